//! Document backends.
//!
//! Each backend parses raw input once into an owned document and hands out
//! borrowed [`DataView`]s over its nodes:
//!
//! - [`json`] - objects addressed by name, arrays by index
//! - [`xml`] - elements addressed by tag, attributes, leaf text collapsing
//! - [`tabular`] - rows and cells addressed by index
//!
//! ```text
//! raw input ──▶ *Document ──root()──▶ DataView ──child()/children()──▶ DataView ...
//! ```

pub mod json;
pub mod tabular;
pub mod xml;

use std::fmt;

use crate::error::ViewError;
use crate::value::Value;

pub use json::{JsonDocument, JsonView};
pub use tabular::{TabularDocument, TabularView};
pub use xml::{XmlDocument, XmlElement, XmlView};

/// Address of a child node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "key {:?}", name),
            Key::Index(i) => write!(f, "index {}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// Shape of the node a view points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    JsonObject,
    JsonArray,
    JsonScalar,
    XmlElement,
    XmlText,
    XmlMissing,
    Table,
    Row,
    Cell,
    /// A value already produced by an action; it can no longer be navigated.
    Resolved,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViewKind::JsonObject => "JSON object",
            ViewKind::JsonArray => "JSON array",
            ViewKind::JsonScalar => "JSON scalar",
            ViewKind::XmlElement => "XML element",
            ViewKind::XmlText => "XML text",
            ViewKind::XmlMissing => "missing XML node",
            ViewKind::Table => "table",
            ViewKind::Row => "row",
            ViewKind::Cell => "cell",
            ViewKind::Resolved => "resolved value",
        };
        f.write_str(name)
    }
}

/// What an iteration does with an element that fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratePolicy {
    /// The failure aborts the whole iteration.
    Propagate,
    /// The element is dropped from the resulting sequence.
    SkipFailed,
}

/// Read-only handle onto one node of a parsed document.
///
/// Navigation never mutates the document; every call returns a new view.
pub trait DataView: Clone + Sized {
    /// Backend name used in error messages.
    const BACKEND: &'static str;

    fn kind(&self) -> ViewKind;

    /// Child addressed by name or position.
    fn child(&self, key: &Key) -> Result<Self, ViewError>;

    /// Attribute lookup. Backends without attributes reject it.
    fn attribute(&self, name: &str) -> Result<Self, ViewError> {
        Err(ViewError::UnsupportedAction {
            action: format!("attribute {:?}", name),
            backend: Self::BACKEND,
        })
    }

    /// Ordered children of an iterable node.
    fn children(&self) -> Result<Vec<Self>, ViewError>;

    /// Children selected by a tag. By default the children of the named child.
    fn children_named(&self, name: &str) -> Result<Vec<Self>, ViewError> {
        self.child(&Key::Name(name.to_string()))?.children()
    }

    /// The node's own value.
    fn as_scalar(&self) -> Value;

    fn iterate_policy(&self) -> IteratePolicy {
        IteratePolicy::Propagate
    }
}
