//! Error types for document loading, schema declaration and record resolution.
//!
//! - [`ViewError`] - navigation failures raised by a backend
//! - [`ConversionError`] - a field converter rejected its input
//! - [`ResolveError`] - a record could not be instantiated
//! - [`DocumentError`] - raw input could not be parsed into a document
//! - [`SchemaError`] - a schema could not be declared or loaded
//! - [`FetchError`] - HTTP retrieval errors
//! - [`Error`] - top-level error used by the pipeline and the CLI
//!
//! Conversion is automatic via `From` implementations, so `?` works across
//! error boundaries.

use thiserror::Error;

use crate::view::ViewKind;

// =============================================================================
// Navigation Errors
// =============================================================================

/// Errors raised by a [`crate::view::DataView`] while navigating.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewError {
    /// The requested key, index or attribute does not exist.
    #[error("{key} not found in {kind}")]
    NotFound { key: String, kind: ViewKind },

    /// The addressing mode does not fit the kind of the current node.
    #[error("{operation} is not possible on {kind}")]
    TypeMismatch { operation: String, kind: ViewKind },

    /// The backend has no semantics for this kind of step.
    #[error("{action} is not supported by the {backend} backend")]
    UnsupportedAction { action: String, backend: &'static str },
}

impl ViewError {
    pub fn not_found(key: impl ToString, kind: ViewKind) -> Self {
        Self::NotFound {
            key: key.to_string(),
            kind,
        }
    }

    pub fn mismatch(operation: impl ToString, kind: ViewKind) -> Self {
        Self::TypeMismatch {
            operation: operation.to_string(),
            kind,
        }
    }
}

// =============================================================================
// Conversion Errors
// =============================================================================

/// A converter refused the value it was given.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{converter} rejected {input}: {reason}")]
pub struct ConversionError {
    pub converter: String,
    pub input: String,
    pub reason: String,
}

impl ConversionError {
    pub fn new(
        converter: impl Into<String>,
        input: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            converter: converter.into(),
            input: input.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Errors while applying a record definition to a view.
///
/// Field-level variants name the record, the field and the trail of steps
/// that led to the failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A navigation step failed.
    #[error("{record}.{field}: step `{step}` failed: {source}")]
    Step {
        record: String,
        field: String,
        step: String,
        #[source]
        source: ViewError,
    },

    /// A nested record could not be instantiated.
    #[error("{record}.{field} (at `{step}`): {source}")]
    Nested {
        record: String,
        field: String,
        step: String,
        #[source]
        source: Box<ResolveError>,
    },

    /// The field converter rejected the resolved value.
    #[error("{record}.{field}: conversion failed: {source}")]
    ConversionFailed {
        record: String,
        field: String,
        #[source]
        source: ConversionError,
    },

    /// Record nesting went deeper than allowed.
    #[error("record nesting exceeded {limit} levels")]
    DepthExceeded { limit: usize },

    /// The definition handle does not belong to this schema.
    #[error("unknown record definition #{id}")]
    UnknownDefinition { id: usize },
}

impl ResolveError {
    /// The navigation error at the bottom of a chain of nested failures.
    pub fn view_error(&self) -> Option<&ViewError> {
        match self {
            Self::Step { source, .. } => Some(source),
            Self::Nested { source, .. } => source.view_error(),
            _ => None,
        }
    }

    /// The innermost error of a chain of nested failures.
    pub fn root_cause(&self) -> &ResolveError {
        match self {
            Self::Nested { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.view_error(), Some(ViewError::NotFound { .. }))
    }

    pub fn is_depth_exceeded(&self) -> bool {
        matches!(self.root_cause(), Self::DepthExceeded { .. })
    }
}

// =============================================================================
// Document Errors
// =============================================================================

/// Errors while turning raw input into a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot decode input: {0}")]
    Encoding(String),

    #[error("input is empty")]
    Empty,

    #[error("document nests deeper than {limit} elements")]
    TooDeep { limit: usize },
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while declaring record definitions or loading a schema file.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("record '{0}' is declared twice")]
    DuplicateDefinition(String),

    #[error("record '{0}' is already defined")]
    AlreadyDefined(String),

    #[error("record '{0}' is declared but never defined")]
    Undefined(String),

    #[error("record '{record}' declares field '{field}' twice")]
    DuplicateField { record: String, field: String },

    #[error("{record}.{field} refers to unknown record '{target}'")]
    UnknownReference {
        record: String,
        field: String,
        target: String,
    },

    #[error("{record}.{field} refers to a record handle from another registry")]
    ForeignHandle { record: String, field: String },

    #[error("{record}.{field}: a record step must be the last step of a path")]
    MisplacedRecordStep { record: String, field: String },

    #[error("record '{0}' is not declared")]
    NotDeclared(String),

    #[error("invalid schema file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read schema file: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Fetch Errors
// =============================================================================

/// Errors from the HTTP document fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("invalid fetch configuration: {0}")]
    Config(String),
}

// =============================================================================
// Top-level Error
// =============================================================================

/// Top-level error returned by the pipeline helpers and the CLI.
#[derive(Debug, Error)]
pub enum Error {
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot detect the document format of {0}")]
    UnknownFormat(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type ViewResult<T> = Result<T, ViewError>;

pub type ResolveResult<T> = Result<T, ResolveError>;

pub type DocumentResult<T> = Result<T, DocumentError>;

pub type SchemaResult<T> = Result<T, SchemaError>;

pub type FetchResult<T> = Result<T, FetchError>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let doc_err = DocumentError::Empty;
        let err: Error = doc_err.into();
        assert!(err.to_string().contains("empty"));

        let schema_err = SchemaError::Undefined("User".into());
        let err: Error = schema_err.into();
        assert!(err.to_string().contains("User"));
    }

    #[test]
    fn test_nested_error_reaches_view_error() {
        let inner = ResolveError::Step {
            record: "User".into(),
            field: "name".into(),
            step: "name".into(),
            source: ViewError::not_found("key \"name\"", ViewKind::JsonObject),
        };
        let outer = ResolveError::Nested {
            record: "Data".into(),
            field: "user".into(),
            step: "a / c / User".into(),
            source: Box::new(inner),
        };

        assert!(outer.is_not_found());
        assert!(!outer.is_depth_exceeded());
        let msg = outer.to_string();
        assert!(msg.contains("Data.user"));
        assert!(msg.contains("a / c / User"));
    }

    #[test]
    fn test_step_error_format() {
        let err = ResolveError::Step {
            record: "Country".into(),
            field: "rank".into(),
            step: "[0]".into(),
            source: ViewError::mismatch("index 0", ViewKind::XmlElement),
        };
        let msg = err.to_string();
        assert!(msg.contains("Country.rank"));
        assert!(msg.contains("[0]"));
        assert!(msg.contains("XML element"));
    }
}
