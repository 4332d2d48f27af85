//! # Miracle - declarative extraction of typed records
//!
//! Miracle applies small, reusable record definitions to JSON, XML and CSV
//! documents. Each field of a definition is bound to a navigation action; the
//! result is an in-memory [`Record`] made of scalars, lists and nested records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  raw input  │────▶│  Document   │────▶│   Engine    │────▶│   Record    │
//! │ JSON/XML/CSV│     │  DataView   │     │ (+ convert) │     │  (owned)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ▲
//!                                        Schema (Registry)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use miracle::{select, Iterate, JsonDocument, RecordBuilder, Registry};
//!
//! let mut registry = Registry::new();
//! let user = registry
//!     .add("User", RecordBuilder::new().field("name", select!["name"]))
//!     .unwrap();
//! let data = registry
//!     .add("Data", RecordBuilder::new().field("users", Iterate::all().record(user)))
//!     .unwrap();
//! let schema = registry.finish().unwrap();
//!
//! let doc = JsonDocument::parse(r#"[{"name":"Alex"},{"name":"Den"}]"#).unwrap();
//! let record = miracle::instantiate(&schema, data, doc.root()).unwrap();
//! let users = record["users"].as_list().unwrap();
//! assert_eq!(users[1].as_record().unwrap()["name"], "Den");
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per area
//! - [`value`] - Resolved values and records
//! - [`view`] - JSON, XML and tabular backends
//! - [`schema`] - Action language, registry, schema files
//! - [`engine`] - Record instantiation
//! - [`convert`] - Post-resolution converters
//! - [`pipeline`] - Format detection and one-call extraction
//! - [`fetch`] - HTTP retrieval

// Core modules
pub mod error;
pub mod value;

// Backends
pub mod view;

// Definitions and resolution
pub mod convert;
pub mod engine;
pub mod schema;

// Collaborators
pub mod fetch;
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConversionError, DocumentError, Error, FetchError, ResolveError, Result, SchemaError, ViewError,
};

// =============================================================================
// Re-exports - Values
// =============================================================================

pub use value::{Record, Value};

// =============================================================================
// Re-exports - Backends
// =============================================================================

pub use view::{
    DataView, IteratePolicy, JsonDocument, JsonView, Key, TabularDocument, TabularView, ViewKind,
    XmlDocument, XmlView,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{
    Action, DefinitionId, Each, FieldBinding, Iterate, RecordBuilder, RecordDefinition, Registry,
    Schema, SchemaFile, Step,
};

// =============================================================================
// Re-exports - Engine and conversion
// =============================================================================

pub use convert::{operations_description, Converter, Operation};
pub use engine::{instantiate, Executor, ResolveOptions};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use fetch::{FetchOptions, Fetched, Fetcher};
pub use pipeline::{Extractor, Format};
