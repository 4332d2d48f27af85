//! Record definitions and the action language.
//!
//! - [`action`] - Select / Iterate / Identity and the `select!` macro
//! - [`registry`] - definitions, the mutable [`Registry`] and the frozen [`Schema`]
//! - [`file`] - JSON schema files

pub mod action;
pub mod file;
pub mod registry;

pub use action::{Action, Each, Iterate, Step};
pub use file::SchemaFile;
pub use registry::{DefinitionId, FieldBinding, RecordBuilder, RecordDefinition, Registry, Schema};
