//! Resolution engine.
//!
//! ```text
//! Schema + DefinitionId + DataView
//!        │
//!        ▼
//!   Executor::instantiate ──▶ per field: Action ──▶ raw Value ──▶ Converter ──▶ Record
//!        ▲                                   │
//!        └──── nested definitions ◀──────────┘
//! ```

pub mod executor;
pub mod options;

pub use executor::Executor;
pub use options::{ResolveOptions, DEFAULT_MAX_DEPTH};

use crate::error::ResolveError;
use crate::schema::{DefinitionId, Schema};
use crate::value::Record;
use crate::view::DataView;

/// Apply the definition `id` of `schema` to `view` with default options.
pub fn instantiate<V: DataView>(schema: &Schema, id: DefinitionId, view: V) -> Result<Record, ResolveError> {
    schema.instantiate(id, view)
}
