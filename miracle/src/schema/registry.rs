//! Record definitions and the registry that collects them.
//!
//! Definitions refer to each other through [`DefinitionId`] handles, so a
//! definition can be referenced before it is defined, or by itself. The
//! registry is mutable while declaring; [`Registry::finish`] validates it and
//! freezes it into a read-only [`Schema`] that can be shared across threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use super::action::Action;
use crate::convert::Converter;
use crate::engine::{Executor, ResolveOptions};
use crate::error::{ResolveError, SchemaError};
use crate::value::Record;
use crate::view::DataView;

static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(1);

/// Handle to a record definition inside one registry.
///
/// Handles remember the registry that issued them, so a handle from another
/// registry is rejected rather than bound to whatever sits at its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefinitionId {
    registry: u32,
    index: usize,
}

impl DefinitionId {
    pub(crate) fn new(registry: u32, index: usize) -> Self {
        Self { registry, index }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record#{}", self.index)
    }
}

/// One field: how to reach it, and how to convert what was reached.
#[derive(Debug, Clone)]
pub struct FieldBinding {
    name: String,
    action: Action,
    converter: Option<Converter>,
}

impl FieldBinding {
    pub fn new(name: impl Into<String>, action: impl Into<Action>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            converter: None,
        }
    }

    pub fn with_converter(mut self, converter: impl Into<Converter>) -> Self {
        self.converter = Some(converter.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn converter(&self) -> Option<&Converter> {
        self.converter.as_ref()
    }
}

/// Ordered field bindings of one record shape.
#[derive(Debug, Clone)]
pub struct RecordDefinition {
    name: String,
    fields: Vec<FieldBinding>,
}

impl RecordDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldBinding] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Collects the fields of a definition in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    fields: Vec<FieldBinding>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(self, name: impl Into<String>, action: impl Into<Action>) -> Self {
        self.binding(FieldBinding::new(name, action))
    }

    /// A field whose resolved value goes through `converter`.
    pub fn convert(
        self,
        name: impl Into<String>,
        action: impl Into<Action>,
        converter: impl Into<Converter>,
    ) -> Self {
        self.binding(FieldBinding::new(name, action).with_converter(converter))
    }

    pub fn binding(mut self, binding: FieldBinding) -> Self {
        self.fields.push(binding);
        self
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    fields: Option<Vec<FieldBinding>>,
}

/// Mutable collection of record definitions.
///
/// ```rust
/// use miracle::{select, Registry, RecordBuilder, Iterate};
///
/// let mut registry = Registry::new();
/// let user = registry.declare("User").unwrap();
/// let data = registry
///     .add("Data", RecordBuilder::new().field("users", Iterate::all().record(user)))
///     .unwrap();
/// registry
///     .define(user, RecordBuilder::new().field("name", select!["name"]))
///     .unwrap();
/// let schema = registry.finish().unwrap();
/// assert_eq!(schema.lookup("Data"), Some(data));
/// ```
#[derive(Debug)]
pub struct Registry {
    id: u32,
    slots: Vec<Slot>,
    names: HashMap<String, DefinitionId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            names: HashMap::new(),
        }
    }

    fn owns(&self, id: DefinitionId) -> bool {
        id.registry == self.id && id.index < self.slots.len()
    }

    /// Reserve a handle for a definition that will be defined later.
    pub fn declare(&mut self, name: impl Into<String>) -> Result<DefinitionId, SchemaError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(SchemaError::DuplicateDefinition(name));
        }
        let id = DefinitionId::new(self.id, self.slots.len());
        self.names.insert(name.clone(), id);
        self.slots.push(Slot { name, fields: None });
        Ok(id)
    }

    /// Give a declared definition its fields.
    pub fn define(&mut self, id: DefinitionId, builder: RecordBuilder) -> Result<(), SchemaError> {
        if !self.owns(id) {
            return Err(SchemaError::NotDeclared(id.to_string()));
        }
        let slot = &mut self.slots[id.index()];
        if slot.fields.is_some() {
            return Err(SchemaError::AlreadyDefined(slot.name.clone()));
        }

        let mut seen: Vec<&str> = Vec::with_capacity(builder.fields.len());
        for binding in &builder.fields {
            if seen.contains(&binding.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    record: slot.name.clone(),
                    field: binding.name.clone(),
                });
            }
            seen.push(&binding.name);
        }

        slot.fields = Some(builder.fields);
        Ok(())
    }

    /// Declare and define in one call.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        builder: RecordBuilder,
    ) -> Result<DefinitionId, SchemaError> {
        let id = self.declare(name)?;
        self.define(id, builder)?;
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<DefinitionId> {
        self.names.get(name).copied()
    }

    /// Check every definition and freeze the registry.
    pub fn finish(self) -> Result<Schema, SchemaError> {
        let mut definitions = Vec::with_capacity(self.slots.len());

        for slot in &self.slots {
            let fields = slot
                .fields
                .as_ref()
                .ok_or_else(|| SchemaError::Undefined(slot.name.clone()))?;

            for binding in fields {
                if binding.action.has_misplaced_record_step() {
                    return Err(SchemaError::MisplacedRecordStep {
                        record: slot.name.clone(),
                        field: binding.name.clone(),
                    });
                }
                if binding.action.references().iter().any(|id| !self.owns(*id)) {
                    return Err(SchemaError::ForeignHandle {
                        record: slot.name.clone(),
                        field: binding.name.clone(),
                    });
                }
            }

            definitions.push(RecordDefinition {
                name: slot.name.clone(),
                fields: fields.clone(),
            });
        }

        tracing::debug!(definitions = definitions.len(), "schema finished");
        Ok(Schema {
            id: self.id,
            definitions,
            names: self.names,
        })
    }
}

/// A validated, read-only set of record definitions.
#[derive(Debug)]
pub struct Schema {
    id: u32,
    definitions: Vec<RecordDefinition>,
    names: HashMap<String, DefinitionId>,
}

impl Schema {
    pub fn definition(&self, id: DefinitionId) -> Option<&RecordDefinition> {
        if id.registry != self.id {
            return None;
        }
        self.definitions.get(id.index())
    }

    pub fn lookup(&self, name: &str) -> Option<DefinitionId> {
        self.names.get(name).copied()
    }

    pub fn definitions(&self) -> impl Iterator<Item = (DefinitionId, &RecordDefinition)> {
        self.definitions
            .iter()
            .enumerate()
            .map(move |(i, def)| (DefinitionId::new(self.id, i), def))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Apply the definition `id` to `view` with default options.
    pub fn instantiate<V: DataView>(&self, id: DefinitionId, view: V) -> Result<Record, ResolveError> {
        self.instantiate_with(id, view, &ResolveOptions::default())
    }

    pub fn instantiate_with<V: DataView>(
        &self,
        id: DefinitionId,
        view: V,
        options: &ResolveOptions,
    ) -> Result<Record, ResolveError> {
        Executor::new(self, options).instantiate(id, &view)
    }
}
