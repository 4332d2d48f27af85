//! Record instantiation.
//!
//! Applies a record definition to a view: every field binding is evaluated
//! against the view in declaration order, converted if a converter is attached
//! and stored. Nested definitions recurse on narrower views.

use std::fmt;

use tracing::{debug, trace};

use super::options::ResolveOptions;
use crate::error::{ResolveError, ViewError};
use crate::schema::{Action, DefinitionId, Each, Iterate, Schema, Step};
use crate::value::{Record, Value};
use crate::view::{DataView, IteratePolicy, ViewKind};

/// Position reached while evaluating an action.
enum Reached<V> {
    View(V),
    Value(Value),
}

impl<V: DataView> Reached<V> {
    fn into_value(self) -> Value {
        match self {
            Reached::View(view) => view.as_scalar(),
            Reached::Value(value) => value,
        }
    }

    fn into_view(self, step: &Step) -> Result<V, EvalError> {
        match self {
            Reached::View(view) => Ok(view),
            Reached::Value(_) => Err(ViewError::mismatch(describe(step), ViewKind::Resolved).into()),
        }
    }
}

fn describe(step: &Step) -> String {
    match step {
        Step::Key(key) => key.to_string(),
        Step::Attribute(name) => format!("attribute {:?}", name),
        Step::Action(action) => action.to_string(),
        Step::Record(id) => id.to_string(),
    }
}

#[derive(Debug)]
enum Failure {
    View(ViewError),
    Record(ResolveError),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::View(e) => write!(f, "{}", e),
            Failure::Record(e) => write!(f, "{}", e),
        }
    }
}

/// A failure inside one field, with the steps it went through.
///
/// Labels are pushed while the error travels outwards, so `trail` is stored
/// innermost first.
#[derive(Debug)]
struct EvalError {
    trail: Vec<String>,
    failure: Failure,
}

impl EvalError {
    fn at(mut self, label: impl Into<String>) -> Self {
        self.trail.push(label.into());
        self
    }

    fn is_depth_exceeded(&self) -> bool {
        matches!(&self.failure, Failure::Record(e) if e.is_depth_exceeded())
    }

    fn into_resolve_error(self, record: &str, field: &str) -> ResolveError {
        let step = if self.trail.is_empty() {
            "itself".to_string()
        } else {
            self.trail.iter().rev().cloned().collect::<Vec<_>>().join(" / ")
        };

        match self.failure {
            Failure::View(source) => ResolveError::Step {
                record: record.to_string(),
                field: field.to_string(),
                step,
                source,
            },
            Failure::Record(source) if source.is_depth_exceeded() => source,
            Failure::Record(source) => ResolveError::Nested {
                record: record.to_string(),
                field: field.to_string(),
                step,
                source: Box::new(source),
            },
        }
    }
}

impl From<ViewError> for EvalError {
    fn from(e: ViewError) -> Self {
        Self {
            trail: Vec::new(),
            failure: Failure::View(e),
        }
    }
}

impl From<ResolveError> for EvalError {
    fn from(e: ResolveError) -> Self {
        Self {
            trail: Vec::new(),
            failure: Failure::Record(e),
        }
    }
}

/// Applies the definitions of one schema.
#[derive(Debug, Clone, Copy)]
pub struct Executor<'s> {
    schema: &'s Schema,
    options: ResolveOptions,
}

impl<'s> Executor<'s> {
    pub fn new(schema: &'s Schema, options: &ResolveOptions) -> Self {
        Self {
            schema,
            options: *options,
        }
    }

    /// Apply the definition `id` to `view`.
    ///
    /// Either every field resolves or an error is returned; there are no
    /// partial records.
    pub fn instantiate<V: DataView>(&self, id: DefinitionId, view: &V) -> Result<Record, ResolveError> {
        self.record(id, view, 1)
    }

    fn record<V: DataView>(&self, id: DefinitionId, view: &V, depth: usize) -> Result<Record, ResolveError> {
        if depth > self.options.max_depth {
            return Err(ResolveError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }
        let definition = self
            .schema
            .definition(id)
            .ok_or(ResolveError::UnknownDefinition { id: id.index() })?;

        debug!(record = definition.name(), depth, backend = V::BACKEND, "instantiating record");

        let mut fields = Vec::with_capacity(definition.fields().len());
        for binding in definition.fields() {
            let raw = self
                .eval_action(binding.action(), view, depth)
                .map_err(|e| e.into_resolve_error(definition.name(), binding.name()))?
                .into_value();

            let value = match binding.converter() {
                Some(converter) => converter.apply(raw).map_err(|source| ResolveError::ConversionFailed {
                    record: definition.name().to_string(),
                    field: binding.name().to_string(),
                    source,
                })?,
                None => raw,
            };

            trace!(record = definition.name(), field = binding.name(), %value, "resolved field");
            fields.push((binding.name().to_string(), value));
        }

        Ok(Record::new(definition.name(), fields))
    }

    fn name_of(&self, id: DefinitionId) -> String {
        self.schema
            .definition(id)
            .map_or_else(|| id.to_string(), |d| d.name().to_string())
    }

    fn nested<V: DataView>(&self, id: DefinitionId, view: &V, depth: usize) -> Result<Value, EvalError> {
        self.record(id, view, depth + 1)
            .map(Value::Record)
            .map_err(|e| EvalError::from(e).at(self.name_of(id)))
    }

    fn eval_action<V: DataView>(
        &self,
        action: &Action,
        view: &V,
        depth: usize,
    ) -> Result<Reached<V>, EvalError> {
        match action {
            Action::Identity => Ok(Reached::View(view.clone())),
            Action::Iterate(iterate) => self.eval_iterate(iterate, view, depth).map(Reached::Value),
            Action::Select(steps) => self.eval_select(steps, view, depth),
        }
    }

    fn eval_select<V: DataView>(
        &self,
        steps: &[Step],
        view: &V,
        depth: usize,
    ) -> Result<Reached<V>, EvalError> {
        let mut current = Reached::View(view.clone());

        for (i, step) in steps.iter().enumerate() {
            current = self.eval_step(step, current, depth).map_err(|e| {
                steps[..i]
                    .iter()
                    .rev()
                    .fold(e, |e, passed| e.at(passed.to_string()))
            })?;
        }

        Ok(current)
    }

    fn eval_step<V: DataView>(
        &self,
        step: &Step,
        current: Reached<V>,
        depth: usize,
    ) -> Result<Reached<V>, EvalError> {
        let here = current.into_view(step).map_err(|e| e.at(step.to_string()))?;
        match step {
            Step::Key(key) => here
                .child(key)
                .map(Reached::View)
                .map_err(|e| EvalError::from(e).at(step.to_string())),
            Step::Attribute(name) => here
                .attribute(name)
                .map(Reached::View)
                .map_err(|e| EvalError::from(e).at(step.to_string())),
            Step::Action(inner) => self.eval_action(inner, &here, depth),
            // Record steps are always last, so the path ends here.
            Step::Record(id) => self.nested(*id, &here, depth).map(Reached::Value),
        }
    }

    fn eval_iterate<V: DataView>(
        &self,
        iterate: &Iterate,
        view: &V,
        depth: usize,
    ) -> Result<Value, EvalError> {
        let children = match &iterate.over {
            Some(tag) => view.children_named(tag),
            None => view.children(),
        }
        .map_err(|e| EvalError::from(e).at(iterate.to_string()))?;

        let policy = view.iterate_policy();
        let mut items = Vec::with_capacity(children.len());

        for (index, child) in children.iter().enumerate() {
            match self.eval_each(iterate.each.as_ref(), child, depth) {
                Ok(value) => items.push(value),
                Err(e) if policy == IteratePolicy::SkipFailed && !e.is_depth_exceeded() => {
                    debug!(index, error = %e.failure, "skipping element that failed to resolve");
                }
                Err(e) => return Err(e.at(format!("[{}]", index)).at(iterate.to_string())),
            }
        }

        Ok(Value::List(items))
    }

    fn eval_each<V: DataView>(&self, each: Option<&Each>, child: &V, depth: usize) -> Result<Value, EvalError> {
        match each {
            None => Ok(child.as_scalar()),
            Some(Each::Key(key)) => child
                .child(key)
                .map(|v| v.as_scalar())
                .map_err(|e| EvalError::from(e).at(Step::Key(key.clone()).to_string())),
            Some(Each::Attribute(name)) => child
                .attribute(name)
                .map(|v| v.as_scalar())
                .map_err(|e| EvalError::from(e).at(format!("@{}", name))),
            Some(Each::Action(action)) => self.eval_action(action, child, depth).map(Reached::into_value),
            Some(Each::Record(id)) => self.nested(*id, child, depth),
        }
    }
}
