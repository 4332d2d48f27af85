//! The action language.
//!
//! Actions describe, independently of any backend, how to walk from a view to
//! a value:
//!
//! | Action | Meaning |
//! |--------|---------|
//! | `Select(steps)` | follow steps left to right; a trailing record step wraps the result |
//! | `Iterate { over, each }` | map every child (optionally only those tagged `over`) |
//! | `Identity` | the current node's own value |
//!
//! ```rust,ignore
//! use miracle::{select, Action, Iterate, Step};
//!
//! let name = select!["name"];
//! let rank = select![Step::attr("rank")];
//! let user = select!["a", "c", user_id];
//! let posts = select!["channel", Iterate::over("item").record(post_id)];
//! ```

use std::fmt;

use super::registry::DefinitionId;
use crate::view::Key;

/// One hop of a [`Action::Select`] path.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Child lookup by name or position.
    Key(Key),
    /// Attribute lookup.
    Attribute(String),
    /// A nested action evaluated against the current position.
    Action(Action),
    /// Apply a record definition to the current position. Must be last.
    Record(DefinitionId),
}

impl Step {
    pub fn attr(name: impl Into<String>) -> Self {
        Step::Attribute(name.into())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(Key::Name(name)) => write!(f, "{}", name),
            Step::Key(Key::Index(i)) => write!(f, "[{}]", i),
            Step::Attribute(name) => write!(f, "@{}", name),
            Step::Action(action) => write!(f, "{}", action),
            Step::Record(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for Step {
    fn from(name: &str) -> Self {
        Step::Key(Key::from(name))
    }
}

impl From<String> for Step {
    fn from(name: String) -> Self {
        Step::Key(Key::Name(name))
    }
}

impl From<usize> for Step {
    fn from(i: usize) -> Self {
        Step::Key(Key::Index(i))
    }
}

impl From<Key> for Step {
    fn from(key: Key) -> Self {
        Step::Key(key)
    }
}

impl From<Action> for Step {
    fn from(action: Action) -> Self {
        Step::Action(action)
    }
}

impl From<Iterate> for Step {
    fn from(iterate: Iterate) -> Self {
        Step::Action(Action::Iterate(iterate))
    }
}

impl From<DefinitionId> for Step {
    fn from(id: DefinitionId) -> Self {
        Step::Record(id)
    }
}

/// What an iteration does with each child.
#[derive(Debug, Clone, PartialEq)]
pub enum Each {
    Key(Key),
    Attribute(String),
    Action(Box<Action>),
    Record(DefinitionId),
}

/// Iterate over the children of the current view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Iterate {
    /// Only children carrying this tag (XML) or found under this key.
    pub over: Option<String>,
    /// Mapping applied to each child. `None` passes children through.
    pub each: Option<Each>,
}

impl Iterate {
    /// Iterate over all children of the current view.
    pub fn all() -> Self {
        Self::default()
    }

    /// Iterate over the children selected by `tag`.
    pub fn over(tag: impl Into<String>) -> Self {
        Self {
            over: Some(tag.into()),
            each: None,
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.each = Some(Each::Key(key.into()));
        self
    }

    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.each = Some(Each::Attribute(name.into()));
        self
    }

    pub fn action(mut self, action: impl Into<Action>) -> Self {
        self.each = Some(Each::Action(Box::new(action.into())));
        self
    }

    pub fn record(mut self, id: DefinitionId) -> Self {
        self.each = Some(Each::Record(id));
        self
    }
}

impl fmt::Display for Iterate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.over {
            Some(tag) => write!(f, "each({})", tag),
            None => write!(f, "each"),
        }
    }
}

/// How a field reaches its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Select(Vec<Step>),
    Iterate(Iterate),
    Identity,
}

impl Action {
    pub fn select<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        Action::Select(steps.into_iter().map(Into::into).collect())
    }

    /// Every record definition this action refers to, in path order.
    pub fn references(&self) -> Vec<DefinitionId> {
        let mut found = Vec::new();
        self.collect_references(&mut found);
        found
    }

    fn collect_references(&self, found: &mut Vec<DefinitionId>) {
        match self {
            Action::Select(steps) => {
                for step in steps {
                    match step {
                        Step::Action(inner) => inner.collect_references(found),
                        Step::Record(id) => found.push(*id),
                        Step::Key(_) | Step::Attribute(_) => {}
                    }
                }
            }
            Action::Iterate(iterate) => match &iterate.each {
                Some(Each::Action(inner)) => inner.collect_references(found),
                Some(Each::Record(id)) => found.push(*id),
                _ => {}
            },
            Action::Identity => {}
        }
    }

    /// True when a record step is followed by further steps anywhere in the action.
    pub fn has_misplaced_record_step(&self) -> bool {
        match self {
            Action::Select(steps) => steps.iter().enumerate().any(|(i, step)| match step {
                Step::Record(_) => i + 1 < steps.len(),
                Step::Action(inner) => inner.has_misplaced_record_step(),
                _ => false,
            }),
            Action::Iterate(Iterate {
                each: Some(Each::Action(inner)),
                ..
            }) => inner.has_misplaced_record_step(),
            _ => false,
        }
    }
}

impl From<Iterate> for Action {
    fn from(iterate: Iterate) -> Self {
        Action::Iterate(iterate)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Select(steps) => {
                let parts: Vec<String> = steps.iter().map(ToString::to_string).collect();
                write!(f, "select({})", parts.join(", "))
            }
            Action::Iterate(iterate) => write!(f, "{}", iterate),
            Action::Identity => write!(f, "itself"),
        }
    }
}

/// Build an [`Action::Select`] from heterogeneous steps.
///
/// Each argument goes through `Step::from`: string literals are keys, `usize`
/// values are indices, actions nest, and a [`DefinitionId`] ends the path.
#[macro_export]
macro_rules! select {
    ($($step:expr),* $(,)?) => {
        $crate::schema::Action::Select(vec![$($crate::schema::Step::from($step)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_macro_mixes_step_kinds() {
        let id = DefinitionId::new(0, 3);
        let action = crate::select!["a", 0usize, Step::attr("rank"), id];
        assert_eq!(
            action,
            Action::Select(vec![
                Step::Key(Key::Name("a".into())),
                Step::Key(Key::Index(0)),
                Step::Attribute("rank".into()),
                Step::Record(id),
            ])
        );
        assert_eq!(action.references(), vec![id]);
    }

    #[test]
    fn test_nested_references_are_collected() {
        let post = DefinitionId::new(0, 1);
        let tag = DefinitionId::new(0, 2);
        let action = crate::select![
            "channel",
            Iterate::over("item").action(crate::select![post]),
            Iterate::all().record(tag)
        ];
        assert_eq!(action.references(), vec![post, tag]);
    }

    #[test]
    fn test_misplaced_record_step() {
        let id = DefinitionId::new(0, 0);
        assert!(!crate::select!["a", id].has_misplaced_record_step());
        assert!(crate::select![id, "a"].has_misplaced_record_step());
        let nested = Action::from(Iterate::all().action(crate::select![id, "b"]));
        assert!(nested.has_misplaced_record_step());
    }

    #[test]
    fn test_display() {
        let action = crate::select!["channel", Iterate::over("item"), 2usize, Step::attr("x")];
        assert_eq!(action.to_string(), "select(channel, each(item), [2], @x)");
        assert_eq!(Action::Identity.to_string(), "itself");
    }
}
