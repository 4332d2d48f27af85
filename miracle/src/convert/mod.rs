//! Post-resolution conversion.
//!
//! A [`Converter`] sees only the raw value of its own field. It is either a
//! chain of named [`Operation`]s, which schema files can describe, or a custom
//! closure supplied by application code.

pub mod operations;

use std::fmt;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::value::Value;

pub use operations::{operations_description, Operation};

/// Signature of a custom converter.
pub type ConvertFn = dyn Fn(Value) -> Result<Value, ConversionError> + Send + Sync;

/// Pure function applied to a field's resolved value.
#[derive(Clone)]
pub enum Converter {
    /// Operations applied in order.
    Operations(Vec<Operation>),
    /// Application-supplied function.
    Custom { name: String, func: Arc<ConvertFn> },
}

impl Converter {
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        Converter::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn apply(&self, value: Value) -> Result<Value, ConversionError> {
        match self {
            Converter::Operations(ops) => ops.iter().try_fold(value, |acc, op| op.apply(acc)),
            Converter::Custom { func, .. } => func(value),
        }
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Operations(ops) => f.debug_tuple("Operations").field(ops).finish(),
            Converter::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

impl From<Operation> for Converter {
    fn from(op: Operation) -> Self {
        Converter::Operations(vec![op])
    }
}

impl From<Vec<Operation>> for Converter {
    fn from(ops: Vec<Operation>) -> Self {
        Converter::Operations(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_chain_in_order() {
        let converter = Converter::from(vec![Operation::Trim, Operation::ToInt]);
        assert_eq!(converter.apply(" 42 ".into()).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_custom_converter() {
        let double = Converter::custom("double", |v: Value| match v.as_i64() {
            Some(n) => Ok(Value::Int(n * 2)),
            None => Err(ConversionError::new("double", v.to_string(), "not an integer")),
        });
        assert_eq!(double.apply(Value::Int(21)).unwrap(), Value::Int(42));
        assert!(double.apply("x".into()).is_err());
        assert_eq!(format!("{:?}", double), "Custom { name: \"double\" }");
    }

    #[test]
    fn test_chain_stops_at_first_failure() {
        let converter = Converter::from(vec![Operation::ToInt, Operation::Uppercase]);
        let err = converter.apply("abc".into()).unwrap_err();
        assert_eq!(err.converter, "to_int");
    }
}
