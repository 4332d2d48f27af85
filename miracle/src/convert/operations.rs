//! Named conversion operations.
//!
//! Operations are serde-describable so schema files can attach them to fields.
//! String operations pass other values through untouched; parsing operations
//! reject input they cannot read. Lists are converted element by element.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::ConversionError;
use crate::value::Value;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid year pattern"));

/// Compiled `replace` patterns, shared by every operation using them.
static PATTERNS: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let mut cache = PATTERNS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// All available conversion operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Parse an integer
    ToInt,

    /// Parse a floating point number
    ToFloat,

    /// Convert to boolean
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Parse a date/time: `rfc2822`, `rfc3339` or a chrono format string
    ParseTimestamp {
        #[serde(default = "default_timestamp_format")]
        format: String,
    },

    /// Split string into a list
    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },

    /// Map values using a lookup table
    Map {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value to use when nothing matches (absent = keep the input)
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Remove all non-digit characters
    DigitsOnly,

    /// Extract the first 4-digit year as an integer
    ExtractYear,

    /// Replace a null value
    Default { value: serde_json::Value },
}

fn default_true_values() -> Vec<String> {
    ["true", "1", "yes", "y", "on"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timestamp_format() -> String {
    "rfc3339".to_string()
}

fn default_split_separator() -> String {
    ",".to_string()
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Trim => "trim",
            Operation::Uppercase => "uppercase",
            Operation::Lowercase => "lowercase",
            Operation::Replace { .. } => "replace",
            Operation::ToInt => "to_int",
            Operation::ToFloat => "to_float",
            Operation::ToBoolean { .. } => "to_boolean",
            Operation::ParseTimestamp { .. } => "parse_timestamp",
            Operation::Split { .. } => "split",
            Operation::Map { .. } => "map",
            Operation::DigitsOnly => "digits_only",
            Operation::ExtractYear => "extract_year",
            Operation::Default { .. } => "default",
        }
    }

    /// Apply this operation to a value
    pub fn apply(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::List(items) if !matches!(self, Operation::Default { .. }) => items
                .into_iter()
                .map(|item| self.apply(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => self.apply_one(other),
        }
    }

    fn apply_one(&self, value: Value) -> Result<Value, ConversionError> {
        match self {
            Operation::Trim => Ok(map_str(value, |s| s.trim().to_string())),
            Operation::Uppercase => Ok(map_str(value, |s| s.to_uppercase())),
            Operation::Lowercase => Ok(map_str(value, |s| s.to_lowercase())),
            Operation::Replace { pattern, value: replacement } => {
                let re = compiled(pattern)
                    .map_err(|e| self.reject(&Value::from(pattern.as_str()), e.to_string()))?;
                Ok(map_str(value, |s| re.replace_all(s, replacement.as_str()).into_owned()))
            }
            Operation::ToInt => self.apply_to_int(value),
            Operation::ToFloat => self.apply_to_float(value),
            Operation::ToBoolean { true_values } => Ok(apply_to_boolean(value, true_values)),
            Operation::ParseTimestamp { format } => self.apply_parse_timestamp(value, format),
            Operation::Split { separator } => Ok(match value {
                Value::Str(s) => Value::List(
                    s.split(separator.as_str())
                        .map(|part| Value::from(part.trim()))
                        .collect(),
                ),
                other => other,
            }),
            Operation::Map {
                mapping,
                case_insensitive,
                default_unmapped,
            } => Ok(apply_map(value, mapping, *case_insensitive, default_unmapped.as_deref())),
            Operation::DigitsOnly => Ok(map_str(value, |s| {
                s.chars().filter(|c| c.is_ascii_digit()).collect()
            })),
            Operation::ExtractYear => Ok(match value {
                Value::Str(s) => YEAR
                    .find(&s)
                    .and_then(|m| m.as_str().parse::<i64>().ok())
                    .map_or(Value::Null, Value::Int),
                other => other,
            }),
            Operation::Default { value: fallback } => Ok(match value {
                Value::Null => Value::from(fallback),
                other => other,
            }),
        }
    }

    fn reject(&self, input: &Value, reason: impl Into<String>) -> ConversionError {
        ConversionError::new(self.name(), input.to_string(), reason)
    }

    fn apply_to_int(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::Int(_) => Ok(value),
            // i64::MAX is not representable, its f64 rounds up to 2^63
            Value::Float(x) if x.is_finite() => {
                let whole = x.trunc();
                if whole >= i64::MIN as f64 && whole < i64::MAX as f64 {
                    Ok(Value::Int(whole as i64))
                } else {
                    Err(self.reject(&value, "out of range for a 64-bit integer"))
                }
            }
            Value::Str(ref s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| self.reject(&value, e.to_string())),
            other => Err(self.reject(&other, format!("cannot read an integer from {}", other.type_name()))),
        }
    }

    fn apply_to_float(&self, value: Value) -> Result<Value, ConversionError> {
        match value {
            Value::Float(_) => Ok(value),
            Value::Int(n) => Ok(Value::Float(n as f64)),
            Value::Str(ref s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| self.reject(&value, e.to_string())),
            other => Err(self.reject(&other, format!("cannot read a number from {}", other.type_name()))),
        }
    }

    fn apply_parse_timestamp(&self, value: Value, format: &str) -> Result<Value, ConversionError> {
        if let Value::Timestamp(_) = value {
            return Ok(value);
        }
        let text = match &value {
            Value::Str(s) => s.trim(),
            other => {
                return Err(self.reject(other, format!("cannot read a timestamp from {}", other.type_name())))
            }
        };

        let parsed = match format {
            "rfc2822" => DateTime::parse_from_rfc2822(text).map(|t| t.naive_utc()),
            "rfc3339" => DateTime::parse_from_rfc3339(text).map(|t| t.naive_utc()),
            custom => NaiveDateTime::parse_from_str(text, custom).or_else(|e| {
                NaiveDate::parse_from_str(text, custom)
                    .map(|d| d.and_time(NaiveTime::default()))
                    .map_err(|_| e)
            }),
        };

        parsed
            .map(Value::Timestamp)
            .map_err(|e| self.reject(&value, e.to_string()))
    }
}

fn map_str(value: Value, f: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::Str(s) => Value::Str(f(&s)),
        other => other,
    }
}

fn apply_to_boolean(value: Value, true_values: &[String]) -> Value {
    match value {
        Value::Bool(_) => value,
        Value::Int(n) => Value::Bool(n != 0),
        Value::Str(s) => {
            let lower = s.trim().to_lowercase();
            Value::Bool(true_values.iter().any(|tv| tv.to_lowercase() == lower))
        }
        _ => Value::Bool(false),
    }
}

fn apply_map(
    value: Value,
    mapping: &HashMap<String, String>,
    case_insensitive: bool,
    default_unmapped: Option<&str>,
) -> Value {
    let s = match &value {
        Value::Str(s) => s,
        _ => return value,
    };

    let found = if case_insensitive {
        let key = s.to_lowercase();
        mapping
            .iter()
            .find(|(k, _)| k.to_lowercase() == key)
            .map(|(_, v)| v)
    } else {
        mapping.get(s)
    };

    match (found, default_unmapped) {
        (Some(mapped), _) => Value::from(mapped.as_str()),
        (None, Some(d)) => Value::from(d),
        (None, None) => value,
    }
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available conversion operations:

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| to_int | Parse an integer (fails on bad input) | - |
| to_float | Parse a number (fails on bad input) | - |
| to_boolean | Convert to boolean | true_values: list of truthy strings |
| parse_timestamp | Parse a date/time (fails on bad input) | format: "rfc2822", "rfc3339" or chrono format |
| split | Split into a list | separator: split string (default ",") |
| map | Map values using lookup table | mapping: {source: target}, case_insensitive: bool, default_unmapped: string |
| digits_only | Keep only digits | - |
| extract_year | Extract 4-digit year from a date | - |
| default | Replace null | value: any JSON value |

Example operations in JSON:
[
  {"type": "trim"},
  {"type": "to_int"},
  {"type": "parse_timestamp", "format": "rfc2822"},
  {"type": "map", "mapping": {"E": "east", "W": "west"}, "case_insensitive": true}
]"#
    .to_string()
}
