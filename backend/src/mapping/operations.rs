//! Value operations for declarative derive rules.
//!
//! Each operation maps one JSON value to another. Operations never fail:
//! inputs they cannot handle pass through unchanged, and conversions that
//! find nothing to convert produce `null` (which drops the field).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// All available rule operations
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

    /// Split string into a trimmed array, dropping empty parts
    Split {
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// First element of an array
    First,

    /// Every element of an array except the first
    Rest,

    /// Join an array into a string
    Join {
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// Map values using a lookup table
    Map {
        mapping: HashMap<String, Value>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value when nothing matches (absent = null, which drops the field)
        #[serde(default)]
        default_unmapped: Option<Value>,
    },

    /// Convert to boolean
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Convert to number (integer or float)
    ToNumber,

    /// Remove all non-digit characters
    DigitsOnly,

    /// Ensure string starts with given prefix
    EnsurePrefix { value: String },
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_true_values() -> Vec<String> {
    ["true", "1", "yes", "y", "on"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Operation {
    /// Apply this operation to a value
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            Operation::Trim => map_str(value, |s| Value::String(s.trim().to_string())),
            Operation::Uppercase => map_str(value, |s| Value::String(s.to_uppercase())),
            Operation::Lowercase => map_str(value, |s| Value::String(s.to_lowercase())),
            Operation::Replace { pattern, value: replacement } => {
                apply_replace(value, pattern, replacement)
            }
            Operation::Split { separator } => map_str(value, |s| {
                Value::Array(
                    s.split(separator.as_str())
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(|p| Value::String(p.to_string()))
                        .collect(),
                )
            }),
            Operation::First => match value {
                Value::Array(items) => items.first().cloned().unwrap_or(Value::Null),
                other => other.clone(),
            },
            Operation::Rest => match value {
                Value::Array(items) => Value::Array(items.iter().skip(1).cloned().collect()),
                _ => Value::Array(Vec::new()),
            },
            Operation::Join { separator } => match value {
                Value::Array(items) => Value::String(
                    items
                        .iter()
                        .filter_map(as_string)
                        .collect::<Vec<_>>()
                        .join(separator),
                ),
                other => other.clone(),
            },
            Operation::Map { mapping, case_insensitive, default_unmapped } => {
                apply_map(value, mapping, *case_insensitive, default_unmapped.as_ref())
            }
            Operation::ToBoolean { true_values } => match value {
                Value::Bool(_) => value.clone(),
                _ => as_string(value)
                    .map(|s| {
                        let lower = s.trim().to_lowercase();
                        Value::Bool(true_values.iter().any(|tv| tv.to_lowercase() == lower))
                    })
                    .unwrap_or(Value::Bool(false)),
            },
            Operation::ToNumber => apply_to_number(value),
            Operation::DigitsOnly => map_str(value, |s| {
                Value::String(s.chars().filter(|c| c.is_ascii_digit()).collect())
            }),
            Operation::EnsurePrefix { value: prefix } => map_str(value, |s| {
                if s.starts_with(prefix.as_str()) {
                    Value::String(s)
                } else {
                    Value::String(format!("{}{}", prefix, s))
                }
            }),
        }
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Apply `f` to the string form of scalars; arrays are mapped element-wise.
fn map_str(value: &Value, f: impl Fn(String) -> Value + Copy) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| map_str(v, f)).collect()),
        _ => as_string(value).map(f).unwrap_or_else(|| value.clone()),
    }
}

fn apply_replace(value: &Value, pattern: &str, replacement: &str) -> Value {
    match regex::Regex::new(pattern) {
        Ok(re) => map_str(value, |s| Value::String(re.replace_all(&s, replacement).into_owned())),
        Err(_) => value.clone(),
    }
}

fn apply_map(
    value: &Value,
    mapping: &HashMap<String, Value>,
    case_insensitive: bool,
    default_unmapped: Option<&Value>,
) -> Value {
    let Some(key) = as_string(value) else {
        return value.clone();
    };

    let found = if case_insensitive {
        let key = key.to_lowercase();
        mapping.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v)
    } else {
        mapping.get(&key)
    };

    found
        .or(default_unmapped)
        .cloned()
        .unwrap_or(Value::Null)
}

fn apply_to_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        _ => as_string(value)
            .and_then(|s| {
                let s = s.trim();
                if let Ok(n) = s.parse::<i64>() {
                    return Some(Value::Number(n.into()));
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            })
            .unwrap_or(Value::Null),
    }
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available rule operations:

| Operation | Description | Parameters |
|-----------|-------------|------------|
| trim | Remove leading/trailing whitespace | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| replace | Regex pattern replacement | pattern: regex, value: replacement |
| split | Split into trimmed array | separator (default ",") |
| first | First array element | - |
| rest | All array elements but the first | - |
| join | Join array into string | separator (default ",") |
| map | Lookup table | mapping: {source: target}, case_insensitive, default_unmapped |
| to_boolean | Convert to boolean | true_values: list of truthy strings |
| to_number | Convert to number | - |
| digits_only | Keep only digits | - |
| ensure_prefix | Add prefix if not present | value: prefix string |

Example:
[
  {"type": "split", "separator": ","},
  {"type": "first"},
  {"type": "map", "mapping": {"x": "Experimental"}, "case_insensitive": true}
]"#
    .to_string()
}
