//! Register values and the schema that names them.
//!
//! Registers are positional: slot `i` of a register array is described by
//! slot `i` of the matching variable schema. A schema slot may be `null`,
//! meaning the slot is unused and is skipped when listing fields.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single register value.
///
/// Peers are loose about types (some send every value as a string), so the
/// decoder accepts any JSON scalar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    /// Unset slot.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value, or a number the peer sent as text.
    Text(String),
}

impl RegisterValue {
    /// Build a value from operator text, guided by the schema type name.
    ///
    /// Unknown type names, or text that does not parse as the named type,
    /// are kept as [`RegisterValue::Text`]. The peer performs the
    /// authoritative coercion.
    pub fn coerce(value_type: &str, text: &str) -> Self {
        let trimmed = text.trim();
        match value_type {
            "int" => trimmed.parse().map_or_else(|_| Self::Text(text.to_string()), Self::Int),
            "float" => trimmed.parse().map_or_else(|_| Self::Text(text.to_string()), Self::Float),
            "bool" => match trimmed {
                "true" | "True" | "1" => Self::Bool(true),
                "false" | "False" | "0" => Self::Bool(false),
                _ => Self::Text(text.to_string()),
            },
            _ => Self::Text(text.to_string()),
        }
    }

    /// Numeric view of the value, parsing text if needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Name and type of one register slot.
///
/// Encoded on the wire as a two-element array `["name", "type"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Variable {
    /// Display name.
    pub name: String,
    /// Type name (`int`, `float`, `string`, ...).
    pub value_type: String,
}

impl Variable {
    /// Create a variable description.
    pub fn new(name: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self { name: name.into(), value_type: value_type.into() }
    }
}

impl From<(String, String)> for Variable {
    fn from((name, value_type): (String, String)) -> Self {
        Self { name, value_type }
    }
}

impl From<Variable> for (String, String) {
    fn from(variable: Variable) -> Self {
        (variable.name, variable.value_type)
    }
}

/// Positional register schema. `None` marks an unused slot.
pub type VariableSchema = Vec<Option<Variable>>;
