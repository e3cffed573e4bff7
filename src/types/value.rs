use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{GraphError, Result};

/// Property map of a node or edge. Ordered so encodings are deterministic.
pub type Properties = BTreeMap<String, Value>;

/// Typed property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float. Must be finite.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Dense float32 vector, used by vector indexes.
    Vector(Vec<f32>),
}

impl Value {
    /// Converts generic numeric input: integral values become `Int`, anything
    /// with a fractional part (or outside the `i64` range) becomes `Float`.
    pub fn from_number(n: f64) -> Value {
        // 2^63 is exactly representable; anything at or above it overflows i64.
        const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
        if n.is_finite() && n.fract() == 0.0 && n >= -I64_BOUND && n < I64_BOUND {
            Value::Int(n as i64)
        } else {
            Value::Float(n)
        }
    }

    /// Converts a raw JSON value received from an API caller.
    ///
    /// Strings, booleans and numbers map to their variants; an array of numbers
    /// becomes a `Vector`. `null`, objects and mixed arrays are rejected.
    pub fn from_json(raw: &serde_json::Value) -> Result<Value> {
        match raw {
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::from_number(f))
                } else {
                    Err(GraphError::invalid("unrepresentable number"))
                }
            }
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let f = item
                        .as_f64()
                        .ok_or_else(|| GraphError::invalid("vector elements must be numbers"))?;
                    out.push(f as f32);
                }
                Ok(Value::Vector(out))
            }
            serde_json::Value::Null => {
                Err(GraphError::invalid("null property values are not supported"))
            }
            serde_json::Value::Object(_) => {
                Err(GraphError::invalid("nested objects are not supported"))
            }
        }
    }

    /// Raw JSON form handed back to API callers for re-serialization.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Vector(v) => {
                serde_json::Value::Array(v.iter().map(|x| serde_json::Value::from(*x)).collect())
            }
        }
    }

    /// Rejects values that cannot be logged and replayed faithfully.
    pub fn validate(&self) -> Result<()> {
        match self {
            Value::Float(f) if !f.is_finite() => {
                Err(GraphError::invalid("float property must be finite"))
            }
            Value::Vector(v) => check_vector(v),
            _ => Ok(()),
        }
    }

    /// Returns the string payload, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the float payload, if this is a `Float`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the vector payload, if this is a `Vector`.
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Value::Vector(v) => Some(v),
            _ => None,
        }
    }
}

/// Rejects vectors with a non-finite component or whose squared norm
/// overflows `f32`, since distances over them cannot be represented.
pub(crate) fn check_vector(v: &[f32]) -> Result<()> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(GraphError::invalid("vector contains NaN or infinite component"));
    }
    let squared: f64 = v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum();
    if squared > f64::from(f32::MAX) {
        return Err(GraphError::invalid("vector norm overflows f32"));
    }
    Ok(())
}

/// Validates every value of a property map.
pub(crate) fn validate_properties(props: &Properties) -> Result<()> {
    for (key, value) in props {
        if key.is_empty() {
            return Err(GraphError::invalid("property name must not be empty"));
        }
        value.validate()?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Vector(v) => write!(f, "vector(dim={})", v.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<f32>> for Value {
    fn from(value: Vec<f32>) -> Self {
        Value::Vector(value)
    }
}
