//! Field value types for line-protocol points.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A single field value carried by a point.
///
/// Fields are typed but unindexed; they are not part of series identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Signed 64-bit integer.
    ///
    /// Integers are written through the floating-point text formatter, so
    /// an encoded integer is indistinguishable from a float with no
    /// fractional part. This is a legacy quirk of the format, kept on
    /// purpose.
    Integer(i64),

    /// 64-bit floating point value. Always encoded with a decimal point.
    Float(OrderedFloat<f64>),

    /// Boolean value, encoded as `true`/`false`.
    Boolean(bool),

    /// String value, encoded surrounded by double quotes.
    String(String),

    /// Raw byte payload, written verbatim and unquoted.
    Bytes(Vec<u8>),

    /// Null value. Omitted from the encoding entirely.
    Null,
}

impl FieldValue {
    /// Returns the value as an i64 if it is an `Integer` variant.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an f64 if it is a `Float` variant.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(f.into_inner()),
            _ => None,
        }
    }

    /// Returns the value as a bool if it is a `Boolean` variant.
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is a `String` variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a byte slice if it is a `Bytes` variant.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(OrderedFloat(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Bytes(b) => write!(f, "<binary {} bytes>", b.len()),
            FieldValue::Null => write!(f, "null"),
        }
    }
}
