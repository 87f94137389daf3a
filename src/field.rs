//! Field sets and their canonical byte encoding.
//!
//! Fields are stored on a point as validated text bytes and decoded on
//! demand. The canonical encoding sorts field names ascending, so two
//! points with equal structured content are byte-identical here as well.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::escape::escape_str;
use crate::scan::{scan_field_value, scan_to, to_text};
use crate::value::FieldValue;

/// A point's field set: unique string names mapped to typed values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    /// Create an empty field set.
    pub fn new() -> Self {
        Fields(BTreeMap::new())
    }

    /// Add or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Remove a field, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.remove(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the field set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Decode a stored field encoding back into typed values.
    ///
    /// A value starting with `"` decodes to a string with the quotes
    /// stripped and escapes reversed; one starting with a digit, `-`, or
    /// `.` decodes to an integer when it has no decimal point and a float
    /// otherwise; anything else must be exactly `true` or `false`. Content
    /// that fits none of these is [`Error::InvalidFieldBytes`].
    pub fn from_encoded(buf: &[u8]) -> Result<Fields> {
        let mut fields = BTreeMap::new();
        let mut i = 0;
        while i < buf.len() {
            let (pos, name) = scan_to(buf, i, b'=');
            if name.is_empty() || pos >= buf.len() {
                return Err(Error::InvalidFieldBytes(to_text(buf)));
            }

            let (pos, value_buf) = scan_field_value(buf, pos + 1);
            let value = decode_value(value_buf)?;
            fields.insert(to_text(&crate::escape::unescape(name)), value);
            i = pos + 1;
        }
        Ok(Fields(fields))
    }

    /// Encode the field set into its canonical byte form: names ascending,
    /// `name=value` pairs joined with commas, null values omitted.
    pub fn to_encoded(&self) -> Vec<u8> {
        let mut b = Vec::new();
        for (name, value) in &self.0 {
            if value.is_null() {
                continue;
            }
            b.extend_from_slice(escape_str(name).as_bytes());
            b.push(b'=');
            encode_value(&mut b, value);
            b.push(b',');
        }
        // trim the separator after the last pair
        b.pop();
        b
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Fields(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn encode_value(b: &mut Vec<u8>, value: &FieldValue) {
    match value {
        // integers go through the float formatter; see FieldValue::Integer
        FieldValue::Integer(i) => {
            b.extend_from_slice(format!("{}", *i as f64).as_bytes());
        }
        FieldValue::Float(f) => {
            let v = f.into_inner();
            b.extend_from_slice(format!("{}", v).as_bytes());
            // a float always carries a decimal point
            if v.is_finite() && v.fract() == 0.0 {
                b.extend_from_slice(b".0");
            }
        }
        FieldValue::Boolean(v) => {
            b.extend_from_slice(if *v { b"true" } else { b"false" });
        }
        FieldValue::String(s) => {
            b.push(b'"');
            for &c in s.as_bytes() {
                if c == b'"' || c == b'\\' {
                    b.push(b'\\');
                }
                b.push(c);
            }
            b.push(b'"');
        }
        FieldValue::Bytes(raw) => b.extend_from_slice(raw),
        FieldValue::Null => {}
    }
}

fn decode_value(value_buf: &[u8]) -> Result<FieldValue> {
    if value_buf.is_empty() {
        return Ok(FieldValue::Null);
    }

    if value_buf[0] == b'"' {
        if value_buf.len() < 2 || value_buf[value_buf.len() - 1] != b'"' {
            return Err(Error::InvalidFieldBytes(to_text(value_buf)));
        }
        return Ok(FieldValue::String(unescape_quoted(
            &value_buf[1..value_buf.len() - 1],
        )));
    }

    if value_buf[0].is_ascii_digit() || value_buf[0] == b'-' || value_buf[0] == b'.' {
        return decode_number(value_buf);
    }

    match value_buf {
        b"true" => Ok(FieldValue::Boolean(true)),
        b"false" => Ok(FieldValue::Boolean(false)),
        _ => Err(Error::InvalidFieldBytes(to_text(value_buf))),
    }
}

fn decode_number(value_buf: &[u8]) -> Result<FieldValue> {
    let s = to_text(value_buf);
    if value_buf.contains(&b'.') {
        s.parse::<f64>()
            .map(|f| FieldValue::Float(OrderedFloat(f)))
            .map_err(|_| Error::InvalidFieldBytes(s.clone()))
    } else {
        s.parse::<i64>()
            .map(FieldValue::Integer)
            .map_err(|_| Error::InvalidFieldBytes(s.clone()))
    }
}

// Reverses the escapes the string encoder and the line parser may have put
// inside a quoted value: the four reserved bytes plus the backslash itself.
fn unescape_quoted(buf: &[u8]) -> String {
    let mut out = Vec::with_capacity(buf.len());
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\\'
            && i + 1 < buf.len()
            && matches!(buf[i + 1], b',' | b'"' | b' ' | b'=' | b'\\')
        {
            out.push(buf[i + 1]);
            i += 2;
        } else {
            out.push(buf[i]);
            i += 1;
        }
    }
    to_text(&out)
}
