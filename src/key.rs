//! Tag sets and the canonical series key.
//!
//! A series key is the escaped measurement name followed by the tag set's
//! canonical serialized form. Two points denote the same series iff their
//! keys are byte-equal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::escape::{escape, escape_str, unescape};
use crate::scan::{scan_tag_value, scan_to, to_text};

/// A point's tag set: unique string names mapped to string values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Tags(BTreeMap::new())
    }

    /// Add or replace a tag.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Get a tag value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Remove a tag, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the tag set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over tags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The canonical serialized form of the tag set: names and values
    /// escaped, pairs sorted ascending by escaped name and joined as
    /// `,name=value` with a leading comma per pair. An empty tag set
    /// serializes to empty bytes.
    pub fn hash_key(&self) -> Vec<u8> {
        if self.0.is_empty() {
            return Vec::new();
        }

        // sort on the escaped names: they are what ends up in the key
        let mut escaped: Vec<(String, String)> = self
            .0
            .iter()
            .map(|(k, v)| (escape_str(k), escape_str(v)))
            .collect();
        escaped.sort();

        let size = escaped
            .iter()
            .map(|(k, v)| k.len() + v.len() + 2)
            .sum::<usize>();
        let mut b = Vec::with_capacity(size);
        for (k, v) in &escaped {
            b.push(b',');
            b.extend_from_slice(k.as_bytes());
            b.push(b'=');
            b.extend_from_slice(v.as_bytes());
        }
        b
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Tags {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Build a canonical series key from a raw measurement name and a tag set.
pub fn make_key(name: &[u8], tags: &Tags) -> Vec<u8> {
    let mut key = escape(name);
    key.extend_from_slice(&tags.hash_key());
    key
}

/// Decompose a series key back into its tag mapping, reversing the escapes.
pub(crate) fn tags_from_key(key: &[u8]) -> Tags {
    let mut tags = Tags::new();
    if key.is_empty() {
        return tags;
    }

    let (pos, name) = scan_to(key, 0, b',');
    if name.is_empty() {
        return tags;
    }

    let mut i = pos + 1;
    while i < key.len() {
        let (pos, name) = scan_to(key, i, b'=');
        let (pos, value) = scan_tag_value(key, pos + 1);
        tags.insert(to_text(&unescape(name)), to_text(&unescape(value)));
        i = pos + 1;
    }
    tags
}
