//! Ordered JSON object tree
//!
//! [`JsonTree`] is a JSON object whose keys keep insertion order, with typed
//! accessors and a merge that can either fill gaps or overwrite.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SupportError, SupportResult};

/// Name of a JSON value's kind, used in error messages
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// JSON object with insertion-ordered keys
///
/// # Examples
/// ```
/// use tidepool_support::JsonTree;
///
/// let mut base = JsonTree::parse(r#"{"host": "localhost", "limits": {"conns": 10}}"#)?;
/// let patch = JsonTree::parse(r#"{"limits": {"conns": 50, "idle": 5}, "tls": true}"#)?;
///
/// base.merge(&patch, true);
/// assert_eq!(
///     base.to_json_string(),
///     r#"{"host":"localhost","limits":{"conns":50,"idle":5},"tls":true}"#
/// );
/// # Ok::<(), tidepool_support::SupportError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonTree {
    map: Map<String, Value>,
}

impl JsonTree {
    /// Creates an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document whose top level is an object
    pub fn parse(text: &str) -> SupportResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::try_from(value)
    }

    /// Inserts or replaces `key`, returning the previous value
    ///
    /// A new key goes to the end; replacing keeps the key's position.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.map.insert(key.into(), value.into())
    }

    /// Raw value under `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// String under `key`
    ///
    /// `Ok(None)` when the key is missing, an error when it holds something
    /// other than a string.
    pub fn get_string(&self, key: &str) -> SupportResult<Option<&str>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(other) => Err(SupportError::type_mismatch(key, "string", kind(other))),
        }
    }

    /// Nested object under `key`, copied out as its own tree
    ///
    /// `Ok(None)` when the key is missing, an error when it holds something
    /// other than an object.
    pub fn get_json_object(&self, key: &str) -> SupportResult<Option<JsonTree>> {
        match self.map.get(key) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(Self { map: map.clone() })),
            Some(other) => Err(SupportError::type_mismatch(key, "object", kind(other))),
        }
    }

    /// Removes `key`, returning its value
    ///
    /// Later keys keep their relative order.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.shift_remove(key)
    }

    /// True if `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Keys in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Number of top-level keys
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// True if there are no keys
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Structural equality, ignoring key order
    pub fn equals(&self, other: &JsonTree) -> bool {
        self == other
    }

    /// Merges `other` into `self`
    ///
    /// Keys missing from `self` are appended in `other`'s order. For keys
    /// present in both, `overwrite` decides: when false the existing value
    /// stays; when true it is replaced, except that two objects are merged
    /// recursively with the same rule. `other` is never modified.
    pub fn merge(&mut self, other: &JsonTree, overwrite: bool) {
        merge_maps(&mut self.map, &other.map, overwrite);
    }

    /// Compact JSON text
    pub fn to_json_string(&self) -> String {
        // Map<String, Value> always serializes
        Value::Object(self.map.clone()).to_string()
    }

    /// Indented JSON text
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.map).unwrap_or_default()
    }

    /// Converts into a `serde_json::Value::Object`
    pub fn into_value(self) -> Value {
        Value::Object(self.map)
    }
}

fn merge_maps(target: &mut Map<String, Value>, source: &Map<String, Value>, overwrite: bool) {
    for (key, incoming) in source {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), incoming.clone());
            }
            Some(_) if !overwrite => {}
            Some(existing) => match (existing, incoming) {
                (Value::Object(existing), Value::Object(nested)) => {
                    merge_maps(existing, nested, true);
                }
                (existing, incoming) => *existing = incoming.clone(),
            },
        }
    }
}

impl TryFrom<Value> for JsonTree {
    type Error = SupportError;

    fn try_from(value: Value) -> SupportResult<Self> {
        match value {
            Value::Object(map) => Ok(Self { map }),
            other => Err(SupportError::NotAnObject { found: kind(&other) }),
        }
    }
}

impl From<Map<String, Value>> for JsonTree {
    fn from(map: Map<String, Value>) -> Self {
        Self { map }
    }
}

impl From<JsonTree> for Value {
    fn from(tree: JsonTree) -> Self {
        tree.into_value()
    }
}

impl fmt::Display for JsonTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string())
    }
}
