//! GraphQL variable trees with an explicit "unset" placeholder.
//!
//! A [`VariableTree`] is the `variables` object of a persisted-query request.
//! Templates use [`VarValue::Unset`] to mark leaves the caller must fill in
//! before the request can be sent. `Unset` is distinct from [`VarValue::Null`]:
//! a template can legitimately send `null`, but it can never send `Unset`.
//!
//! Keys are kept in a `BTreeMap` so serialization order is deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Deserializer;
use serde::ser::{Error as _, SerializeMap, SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// A single variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum VarValue {
    /// JSON null. Sent as-is.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON integer above `i64::MAX`. Smaller values are always `Int`.
    UInt(u64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// JSON array (ordered sequence of values).
    Array(Vec<VarValue>),
    /// Nested variable tree.
    Map(VariableTree),
    /// Placeholder that must be replaced before sending.
    Unset,
}

impl VarValue {
    /// Returns `true` for the nested-tree variant.
    #[must_use]
    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Returns `true` for the placeholder variant.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Nested tree, if this value is one.
    #[must_use]
    pub fn as_tree(&self) -> Option<&VariableTree> {
        match self {
            Self::Map(tree) => Some(tree),
            _ => None,
        }
    }

    /// Borrowed string, if this value is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn first_unset_path(&self, path: &str) -> Option<String> {
        match self {
            Self::Unset => Some(path.to_string()),
            Self::Map(tree) => tree.first_unset_under(path),
            Self::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, item)| item.first_unset_path(&format!("{path}[{i}]"))),
            _ => None,
        }
    }
}

impl From<bool> for VarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for VarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for VarValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for VarValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for VarValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::UInt(v), Self::Int)
    }
}

impl From<f64> for VarValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for VarValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for VarValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<VariableTree> for VarValue {
    fn from(v: VariableTree) -> Self {
        Self::Map(v)
    }
}

impl From<Vec<VarValue>> for VarValue {
    fn from(v: Vec<VarValue>) -> Self {
        Self::Array(v)
    }
}

impl From<serde_json::Value> for VarValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(u)) => Self::UInt(u),
                (None, None) => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl Serialize for VarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(tree) => tree.serialize(serializer),
            Self::Unset => Err(S::Error::custom("cannot serialize an unset variable")),
        }
    }
}

impl<'de> Deserialize<'de> for VarValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

// ---------------------------------------------------------------------------
// VariableTree
// ---------------------------------------------------------------------------

/// Ordered mapping of variable names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTree(BTreeMap<String, VarValue>);

impl VariableTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<VarValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts a value, returning the previous one for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<VarValue>) -> Option<VarValue> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&VarValue> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut VarValue> {
        self.0.get_mut(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Follows a dotted path (`"input.claimID"`) through nested trees.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&VarValue> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_tree()?.get(part)?;
        }
        Some(current)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarValue)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Dotted path of the first `Unset` leaf at any depth, if any remain.
    ///
    /// Sequence elements are addressed as `key[index]`.
    #[must_use]
    pub fn first_unset_path(&self) -> Option<String> {
        self.first_unset_under("")
    }

    /// Returns `true` when no `Unset` leaf remains at any depth.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.first_unset_path().is_none()
    }

    pub(crate) fn first_unset_under(&self, prefix: &str) -> Option<String> {
        self.0
            .iter()
            .find_map(|(key, value)| value.first_unset_path(&join_path(prefix, key)))
    }
}

/// Joins a parent path and a key with `.`; the root has an empty prefix.
pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

impl<K: Into<String>, V: Into<VarValue>> FromIterator<(K, V)> for VariableTree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<VarValue>, const N: usize> From<[(K, V); N]> for VariableTree {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a VariableTree {
    type Item = (&'a String, &'a VarValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, VarValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Error converting arbitrary JSON into a tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("variables must be a JSON object, got {found}")]
pub struct NotAnObject {
    pub found: &'static str,
}

impl TryFrom<serde_json::Value> for VariableTree {
    type Error = NotAnObject;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match VarValue::from(value) {
            VarValue::Map(tree) => Ok(tree),
            other => Err(NotAnObject {
                found: kind_name(&other),
            }),
        }
    }
}

fn kind_name(value: &VarValue) -> &'static str {
    match value {
        VarValue::Null => "null",
        VarValue::Bool(_) => "boolean",
        VarValue::Int(_) | VarValue::UInt(_) | VarValue::Float(_) => "number",
        VarValue::String(_) => "string",
        VarValue::Array(_) => "array",
        VarValue::Map(_) => "object",
        VarValue::Unset => "unset",
    }
}

impl Serialize for VariableTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for VariableTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for VariableTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "<unresolved {} keys>", self.0.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ---- JSON bridge ----

    #[test]
    fn from_json_object_builds_nested_tree() {
        let tree = VariableTree::try_from(json!({
            "input": { "claimID": "abc", "channelID": "42" },
            "limit": 30,
            "tags": ["a", "b"],
            "cursor": null,
        }))
        .unwrap();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.lookup("input.claimID"), Some(&VarValue::from("abc")));
        assert_eq!(tree.get("limit"), Some(&VarValue::Int(30)));
        assert_eq!(tree.get("cursor"), Some(&VarValue::Null));
        assert!(matches!(tree.get("tags"), Some(VarValue::Array(items)) if items.len() == 2));
    }

    #[test]
    fn large_unsigned_integers_survive_exactly() {
        let tree = VariableTree::try_from(json!({ "id": u64::MAX, "small": 7_u64, "neg": -7 })).unwrap();
        assert_eq!(tree.get("id"), Some(&VarValue::UInt(u64::MAX)));
        assert_eq!(tree.get("small"), Some(&VarValue::Int(7)));
        assert_eq!(tree.get("neg"), Some(&VarValue::Int(-7)));
        assert_eq!(serde_json::to_string(&tree).unwrap(), r#"{"id":18446744073709551615,"neg":-7,"small":7}"#);
        assert_eq!(VarValue::from(u64::MAX), VarValue::UInt(u64::MAX));
        assert_eq!(VarValue::from(5_u64), VarValue::Int(5));
    }

    #[test]
    fn from_json_rejects_non_object() {
        let err = VariableTree::try_from(json!([1, 2])).unwrap_err();
        assert_eq!(err.found, "array");
    }

    #[test]
    fn null_is_not_unset() {
        let tree = VariableTree::new().with("freeformTags", VarValue::Null);
        assert!(tree.is_resolved());
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({ "freeformTags": null }));
    }

    #[test]
    fn serialize_refuses_unset() {
        let tree = VariableTree::new().with("channel", VarValue::Unset);
        assert!(serde_json::to_value(&tree).is_err());
    }

    #[test]
    fn deserialize_from_json_text() {
        let tree: VariableTree = serde_json::from_str(r#"{"a":{"b":1.5}}"#).unwrap();
        assert_eq!(tree.lookup("a.b"), Some(&VarValue::Float(1.5)));
    }

    // ---- Unset scanning ----

    #[test]
    fn unset_path_found_at_depth() {
        let tree = VariableTree::new().with("limit", 10).with(
            "input",
            VariableTree::new()
                .with("dropInstanceID", VarValue::Unset)
                .with("other", "x"),
        );
        assert_eq!(tree.first_unset_path().as_deref(), Some("input.dropInstanceID"));
        assert!(!tree.is_resolved());
    }

    #[test]
    fn unset_path_found_inside_sequence() {
        let tree = VariableTree::new().with(
            "options",
            VariableTree::new().with("tags", vec![VarValue::from("ok"), VarValue::Unset]),
        );
        assert_eq!(tree.first_unset_path().as_deref(), Some("options.tags[1]"));
    }

    #[test]
    fn lookup_missing_path_is_none() {
        let tree = VariableTree::new().with("a", 1);
        assert!(tree.lookup("a.b").is_none());
        assert!(tree.lookup("z").is_none());
    }

    #[test]
    fn display_renders_json() {
        let tree = VariableTree::from([("b", 2), ("a", 1)]);
        assert_eq!(tree.to_string(), r#"{"a":1,"b":2}"#);
    }
}
