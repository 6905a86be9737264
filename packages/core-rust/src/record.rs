//! Record: a flat mapping from field name to scalar JSON value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a value counts as empty for validation and autocomplete purposes.
///
/// `null` and the empty string are empty. `false` and `0` are values.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Renders a scalar value the way an input or table cell shows it.
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single entity as exchanged with the entity gateway.
///
/// Keys are schema field names plus, transiently inside a form draft, the
/// display keys of foreign-key fields. Missing keys read as empty.
/// Uses `BTreeMap` for deterministic serialization order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a JSON object into a record. Non-objects yield `None`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map.into_iter().collect())),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Inserts or replaces a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Whether the value under `key` is missing or empty.
    #[must_use]
    pub fn is_blank(&self, key: &str) -> bool {
        self.0.get(key).is_none_or(is_empty_value)
    }

    /// Display text of the value under `key`; empty when missing.
    #[must_use]
    pub fn text(&self, key: &str) -> String {
        self.0.get(key).map(value_text).unwrap_or_default()
    }

    /// The record's `id` property as text, if present and non-empty.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.0
            .get("id")
            .filter(|v| !is_empty_value(v))
            .map(value_text)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keeps only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.0.retain(|k, v| keep(k, v));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_covers_missing_null_and_empty_string() {
        let record: Record = [
            ("empty", json!("")),
            ("null", Value::Null),
            ("zero", json!(0)),
            ("off", json!(false)),
            ("name", json!("Bob")),
        ]
        .into_iter()
        .collect();

        assert!(record.is_blank("missing"));
        assert!(record.is_blank("empty"));
        assert!(record.is_blank("null"));
        assert!(!record.is_blank("zero"));
        assert!(!record.is_blank("off"));
        assert!(!record.is_blank("name"));
    }

    #[test]
    fn text_renders_scalars() {
        let record: Record = [("n", json!(42)), ("s", json!("x")), ("b", json!(true))]
            .into_iter()
            .collect();
        assert_eq!(record.text("n"), "42");
        assert_eq!(record.text("s"), "x");
        assert_eq!(record.text("b"), "true");
        assert_eq!(record.text("missing"), "");
    }

    #[test]
    fn id_accepts_numbers_and_strings() {
        let numeric = Record::from_value(json!({ "id": 9 })).expect("object");
        assert_eq!(numeric.id().as_deref(), Some("9"));
        let text = Record::from_value(json!({ "id": "abc" })).expect("object");
        assert_eq!(text.id().as_deref(), Some("abc"));
        let blank = Record::from_value(json!({ "id": "" })).expect("object");
        assert_eq!(blank.id(), None);
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Record::from_value(json!([1, 2])).is_none());
        assert!(Record::from_value(json!("x")).is_none());
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut record = Record::new();
        record.set("name", "Bob");
        record.set("age", 30);
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json, json!({ "age": 30, "name": "Bob" }));
    }
}
