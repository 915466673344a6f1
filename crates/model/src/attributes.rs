//! Open key/value maps for user-defined fields.
//!
//! Characters carry custom attributes ("eye colour", "birthday") and
//! relationships carry free-form metadata ("met on", "notes"). Both use
//! [`Attributes`], a string-keyed map of tagged [`AttributeValue`]s.
//!
//! Updates are expressed as an [`AttributesPatch`] and applied with
//! [`Attributes::merge`]: keys present in the patch overwrite, keys mapped to
//! `None` are deleted, every other key is left untouched (shallow merge).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::Date;

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Date(Date),
    Flag(bool),
}
impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}
impl From<Date> for AttributeValue {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}
impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

/// Patch applied by [`Attributes::merge`]; `None` is a tombstone.
pub type AttributesPatch = BTreeMap<String, Option<AttributeValue>>;

/// Schema-less attribute map with shallow-merge update semantics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValue>);
impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Option<AttributeValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Shallow-merge `patch` into this map.
    pub fn merge(&mut self, patch: AttributesPatch) {
        for (key, value) in patch {
            match value {
                Some(value) => {
                    self.0.insert(key, value);
                },
                None => {
                    self.0.remove(&key);
                },
            }
        }
    }
}
impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn test_merge_overwrites_adds_and_deletes() {
        let mut attrs: Attributes = [("eyes", "green"), ("hair", "black"), ("height", "tall")].into_iter().collect();
        let patch = AttributesPatch::from([
            ("eyes".to_string(), Some(AttributeValue::from("grey"))),
            ("hair".to_string(), None),
            ("age".to_string(), Some(AttributeValue::from(41.0))),
        ]);
        attrs.merge(patch);
        assert_eq!(attrs.get("eyes"), Some(&AttributeValue::Text("grey".to_string())));
        assert_eq!(attrs.get("hair"), None);
        assert_eq!(attrs.get("height"), Some(&AttributeValue::Text("tall".to_string())));
        assert_eq!(attrs.get("age"), Some(&AttributeValue::Number(41.0)));
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn test_tombstone_for_missing_key_is_noop() {
        let mut attrs = Attributes::new();
        attrs.merge(AttributesPatch::from([("ghost".to_string(), None)]));
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_values_are_tagged_in_json() {
        let mut attrs = Attributes::new();
        attrs.insert("alive", true);
        attrs.insert("born", Date::from_calendar_date(1802, Month::July, 24).unwrap());
        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["alive"], serde_json::json!({"type": "flag", "value": true}));
        assert_eq!(json["born"]["type"], "date");
        let back: Attributes = serde_json::from_value(json).unwrap();
        assert_eq!(back, attrs);
    }
}
