//! Key/value projection of an entity used for write payloads.
//!
//! A [`DataDictionary`] is built once per row, right before the write's
//! pre-event fires, so subscribers and the sequence registrar can inspect and
//! patch field values without knowing the concrete entity type.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::value::Value;

/// Field name to value map for a single row.
///
/// # Example
///
/// ```
/// use datakit_core::{DataDictionary, Value};
///
/// let mut row = DataDictionary::new();
/// row.set("Name", "Alice");
/// row.set("UserId", 0);
///
/// assert!(row.is_unset("UserId"));
/// assert!(row.is_unset("Missing"));
/// assert_eq!(row.get("Name").and_then(Value::as_str), Some("Alice"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataDictionary {
    values: BTreeMap<String, Value>,
}

impl DataDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project any serializable value into a dictionary.
    ///
    /// The value must serialize to a JSON object.
    pub fn from_entity<T: Serialize + ?Sized>(entity: &T) -> Result<Self> {
        match serde_json::to_value(entity)? {
            serde_json::Value::Object(map) => Ok(Self {
                values: map
                    .into_iter()
                    .map(|(name, value)| (name, Value::from(value)))
                    .collect(),
            }),
            other => Err(Error::invalid_argument(
                "data",
                format!("expected an object, found {}", json_kind(&other)),
            )),
        }
    }

    /// Rebuild a typed value from the dictionary.
    pub fn into_entity<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.to_json())?)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// True when the field is absent, null or numerically zero.
    pub fn is_unset(&self, name: &str) -> bool {
        self.values
            .get(name)
            .is_none_or(|value| value.is_null() || value.is_zero())
    }

    /// Assign `name` from `compute` when `predicate` accepts the current value.
    ///
    /// `compute` only runs when the predicate passes. Returns whether the
    /// field was written.
    pub fn try_set_with<P, F>(&mut self, name: &str, predicate: P, compute: F) -> Result<bool>
    where
        P: FnOnce(Option<&Value>) -> bool,
        F: FnOnce() -> Result<Value>,
    {
        if !predicate(self.values.get(name)) {
            return Ok(false);
        }
        let value = compute()?;
        self.values.insert(name.to_string(), value);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DataDictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Serialize for DataDictionary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
