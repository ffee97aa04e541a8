//! Serializable attribute bag carried by every component model.
//!
//! Values are converted to [`serde_json::Value`] when they are assigned, so a
//! value that cannot be replicated with the session fails at the assignment
//! site instead of at some later serialization point.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Free-form, named values attached to a component model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    values: BTreeMap<String, serde_json::Value>,
}

impl Attributes {
    /// Create an empty attribute bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// Fails with [`StateError::NotSerializable`] when `value` cannot be
    /// serialized.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StateError> {
        let value = serde_json::to_value(value).map_err(|source| StateError::NotSerializable {
            key: key.to_owned(),
            source,
        })?;
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    /// Read `key` back as `T`. Returns `None` if absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| T::deserialize(v).ok())
    }

    /// The raw stored value.
    pub fn get_raw(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Remove `key`, returning the previous raw value.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
