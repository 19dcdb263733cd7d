use std::sync::RwLock;

use serde_json::{Map, Value};

/// Externally reported status (position, temperature, ...). Updates are
/// merged key by key, last write wins.
#[derive(Debug)]
pub struct StatusStore {
    data: RwLock<Map<String, Value>>,
}

impl StatusStore {
    pub fn new() -> Self {
        let mut data = Map::new();
        for key in ["lat", "lon", "temp"] {
            data.insert(key.to_string(), Value::Null);
        }
        Self {
            data: RwLock::new(data),
        }
    }

    /// Merges a JSON object into the store and returns the result.
    /// Non-object values leave the store unchanged.
    pub fn merge(&self, update: Value) -> Map<String, Value> {
        let mut data = self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Value::Object(fields) = update {
            for (key, value) in fields {
                data.insert(key, value);
            }
        }
        data.clone()
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}
