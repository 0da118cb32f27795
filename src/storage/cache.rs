//! Scalar Settings Cache
//!
//! A `Cache` is one owner's flat mapping of scalar settings, persisted as a
//! single JSON object at an owner-specific path. Every load and every write
//! is reported to an optional change handler, one call per key.

use std::fmt;

use serde_json::{Map, Value};
use tracing::warn;

use super::SharedStorage;
use crate::error::{LightstackError, Result};

/// Callback invoked with `(key, value)` after a value is loaded or committed
pub type ChangeHandler = Box<dyn FnMut(&str, &Value)>;

/// Durable key/value store for one owner's scalar settings
pub struct Cache {
    path: String,
    storage: SharedStorage,
    values: Map<String, Value>,
    on_change: Option<ChangeHandler>,
}

impl Cache {
    /// Open the cache at `path`
    ///
    /// Persisted values override `initial` key by key. If nothing is stored
    /// yet (or the stored data cannot be read) the initial values are used.
    /// Either way the resulting state is written back and the handler is
    /// notified once per key.
    pub fn open(
        storage: SharedStorage,
        path: impl Into<String>,
        initial: Map<String, Value>,
        on_change: Option<ChangeHandler>,
    ) -> Result<Self> {
        let path = path.into();
        for (key, value) in &initial {
            check_scalar(key, value)?;
        }

        let mut values = initial;
        match storage.read(&path) {
            Ok(Some(text)) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(loaded) => {
                    for (key, value) in loaded {
                        if check_scalar(&key, &value).is_ok() {
                            values.insert(key, value);
                        } else {
                            warn!(path = %path, key = %key, "ignoring nested cached value");
                        }
                    }
                }
                Err(e) => warn!(path = %path, error = %e, "corrupt cache, using defaults"),
            },
            Ok(None) => {}
            Err(e) => warn!(path = %path, error = %e, "cache unreadable, using defaults"),
        }

        let mut cache = Self {
            path,
            storage,
            values,
            on_change,
        };
        cache.store(&cache.values)?;
        cache.notify_all();
        Ok(cache)
    }

    /// Storage path of this cache
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get a value, failing if the key was never declared or loaded
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| LightstackError::KeyNotFound {
                key: format!("{}:{}", self.path, key),
            })
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All values currently held
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Persist then commit a single value, notifying once
    ///
    /// If the write fails the in-memory value is left untouched.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        check_scalar(key, &value)?;

        let mut next = self.values.clone();
        next.insert(key.to_string(), value);
        self.store(&next)?;
        self.values = next;
        self.notify(key);
        Ok(())
    }

    /// Persist then commit several values in one write
    pub fn merge(&mut self, updates: Map<String, Value>) -> Result<()> {
        for (key, value) in &updates {
            check_scalar(key, value)?;
        }

        let mut next = self.values.clone();
        let keys: Vec<String> = updates.keys().cloned().collect();
        next.extend(updates);
        self.store(&next)?;
        self.values = next;
        for key in keys {
            self.notify(&key);
        }
        Ok(())
    }

    /// Replace the change handler
    pub fn set_change_handler(&mut self, handler: Option<ChangeHandler>) {
        self.on_change = handler;
    }

    /// Notify the handler of every key's current value
    pub fn notify_all(&mut self) {
        if let Some(handler) = self.on_change.as_mut() {
            for (key, value) in &self.values {
                handler(key, value);
            }
        }
    }

    fn notify(&mut self, key: &str) {
        if let (Some(handler), Some(value)) = (self.on_change.as_mut(), self.values.get(key)) {
            handler(key, value);
        }
    }

    fn store(&self, values: &Map<String, Value>) -> Result<()> {
        let text = serde_json::to_string(values)?;
        self.storage.write(&self.path, &text)
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("path", &self.path)
            .field("values", &self.values)
            .field("has_handler", &self.on_change.is_some())
            .finish()
    }
}

fn check_scalar(key: &str, value: &Value) -> Result<()> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(LightstackError::NestedValue {
            key: key.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn initial() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("active".to_string(), json!("A"));
        map
    }

    fn recorder() -> (Rc<RefCell<Vec<(String, Value)>>>, ChangeHandler) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let handler: ChangeHandler = Box::new(move |key, value| {
            sink.borrow_mut().push((key.to_string(), value.clone()));
        });
        (seen, handler)
    }

    #[test]
    fn test_fresh_cache_persists_and_notifies_defaults() {
        let storage = Rc::new(MemoryStorage::new());
        let (seen, handler) = recorder();

        let cache = Cache::open(storage.clone(), "stacks/info", initial(), Some(handler)).unwrap();

        assert_eq!(cache.get("active").unwrap(), &json!("A"));
        assert_eq!(
            storage.read("stacks/info").unwrap(),
            Some(r#"{"active":"A"}"#.to_string())
        );
        assert_eq!(seen.borrow().as_slice(), &[("active".to_string(), json!("A"))]);
    }

    #[test]
    fn test_loaded_values_override_defaults() {
        let storage = Rc::new(MemoryStorage::new());
        storage.write("stacks/info", r#"{"active":"B"}"#).unwrap();
        let (seen, handler) = recorder();

        let cache = Cache::open(storage, "stacks/info", initial(), Some(handler)).unwrap();

        assert_eq!(cache.get("active").unwrap(), &json!("B"));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_get_unknown_key() {
        let storage = Rc::new(MemoryStorage::new());
        let cache = Cache::open(storage, "x", Map::new(), None).unwrap();
        let err = cache.get("missing").unwrap_err();
        assert_eq!(err.error_code(), "KEY_NOT_FOUND");
    }

    #[test]
    fn test_set_persists_then_notifies_once() {
        let storage = Rc::new(MemoryStorage::new());
        let (seen, handler) = recorder();
        let mut cache = Cache::open(storage.clone(), "info", initial(), Some(handler)).unwrap();
        seen.borrow_mut().clear();

        cache.set("active", "B").unwrap();

        assert_eq!(seen.borrow().as_slice(), &[("active".to_string(), json!("B"))]);
        assert_eq!(
            storage.read("info").unwrap(),
            Some(r#"{"active":"B"}"#.to_string())
        );
    }

    #[test]
    fn test_failed_write_is_not_committed() {
        let storage = Rc::new(MemoryStorage::new());
        let (seen, handler) = recorder();
        let mut cache = Cache::open(storage.clone(), "info", initial(), Some(handler)).unwrap();
        seen.borrow_mut().clear();

        storage.set_fail_writes(true);
        let err = cache.set("active", "B").unwrap_err();

        assert_eq!(err.error_code(), "PERSISTENCE_FAULT");
        assert_eq!(cache.get("active").unwrap(), &json!("A"));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_nested_values_rejected() {
        let storage = Rc::new(MemoryStorage::new());
        let mut cache = Cache::open(storage, "info", Map::new(), None).unwrap();
        let err = cache.set("palette", json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.error_code(), "NESTED_VALUE");
        assert!(!cache.contains("palette"));
    }

    #[test]
    fn test_merge_single_write() {
        let storage = Rc::new(MemoryStorage::new());
        let mut cache = Cache::open(storage.clone(), "info", initial(), None).unwrap();
        let before = storage.write_count();

        let mut updates = Map::new();
        updates.insert("active".to_string(), json!("B"));
        updates.insert("index".to_string(), json!(3));
        cache.merge(updates).unwrap();

        assert_eq!(storage.write_count(), before + 1);
        assert_eq!(cache.get("index").unwrap(), &json!(3));
    }

    #[test]
    fn test_corrupt_storage_falls_back_to_defaults() {
        let storage = Rc::new(MemoryStorage::new());
        storage.write("info", "not json").unwrap();

        let cache = Cache::open(storage.clone(), "info", initial(), None).unwrap();

        assert_eq!(cache.get("active").unwrap(), &json!("A"));
        assert_eq!(
            storage.read("info").unwrap(),
            Some(r#"{"active":"A"}"#.to_string())
        );
    }
}
