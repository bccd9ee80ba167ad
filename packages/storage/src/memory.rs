//! In-process [`KeyValueStore`] backed by a `BTreeMap`.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::{KeyValueStore, StorageError, validate_key};

/// A volatile store for tests and sessions that must not touch disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let store = MemoryStore::new();
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));

        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        // Removing twice is fine.
        store.remove("a").await.unwrap();
    }

    #[tokio::test]
    async fn keys_filter_by_prefix() {
        let store = MemoryStore::new();
        store.set("offline_map_b", "{}").await.unwrap();
        store.set("offline_map_a", "{}").await.unwrap();
        store.set("geofence_zones", "[]").await.unwrap();

        let keys = store.keys("offline_map_").await.unwrap();
        assert_eq!(keys, vec!["offline_map_a", "offline_map_b"]);
    }
}
