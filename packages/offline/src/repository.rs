//! Region persistence, one record per region.

use std::sync::Arc;

use waypoint_storage::{KeyValueStore, StorageError, load_json, save_json};

use crate::OfflineMapData;

/// Prefix of every region record key.
pub const REGION_KEY_PREFIX: &str = "offline_map_";

fn key_for(region_id: &str) -> String {
    format!("{REGION_KEY_PREFIX}{region_id}")
}

/// Typed access to stored regions.
#[derive(Clone)]
pub struct RegionRepository {
    store: Arc<dyn KeyValueStore>,
}

impl RegionRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns [`StorageError`] if the record cannot be read or parsed.
    pub async fn load(&self, region_id: &str) -> Result<Option<OfflineMapData>, StorageError> {
        load_json(self.store.as_ref(), &key_for(region_id)).await
    }

    /// Writes `data` under its region id, replacing any earlier download.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the region id is not a usable key or the
    /// write fails.
    pub async fn save(&self, data: &OfflineMapData) -> Result<(), StorageError> {
        save_json(self.store.as_ref(), &key_for(&data.region_id), data).await
    }

    /// Ids of every stored region, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the store cannot be listed.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .store
            .keys(REGION_KEY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(REGION_KEY_PREFIX).map(String::from))
            .filter(|id| !id.is_empty())
            .collect())
    }

    /// # Errors
    ///
    /// Returns [`StorageError`] if the delete fails.
    pub async fn remove(&self, region_id: &str) -> Result<(), StorageError> {
        self.store.remove(&key_for(region_id)).await
    }
}
