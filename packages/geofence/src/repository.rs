//! Zone persistence.

use std::sync::Arc;

use waypoint_geofence_models::GeofenceZone;
use waypoint_storage::{KeyValueStore, StorageError, load_json, save_json};

/// Storage key holding the full zone list.
pub const ZONES_KEY: &str = "geofence_zones";

/// Reads and writes the zone list as one record.
#[derive(Clone)]
pub struct ZoneRepository {
    store: Arc<dyn KeyValueStore>,
}

impl ZoneRepository {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Loads every stored zone; an absent record is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the record cannot be read or parsed.
    pub async fn load(&self) -> Result<Vec<GeofenceZone>, StorageError> {
        Ok(load_json(self.store.as_ref(), ZONES_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Overwrites the stored list with `zones`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the write fails.
    pub async fn save(&self, zones: &[GeofenceZone]) -> Result<(), StorageError> {
        save_json(self.store.as_ref(), ZONES_KEY, &zones).await
    }
}
