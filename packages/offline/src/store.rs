//! In-memory view of downloaded regions backed by [`RegionRepository`].

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use waypoint_geo_models::{Bounds, Coordinate};

use crate::{EmptyMapSource, MapDataSource, OfflineError, OfflineMapData, RegionRepository};

/// A region without its content, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    pub region_id: String,
    pub bounds: Bounds,
    pub tile_count: usize,
    pub poi_count: usize,
    pub route_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl From<&OfflineMapData> for RegionSummary {
    fn from(data: &OfflineMapData) -> Self {
        Self {
            region_id: data.region_id.clone(),
            bounds: data.bounds,
            tile_count: data.tiles.len(),
            poi_count: data.pois.len(),
            route_count: data.routes.len(),
            last_updated: data.last_updated,
        }
    }
}

/// Downloads, persists, and queries offline regions.
pub struct OfflineMapStore {
    repository: RegionRepository,
    source: Arc<dyn MapDataSource>,
    regions: RwLock<BTreeMap<String, OfflineMapData>>,
}

impl OfflineMapStore {
    /// Creates a store with no regions loaded and an [`EmptyMapSource`].
    #[must_use]
    pub fn new(repository: RegionRepository) -> Self {
        Self {
            repository,
            source: Arc::new(EmptyMapSource),
            regions: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn MapDataSource>) -> Self {
        self.source = source;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, OfflineMapData>> {
        self.regions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, OfflineMapData>> {
        self.regions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads every stored region into memory, returning how many loaded.
    ///
    /// Regions whose record cannot be read are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`OfflineError::Storage`] if the stored regions cannot be
    /// listed.
    pub async fn restore(&self) -> Result<usize, OfflineError> {
        let ids = self.repository.list().await?;
        let mut loaded = BTreeMap::new();

        for id in ids {
            match self.repository.load(&id).await {
                Ok(Some(data)) => {
                    loaded.insert(id, data);
                }
                Ok(None) => {}
                Err(e) => log::warn!("Skipping offline region {id}: {e}"),
            }
        }

        let count = loaded.len();
        *self.write() = loaded;
        log::info!("Rehydrated {count} offline region(s)");
        Ok(count)
    }

    /// Fetches content for `bounds`, persists it under `region_id`, and
    /// registers the region. Downloading an existing id replaces it.
    ///
    /// The region is only registered once the write has succeeded.
    ///
    /// # Errors
    ///
    /// * [`OfflineError::InvalidBounds`] if `bounds` is not a valid rectangle
    /// * [`OfflineError::Source`] if the map data source fails
    /// * [`OfflineError::Storage`] if the region cannot be written
    pub async fn download_offline_map(
        &self,
        region_id: &str,
        bounds: Bounds,
    ) -> Result<OfflineMapData, OfflineError> {
        if !bounds.is_valid() {
            return Err(OfflineError::InvalidBounds {
                region_id: region_id.to_string(),
            });
        }

        let content = self.source.fetch(region_id, bounds).await?;
        let data = OfflineMapData::new(region_id, bounds, content);

        if let Err(e) = self.repository.save(&data).await {
            log::error!("Failed to store offline region {region_id}: {e}");
            return Err(e.into());
        }

        log::info!(
            "Downloaded offline region {region_id} ({} tiles, {} POIs, {} routes)",
            data.tiles.len(),
            data.pois.len(),
            data.routes.len()
        );
        self.write().insert(region_id.to_string(), data.clone());
        Ok(data)
    }

    /// Returns `true` if `point` lies inside any downloaded region,
    /// edges included.
    #[must_use]
    pub fn is_offline_data_available(&self, point: Coordinate) -> bool {
        self.read().values().any(|r| r.bounds.contains(point))
    }

    /// Summaries of every downloaded region, ordered by id.
    #[must_use]
    pub fn regions(&self) -> Vec<RegionSummary> {
        self.read().values().map(RegionSummary::from).collect()
    }

    /// The full record of one region.
    #[must_use]
    pub fn region(&self, region_id: &str) -> Option<OfflineMapData> {
        self.read().get(region_id).cloned()
    }

    /// Deletes a region from storage and memory. Returns `false` if it was
    /// not downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`OfflineError::Storage`] if the record cannot be deleted;
    /// the region then stays registered.
    pub async fn remove_region(&self, region_id: &str) -> Result<bool, OfflineError> {
        if !self.read().contains_key(region_id) {
            return Ok(false);
        }
        self.repository.remove(region_id).await?;
        let removed = self.write().remove(region_id).is_some();
        if removed {
            log::info!("Removed offline region {region_id}");
        }
        Ok(removed)
    }
}
