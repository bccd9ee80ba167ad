#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Offline regional map bundles.
//!
//! A region is an axis-aligned [`Bounds`] plus whatever map content a
//! [`MapDataSource`] supplies for it (tiles, points of interest, routes).
//! Each region is stored as its own record through [`RegionRepository`];
//! [`OfflineMapStore`] keeps the downloaded regions in memory and answers
//! whether a position is covered by any of them.

pub mod repository;
pub mod store;

pub use repository::{REGION_KEY_PREFIX, RegionRepository};
pub use store::{OfflineMapStore, RegionSummary};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use waypoint_discovery_models::PointOfInterest;
use waypoint_geo_models::Bounds;
use waypoint_routing_models::RouteData;
use waypoint_storage::StorageError;

/// Errors from offline map operations.
#[derive(Debug, Error)]
pub enum OfflineError {
    /// The region record could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The map data source failed to produce content for the region.
    #[error("Map data source failed for region {region_id}: {message}")]
    Source {
        /// Region being downloaded.
        region_id: String,
        /// What went wrong.
        message: String,
    },

    /// The requested bounds are not a valid rectangle.
    #[error("Invalid bounds for region {region_id}")]
    InvalidBounds {
        /// Region being downloaded.
        region_id: String,
    },
}

/// Content fetched for one region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionContent {
    /// Tile payloads keyed by `z/x/y`.
    pub tiles: BTreeMap<String, String>,
    pub pois: Vec<PointOfInterest>,
    pub routes: Vec<RouteData>,
}

/// One stored region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineMapData {
    pub region_id: String,
    pub bounds: Bounds,
    #[serde(default)]
    pub tiles: BTreeMap<String, String>,
    #[serde(default)]
    pub pois: Vec<PointOfInterest>,
    #[serde(default)]
    pub routes: Vec<RouteData>,
    pub last_updated: DateTime<Utc>,
}

impl OfflineMapData {
    /// Assembles a region record stamped with the current time.
    #[must_use]
    pub fn new(region_id: impl Into<String>, bounds: Bounds, content: RegionContent) -> Self {
        Self {
            region_id: region_id.into(),
            bounds,
            tiles: content.tiles,
            pois: content.pois,
            routes: content.routes,
            last_updated: Utc::now(),
        }
    }
}

/// Supplies the map content bundled into a region.
#[async_trait::async_trait]
pub trait MapDataSource: Send + Sync {
    /// Fetches content covering `bounds`.
    ///
    /// # Errors
    ///
    /// Returns [`OfflineError::Source`] if the content cannot be produced.
    async fn fetch(&self, region_id: &str, bounds: Bounds) -> Result<RegionContent, OfflineError>;
}

/// A source that bundles no content; regions carry only their bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMapSource;

#[async_trait::async_trait]
impl MapDataSource for EmptyMapSource {
    async fn fetch(&self, _region_id: &str, _bounds: Bounds) -> Result<RegionContent, OfflineError> {
        Ok(RegionContent::default())
    }
}
