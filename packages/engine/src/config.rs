//! Engine configuration.
//!
//! Loaded from a TOML file where every table and field is optional, then
//! patched from `WAYPOINT_*` environment variables:
//!
//! ```toml
//! [cache]
//! default_ttl_secs = 300
//! weather_ttl_secs = 1800
//! max_entries = 512
//!
//! [tracking.one_shot]
//! high_accuracy = true
//! timeout_ms = 10000
//! max_age_ms = 30000
//!
//! [routing]
//! base_url = "http://localhost:5000"
//! request_timeout_secs = 15
//! default_language = "en"
//!
//! [geofence]
//! default_dwell_secs = 300
//! utc_offset_minutes = 60
//!
//! [navigation]
//! snap_radius_m = 20.0
//!
//! [discovery]
//! poi_base_url = "http://localhost:5001"
//! weather_base_url = "http://localhost:5002"
//!
//! [storage]
//! data_dir = "data"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Deserializer};
use waypoint_location::PositionOptions;
use waypoint_storage::paths::DATA_DIR_ENV;

use crate::EngineError;

/// Overrides `[routing] base_url`.
pub const ROUTING_URL_ENV: &str = "WAYPOINT_ROUTING_URL";
/// Overrides `[discovery] poi_base_url`.
pub const POI_URL_ENV: &str = "WAYPOINT_POI_URL";
/// Overrides `[discovery] weather_base_url`.
pub const WEATHER_URL_ENV: &str = "WAYPOINT_WEATHER_URL";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub tracking: TrackingConfig,
    pub routing: RoutingConfig,
    pub geofence: GeofenceConfig,
    pub navigation: NavigationConfig,
    pub discovery: DiscoveryConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    pub weather_ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            weather_ttl_secs: 1800,
            max_entries: 512,
        }
    }
}

/// One position request profile.
///
/// Fields missing from a `[tracking.*]` table fall back to that table's own
/// profile, not to a shared default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingProfile {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub max_age_ms: u64,
}

/// A `[tracking.*]` table as written, before defaults are filled in.
#[derive(Debug, Deserialize)]
struct ProfileTable {
    high_accuracy: Option<bool>,
    timeout_ms: Option<u64>,
    max_age_ms: Option<u64>,
}

impl ProfileTable {
    fn over(self, base: PositionOptions) -> TrackingProfile {
        let base = TrackingProfile::from(base);
        TrackingProfile {
            high_accuracy: self.high_accuracy.unwrap_or(base.high_accuracy),
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            max_age_ms: self.max_age_ms.unwrap_or(base.max_age_ms),
        }
    }
}

fn one_shot_profile<'de, D: Deserializer<'de>>(d: D) -> Result<TrackingProfile, D::Error> {
    ProfileTable::deserialize(d).map(|table| table.over(PositionOptions::one_shot()))
}

fn continuous_profile<'de, D: Deserializer<'de>>(d: D) -> Result<TrackingProfile, D::Error> {
    ProfileTable::deserialize(d).map(|table| table.over(PositionOptions::continuous()))
}

impl From<PositionOptions> for TrackingProfile {
    #[allow(clippy::cast_possible_truncation)]
    fn from(options: PositionOptions) -> Self {
        Self {
            high_accuracy: options.enable_high_accuracy,
            timeout_ms: options.timeout.as_millis() as u64,
            max_age_ms: options.maximum_age.as_millis() as u64,
        }
    }
}

impl TrackingProfile {
    #[must_use]
    pub const fn options(&self) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: self.high_accuracy,
            timeout: Duration::from_millis(self.timeout_ms),
            maximum_age: Duration::from_millis(self.max_age_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    #[serde(deserialize_with = "one_shot_profile")]
    pub one_shot: TrackingProfile,
    #[serde(deserialize_with = "continuous_profile")]
    pub continuous: TrackingProfile,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            one_shot: PositionOptions::one_shot().into(),
            continuous: PositionOptions::continuous().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Routing service; routes are synthesized when unset.
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub default_language: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: 15,
            default_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    pub default_dwell_secs: u64,
    /// Offset of the local time used for zones' active hours.
    pub utc_offset_minutes: i32,
    pub webhook_timeout_secs: u64,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            default_dwell_secs: 300,
            utc_offset_minutes: 0,
            webhook_timeout_secs: 10,
        }
    }
}

impl GeofenceConfig {
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the offset is a day or more.
    pub fn utc_offset(&self) -> Result<FixedOffset, EngineError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| EngineError::Config {
                message: format!(
                    "geofence.utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub snap_radius_m: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            snap_radius_m: waypoint_navigation::DEFAULT_SNAP_RADIUS_M,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub poi_base_url: Option<String>,
    pub weather_base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poi_base_url: None,
            weather_base_url: None,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the document is not valid TOML or
    /// a field has the wrong type.
    pub fn from_toml(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config {
            message: e.to_string(),
        })
    }

    /// Reads `path` (or starts from defaults when `None`), then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file cannot be read or parsed.
    pub async fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut config = match path {
            Some(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| EngineError::Config {
                        message: format!("Failed to read {}: {e}", path.display()),
                    })?;
                log::debug!("Loaded engine config from {}", path.display());
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies `WAYPOINT_*` overrides read through `lookup`. Empty values
    /// are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get(DATA_DIR_ENV) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = get(ROUTING_URL_ENV) {
            self.routing.base_url = Some(url);
        }
        if let Some(url) = get(POI_URL_ENV) {
            self.discovery.poi_base_url = Some(url);
        }
        if let Some(url) = get(WEATHER_URL_ENV) {
            self.discovery.weather_base_url = Some(url);
        }
    }
}
