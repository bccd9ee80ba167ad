#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Nearby places and current weather.
//!
//! Both lookups are cache-fronted calls to external providers, bounded by
//! a request timeout, but they fail differently:
//!
//! * [`PoiRecommender::find_nearby_pois`] never fails. A provider error (or
//!   no provider at all) yields an empty list and a warning, and nothing is
//!   cached, so the next call tries again.
//! * [`WeatherLookup::get_weather_info`] returns the provider error to the
//!   caller.

pub mod http;

pub use http::{HttpPoiProvider, HttpWeatherProvider};

use std::sync::Arc;
use std::time::Duration;

use waypoint_cache::GeoCache;
use waypoint_discovery_models::{PoiFilters, PointOfInterest, WeatherInfo};
use waypoint_geo::haversine_distance;
use waypoint_geo_models::Coordinate;
use waypoint_provider::{ProviderError, with_timeout};

/// Time-to-live for cached weather.
pub const WEATHER_TTL: Duration = Duration::from_secs(30 * 60);

/// Default bound on a provider call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An external POI search service.
#[async_trait::async_trait]
pub trait PoiProvider: Send + Sync {
    /// Places near `location`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the lookup fails.
    async fn nearby(
        &self,
        location: Coordinate,
        filters: &PoiFilters,
    ) -> Result<Vec<PointOfInterest>, ProviderError>;
}

/// An external weather service.
#[async_trait::async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the lookup fails.
    async fn current(&self, location: Coordinate) -> Result<WeatherInfo, ProviderError>;
}

/// Drops places outside the radius or rejected by the filters, fills in
/// distances, and returns the nearest `limit` places.
#[must_use]
pub fn rank(
    location: Coordinate,
    filters: &PoiFilters,
    places: Vec<PointOfInterest>,
) -> Vec<PointOfInterest> {
    let mut ranked: Vec<_> = places
        .into_iter()
        .filter(|poi| filters.accepts(poi))
        .map(|mut poi| {
            poi.distance = Some(haversine_distance(location, poi.location));
            poi
        })
        .filter(|poi| poi.distance.is_some_and(|d| d <= filters.radius_m))
        .collect();

    ranked.sort_by(|a, b| a.distance.unwrap_or(0.0).total_cmp(&b.distance.unwrap_or(0.0)));
    ranked.truncate(filters.limit);
    ranked
}

/// Cache-fronted nearby search.
pub struct PoiRecommender {
    cache: GeoCache<Arc<Vec<PointOfInterest>>>,
    provider: Option<Arc<dyn PoiProvider>>,
    request_timeout: Duration,
}

impl PoiRecommender {
    #[must_use]
    pub const fn new(cache: GeoCache<Arc<Vec<PointOfInterest>>>) -> Self {
        Self {
            cache,
            provider: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn PoiProvider>, request_timeout: Duration) -> Self {
        self.provider = Some(provider);
        self.request_timeout = request_timeout;
        self
    }

    /// Places near `location` matching `filters`, nearest first.
    ///
    /// Returns an empty list when the provider fails, times out, or is not
    /// configured.
    pub async fn find_nearby_pois(
        &self,
        location: Coordinate,
        filters: &PoiFilters,
    ) -> Arc<Vec<PointOfInterest>> {
        let key = format!("pois:{location}|{}", filters.cache_fragment());

        let result = self
            .cache
            .get_or_try_insert_with(&key, None, move || async move {
                let provider = self
                    .provider
                    .as_ref()
                    .ok_or(ProviderError::NotConfigured { service: "poi" })?;
                let places =
                    with_timeout(self.request_timeout, provider.nearby(location, filters)).await?;
                Ok::<_, ProviderError>(Arc::new(rank(location, filters, places)))
            })
            .await;

        result.unwrap_or_else(|e| {
            log::warn!("POI lookup near {location} failed, returning no results: {e}");
            Arc::new(Vec::new())
        })
    }
}

/// Cache-fronted weather lookups.
pub struct WeatherLookup {
    cache: GeoCache<WeatherInfo>,
    provider: Option<Arc<dyn WeatherProvider>>,
    request_timeout: Duration,
    ttl: Duration,
}

impl WeatherLookup {
    /// Entries are kept for [`WEATHER_TTL`] whatever the cache's own
    /// default time-to-live is.
    #[must_use]
    pub const fn new(cache: GeoCache<WeatherInfo>) -> Self {
        Self {
            cache,
            provider: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ttl: WEATHER_TTL,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_provider(
        mut self,
        provider: Arc<dyn WeatherProvider>,
        request_timeout: Duration,
    ) -> Self {
        self.provider = Some(provider);
        self.request_timeout = request_timeout;
        self
    }

    /// Current conditions at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider fails or times out, or
    /// [`ProviderError::NotConfigured`] if there is no weather provider.
    pub async fn get_weather_info(&self, location: Coordinate) -> Result<WeatherInfo, ProviderError> {
        let key = format!("weather:{location}");

        self.cache
            .get_or_try_insert_with(&key, Some(self.ttl), move || async move {
                let provider = self
                    .provider
                    .as_ref()
                    .ok_or(ProviderError::NotConfigured { service: "weather" })?;
                with_timeout(self.request_timeout, provider.current(location)).await
            })
            .await
            .inspect_err(|e| log::error!("Weather lookup at {location} failed: {e}"))
    }
}
