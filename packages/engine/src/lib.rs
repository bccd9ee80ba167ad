#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The location engine.
//!
//! [`LocationEngine`] wires the component crates together from an
//! [`EngineConfig`] and exposes the operations hosts call: position reads
//! and tracking, routing, geofences, navigation, offline regions, and
//! nearby places and weather. During continuous tracking every fix is run
//! through geofence evaluation and then navigation progress before the
//! caller's callback sees it.

pub mod config;
pub mod pipeline;

pub use config::EngineConfig;
pub use pipeline::FixPipeline;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use waypoint_cache::GeoCache;
use waypoint_discovery::http::{HttpPoiProvider, HttpWeatherProvider};
use waypoint_discovery::{PoiRecommender, WeatherLookup};
use waypoint_discovery_models::{PoiFilters, PointOfInterest, WeatherInfo};
use waypoint_geo_models::{Bounds, Coordinate, Position};
use waypoint_geofence::{
    GeofenceEngine, GeofenceError, GeofenceSettings, HttpWebhookClient, MemoryVisitRecorder,
    ZoneRepository,
};
use waypoint_geofence_models::{GeofenceZone, VisitEvent};
use waypoint_location::{PositionError, PositionSource, PositionTracker, TrackingHandle};
use waypoint_navigation::{NavigationSession, NavigationState};
use waypoint_notification::{FallbackSink, NotificationSink};
use waypoint_offline::{OfflineError, OfflineMapData, OfflineMapStore, RegionRepository, RegionSummary};
use waypoint_provider::ProviderError;
use waypoint_routing::http::HttpRoutingProvider;
use waypoint_routing::{RouteError, RoutePlanner};
use waypoint_routing_models::{RouteData, RouteOptions};
use waypoint_storage::{FileStore, KeyValueStore, StorageError, paths};

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Geofence(#[from] GeofenceError),

    #[error(transparent)]
    Offline(#[from] OfflineError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// The engine facade.
pub struct LocationEngine {
    tracker: PositionTracker,
    routes: RoutePlanner,
    geofence: Arc<GeofenceEngine>,
    navigation: Arc<NavigationSession>,
    offline: OfflineMapStore,
    pois: PoiRecommender,
    weather: WeatherLookup,
    visits: Arc<MemoryVisitRecorder>,
    default_language: String,
}

const fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

impl LocationEngine {
    /// Opens the engine with file-backed storage under the configured data
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the data directory cannot be created or
    /// the configuration is invalid.
    pub async fn open(
        config: &EngineConfig,
        source: Arc<dyn PositionSource>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, EngineError> {
        let store = FileStore::open(paths::store_dir(&config.storage.data_dir)).await?;
        Self::with_store(config, Arc::new(store), source, notifier).await
    }

    /// Builds the engine over `store` and rehydrates persisted zones and
    /// offline regions from it.
    ///
    /// Unreadable persisted state is logged and the engine starts without
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] for invalid settings or
    /// [`EngineError::Provider`] if an HTTP client cannot be built.
    pub async fn with_store(
        config: &EngineConfig,
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn PositionSource>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, EngineError> {
        let notifier: Arc<dyn NotificationSink> = Arc::new(FallbackSink::new(notifier));
        let cache = &config.cache;
        let default_ttl = secs(cache.default_ttl_secs);

        let visits = Arc::new(MemoryVisitRecorder::new());
        let mut geofence = GeofenceEngine::new(
            ZoneRepository::new(Arc::clone(&store)),
            Arc::clone(&notifier),
            visits.clone(),
            GeofenceSettings {
                default_dwell: secs(config.geofence.default_dwell_secs),
                utc_offset: config.geofence.utc_offset()?,
            },
        );
        match HttpWebhookClient::new(secs(config.geofence.webhook_timeout_secs)) {
            Ok(client) => geofence = geofence.with_webhooks(Arc::new(client)),
            Err(e) => log::warn!("Webhook triggers disabled: {e}"),
        }
        let geofence = Arc::new(geofence);
        if let Err(e) = geofence.restore().await {
            log::warn!("Could not restore geofence zones: {e}");
        }

        let offline = OfflineMapStore::new(RegionRepository::new(store));
        if let Err(e) = offline.restore().await {
            log::warn!("Could not restore offline regions: {e}");
        }

        let navigation = Arc::new(NavigationSession::new(config.navigation.snap_radius_m));

        let tracker = PositionTracker::new(source, notifier)
            .with_options(
                config.tracking.one_shot.options(),
                config.tracking.continuous.options(),
            )
            .with_handler(Arc::new(FixPipeline::new(
                Arc::clone(&geofence),
                Arc::clone(&navigation),
            )));

        let mut routes = RoutePlanner::new(GeoCache::new("routes", default_ttl, cache.max_entries));
        if let Some(url) = &config.routing.base_url {
            let timeout = secs(config.routing.request_timeout_secs);
            routes = routes.with_provider(Arc::new(HttpRoutingProvider::new(url, timeout)?), timeout);
            log::info!("Routing via {url}");
        } else {
            log::info!("No routing service configured; routes will be synthesized");
        }

        let discovery_timeout = secs(config.discovery.request_timeout_secs);

        let mut pois = PoiRecommender::new(GeoCache::new("pois", default_ttl, cache.max_entries));
        if let Some(url) = &config.discovery.poi_base_url {
            pois = pois.with_provider(
                Arc::new(HttpPoiProvider::new(url, discovery_timeout)?),
                discovery_timeout,
            );
        }

        let weather_ttl = secs(cache.weather_ttl_secs);
        let mut weather =
            WeatherLookup::new(GeoCache::new("weather", weather_ttl, cache.max_entries))
                .with_ttl(weather_ttl);
        if let Some(url) = &config.discovery.weather_base_url {
            weather = weather.with_provider(
                Arc::new(HttpWeatherProvider::new(url, discovery_timeout)?),
                discovery_timeout,
            );
        }

        log::info!("Location engine started");

        Ok(Self {
            tracker,
            routes,
            geofence,
            navigation,
            offline,
            pois,
            weather,
            visits,
            default_language: config.routing.default_language.clone(),
        })
    }

    /// Reads a single fix.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Position`] if the source fails or times out.
    pub async fn get_current_position(&self) -> Result<Position, EngineError> {
        Ok(self.tracker.current_position().await?)
    }

    /// The last fix seen by any read.
    #[must_use]
    pub fn last_known_position(&self) -> Option<Position> {
        self.tracker.last_known_position()
    }

    /// Starts continuous tracking. See [`PositionTracker::start_tracking`].
    pub fn start_tracking<F>(&self, on_fix: F) -> TrackingHandle
    where
        F: Fn(&Position) + Send + Sync + 'static,
    {
        self.tracker.start_tracking(on_fix)
    }

    pub fn stop_tracking(&self, handle: &TrackingHandle) {
        self.tracker.stop_tracking(handle);
    }

    /// Default route options with the configured language.
    #[must_use]
    pub fn route_options(&self) -> RouteOptions {
        RouteOptions {
            language: self.default_language.clone(),
            ..RouteOptions::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Route`] if the route cannot be computed.
    pub async fn calculate_route(
        &self,
        origin: Coordinate,
        destination: &str,
        options: &RouteOptions,
    ) -> Result<Arc<RouteData>, EngineError> {
        Ok(self
            .routes
            .calculate_route(origin, destination, options)
            .await?)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Geofence`] if the zone fails validation.
    pub async fn add_geofence(&self, zone: GeofenceZone) -> Result<(), EngineError> {
        Ok(self.geofence.add_geofence(zone).await?)
    }

    /// Returns `false` if no zone has `zone_id`.
    pub async fn remove_geofence(&self, zone_id: &str) -> bool {
        self.geofence.remove_geofence(zone_id).await
    }

    pub async fn geofences(&self) -> Vec<GeofenceZone> {
        self.geofence.zones().await
    }

    /// Visits recorded by `analytics` triggers.
    #[must_use]
    pub fn visits(&self) -> Vec<VisitEvent> {
        self.visits.visits()
    }

    pub fn start_navigation(&self, route: Arc<RouteData>) {
        self.navigation.start_navigation(route);
    }

    pub fn stop_navigation(&self) {
        self.navigation.stop_navigation();
    }

    #[must_use]
    pub fn get_navigation_state(&self) -> NavigationState {
        self.navigation.state()
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Offline`] if the bounds are invalid, the map
    /// data source fails, or the region cannot be stored.
    pub async fn download_offline_map(
        &self,
        region_id: &str,
        bounds: Bounds,
    ) -> Result<OfflineMapData, EngineError> {
        Ok(self.offline.download_offline_map(region_id, bounds).await?)
    }

    #[must_use]
    pub fn is_offline_data_available(&self, point: Coordinate) -> bool {
        self.offline.is_offline_data_available(point)
    }

    #[must_use]
    pub fn offline_regions(&self) -> Vec<RegionSummary> {
        self.offline.regions()
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Offline`] if the record cannot be deleted.
    pub async fn remove_offline_region(&self, region_id: &str) -> Result<bool, EngineError> {
        Ok(self.offline.remove_region(region_id).await?)
    }

    /// Nearby places. Never fails; provider problems give an empty list.
    pub async fn find_nearby_pois(
        &self,
        location: Coordinate,
        filters: &PoiFilters,
    ) -> Arc<Vec<PointOfInterest>> {
        self.pois.find_nearby_pois(location, filters).await
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Provider`] if the lookup fails or no weather
    /// service is configured.
    pub async fn get_weather_info(&self, location: Coordinate) -> Result<WeatherInfo, EngineError> {
        Ok(self.weather.get_weather_info(location).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta, Utc};
    use waypoint_geofence_models::{GeofenceTrigger, TriggerAction, TriggerEvent};
    use waypoint_location::ReplaySource;
    use waypoint_notification::MemorySink;
    use waypoint_routing_models::Maneuver;
    use waypoint_storage::MemoryStore;

    use super::*;

    fn start() -> DateTime<Utc> {
        "2024-05-01T08:00:00Z".parse().unwrap()
    }

    fn fix(lat: f64, lng: f64, minute: i64) -> Position {
        Position::new(lat, lng, 5.0, start() + TimeDelta::minutes(minute))
    }

    fn replay(fixes: Vec<Position>) -> Arc<ReplaySource> {
        Arc::new(ReplaySource::new(
            fixes.into_iter().map(Ok).collect(),
            Duration::ZERO,
        ))
    }

    async fn engine_with(
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn PositionSource>,
        sink: Arc<MemorySink>,
    ) -> LocationEngine {
        LocationEngine::with_store(&EngineConfig::default(), store, source, sink)
            .await
            .unwrap()
    }

    async fn engine(source: Arc<dyn PositionSource>) -> (LocationEngine, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let engine = engine_with(Arc::new(MemoryStore::new()), source, sink.clone()).await;
        (engine, sink)
    }

    fn dam_square() -> GeofenceZone {
        GeofenceZone::circle("dam", "Dam Square", Coordinate::new(52.3731, 4.8926), 100.0)
            .with_trigger(GeofenceTrigger::new(
                TriggerEvent::Enter,
                TriggerAction::Notification,
            ))
            .with_trigger(GeofenceTrigger::new(TriggerEvent::Exit, TriggerAction::Analytics))
    }

    #[tokio::test]
    async fn current_position_comes_from_source() {
        let (engine, _) = engine(replay(vec![fix(52.37, 4.89, 0)])).await;

        let position = engine.get_current_position().await.unwrap();
        assert!((position.latitude - 52.37).abs() < f64::EPSILON);
        assert_eq!(engine.last_known_position(), Some(position));
    }

    #[tokio::test]
    async fn position_failure_is_returned() {
        let (engine, _) = engine(replay(Vec::new())).await;
        assert!(matches!(
            engine.get_current_position().await,
            Err(EngineError::Position(PositionError::Unavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn tracked_fixes_drive_geofences() {
        let (engine, sink) = engine(replay(vec![
            fix(52.3800, 4.8926, 0),
            fix(52.3731, 4.8926, 1),
            fix(52.3731, 4.8927, 2),
            fix(52.3800, 4.8926, 3),
        ]))
        .await;
        engine.add_geofence(dam_square()).await.unwrap();

        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handle = engine.start_tracking(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        handle.finished().await;

        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 4);
        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].body, "You've arrived at Dam Square");

        let visits = engine.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].event, TriggerEvent::Exit);
        assert_eq!(visits[0].dwell_secs, Some(120));
    }

    #[tokio::test]
    async fn tracked_fixes_drive_navigation() {
        let origin = Coordinate::new(52.3731, 4.8926);
        let (engine, _) = engine(replay(vec![fix(52.3600, 4.8852, 10)])).await;

        let route = engine
            .calculate_route(origin, "52.3600,4.8852", &engine.route_options())
            .await
            .unwrap();
        assert_eq!(route.steps[0].maneuver, Maneuver::Depart);
        engine.start_navigation(route);

        engine.start_tracking(|_| {}).finished().await;

        let state = engine.get_navigation_state();
        assert!(state.arrived);
        assert!(state.remaining_distance.abs() < f64::EPSILON);

        engine.stop_navigation();
        assert!(!engine.get_navigation_state().is_navigating);
    }

    #[tokio::test]
    async fn routes_are_cached() {
        let (engine, _) = engine(replay(Vec::new())).await;
        let origin = Coordinate::new(52.3731, 4.8926);
        let options = engine.route_options();

        let first = engine
            .calculate_route(origin, "52.36,4.8852", &options)
            .await
            .unwrap();
        let second = engine
            .calculate_route(origin, "52.36,4.8852", &options)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn free_text_destination_needs_routing_service() {
        let (engine, _) = engine(replay(Vec::new())).await;
        assert!(matches!(
            engine
                .calculate_route(Coordinate::new(0.0, 0.0), "Rijksmuseum", &engine.route_options())
                .await,
            Err(EngineError::Route(RouteError::UnresolvedDestination { .. }))
        ));
    }

    #[tokio::test]
    async fn configured_language_applies_to_synthesized_routes() {
        let config = EngineConfig::from_toml("[routing]\ndefault_language = \"pl\"").unwrap();
        let engine = LocationEngine::with_store(
            &config,
            Arc::new(MemoryStore::new()),
            replay(Vec::new()),
            Arc::new(MemorySink::new()),
        )
        .await
        .unwrap();

        let route = engine
            .calculate_route(Coordinate::new(52.0, 4.9), "52.1,4.9", &engine.route_options())
            .await
            .unwrap();
        assert_eq!(route.steps[0].instruction, "Kieruj się na północ");
    }

    #[tokio::test]
    async fn invalid_zone_is_rejected() {
        let (engine, _) = engine(replay(Vec::new())).await;
        let mut zone = dam_square();
        zone.circular = None;

        assert!(matches!(
            engine.add_geofence(zone).await,
            Err(EngineError::Geofence(GeofenceError::Validation { .. }))
        ));
        assert!(engine.geofences().await.is_empty());
    }

    #[tokio::test]
    async fn zones_and_regions_survive_restart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());

        let first = engine_with(Arc::clone(&store), replay(Vec::new()), sink.clone()).await;
        first.add_geofence(dam_square()).await.unwrap();
        first
            .download_offline_map(
                "amsterdam-center",
                Bounds::from_corners([52.35, 4.88], [52.39, 4.93]),
            )
            .await
            .unwrap();
        drop(first);

        let second = engine_with(store, replay(Vec::new()), sink).await;
        assert_eq!(second.geofences().await.len(), 1);
        assert!(second.is_offline_data_available(Coordinate::new(52.37, 4.90)));
        assert!(!second.is_offline_data_available(Coordinate::new(52.50, 5.10)));
        assert_eq!(second.offline_regions().len(), 1);

        assert!(second.remove_offline_region("amsterdam-center").await.unwrap());
        assert!(second.remove_geofence("dam").await);
    }

    #[tokio::test]
    async fn opens_file_store_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();

        let engine = LocationEngine::open(&config, replay(Vec::new()), Arc::new(MemorySink::new()))
            .await
            .unwrap();
        engine.add_geofence(dam_square()).await.unwrap();

        assert!(dir.path().join("store").join("geofence_zones.json").exists());
    }

    #[tokio::test]
    async fn discovery_without_services() {
        let (engine, _) = engine(replay(Vec::new())).await;
        let here = Coordinate::new(52.37, 4.89);

        assert!(
            engine
                .find_nearby_pois(here, &PoiFilters::default())
                .await
                .is_empty()
        );
        assert!(matches!(
            engine.get_weather_info(here).await,
            Err(EngineError::Provider(ProviderError::NotConfigured { .. }))
        ));
    }

    #[tokio::test]
    async fn invalid_offset_fails_startup() {
        let config = EngineConfig::from_toml("[geofence]\nutc_offset_minutes = 100000").unwrap();
        let result = LocationEngine::with_store(
            &config,
            Arc::new(MemoryStore::new()),
            replay(Vec::new()),
            Arc::new(MemorySink::new()),
        )
        .await;
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }
}
