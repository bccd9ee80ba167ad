#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route planning.
//!
//! [`RoutePlanner::calculate_route`] consults its cache first, keyed by
//! origin, destination and options. On a miss it asks the configured
//! [`RoutingProvider`] (bounded by a request timeout) or, when none is
//! configured, synthesizes a direct-line route from the geometry alone.
//! Concurrent identical requests share one provider call.

pub mod http;
pub mod instructions;
pub mod synth;

pub use http::HttpRoutingProvider;
pub use synth::synthesize_route;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use waypoint_cache::GeoCache;
use waypoint_geo_models::Coordinate;
use waypoint_provider::{ProviderError, with_timeout};
use waypoint_routing_models::{RouteData, RouteOptions};

/// Default bound on a provider call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from route planning.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The routing provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The destination is not a coordinate and there is no provider to
    /// look it up.
    #[error("Cannot resolve destination {query:?} without a routing provider")]
    UnresolvedDestination {
        /// The destination text as given.
        query: String,
    },
}

/// Where a route should end.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// An explicit point.
    Coordinate(Coordinate),
    /// Free text (an address or place name) for the provider to resolve.
    Query(String),
}

impl Destination {
    /// Interprets `"lat,lng"` as a coordinate and anything else as a query.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Coordinate::parse(text).map_or_else(|| Self::Query(text.trim().to_string()), Self::Coordinate)
    }

    fn cache_fragment(&self) -> String {
        match self {
            Self::Coordinate(c) => c.to_string(),
            Self::Query(q) => q.to_lowercase(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinate(c) => write!(f, "{c}"),
            Self::Query(q) => f.write_str(q),
        }
    }
}

/// An external routing service.
#[async_trait::async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Computes a route.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] for transport failures, non-success
    /// responses, or responses missing required fields.
    async fn route(
        &self,
        origin: Coordinate,
        destination: &Destination,
        options: &RouteOptions,
    ) -> Result<RouteData, ProviderError>;
}

/// Cache-fronted route lookups.
pub struct RoutePlanner {
    cache: GeoCache<Arc<RouteData>>,
    provider: Option<Arc<dyn RoutingProvider>>,
    request_timeout: Duration,
}

impl RoutePlanner {
    /// Creates a planner with no provider; every route is synthesized.
    #[must_use]
    pub const fn new(cache: GeoCache<Arc<RouteData>>) -> Self {
        Self {
            cache,
            provider: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Routes through `provider`, bounding each call by `request_timeout`.
    #[must_use]
    pub fn with_provider(
        mut self,
        provider: Arc<dyn RoutingProvider>,
        request_timeout: Duration,
    ) -> Self {
        self.provider = Some(provider);
        self.request_timeout = request_timeout;
        self
    }

    /// Returns `true` if a routing provider is configured.
    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Computes (or reuses) a route from `origin` to `destination`.
    ///
    /// `destination` is either `"lat,lng"` or free text for the provider.
    ///
    /// # Errors
    ///
    /// * [`RouteError::Provider`] if the provider fails or times out.
    /// * [`RouteError::UnresolvedDestination`] if `destination` is free text
    ///   and no provider is configured.
    pub async fn calculate_route(
        &self,
        origin: Coordinate,
        destination: &str,
        options: &RouteOptions,
    ) -> Result<Arc<RouteData>, RouteError> {
        let destination = Destination::parse(destination);
        let key = format!(
            "route:{origin}->{}|{}",
            destination.cache_fragment(),
            options.cache_fragment()
        );

        self.cache
            .get_or_try_insert_with(&key, None, move || {
                self.compute(origin, destination, options)
            })
            .await
    }

    async fn compute(
        &self,
        origin: Coordinate,
        destination: Destination,
        options: &RouteOptions,
    ) -> Result<Arc<RouteData>, RouteError> {
        let route = match (&self.provider, destination) {
            (Some(provider), destination) => {
                log::debug!("Requesting route {origin} -> {destination}");
                with_timeout(
                    self.request_timeout,
                    provider.route(origin, &destination, options),
                )
                .await
                .inspect_err(|e| log::error!("Routing provider failed: {e}"))?
            }
            (None, Destination::Coordinate(to)) => {
                log::debug!("No routing provider; synthesizing {origin} -> {to}");
                synthesize_route(origin, to, options)
            }
            (None, Destination::Query(query)) => {
                return Err(RouteError::UnresolvedDestination { query });
            }
        };

        Ok(Arc::new(route))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use waypoint_routing_models::{Maneuver, TravelMode};

    use super::*;

    struct FakeProvider {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl RoutingProvider for FakeProvider {
        async fn route(
            &self,
            origin: Coordinate,
            _destination: &Destination,
            options: &RouteOptions,
        ) -> Result<RouteData, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ProviderError::Status { status: 503 });
            }
            let mut route = synthesize_route(origin, Coordinate::new(52.38, 4.90), options);
            route.total_distance = 4200.0;
            Ok(route)
        }
    }

    fn planner() -> RoutePlanner {
        RoutePlanner::new(GeoCache::with_defaults("routes"))
    }

    fn origin() -> Coordinate {
        Coordinate::new(52.370, 4.895)
    }

    #[test]
    fn parses_destinations() {
        assert_eq!(
            Destination::parse("52.38, 4.90"),
            Destination::Coordinate(Coordinate::new(52.38, 4.90))
        );
        assert_eq!(
            Destination::parse(" Centraal Station "),
            Destination::Query("Centraal Station".to_string())
        );
        assert_eq!(
            Destination::parse("95,4"),
            Destination::Query("95,4".to_string())
        );
    }

    #[tokio::test]
    async fn synthesizes_without_provider() {
        let route = planner()
            .calculate_route(origin(), "52.38,4.895", &RouteOptions::default())
            .await
            .unwrap();
        assert_eq!(route.steps.first().unwrap().maneuver, Maneuver::Depart);
        assert_eq!(route.steps.last().unwrap().maneuver, Maneuver::Arrive);
        assert!(route.total_distance > 1000.0);
    }

    #[tokio::test]
    async fn free_text_without_provider_is_unresolved() {
        let err = planner()
            .calculate_route(origin(), "Rijksmuseum", &RouteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::UnresolvedDestination { query } if query == "Rijksmuseum"));
    }

    #[tokio::test]
    async fn repeated_requests_hit_the_cache() {
        let provider = Arc::new(FakeProvider::new());
        let planner = planner().with_provider(provider.clone(), Duration::from_secs(5));
        let options = RouteOptions::default();

        let a = planner.calculate_route(origin(), "Rijksmuseum", &options).await.unwrap();
        let b = planner.calculate_route(origin(), "rijksmuseum", &options).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_options_are_cached_separately() {
        let provider = Arc::new(FakeProvider::new());
        let planner = planner().with_provider(provider.clone(), Duration::from_secs(5));

        let walking = RouteOptions {
            mode: TravelMode::Walking,
            ..RouteOptions::default()
        };
        planner.calculate_route(origin(), "Dam", &RouteOptions::default()).await.unwrap();
        planner.calculate_route(origin(), "Dam", &walking).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_share_one_call() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(50),
            ..FakeProvider::new()
        });
        let planner = planner().with_provider(provider.clone(), Duration::from_secs(5));
        let options = RouteOptions::default();

        let (a, b) = tokio::join!(
            planner.calculate_route(origin(), "Dam", &options),
            planner.calculate_route(origin(), "Dam", &options),
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_errors_propagate_and_are_not_cached() {
        let provider = Arc::new(FakeProvider {
            fail: true,
            ..FakeProvider::new()
        });
        let planner = planner().with_provider(provider.clone(), Duration::from_secs(5));
        let options = RouteOptions::default();

        for _ in 0..2 {
            let err = planner.calculate_route(origin(), "Dam", &options).await.unwrap_err();
            assert!(matches!(
                err,
                RouteError::Provider(ProviderError::Status { status: 503 })
            ));
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_secs(60),
            ..FakeProvider::new()
        });
        let planner = planner().with_provider(provider, Duration::from_secs(15));

        let err = planner
            .calculate_route(origin(), "Dam", &RouteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouteError::Provider(ProviderError::Timeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cached_route_expires_after_ttl() {
        let provider = Arc::new(FakeProvider::new());
        let planner = RoutePlanner::new(GeoCache::new("routes", Duration::from_secs(60), 16))
            .with_provider(provider.clone(), Duration::from_secs(5));
        let options = RouteOptions::default();

        planner.calculate_route(origin(), "Dam", &options).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        planner.calculate_route(origin(), "Dam", &options).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }
}
