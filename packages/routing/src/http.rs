//! Routing provider backed by a JSON HTTP service.
//!
//! Request: `GET {base_url}/route?origin=lat,lng&destination=...&mode=...`.
//! The response is read leniently; only these fields are used:
//!
//! ```json
//! {"routes": [{
//!   "distance": 2500, "duration": 600,
//!   "steps": [{"maneuver": "turn_left", "distance": 300, "duration": 60,
//!              "location": [52.37, 4.89], "name": "Damrak",
//!              "instruction": "...", "speedLimit": 50, "landmarks": ["..."]}],
//!   "traffic": {"congestion": "moderate", "delay": 120,
//!               "incidents": [{"description": "..."}]}
//! }]}
//! ```
//!
//! The first route is the primary one; any others become alternatives.
//! Steps without an `instruction` get one from the local tables.

use std::time::Duration;

use serde_json::Value;
use waypoint_geo_models::Coordinate;
use waypoint_provider::ProviderError;
use waypoint_provider::http::{client, fetch_json, join_url};
use waypoint_provider::json::{array_field, f64_field, require_f64, str_field};
use waypoint_routing_models::{
    CongestionLevel, Maneuver, RouteData, RouteOptions, RouteStep, TrafficIncident, TrafficInfo,
};

use crate::{Destination, RoutingProvider, instructions};

/// Calls a routing HTTP service.
#[derive(Debug, Clone)]
pub struct HttpRoutingProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpRoutingProvider {
    /// Creates a provider for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: client(timeout)?,
            base_url: base_url.into(),
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl RoutingProvider for HttpRoutingProvider {
    async fn route(
        &self,
        origin: Coordinate,
        destination: &Destination,
        options: &RouteOptions,
    ) -> Result<RouteData, ProviderError> {
        let request = self
            .client
            .get(join_url(&self.base_url, "route"))
            .query(&[
                ("origin", origin.to_string()),
                ("destination", destination.to_string()),
                ("mode", options.mode.to_string()),
                ("language", options.language.clone()),
                ("avoid_traffic", options.avoid_traffic.to_string()),
                ("alternatives", options.alternatives.to_string()),
                ("optimize_for", options.optimize_for.to_string()),
            ]);

        let body = fetch_json(request, self.timeout).await?;
        parse_response(&body, &options.language)
    }
}

/// Parses a routing response into the primary route with alternatives.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] if there are no routes or a route is
/// missing its totals or step coordinates.
pub fn parse_response(body: &Value, language: &str) -> Result<RouteData, ProviderError> {
    let mut routes = array_field(body, "routes")
        .iter()
        .map(|route| parse_route(route, language))
        .collect::<Result<Vec<_>, _>>()?;

    if routes.is_empty() {
        return Err(ProviderError::parse("routing response contains no routes"));
    }

    let mut primary = routes.remove(0);
    primary.alternatives = routes;
    Ok(primary)
}

fn parse_route(route: &Value, language: &str) -> Result<RouteData, ProviderError> {
    let total_distance = require_f64(route, "distance", "routing")?;
    let total_duration = require_f64(route, "duration", "routing")?;

    let steps = array_field(route, "steps")
        .iter()
        .enumerate()
        .map(|(i, step)| parse_step(i, step, language))
        .collect::<Result<Vec<_>, _>>()?;

    let traffic = route.get("traffic").and_then(parse_traffic);

    Ok(RouteData {
        steps,
        total_distance,
        total_duration,
        traffic,
        alternatives: Vec::new(),
    })
}

fn parse_step(index: usize, step: &Value, language: &str) -> Result<RouteStep, ProviderError> {
    let maneuver = str_field(step, "maneuver")
        .and_then(|m| m.parse::<Maneuver>().ok())
        .unwrap_or(Maneuver::Continue);

    let coordinates = step
        .get("location")
        .and_then(parse_coordinate)
        .ok_or_else(|| ProviderError::parse(format!("step {index} has no location")))?;

    let street_name = str_field(step, "name").map(String::from);

    let instruction = str_field(step, "instruction").map_or_else(
        || instructions::instruction_onto(maneuver, language, street_name.as_deref()),
        String::from,
    );

    let landmarks = array_field(step, "landmarks")
        .iter()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect();

    Ok(RouteStep {
        id: str_field(step, "id").map_or_else(|| format!("step-{index}"), String::from),
        instruction,
        distance: f64_field(step, "distance").unwrap_or(0.0),
        duration: f64_field(step, "duration").unwrap_or(0.0),
        maneuver,
        coordinates,
        street_name,
        landmarks,
        speed_limit: f64_field(step, "speedLimit"),
    })
}

/// Accepts `[lat, lng]` or `{"lat": .., "lng"|"lon": ..}`.
fn parse_coordinate(value: &Value) -> Option<Coordinate> {
    let coordinate = if let Some(pair) = value.as_array() {
        match pair.as_slice() {
            [lat, lng] => Coordinate::new(lat.as_f64()?, lng.as_f64()?),
            _ => return None,
        }
    } else {
        let lat = f64_field(value, "lat")?;
        let lng = f64_field(value, "lng").or_else(|| f64_field(value, "lon"))?;
        Coordinate::new(lat, lng)
    };
    coordinate.is_valid().then_some(coordinate)
}

fn parse_traffic(traffic: &Value) -> Option<TrafficInfo> {
    let congestion_level = str_field(traffic, "congestion")?
        .parse::<CongestionLevel>()
        .ok()?;

    let incidents = array_field(traffic, "incidents")
        .iter()
        .filter_map(|incident| {
            Some(TrafficIncident {
                description: str_field(incident, "description")?.to_string(),
                location: incident.get("location").and_then(parse_coordinate),
            })
        })
        .collect();

    Some(TrafficInfo {
        incidents,
        congestion_level,
        estimated_delay: f64_field(traffic, "delay").unwrap_or(0.0),
    })
}
