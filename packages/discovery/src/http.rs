//! HTTP POI and weather providers.
//!
//! POI request: `GET {base}/pois?lat=..&lng=..&radius=..&limit=..[&categories=a,b]`,
//! answered by `{"results": [...]}` or a bare array of places with `id`,
//! `name`, `category`, `lat`, `lng` (or `lon`), and optional `rating` and
//! `address`.
//!
//! Weather request: `GET {base}/weather?lat=..&lng=..`, answered by an
//! object (optionally nested under `current`) with `temperature`,
//! `condition` (or `description`), and optional `humidity`, `windSpeed`,
//! and `observedAt` (RFC 3339).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use waypoint_discovery_models::{PoiFilters, PointOfInterest, WeatherInfo};
use waypoint_geo_models::Coordinate;
use waypoint_provider::ProviderError;
use waypoint_provider::http::{client, fetch_json, join_url};
use waypoint_provider::json::{f64_field, require_f64, str_field};

use crate::{PoiProvider, WeatherProvider};

/// POI search over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPoiProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPoiProvider {
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
impl PoiProvider for HttpPoiProvider {
    async fn nearby(
        &self,
        location: Coordinate,
        filters: &PoiFilters,
    ) -> Result<Vec<PointOfInterest>, ProviderError> {
        let mut query = vec![
            ("lat", location.latitude.to_string()),
            ("lng", location.longitude.to_string()),
            ("radius", format!("{:.0}", filters.radius_m)),
            ("limit", filters.limit.to_string()),
        ];
        if !filters.categories.is_empty() {
            query.push(("categories", filters.categories.join(",")));
        }

        let request = self
            .client
            .get(join_url(&self.base_url, "pois"))
            .query(&query);
        let body = fetch_json(request, self.timeout).await?;
        parse_pois(&body)
    }
}

/// Parses a POI search response. Entries without an id, name, or valid
/// location are skipped.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] if the body holds no result list.
pub fn parse_pois(body: &Value) -> Result<Vec<PointOfInterest>, ProviderError> {
    let results = body
        .as_array()
        .or_else(|| body.get("results").and_then(Value::as_array))
        .ok_or_else(|| ProviderError::parse("POI response has no results list"))?;

    Ok(results.iter().filter_map(parse_poi).collect())
}

fn parse_poi(entry: &Value) -> Option<PointOfInterest> {
    let lat = f64_field(entry, "lat")?;
    let lng = f64_field(entry, "lng").or_else(|| f64_field(entry, "lon"))?;
    let location = Coordinate::new(lat, lng);
    if !location.is_valid() {
        return None;
    }

    let id = match entry.get("id")? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    Some(PointOfInterest {
        id,
        name: str_field(entry, "name")?.to_string(),
        category: str_field(entry, "category").unwrap_or("other").to_string(),
        location,
        distance: None,
        rating: f64_field(entry, "rating"),
        address: str_field(entry, "address").map(String::from),
    })
}

/// Current-conditions lookups over HTTP.
#[derive(Debug, Clone)]
pub struct HttpWeatherProvider {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpWeatherProvider {
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
impl WeatherProvider for HttpWeatherProvider {
    async fn current(&self, location: Coordinate) -> Result<WeatherInfo, ProviderError> {
        let request = self
            .client
            .get(join_url(&self.base_url, "weather"))
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lng", location.longitude.to_string()),
            ]);
        let body = fetch_json(request, self.timeout).await?;
        parse_weather(&body, location)
    }
}

/// Parses a weather response.
///
/// # Errors
///
/// Returns [`ProviderError::Parse`] if the temperature or condition is
/// missing.
pub fn parse_weather(body: &Value, location: Coordinate) -> Result<WeatherInfo, ProviderError> {
    let current = body.get("current").unwrap_or(body);

    let temperature = require_f64(current, "temperature", "weather")?;
    let condition = str_field(current, "condition")
        .or_else(|| str_field(current, "description"))
        .ok_or_else(|| ProviderError::parse("missing condition in weather response"))?;

    let observed_at = str_field(current, "observedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc));

    Ok(WeatherInfo {
        location,
        temperature,
        condition: condition.to_string(),
        humidity: f64_field(current, "humidity"),
        wind_speed: f64_field(current, "windSpeed"),
        observed_at,
    })
}
