#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point-of-interest and weather types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use waypoint_geo_models::Coordinate;

/// A place near the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub category: String,
    pub location: Coordinate,
    /// Meters from the search location, filled in after lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Provider rating, usually 0 to 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Narrows a nearby search. Part of the POI cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoiFilters {
    /// Categories to include; empty means any.
    pub categories: Vec<String>,
    /// Search radius in meters.
    pub radius_m: f64,
    /// Maximum number of results.
    pub limit: usize,
    pub min_rating: Option<f64>,
}

impl Default for PoiFilters {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            radius_m: 1000.0,
            limit: 20,
            min_rating: None,
        }
    }
}

impl PoiFilters {
    /// A stable string form used in cache keys.
    #[must_use]
    pub fn cache_fragment(&self) -> String {
        let mut categories: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .collect();
        categories.sort();
        categories.dedup();

        format!(
            "{}|{:.0}|{}|{}",
            categories.join(","),
            self.radius_m,
            self.limit,
            self.min_rating.map_or_else(String::new, |r| format!("{r:.1}"))
        )
    }

    /// Returns `true` if `poi` passes the category and rating filters.
    #[must_use]
    pub fn accepts(&self, poi: &PointOfInterest) -> bool {
        let category_ok = self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(&poi.category));
        let rating_ok = self
            .min_rating
            .is_none_or(|min| poi.rating.is_some_and(|r| r >= min));
        category_ok && rating_ok
    }
}

/// Current conditions at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherInfo {
    pub location: Coordinate,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Short description, e.g. `"light rain"`.
    pub condition: String,
    /// Relative humidity in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(category: &str, rating: Option<f64>) -> PointOfInterest {
        PointOfInterest {
            id: "1".to_string(),
            name: "Place".to_string(),
            category: category.to_string(),
            location: Coordinate::new(52.0, 4.0),
            distance: None,
            rating,
            address: None,
        }
    }

    #[test]
    fn cache_fragment_ignores_category_order_and_case() {
        let a = PoiFilters {
            categories: vec!["Cafe".to_string(), "museum".to_string()],
            ..PoiFilters::default()
        };
        let b = PoiFilters {
            categories: vec!["museum".to_string(), "cafe".to_string()],
            ..PoiFilters::default()
        };
        assert_eq!(a.cache_fragment(), b.cache_fragment());
        assert_ne!(a.cache_fragment(), PoiFilters::default().cache_fragment());
    }

    #[test]
    fn accepts_by_category_and_rating() {
        let filters = PoiFilters {
            categories: vec!["cafe".to_string()],
            min_rating: Some(4.0),
            ..PoiFilters::default()
        };
        assert!(filters.accepts(&poi("Cafe", Some(4.5))));
        assert!(!filters.accepts(&poi("cafe", Some(3.9))));
        assert!(!filters.accepts(&poi("cafe", None)));
        assert!(!filters.accepts(&poi("bar", Some(5.0))));
        assert!(PoiFilters::default().accepts(&poi("bar", None)));
    }

    #[test]
    fn filters_default_from_partial_json() {
        let filters: PoiFilters = serde_json::from_str(r#"{"radiusM": 250}"#).unwrap();
        assert!((filters.radius_m - 250.0).abs() < f64::EPSILON);
        assert_eq!(filters.limit, 20);
    }
}
