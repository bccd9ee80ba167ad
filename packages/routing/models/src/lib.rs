#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route, step, maneuver, and traffic types.
//!
//! A [`RouteData`] is immutable once computed: the planner caches it and
//! the navigation session holds its own shared copy. Distances are in
//! meters and durations in seconds throughout.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use waypoint_geo_models::Coordinate;

/// How the user is travelling.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TravelMode {
    #[default]
    Driving,
    Walking,
    Cycling,
    Transit,
}

impl TravelMode {
    /// Average speed used to estimate durations for synthesized routes.
    #[must_use]
    pub const fn average_speed_kmh(self) -> f64 {
        match self {
            Self::Driving => 50.0,
            Self::Walking => 5.0,
            Self::Cycling => 15.0,
            Self::Transit => 30.0,
        }
    }

    /// [`Self::average_speed_kmh`] in meters per second.
    #[must_use]
    pub fn average_speed_mps(self) -> f64 {
        self.average_speed_kmh() * 1000.0 / 3600.0
    }
}

/// What the provider should minimise.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OptimizeFor {
    #[default]
    Time,
    Distance,
}

/// Options for a route request. Part of the route cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteOptions {
    pub mode: TravelMode,
    /// Language code for instruction text, e.g. `"en"` or `"pl"`.
    pub language: String,
    pub avoid_traffic: bool,
    /// Ask the provider for alternative routes.
    pub alternatives: bool,
    pub optimize_for: OptimizeFor,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            mode: TravelMode::default(),
            language: "en".to_string(),
            avoid_traffic: false,
            alternatives: false,
            optimize_for: OptimizeFor::default(),
        }
    }
}

impl RouteOptions {
    /// A stable string form used in cache keys.
    #[must_use]
    pub fn cache_fragment(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.mode, self.language, self.avoid_traffic, self.alternatives, self.optimize_for
        )
    }
}

/// The kind of movement a step asks for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Maneuver {
    Depart,
    Arrive,
    Continue,
    Straight,
    TurnLeft,
    TurnRight,
    SlightLeft,
    SlightRight,
    SharpLeft,
    SharpRight,
    UTurn,
    Merge,
    Roundabout,
}

/// Overall traffic congestion along a route.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CongestionLevel {
    Low,
    Moderate,
    High,
    Severe,
}

/// A reported incident along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficIncident {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinate>,
}

/// Traffic conditions reported with a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfo {
    #[serde(default)]
    pub incidents: Vec<TrafficIncident>,
    pub congestion_level: CongestionLevel,
    /// Extra travel time caused by traffic, in seconds.
    pub estimated_delay: f64,
}

/// One instruction along a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub id: String,
    /// Localized instruction text.
    pub instruction: String,
    /// Length of the step in meters.
    pub distance: f64,
    /// Expected time for the step in seconds.
    pub duration: f64,
    pub maneuver: Maneuver,
    /// Where the maneuver happens.
    pub coordinates: Coordinate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub landmarks: Vec<String>,
    /// Posted limit in km/h, when the provider knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_limit: Option<f64>,
}

/// A computed route.
///
/// `steps` is ordered: the first step departs and the last arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteData {
    pub steps: Vec<RouteStep>,
    /// Meters.
    pub total_distance: f64,
    /// Seconds.
    pub total_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<TrafficInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Self>,
}

impl RouteData {
    /// A route with the given totals and steps, no traffic information and
    /// no alternatives.
    #[must_use]
    pub const fn new(steps: Vec<RouteStep>, total_distance: f64, total_duration: f64) -> Self {
        Self {
            steps,
            total_distance,
            total_duration,
            traffic: None,
            alternatives: Vec::new(),
        }
    }

    /// The arrival point, if the route has any steps.
    #[must_use]
    pub fn destination(&self) -> Option<Coordinate> {
        self.steps.last().map(|step| step.coordinates)
    }
}
