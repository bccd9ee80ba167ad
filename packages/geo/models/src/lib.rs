#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate, position fix, and bounding box types.
//!
//! These are the shared vocabulary of the engine: every component that
//! deals with a place on the map speaks in [`Coordinate`]s, every fix from
//! the host's location capability arrives as a [`Position`], and offline
//! regions are described by axis-aligned [`Bounds`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns `true` if both components are finite and within the valid
    /// WGS84 ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Parses a `"lat,lng"` string (whitespace around either part is
    /// ignored).
    ///
    /// Returns `None` if the text does not contain exactly two numeric
    /// parts or the result is out of range.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let (lat, lng) = text.split_once(',')?;
        let latitude = lat.trim().parse::<f64>().ok()?;
        let longitude = lng.trim().parse::<f64>().ok()?;
        let coordinate = Self::new(latitude, longitude);
        coordinate.is_valid().then_some(coordinate)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([latitude, longitude]: [f64; 2]) -> Self {
        Self::new(latitude, longitude)
    }
}

/// A single fix produced by the host's location capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
    /// Ground speed in meters per second, when the source reports one.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Heading in degrees clockwise from true north, when reported.
    #[serde(default)]
    pub heading: Option<f64>,
}

impl Position {
    /// Creates a fix with no speed or heading information.
    #[must_use]
    pub const fn new(
        latitude: f64,
        longitude: f64,
        accuracy: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            timestamp,
            speed: None,
            heading: None,
        }
    }

    /// The location of this fix without its metadata.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// An axis-aligned latitude/longitude rectangle.
///
/// Membership is inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    /// Minimum latitude / minimum longitude corner.
    pub south_west: Coordinate,
    /// Maximum latitude / maximum longitude corner.
    pub north_east: Coordinate,
}

impl Bounds {
    /// Creates bounds from two `[lat, lng]` corners.
    #[must_use]
    pub fn from_corners(south_west: [f64; 2], north_east: [f64; 2]) -> Self {
        Self {
            south_west: south_west.into(),
            north_east: north_east.into(),
        }
    }

    /// Returns `true` if the south-west corner is not north or east of
    /// the north-east corner and both corners are valid coordinates.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.south_west.is_valid()
            && self.north_east.is_valid()
            && self.south_west.latitude <= self.north_east.latitude
            && self.south_west.longitude <= self.north_east.longitude
    }

    /// Inclusive membership test.
    #[must_use]
    pub fn contains(&self, point: Coordinate) -> bool {
        point.latitude >= self.south_west.latitude
            && point.latitude <= self.north_east.latitude
            && point.longitude >= self.south_west.longitude
            && point.longitude <= self.north_east.longitude
    }
}
