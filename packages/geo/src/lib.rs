#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stateless geometry on the WGS84 sphere.
//!
//! Everything here is a pure function of its inputs so it can be tested
//! independently of the stateful engine components that use it:
//!
//! * [`haversine_distance`]: great-circle distance in meters.
//! * [`initial_bearing`] / [`CompassPoint`]: direction from one coordinate
//!   toward another, quantized to 8 compass points for step text.
//! * [`point_in_polygon`]: odd-even ray casting over an ordered ring.
//! * [`bounding_box`]: the axis-aligned envelope of a vertex list.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use waypoint_geo_models::{Bounds, Coordinate};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
#[must_use]
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `from` toward `to`, in degrees clockwise from true
/// north, normalized to `[0, 360)`.
///
/// Identical coordinates yield `0.0`.
#[must_use]
pub fn initial_bearing(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos().mul_add(lat2.sin(), -(lat1.sin() * lat2.cos() * d_lon.cos()));

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// One of the eight principal compass directions.
#[allow(clippy::upper_case_acronyms)]
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
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum CompassPoint {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassPoint {
    const CLOCKWISE: [Self; 8] = [
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    /// Quantizes a bearing in degrees to the nearest compass point.
    ///
    /// Each point covers a 45° sector centered on its heading, so `N`
    /// spans `[337.5, 22.5)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_bearing(bearing: f64) -> Self {
        let normalized = bearing.rem_euclid(360.0);
        let sector = ((normalized + 22.5) / 45.0).floor() as usize % 8;
        Self::CLOCKWISE[sector]
    }
}

/// Compass direction from `from` toward `to`.
#[must_use]
pub fn compass_direction(from: Coordinate, to: Coordinate) -> CompassPoint {
    CompassPoint::from_bearing(initial_bearing(from, to))
}

/// Odd-even ray-casting membership test.
///
/// `vertices` is an ordered ring; the closing edge from the last vertex
/// back to the first is implied, and a repeated closing vertex is
/// harmless. Rings with fewer than three vertices contain nothing.
/// Longitude is treated as the x axis and latitude as y, which is
/// accurate for zones that do not straddle the antimeridian.
#[must_use]
pub fn point_in_polygon(point: Coordinate, vertices: &[Coordinate]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    if bounding_box(vertices).is_some_and(|envelope| !envelope.contains(point)) {
        return false;
    }

    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].longitude, vertices[i].latitude);
        let (xj, yj) = (vertices[j].longitude, vertices[j].latitude);

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// The axis-aligned envelope of a vertex list, or `None` when empty.
#[must_use]
pub fn bounding_box(vertices: &[Coordinate]) -> Option<Bounds> {
    let first = vertices.first()?;
    let mut south_west = *first;
    let mut north_east = *first;

    for v in &vertices[1..] {
        south_west.latitude = south_west.latitude.min(v.latitude);
        south_west.longitude = south_west.longitude.min(v.longitude);
        north_east.latitude = north_east.latitude.max(v.latitude);
        north_east.longitude = north_east.longitude.max(v.longitude);
    }

    Some(Bounds {
        south_west,
        north_east,
    })
}
