#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geofence evaluation and trigger dispatch.
//!
//! [`GeofenceEngine`] owns the zone list. Every mutation rewrites the whole
//! list to storage through [`ZoneRepository`]. Every position fix is
//! tested against each zone (circles by haversine distance, boundary
//! inclusive; polygons by ray casting) and compared with the zone's
//! previous membership:
//!
//! * `enter` fires when the position goes from outside or unknown to inside;
//! * `exit` fires when it goes from inside to outside;
//! * `dwell` fires once per stay, after the position has been inside for
//!   the trigger's threshold.
//!
//! Zones outside their active hours never fire and forget their
//! membership, so a zone that opens while the user is inside reports an
//! entry.

pub mod actions;
pub mod engine;
pub mod membership;
pub mod repository;

pub use actions::{
    HttpWebhookClient, MemoryVisitRecorder, VisitRecorder, WebhookClient, WebhookError,
};
pub use engine::{FiredTrigger, GeofenceEngine, GeofenceSettings};
pub use membership::Membership;
pub use repository::ZoneRepository;

use thiserror::Error;
use waypoint_geofence_models::{GeofenceZone, ZoneShape};
use waypoint_storage::StorageError;

/// Errors from geofence operations.
#[derive(Debug, Error)]
pub enum GeofenceError {
    /// The zone was rejected before being added.
    #[error("Invalid geofence zone {zone_id:?}: {message}")]
    Validation {
        /// Id of the rejected zone.
        zone_id: String,
        /// What is wrong with it.
        message: String,
    },

    /// Zone storage could not be read.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn invalid(zone: &GeofenceZone, message: &str) -> GeofenceError {
    GeofenceError::Validation {
        zone_id: zone.id.clone(),
        message: message.to_string(),
    }
}

/// Checks a zone before it joins `existing`.
///
/// # Errors
///
/// Returns [`GeofenceError::Validation`] describing the first problem
/// found.
pub fn validate_zone(zone: &GeofenceZone, existing: &[GeofenceZone]) -> Result<(), GeofenceError> {
    if zone.id.trim().is_empty() {
        return Err(invalid(zone, "id must not be empty"));
    }
    if existing.iter().any(|z| z.id == zone.id) {
        return Err(invalid(zone, "id is already in use"));
    }

    match zone.shape() {
        None if zone.circular.is_some() => {
            Err(invalid(zone, "only one of circular or polygon may be set"))
        }
        None => Err(invalid(zone, "either circular or polygon must be set")),
        Some(ZoneShape::Circle(circle)) => {
            if !circle.center.is_valid() {
                Err(invalid(zone, "circle center is out of range"))
            } else if !circle.radius.is_finite() || circle.radius <= 0.0 {
                Err(invalid(zone, "radius must be a positive number of meters"))
            } else {
                Ok(())
            }
        }
        Some(ZoneShape::Polygon(vertices)) => {
            if vertices.len() < 3 {
                Err(invalid(zone, "polygon needs at least three vertices"))
            } else if vertices.iter().any(|v| !v.is_valid()) {
                Err(invalid(zone, "polygon vertex is out of range"))
            } else {
                Ok(())
            }
        }
    }
}
