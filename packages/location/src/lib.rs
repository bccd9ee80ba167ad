#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Position tracking on top of the host's location capability.
//!
//! The host exposes its GPS/network location through a [`PositionSource`].
//! [`PositionTracker`] wraps it with the engine's policies:
//!
//! * one-shot reads use [`PositionOptions::one_shot`] and are bounded by
//!   the option timeout;
//! * continuous tracking uses [`PositionOptions::continuous`], processes
//!   every fix to completion (last-known update, then the registered
//!   [`FixHandler`], then the caller's callback) before taking the next;
//! * errors during continuous tracking never reach the caller. They turn
//!   into a user-facing notification and tracking carries on.

pub mod replay;
pub mod tracker;

pub use replay::ReplaySource;
pub use tracker::{PositionTracker, TrackingHandle};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use waypoint_geo_models::Position;

/// Errors reported by a position source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The user denied location permission.
    #[error("Location permission denied")]
    PermissionDenied,

    /// The source could not determine a position.
    #[error("Position unavailable: {message}")]
    Unavailable {
        /// Platform-provided detail.
        message: String,
    },

    /// No fix arrived within the requested timeout.
    #[error("Timed out waiting for a position fix")]
    Timeout,
}

/// Options passed to the position source for each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionOptions {
    /// Ask for GPS-grade accuracy rather than a coarse network fix.
    pub enable_high_accuracy: bool,
    /// How long to wait for a fix.
    #[serde(with = "millis")]
    pub timeout: Duration,
    /// Oldest cached fix the source may return instead of a fresh one.
    #[serde(with = "millis")]
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// High accuracy, 10 s timeout, cached fixes up to 30 s old accepted.
    #[must_use]
    pub const fn one_shot() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(30),
        }
    }

    /// High accuracy, 5 s timeout, never a cached fix.
    #[must_use]
    pub const fn continuous() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::ZERO,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// A stream of fixes (or errors) from a continuous subscription.
///
/// The subscription ends when the receiver is dropped.
pub type FixStream = mpsc::Receiver<Result<Position, PositionError>>;

/// The host's location capability.
#[async_trait::async_trait]
pub trait PositionSource: Send + Sync {
    /// Reads a single fix.
    ///
    /// # Errors
    ///
    /// Returns [`PositionError`] if no fix can be produced.
    async fn current_position(&self, options: &PositionOptions)
    -> Result<Position, PositionError>;

    /// Starts a continuous subscription.
    fn watch(&self, options: &PositionOptions) -> FixStream;
}

/// Receives every fix during continuous tracking, before the caller's
/// callback runs.
///
/// The engine implements this to drive geofence evaluation and
/// navigation progress.
#[async_trait::async_trait]
pub trait FixHandler: Send + Sync {
    /// Processes one fix to completion.
    async fn on_fix(&self, position: &Position);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_option_profiles() {
        let one_shot = PositionOptions::one_shot();
        assert!(one_shot.enable_high_accuracy);
        assert_eq!(one_shot.timeout, Duration::from_secs(10));
        assert_eq!(one_shot.maximum_age, Duration::from_secs(30));

        let continuous = PositionOptions::continuous();
        assert_eq!(continuous.timeout, Duration::from_secs(5));
        assert_eq!(continuous.maximum_age, Duration::ZERO);
    }

    #[test]
    fn options_serialize_as_milliseconds() {
        let json = serde_json::to_value(PositionOptions::one_shot()).unwrap();
        assert_eq!(json["timeout"], 10_000);
        assert_eq!(json["maximumAge"], 30_000);
        assert_eq!(json["enableHighAccuracy"], true);
    }
}
