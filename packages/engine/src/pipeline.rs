//! Per-fix processing during continuous tracking.

use std::sync::Arc;

use waypoint_geo_models::Position;
use waypoint_geofence::GeofenceEngine;
use waypoint_location::FixHandler;
use waypoint_navigation::NavigationSession;

/// Runs geofence evaluation, then navigation progress, for every fix.
pub struct FixPipeline {
    geofence: Arc<GeofenceEngine>,
    navigation: Arc<NavigationSession>,
}

impl FixPipeline {
    #[must_use]
    pub const fn new(geofence: Arc<GeofenceEngine>, navigation: Arc<NavigationSession>) -> Self {
        Self {
            geofence,
            navigation,
        }
    }
}

#[async_trait::async_trait]
impl FixHandler for FixPipeline {
    async fn on_fix(&self, position: &Position) {
        let fired = self.geofence.evaluate(position).await;
        if !fired.is_empty() {
            log::debug!("Fix at {} fired {} trigger(s)", position.coordinate(), fired.len());
        }

        if let Some(advance) = self
            .navigation
            .on_position(position)
            .filter(|advance| advance.advanced > 0)
        {
            log::debug!("Navigation advanced to step {}", advance.step);
        }
    }
}
