#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Navigation session state machine.
//!
//! Two states: idle and navigating. [`NavigationSession::start_navigation`]
//! enters (or restarts) navigation on a route and
//! [`NavigationSession::stop_navigation`] returns to idle from anywhere. A
//! route is held only while navigating.
//!
//! While navigating, each fix is checked against the coordinate of the
//! step after the current one. Once the fix is within the snap radius the
//! session advances and the finished step's distance and duration come
//! off the remaining totals. Snapping onto the final step means arrival.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use waypoint_geo::haversine_distance;
use waypoint_geo_models::Position;
use waypoint_routing_models::{Maneuver, RouteData};

/// Default distance from a step's coordinate at which it counts as reached.
pub const DEFAULT_SNAP_RADIUS_M: f64 = 20.0;

/// A snapshot of the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub is_navigating: bool,
    pub current_route: Option<Arc<RouteData>>,
    /// Index into the route's steps.
    pub current_step: usize,
    /// Meters.
    pub remaining_distance: f64,
    /// Seconds.
    pub remaining_time: f64,
    /// Maneuver of the upcoming step.
    pub next_maneuver: Option<Maneuver>,
    /// Ground speed from the last fix, in m/s.
    pub current_speed: Option<f64>,
    /// Posted limit on the current step, in km/h.
    pub speed_limit: Option<f64>,
    pub arrived: bool,
}

impl NavigationState {
    fn navigating(route: Arc<RouteData>) -> Self {
        let mut state = Self {
            is_navigating: true,
            remaining_distance: route.total_distance,
            remaining_time: route.total_duration,
            current_route: Some(route),
            ..Self::default()
        };
        state.refresh_step_fields();
        state
    }

    fn refresh_step_fields(&mut self) {
        let Some(route) = &self.current_route else {
            return;
        };
        self.next_maneuver = route
            .steps
            .get(self.current_step + 1)
            .map(|step| step.maneuver);
        self.speed_limit = route
            .steps
            .get(self.current_step)
            .and_then(|step| step.speed_limit);
        self.arrived = route
            .steps
            .len()
            .checked_sub(1)
            .is_some_and(|last| last > 0 && self.current_step >= last);
    }
}

/// Progress made by one fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepAdvance {
    /// Step index after the fix.
    pub step: usize,
    /// How many steps the fix advanced past.
    pub advanced: usize,
    pub arrived: bool,
}

/// Tracks progress along one route at a time.
#[derive(Debug)]
pub struct NavigationSession {
    state: Mutex<NavigationState>,
    snap_radius_m: f64,
}

impl Default for NavigationSession {
    fn default() -> Self {
        Self::new(DEFAULT_SNAP_RADIUS_M)
    }
}

impl NavigationSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new(snap_radius_m: f64) -> Self {
        Self {
            state: Mutex::new(NavigationState::default()),
            snap_radius_m,
        }
    }

    fn lock(&self) -> MutexGuard<'_, NavigationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts navigating `route`, replacing any active route.
    pub fn start_navigation(&self, route: Arc<RouteData>) {
        log::info!(
            "Navigation started: {} steps, {:.0} m, {:.0} s",
            route.steps.len(),
            route.total_distance,
            route.total_duration
        );
        *self.lock() = NavigationState::navigating(route);
    }

    /// Returns to idle and clears all progress.
    pub fn stop_navigation(&self) {
        let mut state = self.lock();
        if state.is_navigating {
            log::info!("Navigation stopped at step {}", state.current_step);
        }
        *state = NavigationState::default();
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> NavigationState {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_navigating(&self) -> bool {
        self.lock().is_navigating
    }

    /// Applies a fix. Returns `None` while idle.
    pub fn on_position(&self, position: &Position) -> Option<StepAdvance> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let route = Arc::clone(state.current_route.as_ref()?);

        state.current_speed = position.speed;

        let here = position.coordinate();
        let mut advanced = 0;

        while let Some(next) = route.steps.get(state.current_step + 1) {
            if haversine_distance(here, next.coordinates) > self.snap_radius_m {
                break;
            }
            let finished = &route.steps[state.current_step];
            state.remaining_distance = (state.remaining_distance - finished.distance).max(0.0);
            state.remaining_time = (state.remaining_time - finished.duration).max(0.0);
            state.current_step += 1;
            advanced += 1;
            log::debug!("Snapped to step {}", state.current_step);
        }

        state.refresh_step_fields();

        if advanced > 0 && state.arrived {
            log::info!("Arrived at destination");
            state.remaining_distance = 0.0;
            state.remaining_time = 0.0;
        }

        Some(StepAdvance {
            step: state.current_step,
            advanced,
            arrived: state.arrived,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use waypoint_geo_models::Coordinate;
    use waypoint_routing_models::RouteStep;

    use super::*;

    fn step(i: usize, maneuver: Maneuver, lat: f64, distance: f64, duration: f64) -> RouteStep {
        RouteStep {
            id: format!("step-{i}"),
            instruction: maneuver.to_string(),
            distance,
            duration,
            maneuver,
            coordinates: Coordinate::new(lat, 4.9),
            street_name: None,
            landmarks: Vec::new(),
            speed_limit: (maneuver == Maneuver::TurnLeft).then_some(30.0),
        }
    }

    /// Three steps ~1.1 km apart along a meridian.
    fn route() -> Arc<RouteData> {
        Arc::new(RouteData::new(
            vec![
                step(0, Maneuver::Depart, 52.00, 1100.0, 300.0),
                step(1, Maneuver::TurnLeft, 52.01, 1400.0, 300.0),
                step(2, Maneuver::Arrive, 52.02, 0.0, 0.0),
            ],
            2500.0,
            600.0,
        ))
    }

    fn at(lat: f64) -> Position {
        Position::new(lat, 4.9, 5.0, Utc::now())
    }

    #[test]
    fn starts_idle() {
        let session = NavigationSession::default();
        assert_eq!(session.state(), NavigationState::default());
        assert!(session.on_position(&at(52.0)).is_none());
    }

    #[test]
    fn start_sets_totals() {
        let session = NavigationSession::default();
        let route = route();
        session.start_navigation(route.clone());

        let state = session.state();
        assert!(state.is_navigating);
        assert_eq!(state.current_route, Some(route));
        assert_eq!(state.current_step, 0);
        assert!((state.remaining_distance - 2500.0).abs() < f64::EPSILON);
        assert!((state.remaining_time - 600.0).abs() < f64::EPSILON);
        assert_eq!(state.next_maneuver, Some(Maneuver::TurnLeft));
        assert!(!state.arrived);
    }

    #[test]
    fn stop_returns_to_idle_defaults() {
        let session = NavigationSession::default();
        session.start_navigation(Arc::new(RouteData::new(Vec::new(), 2500.0, 600.0)));
        session.stop_navigation();

        let state = session.state();
        assert!(!state.is_navigating);
        assert!(state.current_route.is_none());
        assert_eq!(state.current_step, 0);
        assert!(state.remaining_distance.abs() < f64::EPSILON);
        assert!(state.remaining_time.abs() < f64::EPSILON);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["isNavigating"], false);
        assert!(json["currentRoute"].is_null());
    }

    #[test]
    fn stop_is_allowed_while_idle() {
        let session = NavigationSession::default();
        session.stop_navigation();
        assert!(!session.is_navigating());
    }

    #[test]
    fn far_fix_does_not_advance_but_records_speed() {
        let session = NavigationSession::default();
        session.start_navigation(route());

        let mut fix = at(52.005);
        fix.speed = Some(12.5);
        let advance = session.on_position(&fix).unwrap();

        assert_eq!(advance.advanced, 0);
        let state = session.state();
        assert_eq!(state.current_step, 0);
        assert_eq!(state.current_speed, Some(12.5));
    }

    #[test]
    fn snapping_advances_and_subtracts() {
        let session = NavigationSession::default();
        session.start_navigation(route());

        // ~11 m short of step 1.
        let advance = session.on_position(&at(52.0099)).unwrap();
        assert_eq!(advance.step, 1);

        let state = session.state();
        assert!((state.remaining_distance - 1400.0).abs() < f64::EPSILON);
        assert!((state.remaining_time - 300.0).abs() < f64::EPSILON);
        assert_eq!(state.next_maneuver, Some(Maneuver::Arrive));
        assert_eq!(state.speed_limit, Some(30.0));
        assert!(!state.arrived);
    }

    #[test]
    fn snapping_onto_last_step_is_arrival() {
        let session = NavigationSession::default();
        session.start_navigation(route());

        session.on_position(&at(52.01));
        let advance = session.on_position(&at(52.02)).unwrap();

        assert!(advance.arrived);
        let state = session.state();
        assert!(state.arrived);
        assert!(state.is_navigating);
        assert_eq!(state.next_maneuver, None);
        assert!(state.remaining_distance.abs() < f64::EPSILON);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let session = NavigationSession::default();
        session.start_navigation(Arc::new(RouteData::new(
            vec![
                step(0, Maneuver::Depart, 52.00, 5000.0, 900.0),
                step(1, Maneuver::Arrive, 52.01, 0.0, 0.0),
            ],
            1000.0,
            100.0,
        )));

        session.on_position(&at(52.01));
        let state = session.state();
        assert!(state.remaining_distance >= 0.0);
        assert!(state.remaining_time >= 0.0);
    }

    #[test]
    fn restarting_replaces_route() {
        let session = NavigationSession::default();
        session.start_navigation(route());
        session.on_position(&at(52.01));

        let other = Arc::new(RouteData::new(Vec::new(), 10.0, 5.0));
        session.start_navigation(other.clone());

        let state = session.state();
        assert_eq!(state.current_step, 0);
        assert_eq!(state.current_route, Some(other));
        assert!((state.remaining_distance - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn custom_snap_radius() {
        let session = NavigationSession::new(5.0);
        session.start_navigation(route());
        // ~11 m away: outside a 5 m radius.
        assert_eq!(session.on_position(&at(52.0099)).unwrap().advanced, 0);
    }
}
