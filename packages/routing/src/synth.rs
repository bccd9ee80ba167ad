//! Direct-line routes for when no routing provider is configured.

use waypoint_geo::{compass_direction, haversine_distance};
use waypoint_geo_models::Coordinate;
use waypoint_routing_models::{Maneuver, RouteData, RouteOptions, RouteStep};

use crate::instructions;

/// Builds a two-step route (depart, arrive) along the great circle from
/// `origin` to `destination`.
///
/// Duration is the distance divided by the travel mode's average speed.
#[must_use]
pub fn synthesize_route(
    origin: Coordinate,
    destination: Coordinate,
    options: &RouteOptions,
) -> RouteData {
    let distance = haversine_distance(origin, destination);
    let duration = distance / options.mode.average_speed_mps();
    let direction = compass_direction(origin, destination);

    let depart = RouteStep {
        id: "step-0".to_string(),
        instruction: instructions::depart_instruction(direction, &options.language),
        distance,
        duration,
        maneuver: Maneuver::Depart,
        coordinates: origin,
        street_name: None,
        landmarks: Vec::new(),
        speed_limit: None,
    };

    let arrive = RouteStep {
        id: "step-1".to_string(),
        instruction: instructions::instruction(Maneuver::Arrive, &options.language).to_string(),
        distance: 0.0,
        duration: 0.0,
        maneuver: Maneuver::Arrive,
        coordinates: destination,
        street_name: None,
        landmarks: Vec::new(),
        speed_limit: None,
    };

    RouteData::new(vec![depart, arrive], distance, duration)
}

#[cfg(test)]
mod tests {
    use waypoint_routing_models::TravelMode;

    use super::*;

    #[test]
    fn two_steps_depart_then_arrive() {
        let origin = Coordinate::new(52.370, 4.895);
        let destination = Coordinate::new(52.380, 4.895);
        let route = synthesize_route(origin, destination, &RouteOptions::default());

        assert_eq!(route.steps.len(), 2);
        assert_eq!(route.steps[0].maneuver, Maneuver::Depart);
        assert_eq!(route.steps[0].instruction, "Head north");
        assert_eq!(route.steps[1].maneuver, Maneuver::Arrive);
        assert_eq!(route.destination(), Some(destination));

        let step_total: f64 = route.steps.iter().map(|s| s.distance).sum();
        assert!((step_total - route.total_distance).abs() < 1e-9);
        assert!((route.total_distance - 1112.0).abs() < 5.0, "got {}", route.total_distance);
    }

    #[test]
    fn duration_follows_mode_speed() {
        let origin = Coordinate::new(0.0, 0.0);
        let destination = Coordinate::new(0.0, 0.1);
        let walking = RouteOptions {
            mode: TravelMode::Walking,
            ..RouteOptions::default()
        };
        let driving = RouteOptions::default();

        let slow = synthesize_route(origin, destination, &walking);
        let fast = synthesize_route(origin, destination, &driving);

        assert!((slow.total_duration / fast.total_duration - 10.0).abs() < 1e-9);
        assert!(
            (slow.total_duration - slow.total_distance / (5.0 / 3.6)).abs() < 1e-6,
            "walking duration should be distance at 5 km/h"
        );
    }

    #[test]
    fn same_point_route_is_zero_length() {
        let here = Coordinate::new(52.0, 4.0);
        let route = synthesize_route(here, here, &RouteOptions::default());
        assert!(route.total_distance.abs() < f64::EPSILON);
        assert!(route.total_duration.abs() < f64::EPSILON);
    }

    #[test]
    fn polish_instructions() {
        let options = RouteOptions {
            language: "pl".to_string(),
            ..RouteOptions::default()
        };
        let route = synthesize_route(Coordinate::new(52.0, 4.0), Coordinate::new(51.9, 4.0), &options);
        assert_eq!(route.steps[0].instruction, "Kieruj się na południe");
        assert_eq!(route.steps[1].instruction, "Dotarłeś do celu");
    }
}
