//! Matching of annotated trigger poses against the waypoints of a route.

use tracing::{debug, instrument, trace};

use crate::{
    annotations::{ScenarioAnnotations, ScenarioDefinition},
    route::Waypoint,
};

/// Maximum distances under which a trigger pose is considered to lie on a route waypoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchThresholds {
    /// Same unit as the coordinates.
    pub position: f64,
    /// Degrees, combined over yaw and pitch.
    pub angle: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            position: 1.0,
            angle: 1.0,
        }
    }
}

/// Shortest difference between two angles, both wrapped into `[0, 360)`. Result is in `[0, 180]`.
pub fn angular_difference(a: f64, b: f64) -> f64 {
    let diff = (a.rem_euclid(360.0) - b.rem_euclid(360.0)).abs();
    diff.min(360.0 - diff)
}

/// True when both poses are closer than the thresholds. Symmetric in its two pose arguments.
pub fn match_waypoints(a: &Waypoint, b: &Waypoint, thresholds: &MatchThresholds) -> bool {
    let dist_position = a.distance(b);
    let dyaw = angular_difference(a.yaw, b.yaw);
    let dpitch = angular_difference(a.pitch, b.pitch);
    let dist_angle = (dyaw * dyaw + dpitch * dpitch).sqrt();
    dist_position < thresholds.position && dist_angle < thresholds.angle
}

/// True when `location` matches at least one of `route`'s waypoints.
pub fn match_world_location_to_route(
    location: &Waypoint,
    route: &[Waypoint],
    thresholds: &MatchThresholds,
) -> bool {
    route
        .iter()
        .any(|waypoint| match_waypoints(location, waypoint, thresholds))
}

/// Every annotated trigger of `town` lying on `route`, in annotation order.
///
/// Duplicates are kept: an annotation listed twice, or the same trigger repeated for several
/// towns sharing a name, yields one definition per occurrence.
#[instrument(skip(route, annotations), fields(waypoints = route.len()))]
pub fn scan_route_for_scenarios(
    town: &str,
    route: &[Waypoint],
    annotations: &ScenarioAnnotations,
    thresholds: &MatchThresholds,
) -> Vec<ScenarioDefinition> {
    let mut possible_scenarios = vec![];

    for (town_name, scenarios) in annotations.towns() {
        if town_name != town {
            trace!(town_name, "skipping annotations of another town");
            continue;
        }

        for scenario in scenarios {
            for event in &scenario.events {
                if !match_world_location_to_route(&event.trigger, route, thresholds) {
                    continue;
                }
                let name = format!("{}_{}", scenario.scenario_type, possible_scenarios.len());
                debug!(name, trigger = ?event.trigger, "scenario matched");
                possible_scenarios.push(ScenarioDefinition {
                    name,
                    scenario_type: scenario.scenario_type.clone(),
                    trigger: event.trigger,
                    other_actors: event.other_actors.clone(),
                });
            }
        }
    }

    possible_scenarios
}
