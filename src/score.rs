//! Turning the events collected during a route run into a score.
//!
//! [`score`] is a pure function: the same ordered events and verdict always give the same
//! [`ScoreResult`].
//!
//! | event                      | penalty |
//! |----------------------------|---------|
//! | `collision-static`         | 10      |
//! | `collision-vehicle`        | 10      |
//! | `collision-pedestrian`     | 30      |
//! | `traffic-light-infraction` | 10      |
//! | `wrong-way-infraction`     | 5       |
//!
//! The route score is 100 once `route-completed` has been seen, otherwise the payload of the
//! last `route-completion-percentage` event (0 without any). The final score is the route
//! score minus the penalties, floored at 0.

use serde::Serialize;

use crate::{
    error::{RouteFault, ScoringWarning},
    master_scenario::MasterVerdict,
    scenario::{TrafficEvent, TrafficEventKind},
};

/// Terminal classification of a route run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Timeout => "TIMEOUT",
        };
        write!(f, "{s}")
    }
}

/// Human readable messages, grouped by kind, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub collisions: Vec<String>,
    pub red_lights: Vec<String>,
    pub wrong_way: Vec<String>,
    pub route_deviation: Vec<String>,
    pub faults: Vec<String>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.collisions.is_empty()
            && self.red_lights.is_empty()
            && self.wrong_way.is_empty()
            && self.route_deviation.is_empty()
            && self.faults.is_empty()
    }

    /// Every message, group after group.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.collisions
            .iter()
            .chain(&self.red_lights)
            .chain(&self.wrong_way)
            .chain(&self.route_deviation)
            .chain(&self.faults)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub outcome: Outcome,
    pub route_score: f64,
    pub penalty: f64,
    pub final_score: f64,
    pub diagnostics: Diagnostics,
    pub warnings: Vec<ScoringWarning>,
}

impl ScoreResult {
    /// Mark the run as failed because of a runtime fault. The score itself is kept.
    pub fn record_fault(&mut self, fault: &RouteFault) {
        self.outcome = Outcome::Failure;
        self.diagnostics.faults.push(fault.to_string());
    }
}

/// Penalty of an event kind, `None` for kinds that are not infractions.
pub fn penalty_of(kind: &TrafficEventKind) -> Option<f64> {
    match kind {
        TrafficEventKind::CollisionStatic => Some(10.0),
        TrafficEventKind::CollisionVehicle => Some(10.0),
        TrafficEventKind::CollisionPedestrian => Some(30.0),
        TrafficEventKind::TrafficLightInfraction => Some(10.0),
        TrafficEventKind::WrongWayInfraction => Some(5.0),
        _ => None,
    }
}

fn default_message(kind: &TrafficEventKind) -> &'static str {
    match kind {
        TrafficEventKind::CollisionStatic => "agent collided against a static object",
        TrafficEventKind::CollisionVehicle => "agent collided against a vehicle",
        TrafficEventKind::CollisionPedestrian => "agent collided against a pedestrian",
        TrafficEventKind::TrafficLightInfraction => "agent ran a red light",
        TrafficEventKind::WrongWayInfraction => "agent invaded the opposite lane",
        TrafficEventKind::RouteDeviation => "agent deviated from the route",
        _ => "",
    }
}

fn read_percentage(event: &TrafficEvent) -> Result<f64, String> {
    let payload = event.payload.as_ref().ok_or("missing payload")?;
    let value = payload
        .get("percentage")
        .ok_or("missing 'percentage'")?
        .as_f64()
        .ok_or("'percentage' is not a number")?;
    if !(0.0..=100.0).contains(&value) {
        return Err(format!("percentage {value} is outside [0, 100]"));
    }
    Ok(value)
}

/// Compute the score of a route run from its events and the master scenario's verdict.
pub fn score(events: &[TrafficEvent], verdict: MasterVerdict) -> ScoreResult {
    let outcome = if verdict.criteria_failed {
        Outcome::Failure
    } else if verdict.timed_out {
        Outcome::Timeout
    } else {
        Outcome::Success
    };

    let mut completed = false;
    let mut last_percentage = None;
    let mut penalty = 0.0;
    let mut diagnostics = Diagnostics::default();
    let mut warnings = vec![];

    for (index, event) in events.iter().enumerate() {
        let message = || {
            event
                .message
                .clone()
                .unwrap_or_else(|| default_message(&event.kind).to_owned())
        };

        match &event.kind {
            TrafficEventKind::CollisionStatic
            | TrafficEventKind::CollisionVehicle
            | TrafficEventKind::CollisionPedestrian => diagnostics.collisions.push(message()),
            TrafficEventKind::TrafficLightInfraction => diagnostics.red_lights.push(message()),
            TrafficEventKind::WrongWayInfraction => diagnostics.wrong_way.push(message()),
            TrafficEventKind::RouteDeviation => diagnostics.route_deviation.push(message()),
            TrafficEventKind::RouteCompleted => completed = true,
            TrafficEventKind::RouteCompletionPercentage => {
                if completed {
                    continue;
                }
                match read_percentage(event) {
                    Ok(value) => last_percentage = Some(value),
                    Err(reason) => warnings.push(ScoringWarning::MalformedPayload {
                        index,
                        kind: event.kind.to_string(),
                        reason,
                    }),
                }
            }
            TrafficEventKind::Unrecognized(kind) => {
                warnings.push(ScoringWarning::UnrecognizedEvent {
                    index,
                    kind: kind.clone(),
                });
            }
        }

        penalty += penalty_of(&event.kind).unwrap_or(0.0);
    }

    let route_score = if completed {
        100.0
    } else {
        last_percentage.unwrap_or(0.0)
    };
    let final_score = f64::max(route_score - penalty, 0.0);

    ScoreResult {
        outcome,
        route_score,
        penalty,
        final_score,
        diagnostics,
        warnings,
    }
}
