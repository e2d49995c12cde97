//! The contract shared by every scenario monitor, and the events they emit.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{scenario_builder::ScenarioConfiguration, simulation_interface::ActorPool};

/// Status reported by a scenario after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Running,
    Success,
    Failure,
}

impl Status {
    pub fn is_running(self) -> bool {
        self == Status::Running
    }
}

/// What a traffic event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficEventKind {
    CollisionStatic,
    CollisionVehicle,
    CollisionPedestrian,
    TrafficLightInfraction,
    WrongWayInfraction,
    RouteDeviation,
    RouteCompleted,
    RouteCompletionPercentage,
    /// Emitted by a scenario implementation the evaluator does not know how to score.
    Unrecognized(String),
}

impl Display for TrafficEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrafficEventKind::CollisionStatic => "collision-static",
            TrafficEventKind::CollisionVehicle => "collision-vehicle",
            TrafficEventKind::CollisionPedestrian => "collision-pedestrian",
            TrafficEventKind::TrafficLightInfraction => "traffic-light-infraction",
            TrafficEventKind::WrongWayInfraction => "wrong-way-infraction",
            TrafficEventKind::RouteDeviation => "route-deviation",
            TrafficEventKind::RouteCompleted => "route-completed",
            TrafficEventKind::RouteCompletionPercentage => "route-completion-percentage",
            TrafficEventKind::Unrecognized(kind) => kind,
        };
        write!(f, "{s}")
    }
}

/// A discrete observation made by a monitor during a tick. Never mutated once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEvent {
    pub kind: TrafficEventKind,
    pub message: Option<String>,
    pub payload: Option<serde_json::Value>,
}

impl TrafficEvent {
    pub fn new(kind: TrafficEventKind) -> Self {
        Self {
            kind,
            message: None,
            payload: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// `route-completion-percentage` carrying `{"percentage": value}`.
    pub fn completion_percentage(percentage: f64) -> Self {
        Self::new(TrafficEventKind::RouteCompletionPercentage)
            .with_payload(serde_json::json!({ "percentage": percentage }))
    }
}

/// A running scenario monitor.
///
/// `tick` is called exactly once per simulation step, before the agent acts and before the
/// world advances. A scenario may spawn or move its own actors through the [`ActorPool`] but
/// cannot step the world.
pub trait Scenario {
    fn name(&self) -> &str;

    /// Evaluate the scenario's monitors once and return the resulting status.
    fn tick(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<Status>;

    /// Status computed by the last tick.
    fn status(&self) -> Status;

    /// Every event emitted since the scenario was created, in emission order.
    fn collect_events(&self) -> Vec<TrafficEvent>;

    /// Release every actor the scenario spawned.
    fn teardown(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<()>;
}

/// A matched scenario definition bound to its running monitor.
pub struct ScenarioInstance {
    configuration: ScenarioConfiguration,
    scenario: Box<dyn Scenario>,
}

impl ScenarioInstance {
    pub fn new(configuration: ScenarioConfiguration, scenario: Box<dyn Scenario>) -> Self {
        Self {
            configuration,
            scenario,
        }
    }

    pub fn configuration(&self) -> &ScenarioConfiguration {
        &self.configuration
    }
}

impl Scenario for ScenarioInstance {
    fn name(&self) -> &str {
        self.scenario.name()
    }

    fn tick(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<Status> {
        self.scenario.tick(world)
    }

    fn status(&self) -> Status {
        self.scenario.status()
    }

    fn collect_events(&self) -> Vec<TrafficEvent> {
        self.scenario.collect_events()
    }

    fn teardown(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<()> {
        self.scenario.teardown(world)
    }
}

impl std::fmt::Debug for ScenarioInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioInstance")
            .field("name", &self.scenario.name())
            .field("scenario_type", &self.configuration.scenario_type)
            .finish()
    }
}
