//! Traits the evaluator needs implemented by its collaborators: the simulated world, the
//! agent under evaluation and the path interpolator.
//!
//! None of them is loaded dynamically: the caller builds them and hands them to the
//! [`Evaluator`](crate::evaluator::Evaluator).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{master_scenario::MasterConfiguration, route::Pose, scenario::Scenario};

/// Opaque handle to an actor living in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorHandle(pub u64);

impl std::fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Command applied to a vehicle for one step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VehicleControl {
    /// `[0, 1]`
    pub throttle: f32,
    /// `[-1, 1]`
    pub steer: f32,
    /// `[0, 1]`
    pub brake: f32,
    pub hand_brake: bool,
    pub reverse: bool,
}

/// High level navigation command attached to a path point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoadOption {
    #[default]
    Void,
    Left,
    Right,
    Straight,
    LaneFollow,
    ChangeLaneLeft,
    ChangeLaneRight,
}

/// Geographic coordinate handed to the agent as its global plan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

/// A sensor requested by the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub id: String,
    /// e.g. `"sensor.camera.rgb"`, `"sensor.other.gnss"`, `"sensor.speedometer"`
    pub kind: String,
    /// Mount pose relative to the ego vehicle.
    pub mount: Pose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorReading {
    Scalar(f64),
    Vector(Vec<f64>),
    Bytes(Vec<u8>),
}

/// Readings of every sensor of the agent at a given frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorSnapshot {
    pub frame: u64,
    pub readings: BTreeMap<String, SensorReading>,
}

/// Output of the path interpolator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterpolatedRoute {
    /// Simplified route given to the agent.
    pub agent_plan: Vec<(GeoPoint, RoadOption)>,
    /// Dense pose sequence used by the route monitors.
    pub dense_path: Vec<(Pose, RoadOption)>,
}

/// What a scenario may do with the world while being ticked: spawn, move, read and remove
/// actors. Advancing time is not part of it.
pub trait ActorPool {
    /// Spawn an actor of `model` at `pose`, or move the existing ego vehicle there when
    /// `is_ego` is set and one already exists.
    fn spawn_or_relocate(
        &mut self,
        model: &str,
        pose: &Pose,
        is_ego: bool,
    ) -> anyhow::Result<ActorHandle>;

    fn destroy(&mut self, actor: ActorHandle) -> anyhow::Result<()>;

    /// Current pose of an actor.
    fn actor_pose(&self, actor: ActorHandle) -> anyhow::Result<Pose>;

    fn apply_control(&mut self, actor: ActorHandle, control: &VehicleControl)
        -> anyhow::Result<()>;
}

/// The synchronous simulated world.
///
/// Only the route runner holds it as a `Simulation`; scenarios only ever see the
/// [`ActorPool`] part.
pub trait Simulation: ActorPool {
    /// Load the map of a route. Called once per route, before anything is spawned.
    fn load_town(&mut self, town: &str) -> anyhow::Result<()>;

    /// Advance the world by exactly one discrete tick.
    fn step(&mut self) -> anyhow::Result<()>;

    /// Current readings of `sensors` attached to `ego`.
    fn sensor_snapshot(
        &mut self,
        ego: ActorHandle,
        sensors: &[SensorSpec],
    ) -> anyhow::Result<SensorSnapshot>;

    /// Instantiate the test criteria of the master scenario (collisions, red lights, wrong
    /// way). Their events and verdict are merged into the master's.
    fn spawn_route_criteria(
        &mut self,
        ego: ActorHandle,
        config: &MasterConfiguration,
    ) -> anyhow::Result<Box<dyn Scenario>>;
}

/// The agent being evaluated.
pub trait EgoAgent {
    /// Sensors the agent wants attached to the ego vehicle.
    fn sensors(&self) -> Vec<SensorSpec>;

    /// Called once per route, before the first step.
    fn set_global_plan(&mut self, plan: &[(GeoPoint, RoadOption)]);

    /// One control decision from the current readings.
    fn run_step(&mut self, input: &SensorSnapshot) -> anyhow::Result<VehicleControl>;

    /// Release whatever the agent holds. The agent is not used afterwards.
    fn destroy(&mut self);
}

/// Creates a fresh agent for every route.
pub trait AgentFactory<A: EgoAgent> {
    fn new_agent(&self) -> anyhow::Result<A>;
}

/// Turns the sparse waypoints of a route into a dense, annotated path.
pub trait PathInterpolator {
    fn interpolate(&mut self, waypoints: &[Pose]) -> anyhow::Result<InterpolatedRoute>;
}
