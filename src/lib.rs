//! # Route Evaluator
//!
//! Evaluates an autonomous driving agent on a list of routes driven in a synchronous
//! simulator, while traffic scenarios are injected at annotated locations along each route.
//!
//! It provides:
//! - Route and scenario annotation loading (`route`, `annotations`)
//! - Matching of annotated trigger points against routes (`waypoint_matcher`)
//! - Scenario instantiation through a tag registry (`ScenarioRegistry`)
//! - A per-route state machine stepping scenarios, agent and world in a fixed order
//!   (`RouteRunner`)
//! - Deterministic scoring of the collected events (`score`)
//! - Batch orchestration and JSON reporting (`Evaluator`)
//!
//! Each route is run to completion before the next one starts. Every route owns exactly one
//! agent and one ego vehicle, and gets a `MasterScenario` tracking completion, deviation and
//! timeout, plus one scenario instance per annotation matching the route.
//!
//! # Documentation Overview
//!
//! - For the execution protocol of a single route, see the [`route_runner`] module.
//! - For the batch and its failure model, see the [`evaluator`] module.
//! - For configuring evaluation behavior, see [`Configuration`](crate::configuration::Configuration).
//! - For plugging in a simulator, an agent or a path interpolator, check out the traits of
//!   [`simulation_interface`].
//! - For writing scenarios, see the [`Scenario`](crate::scenario::Scenario) trait and
//!   [`ScenarioRegistry`](crate::scenario_builder::ScenarioRegistry).
//! - For the scoring rules, see the [`score`] module.
//!
//! # Usage Example
//!
//! ```no_run
//! # use route_evaluator::simulation_interface::*;
//! # use route_evaluator::master_scenario::MasterConfiguration;
//! # use route_evaluator::route::Pose;
//! # struct YourSimulator;
//! # impl ActorPool for YourSimulator {
//! #     fn spawn_or_relocate(&mut self, _: &str, _: &Pose, _: bool) -> anyhow::Result<ActorHandle> { unimplemented!() }
//! #     fn destroy(&mut self, _: ActorHandle) -> anyhow::Result<()> { unimplemented!() }
//! #     fn actor_pose(&self, _: ActorHandle) -> anyhow::Result<Pose> { unimplemented!() }
//! #     fn apply_control(&mut self, _: ActorHandle, _: &VehicleControl) -> anyhow::Result<()> { unimplemented!() }
//! # }
//! # impl Simulation for YourSimulator {
//! #     fn load_town(&mut self, _: &str) -> anyhow::Result<()> { unimplemented!() }
//! #     fn step(&mut self) -> anyhow::Result<()> { unimplemented!() }
//! #     fn sensor_snapshot(&mut self, _: ActorHandle, _: &[SensorSpec]) -> anyhow::Result<SensorSnapshot> { unimplemented!() }
//! #     fn spawn_route_criteria(&mut self, _: ActorHandle, _: &MasterConfiguration) -> anyhow::Result<Box<dyn route_evaluator::scenario::Scenario>> { unimplemented!() }
//! # }
//! # struct YourAgent;
//! # impl EgoAgent for YourAgent {
//! #     fn sensors(&self) -> Vec<SensorSpec> { vec![] }
//! #     fn set_global_plan(&mut self, _: &[(GeoPoint, RoadOption)]) {}
//! #     fn run_step(&mut self, _: &SensorSnapshot) -> anyhow::Result<VehicleControl> { unimplemented!() }
//! #     fn destroy(&mut self) {}
//! # }
//! # struct YourAgentFactory;
//! # impl AgentFactory<YourAgent> for YourAgentFactory {
//! #     fn new_agent(&self) -> anyhow::Result<YourAgent> { Ok(YourAgent) }
//! # }
//! # struct YourPlanner;
//! # impl PathInterpolator for YourPlanner {
//! #     fn interpolate(&mut self, _: &[Pose]) -> anyhow::Result<InterpolatedRoute> { unimplemented!() }
//! # }
//! # fn build_control_loss(_: &ScenarioConfiguration) -> anyhow::Result<Box<dyn Scenario>> { unimplemented!() }
//! use route_evaluator::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Scenario types the annotations may refer to
//!     let registry = ScenarioRegistry::default().with("ControlLoss", build_control_loss);
//!
//!     // Write the JSON report next to the routes
//!     let config = Configuration::from_env().with_output_path("results.json");
//!
//!     let mut evaluator = Evaluator::new(config, registry, YourPlanner);
//!     let report = evaluator.evaluate_files(
//!         &mut YourSimulator,
//!         &YourAgentFactory,
//!         "routes_training.xml",
//!         "all_towns_traffic_scenarios.json",
//!     )?;
//!
//!     for record in &report.records {
//!         println!("{record}");
//!     }
//!     println!("global score: {:.2}", report.global_score);
//!
//!     Ok(())
//! }
//! ```

pub use anyhow;

pub mod annotations;
pub mod configuration;
pub mod error;
pub mod evaluator;
mod logger;
pub mod master_scenario;
pub mod report;
pub mod route;
pub mod route_runner;
pub mod scenario;
pub mod scenario_builder;
pub mod score;
pub mod simulation_interface;
pub mod waypoint_matcher;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use route_evaluator::prelude::*;
/// ```
///
/// Includes:
/// - [`Configuration`](crate::configuration::Configuration)
/// - [`Evaluator`](crate::evaluator::Evaluator) and its report types
/// - the scenario contract and [`ScenarioRegistry`](crate::scenario_builder::ScenarioRegistry)
/// - every collaborator trait of [`simulation_interface`](crate::simulation_interface)
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::error::{ConfigurationError, EvaluationError};
    pub use crate::evaluator::Evaluator;
    pub use crate::report::{BatchReport, RouteRecord};
    pub use crate::scenario::{Scenario, Status, TrafficEvent, TrafficEventKind};
    pub use crate::scenario_builder::{AmbiguityPolicy, ScenarioConfiguration, ScenarioRegistry};
    pub use crate::score::Outcome;
    pub use crate::simulation_interface::{
        ActorPool, AgentFactory, EgoAgent, PathInterpolator, Simulation,
    };
}
