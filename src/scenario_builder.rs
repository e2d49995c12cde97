//! Turning matched scenario definitions into running scenario instances.
//!
//! Scenario implementations are looked up by their type tag in a [`ScenarioRegistry`]. The
//! registry keeps registrations in order; when a tag was registered more than once the
//! [`AmbiguityPolicy`] decides what happens:
//!
//! - [`AmbiguityPolicy::FirstRegistered`]: the earliest registration wins and a warning is
//!   logged.
//! - [`AmbiguityPolicy::Reject`]: resolution fails with
//!   [`ConfigurationError::AmbiguousScenario`].
//!
//! Every tag of a route is resolved by [`ScenarioRegistry::validate`] before anything is
//! spawned, so an unknown tag never leaves half-built routes behind.

use anyhow::Context;
use tracing::{debug, instrument, warn};

use crate::{
    annotations::{OtherActors, ScenarioDefinition},
    error::ConfigurationError,
    master_scenario::{MasterConfiguration, MasterScenario, RouteMonitorSettings},
    route::{Pose, Waypoint},
    scenario::{Scenario, ScenarioInstance},
    simulation_interface::{ActorHandle, RoadOption, Simulation},
};

/// Model used for antagonists whose annotation does not name one.
pub const DEFAULT_ACTOR_MODEL: &str = "vehicle.*";

/// Where an antagonist stands relative to the ego vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorSide {
    Front,
    Left,
    Right,
}

/// Normalized spawn request for one antagonist.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorConfiguration {
    pub model: String,
    pub transform: Waypoint,
    pub side: ActorSide,
    pub speed: f64,
    pub scale: f64,
    pub autopilot: bool,
}

impl ActorConfiguration {
    pub fn new(transform: Waypoint, side: ActorSide) -> Self {
        Self {
            model: DEFAULT_ACTOR_MODEL.to_owned(),
            transform,
            side,
            speed: 0.0,
            scale: 1.0,
            autopilot: false,
        }
    }
}

/// Convert the raw antagonist poses of an annotation, front first, then left, then right.
pub fn convert_other_actors(other_actors: Option<&OtherActors>) -> Vec<ActorConfiguration> {
    let Some(actors) = other_actors else {
        return vec![];
    };
    let groups = [
        (ActorSide::Front, &actors.front),
        (ActorSide::Left, &actors.left),
        (ActorSide::Right, &actors.right),
    ];
    groups
        .into_iter()
        .flat_map(|(side, poses)| {
            poses
                .iter()
                .map(move |pose| ActorConfiguration::new(*pose, side))
        })
        .collect()
}

/// What a scenario implementation is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfiguration {
    pub name: String,
    pub scenario_type: String,
    pub town: String,
    pub trigger_point: Waypoint,
    pub other_actors: Vec<ActorConfiguration>,
    pub ego_vehicle: ActorHandle,
}

/// Builds a scenario from its configuration. Actors are expected to be spawned by the
/// scenario itself once it activates.
pub type ScenarioBuilderFn =
    Box<dyn Fn(&ScenarioConfiguration) -> anyhow::Result<Box<dyn Scenario>>>;

/// How to resolve a tag registered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    #[default]
    FirstRegistered,
    Reject,
}

/// Ordered mapping from scenario type tags to builder functions.
#[derive(Default)]
pub struct ScenarioRegistry {
    entries: Vec<(String, ScenarioBuilderFn)>,
    policy: AmbiguityPolicy,
}

impl ScenarioRegistry {
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self {
            entries: vec![],
            policy,
        }
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: AmbiguityPolicy) {
        self.policy = policy;
    }

    /// Register a builder for `tag`. Registering the same tag twice is allowed, see
    /// [`AmbiguityPolicy`].
    pub fn register<F>(&mut self, tag: impl Into<String>, builder: F)
    where
        F: Fn(&ScenarioConfiguration) -> anyhow::Result<Box<dyn Scenario>> + 'static,
    {
        self.entries.push((tag.into(), Box::new(builder)));
    }

    /// Chainable [`register`](Self::register).
    pub fn with<F>(mut self, tag: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&ScenarioConfiguration) -> anyhow::Result<Box<dyn Scenario>> + 'static,
    {
        self.register(tag, builder);
        self
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    /// The builder chosen for `tag` under the registry's policy.
    pub fn resolve(&self, tag: &str) -> Result<&ScenarioBuilderFn, ConfigurationError> {
        let mut candidates = self
            .entries
            .iter()
            .filter(|(t, _)| t == tag)
            .map(|(_, b)| b);
        let Some(first) = candidates.next() else {
            return Err(ConfigurationError::UnknownScenario(tag.to_owned()));
        };
        let others = candidates.count();
        if others > 0 {
            match self.policy {
                AmbiguityPolicy::FirstRegistered => {
                    warn!(
                        tag,
                        candidates = others + 1,
                        "scenario type registered several times, using the first registration"
                    );
                }
                AmbiguityPolicy::Reject => {
                    return Err(ConfigurationError::AmbiguousScenario {
                        tag: tag.to_owned(),
                        candidates: others + 1,
                    });
                }
            }
        }
        Ok(first)
    }

    /// Resolve every definition without building anything.
    pub fn validate(&self, definitions: &[ScenarioDefinition]) -> Result<(), ConfigurationError> {
        for definition in definitions {
            self.resolve(&definition.scenario_type)?;
        }
        Ok(())
    }

    /// Build one instance per definition, in order.
    ///
    /// Tags are all resolved first: an unresolvable one fails the whole call before any
    /// builder runs.
    #[instrument(skip(self, definitions), fields(count = definitions.len()))]
    pub fn build(
        &self,
        definitions: &[ScenarioDefinition],
        town: &str,
        ego_vehicle: ActorHandle,
    ) -> anyhow::Result<Vec<ScenarioInstance>> {
        let builders = definitions
            .iter()
            .map(|d| self.resolve(&d.scenario_type))
            .collect::<Result<Vec<_>, _>>()?;

        let mut instances = Vec::with_capacity(definitions.len());
        for (definition, builder) in definitions.iter().zip(builders) {
            let configuration = ScenarioConfiguration {
                name: definition.name.clone(),
                scenario_type: definition.scenario_type.clone(),
                town: town.to_owned(),
                trigger_point: definition.trigger,
                other_actors: convert_other_actors(definition.other_actors.as_ref()),
                ego_vehicle,
            };
            let scenario = builder(&configuration)
                .with_context(|| format!("could not build scenario '{}'", definition.name))?;
            debug!(name = definition.name, "scenario built");
            instances.push(ScenarioInstance::new(configuration, scenario));
        }
        Ok(instances)
    }
}

/// Build the master scenario of a route: target is the last pose of `dense_path`, the test
/// criteria are instantiated by the simulation.
#[instrument(skip(simulation, dense_path, settings), fields(points = dense_path.len()))]
pub fn build_master(
    simulation: &mut dyn Simulation,
    ego_vehicle: ActorHandle,
    dense_path: &[(Pose, RoadOption)],
    town: &str,
    settings: RouteMonitorSettings,
) -> anyhow::Result<MasterScenario> {
    let config = MasterConfiguration::new(town, dense_path.to_vec(), settings)
        .context("cannot build the master scenario of an empty route")?;
    debug!(
        target_pose = ?config.target,
        timeout_steps = config.timeout_steps,
        "master scenario configured"
    );
    let criteria = simulation
        .spawn_route_criteria(ego_vehicle, &config)
        .context("could not instantiate the route criteria")?;
    Ok(MasterScenario::new(config, ego_vehicle, criteria))
}
