//! Scripted collaborators shared by the integration tests.
//!
//! The world is one-dimensional: the ego vehicle moves along +x by `throttle` meters on every
//! step. Every collaborator writes what it is asked to do into a shared [`CallLog`].
#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use anyhow::{anyhow, bail};
use route_evaluator::{
    master_scenario::MasterConfiguration,
    prelude::*,
    route::{Pose, RouteDescriptor, Waypoint},
    simulation_interface::{
        ActorHandle, GeoPoint, InterpolatedRoute, RoadOption, SensorSnapshot, SensorSpec,
        VehicleControl,
    },
};

#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.borrow().iter().any(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Events emitted by the route criteria, keyed by the tick they are emitted on.
#[derive(Clone, Default)]
pub struct CriteriaScript {
    pub events: Vec<(u64, TrafficEvent)>,
    pub fail_at: Option<u64>,
}

pub struct MockWorld {
    pub log: CallLog,
    pub criteria: CriteriaScript,
    /// Fail `step()` when called for the n-th time (0 based), counted over the world's life.
    pub fail_step_at: Option<u64>,
    pub fail_load_town: Option<String>,
    actors: HashMap<ActorHandle, Pose>,
    ego: Option<ActorHandle>,
    control: VehicleControl,
    next_id: u64,
    steps: u64,
}

impl MockWorld {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            criteria: CriteriaScript::default(),
            fail_step_at: None,
            fail_load_town: None,
            actors: HashMap::new(),
            ego: None,
            control: VehicleControl::default(),
            next_id: 0,
            steps: 0,
        }
    }

    pub fn live_actors(&self) -> usize {
        self.actors.len()
    }
}

impl ActorPool for MockWorld {
    fn spawn_or_relocate(
        &mut self,
        model: &str,
        pose: &Pose,
        is_ego: bool,
    ) -> anyhow::Result<ActorHandle> {
        if is_ego {
            if let Some(ego) = self.ego {
                self.actors.insert(ego, *pose);
                self.log.push("relocate:ego");
                return Ok(ego);
            }
        }
        let handle = ActorHandle(self.next_id);
        self.next_id += 1;
        self.actors.insert(handle, *pose);
        if is_ego {
            self.ego = Some(handle);
            self.log.push("spawn:ego");
        } else {
            self.log.push(format!("spawn:{model}"));
        }
        Ok(handle)
    }

    fn destroy(&mut self, actor: ActorHandle) -> anyhow::Result<()> {
        self.actors
            .remove(&actor)
            .ok_or_else(|| anyhow!("{actor} does not exist"))?;
        if self.ego == Some(actor) {
            self.ego = None;
            self.log.push("destroy:ego");
        } else {
            self.log.push("destroy:actor");
        }
        Ok(())
    }

    fn actor_pose(&self, actor: ActorHandle) -> anyhow::Result<Pose> {
        self.actors
            .get(&actor)
            .copied()
            .ok_or_else(|| anyhow!("{actor} does not exist"))
    }

    fn apply_control(&mut self, actor: ActorHandle, control: &VehicleControl) -> anyhow::Result<()> {
        if self.ego != Some(actor) {
            bail!("control applied to {actor}, which is not the ego vehicle");
        }
        self.control = *control;
        self.log.push("apply_control");
        Ok(())
    }
}

impl Simulation for MockWorld {
    fn load_town(&mut self, town: &str) -> anyhow::Result<()> {
        self.log.push(format!("load:{town}"));
        if self.fail_load_town.as_deref() == Some(town) {
            bail!("map {town} is not installed");
        }
        Ok(())
    }

    fn step(&mut self) -> anyhow::Result<()> {
        self.log.push("step");
        if self.fail_step_at == Some(self.steps) {
            bail!("simulator stopped responding");
        }
        self.steps += 1;
        if let Some(pose) = self.ego.and_then(|ego| self.actors.get_mut(&ego)) {
            pose.x += f64::from(self.control.throttle);
        }
        Ok(())
    }

    fn sensor_snapshot(
        &mut self,
        ego: ActorHandle,
        _sensors: &[SensorSpec],
    ) -> anyhow::Result<SensorSnapshot> {
        self.actor_pose(ego)?;
        self.log.push("snapshot");
        Ok(SensorSnapshot {
            frame: self.steps,
            ..Default::default()
        })
    }

    fn spawn_route_criteria(
        &mut self,
        _ego: ActorHandle,
        _config: &MasterConfiguration,
    ) -> anyhow::Result<Box<dyn Scenario>> {
        Ok(Box::new(ScriptedCriteria {
            log: self.log.clone(),
            script: self.criteria.clone(),
            ticks: 0,
            emitted: vec![],
            status: Status::Running,
        }))
    }
}

struct ScriptedCriteria {
    log: CallLog,
    script: CriteriaScript,
    ticks: u64,
    emitted: Vec<TrafficEvent>,
    status: Status,
}

impl Scenario for ScriptedCriteria {
    fn name(&self) -> &str {
        "RouteCriteria"
    }

    fn tick(&mut self, _world: &mut dyn ActorPool) -> anyhow::Result<Status> {
        self.log.push("tick:criteria");
        let tick = self.ticks;
        self.emitted.extend(
            self.script
                .events
                .iter()
                .filter(|(at, _)| *at == tick)
                .map(|(_, e)| e.clone()),
        );
        if self.script.fail_at == Some(tick) {
            self.status = Status::Failure;
        }
        self.ticks += 1;
        Ok(self.status)
    }

    fn status(&self) -> Status {
        self.status
    }

    fn collect_events(&self) -> Vec<TrafficEvent> {
        self.emitted.clone()
    }

    fn teardown(&mut self, _world: &mut dyn ActorPool) -> anyhow::Result<()> {
        self.log.push("teardown:criteria");
        Ok(())
    }
}

/// Agent pressing the throttle at a constant value.
pub struct ScriptedAgent {
    log: CallLog,
    throttle: f32,
    fail_at: Option<u64>,
    steps: u64,
}

impl EgoAgent for ScriptedAgent {
    fn sensors(&self) -> Vec<SensorSpec> {
        vec![SensorSpec {
            id: "speed".to_owned(),
            kind: "sensor.speedometer".to_owned(),
            mount: Pose::default(),
        }]
    }

    fn set_global_plan(&mut self, plan: &[(GeoPoint, RoadOption)]) {
        self.log.push(format!("agent:plan:{}", plan.len()));
    }

    fn run_step(&mut self, _input: &SensorSnapshot) -> anyhow::Result<VehicleControl> {
        self.log.push("agent:run_step");
        if self.fail_at == Some(self.steps) {
            bail!("agent crashed");
        }
        self.steps += 1;
        Ok(VehicleControl {
            throttle: self.throttle,
            ..Default::default()
        })
    }

    fn destroy(&mut self) {
        self.log.push("agent:destroy");
    }
}

/// Hands out [`ScriptedAgent`]s. `fail_at` and `refuse` apply to the n-th agent created.
pub struct ScriptedAgents {
    pub log: CallLog,
    pub throttle: f32,
    pub fail_at: HashMap<usize, u64>,
    pub refuse: Vec<usize>,
    created: RefCell<usize>,
}

impl ScriptedAgents {
    pub fn new(log: CallLog, throttle: f32) -> Self {
        Self {
            log,
            throttle,
            fail_at: HashMap::new(),
            refuse: vec![],
            created: RefCell::new(0),
        }
    }
}

impl AgentFactory<ScriptedAgent> for ScriptedAgents {
    fn new_agent(&self) -> anyhow::Result<ScriptedAgent> {
        let index = *self.created.borrow();
        *self.created.borrow_mut() += 1;
        if self.refuse.contains(&index) {
            bail!("no GPU left for agent #{index}");
        }
        Ok(ScriptedAgent {
            log: self.log.clone(),
            throttle: self.throttle,
            fail_at: self.fail_at.get(&index).copied(),
            steps: 0,
        })
    }
}

/// Samples the segments between consecutive waypoints every `spacing` meters.
pub struct LinearInterpolator {
    pub spacing: f64,
}

impl PathInterpolator for LinearInterpolator {
    fn interpolate(&mut self, waypoints: &[Pose]) -> anyhow::Result<InterpolatedRoute> {
        let mut dense_path = vec![];
        for pair in waypoints.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let n = (a.distance(&b) / self.spacing).ceil().max(1.0) as usize;
            for i in 0..n {
                let t = i as f64 / n as f64;
                let pose = Pose {
                    x: a.x + (b.x - a.x) * t,
                    y: a.y + (b.y - a.y) * t,
                    ..a
                };
                dense_path.push((pose, RoadOption::LaneFollow));
            }
        }
        if let Some(last) = waypoints.last() {
            dense_path.push((*last, RoadOption::LaneFollow));
        }
        let agent_plan = waypoints
            .iter()
            .map(|w| {
                (
                    GeoPoint {
                        lat: w.y,
                        lon: w.x,
                        alt: w.z,
                    },
                    RoadOption::LaneFollow,
                )
            })
            .collect();
        Ok(InterpolatedRoute {
            agent_plan,
            dense_path,
        })
    }
}

/// A scenario that spawns one actor per configured antagonist and logs its ticks.
pub struct LoggingScenario {
    name: String,
    log: CallLog,
    fail_at: Option<u64>,
    actors: Vec<Pose>,
    spawned: Vec<ActorHandle>,
    ticks: u64,
    events: Vec<TrafficEvent>,
}

impl Scenario for LoggingScenario {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<Status> {
        self.log.push(format!("tick:{}", self.name));
        if self.ticks == 0 {
            for pose in &self.actors {
                self.spawned.push(world.spawn_or_relocate("vehicle.*", pose, false)?);
            }
        }
        if self.fail_at == Some(self.ticks) {
            bail!("scenario {} lost track of its actors", self.name);
        }
        self.ticks += 1;
        Ok(Status::Running)
    }

    fn status(&self) -> Status {
        Status::Running
    }

    fn collect_events(&self) -> Vec<TrafficEvent> {
        self.events.clone()
    }

    fn teardown(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<()> {
        self.log.push(format!("teardown:{}", self.name));
        for actor in self.spawned.drain(..) {
            world.destroy(actor)?;
        }
        Ok(())
    }
}

/// Registry building [`LoggingScenario`]s for `tags`. A scenario whose name is in `fail` errors
/// on its second tick.
pub fn logging_registry(log: &CallLog, tags: &[&str], fail: &[&str]) -> ScenarioRegistry {
    let mut registry = ScenarioRegistry::default();
    for tag in tags {
        let log = log.clone();
        let fail = fail.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        registry.register(*tag, move |config: &ScenarioConfiguration| {
            Ok(Box::new(LoggingScenario {
                name: config.name.clone(),
                log: log.clone(),
                fail_at: fail.contains(&config.name).then_some(1),
                actors: config.other_actors.iter().map(|a| a.transform).collect(),
                spawned: vec![],
                ticks: 0,
                events: vec![],
            }) as Box<dyn Scenario>)
        });
    }
    registry
}

/// A straight route along +x in `town`.
pub fn straight_route(id: &str, town: &str, length: f64) -> RouteDescriptor {
    RouteDescriptor::new(
        id,
        town,
        vec![
            Waypoint::new(0.0, 0.0, 0.0, 0.0, 0.0),
            Waypoint::new(length / 2.0, 0.0, 0.0, 0.0, 0.0),
            Waypoint::new(length, 0.0, 0.0, 0.0, 0.0),
        ],
    )
    .expect("route has waypoints")
}
