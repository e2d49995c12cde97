//! The master scenario: the one monitor every route run has, tracking completion, deviation,
//! the external test criteria and the route timeout.

use tracing::{debug, info, warn};

use crate::{
    route::{path_length, Pose, Waypoint},
    scenario::{Scenario, Status, TrafficEvent, TrafficEventKind},
    simulation_interface::{ActorHandle, ActorPool, RoadOption},
};

/// Tunables of the route monitors owned by the master scenario.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteMonitorSettings {
    /// Distance under which a dense path point (or the target) counts as reached.
    pub waypoint_reached_distance: f64,
    /// How many points ahead of the current one the completion monitor looks at.
    pub completion_window: usize,
    /// Distance from the route beyond which the ego is considered off route.
    pub max_route_deviation: f64,
    /// How many points ahead of the current one the deviation monitor looks at.
    pub deviation_window: usize,
    /// Time granted per meter of route.
    pub seconds_per_meter: f64,
    /// Time granted regardless of the route length.
    pub initial_delay_seconds: f64,
    /// Simulated duration of one world step.
    pub fixed_delta_seconds: f64,
}

impl Default for RouteMonitorSettings {
    fn default() -> Self {
        Self {
            waypoint_reached_distance: 10.0,
            completion_window: 2,
            max_route_deviation: 30.0,
            deviation_window: 5,
            seconds_per_meter: 0.4,
            initial_delay_seconds: 8.0,
            fixed_delta_seconds: 0.05,
        }
    }
}

impl RouteMonitorSettings {
    /// Number of world steps granted to drive `route_length`.
    pub fn timeout_steps(&self, route_length: f64) -> u64 {
        let seconds = self.initial_delay_seconds + self.seconds_per_meter * route_length;
        (seconds / self.fixed_delta_seconds).ceil().max(1.0) as u64
    }
}

/// Everything the master scenario (and the external criteria) is configured with.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterConfiguration {
    pub town: String,
    /// Last pose of the dense path.
    pub target: Waypoint,
    /// Full dense path.
    pub route: Vec<(Pose, RoadOption)>,
    pub timeout_steps: u64,
    pub settings: RouteMonitorSettings,
}

impl MasterConfiguration {
    /// `None` when the dense path is empty.
    pub fn new(
        town: impl Into<String>,
        route: Vec<(Pose, RoadOption)>,
        settings: RouteMonitorSettings,
    ) -> Option<Self> {
        let target = route.last()?.0;
        let timeout_steps = settings.timeout_steps(path_length(route.iter().map(|(p, _)| p)));
        Some(Self {
            town: town.into(),
            target,
            route,
            timeout_steps,
            settings,
        })
    }
}

/// How the master scenario ended, as seen by the score aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MasterVerdict {
    /// A test criterion (external criteria or route deviation) failed.
    pub criteria_failed: bool,
    /// The timeout monitor fired.
    pub timed_out: bool,
}

pub struct MasterScenario {
    name: String,
    config: MasterConfiguration,
    ego: ActorHandle,
    criteria: Box<dyn Scenario>,
    criteria_events_seen: usize,
    current_index: usize,
    elapsed_steps: u64,
    completed: bool,
    deviated: bool,
    verdict: MasterVerdict,
    status: Status,
    events: Vec<TrafficEvent>,
}

impl MasterScenario {
    pub fn new(config: MasterConfiguration, ego: ActorHandle, criteria: Box<dyn Scenario>) -> Self {
        Self {
            name: format!("MasterScenario_{}", config.town),
            config,
            ego,
            criteria,
            criteria_events_seen: 0,
            current_index: 0,
            elapsed_steps: 0,
            completed: false,
            deviated: false,
            verdict: MasterVerdict::default(),
            status: Status::Running,
            events: vec![],
        }
    }

    pub fn configuration(&self) -> &MasterConfiguration {
        &self.config
    }

    pub fn verdict(&self) -> MasterVerdict {
        self.verdict
    }

    pub fn elapsed_steps(&self) -> u64 {
        self.elapsed_steps
    }

    /// Append the criteria events emitted by the last tick, keeping discovery order.
    fn pull_criteria_events(&mut self) {
        let events = self.criteria.collect_events();
        let total = events.len();
        self.events
            .extend(events.into_iter().skip(self.criteria_events_seen));
        self.criteria_events_seen = total;
    }

    fn update_completion(&mut self, ego: &Pose) {
        let route = &self.config.route;
        let settings = &self.config.settings;
        let end = (self.current_index + settings.completion_window + 1).min(route.len());

        let mut reached = self.current_index;
        for index in self.current_index..end {
            if route[index].0.distance(ego) < settings.waypoint_reached_distance {
                reached = index;
            }
        }
        if reached > self.current_index {
            self.current_index = reached;
            let percentage = 100.0 * reached as f64 / route.len() as f64;
            debug!(index = reached, percentage, "route progress");
            self.events
                .push(TrafficEvent::completion_percentage(percentage));
        }

        // the target only counts once the whole path has been followed up to it
        let at_last_point = self.current_index + 1 >= route.len();
        if at_last_point && self.config.target.distance(ego) < settings.waypoint_reached_distance {
            info!("route completed after {} steps", self.elapsed_steps);
            self.completed = true;
            self.events.push(
                TrafficEvent::new(TrafficEventKind::RouteCompleted)
                    .with_message(format!("route completed in {} steps", self.elapsed_steps)),
            );
        }
    }

    fn update_deviation(&mut self, ego: &Pose) {
        let route = &self.config.route;
        let settings = &self.config.settings;
        let end = (self.current_index + settings.deviation_window + 1).min(route.len());

        let closest = route[self.current_index..end]
            .iter()
            .map(|(p, _)| p.distance(ego))
            .fold(f64::INFINITY, f64::min);

        if closest > settings.max_route_deviation {
            warn!(closest, "ego deviated from the route");
            self.deviated = true;
            self.events.push(
                TrafficEvent::new(TrafficEventKind::RouteDeviation).with_message(format!(
                    "agent deviated from the route at (x={:.1}, y={:.1}, z={:.1})",
                    ego.x, ego.y, ego.z
                )),
            );
        }
    }
}

impl Scenario for MasterScenario {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<Status> {
        if !self.status.is_running() {
            return Ok(self.status);
        }

        let criteria_status = self.criteria.tick(world)?;
        self.pull_criteria_events();
        if criteria_status == Status::Failure {
            self.verdict.criteria_failed = true;
        }

        let ego = world.actor_pose(self.ego)?;
        self.update_completion(&ego);
        if !self.completed {
            self.update_deviation(&ego);
        }
        if self.deviated {
            self.verdict.criteria_failed = true;
        }

        self.elapsed_steps += 1;

        self.status = if self.verdict.criteria_failed {
            Status::Failure
        } else if self.completed {
            Status::Success
        } else if self.elapsed_steps >= self.config.timeout_steps {
            warn!(
                "route timed out after {} steps ({:.0}% completed)",
                self.elapsed_steps,
                100.0 * self.current_index as f64 / self.config.route.len() as f64
            );
            self.verdict.timed_out = true;
            Status::Failure
        } else {
            Status::Running
        };
        Ok(self.status)
    }

    fn status(&self) -> Status {
        self.status
    }

    fn collect_events(&self) -> Vec<TrafficEvent> {
        self.events.clone()
    }

    fn teardown(&mut self, world: &mut dyn ActorPool) -> anyhow::Result<()> {
        self.criteria.teardown(world)
    }
}
