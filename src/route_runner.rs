//! Synchronous execution of one route.
//!
//! A run goes through `Init -> Running -> Finished(outcome)`:
//!
//! 1. load the town, interpolate the route and hand the simplified plan to the agent,
//! 2. spawn (or move) the ego vehicle at the first pose of the dense path,
//! 3. build the master scenario and the matched scenarios, master first,
//! 4. loop until the master scenario stops running. Each iteration ticks every scenario once
//!    (master first), asks the agent for a control and applies it, then steps the world once,
//! 5. collect every event, score them, tear every scenario down and destroy the ego vehicle
//!    and the agent.
//!
//! Any error raised on the way is contained to the route: the run is scored as a failure
//! with the fault in its diagnostics, and teardown still happens.

use anyhow::anyhow;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    annotations::ScenarioDefinition,
    configuration::Configuration,
    error::{FaultStage, RouteFault},
    master_scenario::MasterScenario,
    report::RouteRecord,
    route::RouteDescriptor,
    scenario::{Scenario, ScenarioInstance, TrafficEvent},
    scenario_builder::{build_master, ScenarioRegistry},
    score::{score, Outcome},
    simulation_interface::{ActorHandle, EgoAgent, PathInterpolator, SensorSpec, Simulation},
};

/// Where a route run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Init,
    Running,
    Finished(Outcome),
}

/// Runs a single route. Owns the agent, the ego vehicle and every scenario instance of the
/// run; all of them are released before [`RouteRunner::run`] returns.
pub struct RouteRunner<'r, A: EgoAgent> {
    route: &'r RouteDescriptor,
    definitions: &'r [ScenarioDefinition],
    registry: &'r ScenarioRegistry,
    config: &'r Configuration,
    agent: A,
    state: RunnerState,
    ego: Option<ActorHandle>,
    master: Option<MasterScenario>,
    scenarios: Vec<ScenarioInstance>,
    steps: u64,
    faults: Vec<RouteFault>,
}

impl<'r, A: EgoAgent> RouteRunner<'r, A> {
    pub fn new(
        route: &'r RouteDescriptor,
        definitions: &'r [ScenarioDefinition],
        registry: &'r ScenarioRegistry,
        config: &'r Configuration,
        agent: A,
    ) -> Self {
        Self {
            route,
            definitions,
            registry,
            config,
            agent,
            state: RunnerState::Init,
            ego: None,
            master: None,
            scenarios: vec![],
            steps: 0,
            faults: vec![],
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Drive the route to its end and score it.
    #[instrument(skip_all, fields(route = %self.route.id(), town = %self.route.town()))]
    pub fn run<S, I>(&mut self, simulation: &mut S, interpolator: &mut I) -> RouteRecord
    where
        S: Simulation,
        I: PathInterpolator + ?Sized,
    {
        let result = self
            .setup(simulation, interpolator)
            .and_then(|(ego, sensors)| self.run_loop(simulation, ego, &sensors));
        if let Err(fault) = result {
            error!("{fault}");
            self.faults.push(fault);
        }

        let events = self.collect_events();
        let verdict = self
            .master
            .as_ref()
            .map(MasterScenario::verdict)
            .unwrap_or_default();
        debug!(events = events.len(), ?verdict, "route finished");

        self.teardown(simulation);

        let mut result = score(&events, verdict);
        for fault in &self.faults {
            result.record_fault(fault);
        }
        for warning in &result.warnings {
            warn!("scoring: {warning}");
        }

        self.state = RunnerState::Finished(result.outcome);
        let record = RouteRecord::new(self.route.id(), self.route.town(), result, self.steps);
        info!("{record}");
        record
    }

    fn setup<S, I>(
        &mut self,
        simulation: &mut S,
        interpolator: &mut I,
    ) -> Result<(ActorHandle, Vec<SensorSpec>), RouteFault>
    where
        S: Simulation,
        I: PathInterpolator + ?Sized,
    {
        let fault = |e: anyhow::Error| RouteFault::new(FaultStage::Setup, 0, e);
        let town = self.route.town();

        simulation
            .load_town(town)
            .map_err(|e| fault(e.context(format!("could not load town '{town}'"))))?;

        let interpolated = interpolator
            .interpolate(self.route.waypoints())
            .map_err(|e| fault(e.context("route interpolation failed")))?;
        let Some((start, _)) = interpolated.dense_path.first() else {
            return Err(fault(anyhow!("interpolated route is empty")));
        };
        debug!(
            dense_points = interpolated.dense_path.len(),
            plan_points = interpolated.agent_plan.len(),
            "route interpolated"
        );

        let ego = simulation
            .spawn_or_relocate(&self.config.ego_model, start, true)
            .map_err(|e| fault(e.context("could not position the ego vehicle")))?;
        self.ego = Some(ego);

        self.master = Some(
            build_master(
                simulation,
                ego,
                &interpolated.dense_path,
                town,
                self.config.monitors,
            )
            .map_err(fault)?,
        );
        self.scenarios = self
            .registry
            .build(self.definitions, town, ego)
            .map_err(fault)?;
        info!(scenarios = self.scenarios.len() + 1, "scenarios ready");

        self.agent.set_global_plan(&interpolated.agent_plan);
        Ok((ego, self.agent.sensors()))
    }

    fn run_loop<S: Simulation>(
        &mut self,
        simulation: &mut S,
        ego: ActorHandle,
        sensors: &[SensorSpec],
    ) -> Result<(), RouteFault> {
        let Some(master) = self.master.as_mut() else {
            return Err(RouteFault::new(
                FaultStage::Setup,
                0,
                anyhow!("master scenario was not built"),
            ));
        };
        self.state = RunnerState::Running;

        loop {
            let step = self.steps;

            // scenarios observe the world as it was left by the previous step
            if let Err(e) = master.tick(simulation) {
                return Err(tick_fault(step, master.name(), e));
            }
            for scenario in self.scenarios.iter_mut() {
                if let Err(e) = scenario.tick(simulation) {
                    return Err(tick_fault(step, scenario.name(), e));
                }
            }

            let control = simulation
                .sensor_snapshot(ego, sensors)
                .and_then(|snapshot| self.agent.run_step(&snapshot))
                .and_then(|control| {
                    simulation.apply_control(ego, &control)?;
                    Ok(control)
                })
                .map_err(|e| RouteFault::new(FaultStage::AgentControl, step, e))?;

            simulation
                .step()
                .map_err(|e| RouteFault::new(FaultStage::WorldStep, step, e))?;
            self.steps += 1;

            if !master.status().is_running() {
                debug!(steps = self.steps, status = ?master.status(), ?control, "master scenario finished");
                return Ok(());
            }
        }
    }

    /// Events of every scenario, master first, each in its own discovery order.
    fn collect_events(&self) -> Vec<TrafficEvent> {
        let mut events = self
            .master
            .as_ref()
            .map(|master| master.collect_events())
            .unwrap_or_default();
        for scenario in &self.scenarios {
            events.extend(scenario.collect_events());
        }
        events
    }

    fn teardown<S: Simulation>(&mut self, simulation: &mut S) {
        let step = self.steps;
        let teardown_fault = |e: anyhow::Error| {
            error!("teardown: {e:#}");
            RouteFault::new(FaultStage::Teardown, step, e)
        };

        if let Some(mut master) = self.master.take() {
            if let Err(e) = master.teardown(simulation) {
                self.faults.push(teardown_fault(e));
            }
        }
        for mut scenario in self.scenarios.drain(..) {
            if let Err(e) = scenario.teardown(simulation) {
                let e = e.context(format!("scenario '{}'", scenario.name()));
                self.faults.push(teardown_fault(e));
            }
        }
        if let Some(ego) = self.ego.take() {
            if let Err(e) = simulation.destroy(ego) {
                self.faults
                    .push(teardown_fault(e.context("could not destroy the ego vehicle")));
            }
        }
        self.agent.destroy();
    }
}

fn tick_fault(step: u64, scenario: &str, e: anyhow::Error) -> RouteFault {
    RouteFault::new(
        FaultStage::ScenarioTick,
        step,
        e.context(format!("scenario '{scenario}'")),
    )
}
