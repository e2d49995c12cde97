use mock_world::{logging_registry, straight_route, CallLog, LinearInterpolator, MockWorld, ScriptedAgents};

use route_evaluator::{
    annotations::{parse_annotations, ScenarioDefinition},
    master_scenario::RouteMonitorSettings,
    prelude::*,
    report::RouteRecord,
    route::{RouteDescriptor, Waypoint},
    route_runner::{RouteRunner, RunnerState},
    scenario::TrafficEvent,
    waypoint_matcher::{scan_route_for_scenarios, MatchThresholds},
};

mod mock_world;

/// A control loss scenario triggered at the middle waypoint of the test routes.
const ANNOTATIONS: &str = r#"{
    "available_scenarios": [
        {
            "Town01": [
                {
                    "scenario_type": "ControlLoss",
                    "available_event_configurations": [
                        {
                            "transform": {"x": "25.0", "y": "0.0", "z": "0.0", "yaw": "0", "pitch": "0"},
                            "other_actors": {"front": [{"x": 35.0, "y": 3.5, "z": 0.0, "yaw": 0.0, "pitch": 0.0}]}
                        }
                    ]
                }
            ]
        }
    ]
}"#;

const ITERATION: [&str; 6] = [
    "tick:criteria",
    "tick:ControlLoss_0",
    "snapshot",
    "agent:run_step",
    "apply_control",
    "step",
];

fn definitions(route: &RouteDescriptor) -> Vec<ScenarioDefinition> {
    let annotations = parse_annotations(ANNOTATIONS).unwrap();
    scan_route_for_scenarios(
        route.town(),
        route.waypoints(),
        &annotations,
        &MatchThresholds::default(),
    )
}

struct Harness {
    log: CallLog,
    world: MockWorld,
    agents: ScriptedAgents,
    registry: ScenarioRegistry,
    config: Configuration,
}

impl Harness {
    fn new(throttle: f32) -> Self {
        let log = CallLog::default();
        Self {
            world: MockWorld::new(log.clone()),
            agents: ScriptedAgents::new(log.clone(), throttle),
            registry: logging_registry(&log, &["ControlLoss"], &[]),
            config: Configuration::new().with_verbose(false),
            log,
        }
    }

    fn run(&mut self, route: &RouteDescriptor) -> (RouteRecord, RunnerState) {
        let definitions = definitions(route);
        let agent = self.agents.new_agent().unwrap();
        let mut runner = RouteRunner::new(route, &definitions, &self.registry, &self.config, agent);
        assert_eq!(runner.state(), RunnerState::Init);
        let record = runner.run(&mut self.world, &mut LinearInterpolator { spacing: 1.0 });
        (record, runner.state())
    }
}

#[test]
fn every_step_follows_the_same_order() {
    let mut harness = Harness::new(1.0);
    let route = straight_route("0", "Town01", 50.0);

    let (record, state) = harness.run(&route);

    assert_eq!(state, RunnerState::Finished(Outcome::Success));
    assert_eq!(record.outcome, Outcome::Success);
    assert_eq!(record.route_score, 100.0);
    assert_eq!(record.final_score, 100.0);
    // the target is within 10 m once the ego has covered 41 m
    assert_eq!(record.steps, 42);

    let entries = harness.log.entries();
    assert_eq!(entries[..3], ["load:Town01", "spawn:ego", "agent:plan:3"]);

    let loop_entries = entries
        .iter()
        .filter(|e| ITERATION.contains(&e.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(loop_entries.len(), ITERATION.len() * 42);
    for (i, entry) in loop_entries.iter().enumerate() {
        assert_eq!(*entry, ITERATION[i % ITERATION.len()], "entry #{i}");
    }

    let tail = &entries[entries.len() - 5..];
    assert_eq!(
        tail,
        [
            "teardown:criteria",
            "teardown:ControlLoss_0",
            "destroy:actor",
            "destroy:ego",
            "agent:destroy"
        ]
    );
    assert_eq!(harness.world.live_actors(), 0);
}

#[test]
fn criteria_events_are_penalized() {
    let mut harness = Harness::new(1.0);
    harness.world.criteria.events = vec![
        (
            5,
            TrafficEvent::new(TrafficEventKind::CollisionVehicle).with_message("hit a parked car"),
        ),
        (9, TrafficEvent::new(TrafficEventKind::WrongWayInfraction)),
    ];

    let (record, _) = harness.run(&straight_route("0", "Town01", 50.0));

    assert_eq!(record.outcome, Outcome::Success);
    assert_eq!(record.penalty, 15.0);
    assert_eq!(record.final_score, 85.0);
    assert_eq!(
        record.diagnostic_messages.collisions,
        vec!["hit a parked car"]
    );
    assert_eq!(record.diagnostic_messages.wrong_way.len(), 1);
}

#[test]
fn failing_criteria_fail_the_route() {
    let mut harness = Harness::new(1.0);
    harness.world.criteria.fail_at = Some(3);

    let (record, _) = harness.run(&straight_route("0", "Town01", 50.0));

    assert_eq!(record.outcome, Outcome::Failure);
    assert_eq!(record.steps, 4);
    assert!(record.route_score < 100.0);
}

#[test]
fn slow_agent_times_out() {
    let mut harness = Harness::new(0.5);
    harness.config = Configuration::new()
        .with_verbose(false)
        .with_monitors(RouteMonitorSettings {
            fixed_delta_seconds: 1.0,
            initial_delay_seconds: 10.0,
            seconds_per_meter: 0.0,
            ..Default::default()
        });

    let (record, state) = harness.run(&straight_route("0", "Town01", 50.0));

    assert_eq!(state, RunnerState::Finished(Outcome::Timeout));
    assert_eq!(record.steps, 10);
    assert!(record.route_score > 0.0 && record.route_score < 100.0);
    assert_eq!(record.final_score, record.route_score);
    assert!(harness.log.contains("agent:destroy"));
}

#[test]
fn agent_fault_is_contained_and_torn_down() {
    let mut harness = Harness::new(1.0);
    harness.agents.fail_at.insert(0, 3);

    let (record, state) = harness.run(&straight_route("0", "Town01", 50.0));

    assert_eq!(state, RunnerState::Finished(Outcome::Failure));
    assert_eq!(record.steps, 3);
    assert_eq!(record.diagnostic_messages.faults.len(), 1);
    let fault = &record.diagnostic_messages.faults[0];
    assert!(fault.contains("agent control"), "{fault}");
    assert!(fault.contains("agent crashed"), "{fault}");

    assert!(harness.log.contains("teardown:ControlLoss_0"));
    assert!(harness.log.contains("destroy:ego"));
    assert_eq!(harness.log.count("agent:destroy"), 1);
    assert_eq!(harness.world.live_actors(), 0);
}

#[test]
fn scenario_fault_is_contained() {
    let mut harness = Harness::new(1.0);
    harness.registry = logging_registry(&harness.log, &["ControlLoss"], &["ControlLoss_0"]);

    let (record, _) = harness.run(&straight_route("0", "Town01", 50.0));

    assert_eq!(record.outcome, Outcome::Failure);
    assert_eq!(record.steps, 1);
    let fault = &record.diagnostic_messages.faults[0];
    assert!(fault.contains("scenario tick at step 1"), "{fault}");
    assert!(fault.contains("lost track"), "{fault}");
    assert_eq!(harness.world.live_actors(), 0);
}

#[test]
fn world_fault_is_contained() {
    let mut harness = Harness::new(1.0);
    harness.world.fail_step_at = Some(7);

    let (record, _) = harness.run(&straight_route("0", "Town01", 50.0));

    assert_eq!(record.outcome, Outcome::Failure);
    assert_eq!(record.steps, 7);
    assert!(record.diagnostic_messages.faults[0].contains("world step"));
    assert!(harness.log.contains("destroy:ego"));
}

#[test]
fn setup_fault_never_starts_the_loop() {
    let mut harness = Harness::new(1.0);
    harness.world.fail_load_town = Some("Town01".to_owned());

    let (record, _) = harness.run(&straight_route("0", "Town01", 50.0));

    assert_eq!(record.outcome, Outcome::Failure);
    assert_eq!(record.steps, 0);
    assert_eq!(record.route_score, 0.0);
    assert!(record.diagnostic_messages.faults[0].contains("Town01"));
    assert!(!harness.log.contains("spawn:ego"));
    assert!(!harness.log.contains("step"));
    assert!(harness.log.contains("agent:destroy"));
}

#[test]
fn loop_route_needs_to_be_driven() {
    let mut harness = Harness::new(0.0);
    harness.config = Configuration::new()
        .with_verbose(false)
        .with_monitors(RouteMonitorSettings {
            fixed_delta_seconds: 1.0,
            initial_delay_seconds: 20.0,
            seconds_per_meter: 0.0,
            ..Default::default()
        });
    let route = RouteDescriptor::new(
        "u-turn",
        "Town01",
        vec![
            Waypoint::new(0.0, 0.0, 0.0, 0.0, 0.0),
            Waypoint::new(50.0, 0.0, 0.0, 0.0, 0.0),
            Waypoint::new(50.0, 5.0, 0.0, 90.0, 0.0),
            Waypoint::new(0.0, 5.0, 0.0, 180.0, 0.0),
        ],
    )
    .unwrap();

    let (record, _) = harness.run(&route);

    assert_eq!(record.outcome, Outcome::Timeout);
    assert_eq!(record.steps, 20);
    assert!(record.route_score < 100.0);
}
