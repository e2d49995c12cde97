//! Batch evaluation of routes.
//!
//! This module defines the [`Evaluator`] type, which drives an agent through every route of a
//! route file, one after the other. Its responsibilities include:
//!
//! - Loading the route file and the scenario annotations
//! - Planning every route up front: matching annotated triggers against the route waypoints
//!   and resolving each scenario tag in the [`ScenarioRegistry`]
//! - Running each route through a [`RouteRunner`] with a fresh agent
//! - Collecting the per-route records into a [`BatchReport`]
//!
//! # Failure model
//!
//! Planning happens before the simulation is touched: a malformed file or an unresolvable tag
//! on any route aborts the batch with a [`ConfigurationError`]. Once routes are running,
//! failures are contained to their route. A route whose agent, scenario or simulation raises
//! an error is recorded as `FAILURE` with the error in its diagnostics, and the batch carries
//! on with the next route.
//!
//! # Example
//!
//! See crate-level documentation for an example on how to use the `Evaluator`.

use std::path::Path;

use tracing::{info, instrument, trace, warn};

use crate::{
    annotations::{parse_annotations_file, ScenarioAnnotations, ScenarioDefinition},
    configuration::Configuration,
    error::{ConfigurationError, EvaluationError, FaultStage, RouteFault},
    logger::init_logger,
    report::{BatchReport, RouteRecord},
    route::{parse_routes_file, RouteDescriptor},
    route_runner::RouteRunner,
    scenario_builder::ScenarioRegistry,
    score::{score, Outcome},
    simulation_interface::{AgentFactory, EgoAgent, PathInterpolator, Simulation},
    waypoint_matcher::scan_route_for_scenarios,
};

/// The main type for evaluating an agent on a set of routes.
///
/// # Type Parameters
/// - `I`: The [`PathInterpolator`] turning sparse route waypoints into dense paths
pub struct Evaluator<I: PathInterpolator> {
    config: Configuration,
    registry: ScenarioRegistry,
    interpolator: I,
}

impl<I: PathInterpolator> Evaluator<I> {
    /// Create an [`Evaluator`] with the scenarios it may instantiate.
    ///
    /// The registry keeps its ambiguity policy unless `config` sets one.
    #[instrument(skip_all)]
    pub fn new(config: Configuration, mut registry: ScenarioRegistry, interpolator: I) -> Self {
        if config.log {
            if let Err(e) = init_logger() {
                eprintln!("file logging disabled: {e:#}");
            }
        }

        if let Some(policy) = config.ambiguity_policy {
            registry.set_policy(policy);
        }
        trace!(?config, tags = ?registry.tags().collect::<Vec<_>>());

        Evaluator {
            config,
            registry,
            interpolator,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    /// Load `routes_path` and `annotations_path`, then [`evaluate`](Self::evaluate) them.
    ///
    /// # Errors
    /// Returns an error if either file cannot be read or parsed, or for any error of
    /// [`evaluate`](Self::evaluate).
    pub fn evaluate_files<S, A, F>(
        &mut self,
        simulation: &mut S,
        agents: &F,
        routes_path: impl AsRef<Path>,
        annotations_path: impl AsRef<Path>,
    ) -> Result<BatchReport, EvaluationError>
    where
        S: Simulation,
        A: EgoAgent,
        F: AgentFactory<A>,
    {
        let routes = parse_routes_file(routes_path.as_ref())?;
        let annotations = parse_annotations_file(annotations_path.as_ref())?;
        self.evaluate(simulation, agents, &routes, &annotations)
    }

    /// Run every route, in order, and return one record per route.
    ///
    /// A new agent is requested from `agents` for each route.
    ///
    /// # Errors
    /// Returns an error if a route matches a scenario type the registry cannot resolve (the
    /// simulation is then left untouched), or if the report cannot be written to the
    /// configured output path.
    #[instrument(skip_all, fields(routes = routes.len()))]
    pub fn evaluate<S, A, F>(
        &mut self,
        simulation: &mut S,
        agents: &F,
        routes: &[RouteDescriptor],
        annotations: &ScenarioAnnotations,
    ) -> Result<BatchReport, EvaluationError>
    where
        S: Simulation,
        A: EgoAgent,
        F: AgentFactory<A>,
    {
        // 1. match and validate every route before touching the simulation
        let plans = self.plan(routes, annotations)?;

        if self.config.verbose {
            disable_line_wrap();
        }

        // 2. run routes one at a time
        let mut records = Vec::with_capacity(routes.len());
        for (route, definitions) in routes.iter().zip(&plans) {
            if self.config.verbose {
                print_running_route(route, definitions.len());
            }

            let record = match agents.new_agent() {
                Ok(agent) => {
                    let mut runner =
                        RouteRunner::new(route, definitions, &self.registry, &self.config, agent);
                    runner.run(simulation, &mut self.interpolator)
                }
                Err(e) => agent_creation_failure(route, e),
            };

            if self.config.verbose {
                print_route_record(&record);
            }
            records.push(record);
        }

        if self.config.verbose {
            enable_line_wrap();
        }

        // 3. aggregate
        let report = BatchReport::new(records);
        info!(
            global_score = report.global_score,
            success = report.count(Outcome::Success),
            failure = report.count(Outcome::Failure),
            timeout = report.count(Outcome::Timeout),
            "batch finished"
        );

        if let Some(path) = &self.config.output_path {
            report.write_json(path)?;
            info!(path = %path.display(), "report written");
        }
        Ok(report)
    }

    fn plan(
        &self,
        routes: &[RouteDescriptor],
        annotations: &ScenarioAnnotations,
    ) -> Result<Vec<Vec<ScenarioDefinition>>, ConfigurationError> {
        routes
            .iter()
            .map(|route| {
                let definitions = scan_route_for_scenarios(
                    route.town(),
                    route.waypoints(),
                    annotations,
                    &self.config.match_thresholds,
                );
                self.registry.validate(&definitions).inspect_err(|e| {
                    warn!(route = route.id(), "planning failed: {e}");
                })?;
                info!(
                    route = route.id(),
                    scenarios = definitions.len(),
                    "route planned"
                );
                Ok(definitions)
            })
            .collect()
    }
}

fn agent_creation_failure(route: &RouteDescriptor, e: anyhow::Error) -> RouteRecord {
    let fault = RouteFault::new(FaultStage::Setup, 0, e.context("could not create the agent"));
    warn!(route = route.id(), "{fault}");
    let mut result = score(&[], Default::default());
    result.record_fault(&fault);
    RouteRecord::new(route.id(), route.town(), result, 0)
}

fn print_route_record(record: &RouteRecord) {
    let colour = match record.outcome {
        Outcome::Success => 32,
        Outcome::Timeout => 33,
        Outcome::Failure => 31,
    };
    let diagnostics = record
        .diagnostic_messages
        .messages()
        .collect::<Vec<_>>()
        .join("; ");

    // clear line, coloured outcome, scores, red diagnostics, start of line
    println!(
        "\x1b[2K\x1b[{colour}m{} {}: \x1b[39m{:.2} (route {:.2}, penalty {:.2}) \x1b[31m{diagnostics}\x1b[39m\x1b[0G",
        record.outcome, record.route_id, record.final_score, record.route_score, record.penalty
    );
}

fn print_running_route(route: &RouteDescriptor, scenarios: usize) {
    // clear, green, default, start of line
    print!(
        "\x1b[2K\x1b[32mRunning...:\x1b[39m route {} in {} ({scenarios} scenarios)\x1b[0G",
        route.id(),
        route.town()
    );
    let _ = std::io::Write::flush(&mut std::io::stdout());
}

fn disable_line_wrap() {
    print!("\x1b[?7l");
}

fn enable_line_wrap() {
    print!("\x1b[?7h");
}
