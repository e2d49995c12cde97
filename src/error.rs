//! Error types of the evaluator.
//!
//! Three families coexist, matching how far each one is allowed to travel:
//!
//! - [`ConfigurationError`]: bad input files or an unresolvable scenario tag. Raised before any
//!   simulation resource is touched and returned to the caller of the batch.
//! - [`RouteFault`]: anything going wrong while a route is running (scenario tick, agent,
//!   simulation step). Contained to its route, which is then scored as a failure.
//! - [`ScoringWarning`]: events the aggregator could not make sense of. Never fatal, attached
//!   to the [`ScoreResult`](crate::score::ScoreResult).

use std::path::PathBuf;

use thiserror::Error;

/// Malformed input or an unresolvable scenario definition.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("route file is not valid XML: {0}")]
    RouteXml(#[from] roxmltree::Error),

    #[error("malformed route '{route_id}': {message}")]
    MalformedRoute { route_id: String, message: String },

    #[error("malformed scenario annotations: {0}")]
    MalformedAnnotations(String),

    #[error("unknown scenario type '{0}'")]
    UnknownScenario(String),

    #[error("scenario type '{tag}' resolves to {candidates} registered implementations")]
    AmbiguousScenario { tag: String, candidates: usize },
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(e: serde_json::Error) -> Self {
        ConfigurationError::MalformedAnnotations(e.to_string())
    }
}

/// Error returned by a whole batch evaluation.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("could not write report to '{path}': {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where in the route protocol a runtime fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    Setup,
    ScenarioTick,
    AgentControl,
    WorldStep,
    Teardown,
}

impl std::fmt::Display for FaultStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FaultStage::Setup => "setup",
            FaultStage::ScenarioTick => "scenario tick",
            FaultStage::AgentControl => "agent control",
            FaultStage::WorldStep => "world step",
            FaultStage::Teardown => "teardown",
        };
        write!(f, "{s}")
    }
}

/// A runtime error contained to a single route.
#[derive(Debug, Error)]
#[error("fault during {stage} at step {step}: {source:#}")]
pub struct RouteFault {
    pub stage: FaultStage,
    pub step: u64,
    #[source]
    pub source: anyhow::Error,
}

impl RouteFault {
    pub fn new(stage: FaultStage, step: u64, source: anyhow::Error) -> Self {
        Self {
            stage,
            step,
            source,
        }
    }
}

/// Something the score aggregator could not interpret. Reported next to the result.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize)]
pub enum ScoringWarning {
    #[error("event #{index} has unrecognized kind '{kind}'")]
    UnrecognizedEvent { index: usize, kind: String },

    #[error("event #{index} ({kind}) has a malformed payload: {reason}")]
    MalformedPayload {
        index: usize,
        kind: String,
        reason: String,
    },
}
