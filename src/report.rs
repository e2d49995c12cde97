//! Per-route records and the end-of-batch report.

use std::{fmt::Display, path::Path};

use serde::Serialize;

use crate::{
    error::{EvaluationError, ScoringWarning},
    score::{Diagnostics, Outcome, ScoreResult},
};

/// Result of one route run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRecord {
    pub route_id: String,
    pub town: String,
    pub outcome: Outcome,
    pub route_score: f64,
    pub penalty: f64,
    pub final_score: f64,
    pub diagnostic_messages: Diagnostics,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScoringWarning>,
    /// Number of world steps the route ran for.
    pub steps: u64,
}

impl RouteRecord {
    pub fn new(route_id: &str, town: &str, result: ScoreResult, steps: u64) -> Self {
        Self {
            route_id: route_id.to_owned(),
            town: town.to_owned(),
            outcome: result.outcome,
            route_score: result.route_score,
            penalty: result.penalty,
            final_score: result.final_score,
            diagnostic_messages: result.diagnostics,
            warnings: result.warnings,
            steps,
        }
    }
}

impl Display for RouteRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "route {} ({}): {} score {:.2} (route {:.2} - penalty {:.2})",
            self.route_id, self.town, self.outcome, self.final_score, self.route_score, self.penalty
        )
    }
}

/// Every route record of a batch, in route file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub records: Vec<RouteRecord>,
    /// Mean final score over all routes, 0 for an empty batch.
    pub global_score: f64,
}

impl BatchReport {
    pub fn new(records: Vec<RouteRecord>) -> Self {
        let global_score = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.final_score).sum::<f64>() / records.len() as f64
        };
        Self {
            records,
            global_score,
        }
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), EvaluationError> {
        let json = self.to_json().map_err(|e| EvaluationError::Report {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        std::fs::write(path, json).map_err(|source| EvaluationError::Report {
            path: path.to_path_buf(),
            source,
        })
    }
}
