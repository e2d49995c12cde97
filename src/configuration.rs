//! Config for the evaluator behaviors
//!
//! This module provides configuration options for controlling the behavior of the evaluator.
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! The following environment variables can be used to override configuration values. All
//! values are optional. Flags are case-insensitive, set the value to `"true"` to enable one.
//!
//! - `EVAL_VERBOSE`: print one line per finished route (default: `true`)
//! - `EVAL_LOG`: enable logging to a file (default: `false`)
//! - `EVAL_REJECT_AMBIGUOUS`: fail on scenario tags registered more than once (default: unset,
//!   the registry keeps its own policy)
//! - `EVAL_EGO_MODEL`: blueprint of the ego vehicle (default: `vehicle.lincoln.mkz2017`)
//! - `EVAL_OUTPUT`: path of the JSON report written at the end of a batch (default: unset)
//! - `EVAL_FIXED_DELTA_SECONDS`: simulated seconds per world step (default: `0.05`)
//! - `EVAL_INITIAL_DELAY_SECONDS`: constant part of the route timeout (default: `8`)
//! - `EVAL_SECONDS_PER_METER`: per-meter part of the route timeout (default: `0.4`)
//! - `EVAL_MAX_ROUTE_DEVIATION`: distance to the route that counts as deviation (default: `30`)
//! - `EVAL_WAYPOINT_REACHED_DISTANCE`: distance at which the target counts as reached (default: `10`)
//!
//! Numeric values that cannot be parsed are ignored with a warning.

use std::{path::PathBuf, str::FromStr};

use tracing::warn;

use crate::{
    master_scenario::RouteMonitorSettings, scenario_builder::AmbiguityPolicy,
    waypoint_matcher::MatchThresholds,
};

/// Blueprint used for the ego vehicle when none is configured.
pub const DEFAULT_EGO_MODEL: &str = "vehicle.lincoln.mkz2017";

/// Configuration for evaluator behaviors.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    /// Overrides the registry's own policy when set.
    pub(crate) ambiguity_policy: Option<AmbiguityPolicy>,
    pub(crate) ego_model: String,
    pub(crate) monitors: RouteMonitorSettings,
    pub(crate) match_thresholds: MatchThresholds,
    pub(crate) output_path: Option<PathBuf>,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The evaluator prints one line per finished route to stdout.
    /// - Logging to file is disabled.
    /// - The scenario registry keeps its own ambiguity policy.
    /// - The ego vehicle is a `vehicle.lincoln.mkz2017`.
    /// - Trigger points match route waypoints within 1 m and 1 degree.
    /// - No report file is written.
    pub fn new() -> Self {
        Self {
            verbose: true,
            log: false,
            ambiguity_policy: None,
            ego_model: DEFAULT_EGO_MODEL.to_owned(),
            monitors: RouteMonitorSettings::default(),
            match_thresholds: MatchThresholds::default(),
            output_path: None,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// See the module documentation for the recognized variables. Any variable left unset
    /// keeps the value of [`Configuration::new()`].
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_value<T: FromStr>(var: &str, default: T) -> T {
            match std::env::var(var) {
                Ok(val) => val.trim().parse().unwrap_or_else(|_| {
                    warn!("ignoring {var}={val:?}: not a valid value");
                    default
                }),
                Err(_) => default,
            }
        }

        let defaults = Self::new();
        let monitors = defaults.monitors;
        let ambiguity_policy = match std::env::var("EVAL_REJECT_AMBIGUOUS") {
            Ok(val) if val.eq_ignore_ascii_case("true") => Some(AmbiguityPolicy::Reject),
            Ok(_) => Some(AmbiguityPolicy::FirstRegistered),
            Err(_) => None,
        };

        Self {
            verbose: get_env_flag("EVAL_VERBOSE", defaults.verbose),
            log: get_env_flag("EVAL_LOG", defaults.log),
            ambiguity_policy,
            ego_model: std::env::var("EVAL_EGO_MODEL").unwrap_or(defaults.ego_model),
            monitors: RouteMonitorSettings {
                fixed_delta_seconds: get_env_value(
                    "EVAL_FIXED_DELTA_SECONDS",
                    monitors.fixed_delta_seconds,
                ),
                initial_delay_seconds: get_env_value(
                    "EVAL_INITIAL_DELAY_SECONDS",
                    monitors.initial_delay_seconds,
                ),
                seconds_per_meter: get_env_value(
                    "EVAL_SECONDS_PER_METER",
                    monitors.seconds_per_meter,
                ),
                max_route_deviation: get_env_value(
                    "EVAL_MAX_ROUTE_DEVIATION",
                    monitors.max_route_deviation,
                ),
                waypoint_reached_distance: get_env_value(
                    "EVAL_WAYPOINT_REACHED_DISTANCE",
                    monitors.waypoint_reached_distance,
                ),
                ..monitors
            },
            match_thresholds: defaults.match_thresholds,
            output_path: std::env::var_os("EVAL_OUTPUT").map(PathBuf::from),
        }
    }

    /// Enable or disable the per-route summary lines.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Choose how a scenario tag registered more than once is resolved, in place of the
    /// registry's own policy.
    pub fn with_ambiguity_policy(mut self, policy: AmbiguityPolicy) -> Self {
        self.ambiguity_policy = Some(policy);
        self
    }

    /// Blueprint spawned as the ego vehicle.
    pub fn with_ego_model(mut self, model: impl Into<String>) -> Self {
        self.ego_model = model.into();
        self
    }

    /// Replace the master scenario monitor settings (timeout, deviation, target distance).
    pub fn with_monitors(mut self, monitors: RouteMonitorSettings) -> Self {
        self.monitors = monitors;
        self
    }

    pub fn with_match_thresholds(mut self, thresholds: MatchThresholds) -> Self {
        self.match_thresholds = thresholds;
        self
    }

    /// Write the batch report as JSON to `path` once every route has run.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn ambiguity_policy(&self) -> Option<AmbiguityPolicy> {
        self.ambiguity_policy
    }

    pub fn monitors(&self) -> &RouteMonitorSettings {
        &self.monitors
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
