//! Scenario annotations: where, per town, a scripted scenario may be triggered.
//!
//! The annotation file is JSON:
//!
//! ```json
//! {
//!   "available_scenarios": [
//!     {
//!       "Town03": [
//!         {
//!           "scenario_type": "Scenario1",
//!           "available_event_configurations": [
//!             {
//!               "transform": {"x": "1.0", "y": "2.0", "z": "0.0", "yaw": "90", "pitch": "0"},
//!               "other_actors": {"front": [{"x": 5.0, "y": 2.0, "z": 0.0, "yaw": 90.0, "pitch": 0.0}]}
//!             }
//!           ]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Coordinates may be JSON numbers or numeric strings. Older files name the root key
//! `current_maps` instead of `available_scenarios`; both are read the same way.

use std::{fmt, path::Path};

use serde::{Deserialize, Deserializer, Serialize};
use tracing::instrument;

use crate::{error::ConfigurationError, route::Waypoint};

/// All annotated scenarios, grouped by town, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioAnnotations {
    towns: Vec<(String, Vec<AnnotatedScenario>)>,
}

impl ScenarioAnnotations {
    pub fn new(towns: Vec<(String, Vec<AnnotatedScenario>)>) -> Self {
        Self { towns }
    }

    pub fn towns(&self) -> impl Iterator<Item = (&str, &[AnnotatedScenario])> {
        self.towns.iter().map(|(t, s)| (t.as_str(), s.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.towns.iter().all(|(_, s)| s.is_empty())
    }
}

/// One scenario type and every place it may be triggered.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnnotatedScenario {
    pub scenario_type: String,
    #[serde(rename = "available_event_configurations", default)]
    pub events: Vec<TriggerEvent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "transform", deserialize_with = "deserialize_pose")]
    pub trigger: Waypoint,
    #[serde(default)]
    pub other_actors: Option<OtherActors>,
}

/// Antagonist poses grouped by their position relative to the ego vehicle.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct OtherActors {
    #[serde(default, deserialize_with = "deserialize_poses")]
    pub front: Vec<Waypoint>,
    #[serde(default, deserialize_with = "deserialize_poses")]
    pub left: Vec<Waypoint>,
    #[serde(default, deserialize_with = "deserialize_poses")]
    pub right: Vec<Waypoint>,
}

/// A trigger event that matched a route, ready to be instantiated.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioDefinition {
    /// `"<scenario_type>_<n>"`, n being the discovery index on the route.
    pub name: String,
    pub scenario_type: String,
    pub trigger: Waypoint,
    pub other_actors: Option<OtherActors>,
}

#[derive(Deserialize)]
struct AnnotationFile {
    #[serde(alias = "current_maps")]
    available_scenarios: Vec<TownGroup>,
}

/// One `{"Town": [...], ...}` object, towns kept in the order they are written.
struct TownGroup(Vec<(String, Vec<AnnotatedScenario>)>);

impl<'de> Deserialize<'de> for TownGroup {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct GroupVisitor;

        impl<'de> serde::de::Visitor<'de> for GroupVisitor {
            type Value = TownGroup;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping town names to annotated scenarios")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> Result<TownGroup, A::Error> {
                let mut towns = vec![];
                while let Some(entry) = map.next_entry()? {
                    towns.push(entry);
                }
                Ok(TownGroup(towns))
            }
        }

        d.deserialize_map(GroupVisitor)
    }
}

/// Read and parse an annotation file.
#[instrument]
pub fn parse_annotations_file(path: &Path) -> Result<ScenarioAnnotations, ConfigurationError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_annotations(&json)
}

/// Parse the JSON content of an annotation file.
pub fn parse_annotations(json: &str) -> Result<ScenarioAnnotations, ConfigurationError> {
    let file: AnnotationFile = serde_json::from_str(json)?;
    let towns = file
        .available_scenarios
        .into_iter()
        .flat_map(|group| group.0)
        .collect();
    Ok(ScenarioAnnotations { towns })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Float(f64),
    Text(String),
}

impl Number {
    fn value<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            Number::Float(v) => Ok(v),
            Number::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("'{s}' is not a number"))),
        }
    }
}

#[derive(Deserialize)]
struct RawPose {
    x: Number,
    y: Number,
    #[serde(default)]
    z: Option<Number>,
    #[serde(default)]
    yaw: Option<Number>,
    #[serde(default)]
    pitch: Option<Number>,
}

impl RawPose {
    fn into_waypoint<E: serde::de::Error>(self) -> Result<Waypoint, E> {
        let opt = |n: Option<Number>| n.map_or(Ok(0.0), Number::value::<E>);
        Ok(Waypoint {
            x: self.x.value()?,
            y: self.y.value()?,
            z: opt(self.z)?,
            yaw: opt(self.yaw)?,
            pitch: opt(self.pitch)?,
        })
    }
}

fn deserialize_pose<'de, D: Deserializer<'de>>(d: D) -> Result<Waypoint, D::Error> {
    RawPose::deserialize(d)?.into_waypoint()
}

fn deserialize_poses<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Waypoint>, D::Error> {
    // `null` is used by some files for an empty group
    let raw: Option<Vec<RawPose>> = Option::deserialize(d)?;
    raw.unwrap_or_default()
        .into_iter()
        .map(RawPose::into_waypoint)
        .collect()
}
