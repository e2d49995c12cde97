//! Routes and poses.
//!
//! A route file lists the routes of a batch:
//!
//! ```xml
//! <routes>
//!   <route id="0" map="Town01">
//!     <waypoint x="338.7" y="226.7" z="0.0" pitch="0.0" yaw="270.0" roll="0.0"/>
//!     <waypoint x="321.9" y="133.2" z="0.0" pitch="0.0" yaw="180.0" roll="0.0"/>
//!   </route>
//! </routes>
//! ```
//!
//! Waypoint order is meaningful: it is the driving direction.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ConfigurationError;

/// A pose in the simulation frame. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
}

/// Poses handed to and read from the simulation share the waypoint representation.
pub type Pose = Waypoint;

impl Waypoint {
    pub fn new(x: f64, y: f64, z: f64, yaw: f64, pitch: f64) -> Self {
        Self {
            x,
            y,
            z,
            yaw,
            pitch,
        }
    }

    /// Euclidean distance between the two positions, orientation ignored.
    pub fn distance(&self, other: &Waypoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One route of the batch. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    id: String,
    town: String,
    waypoints: Vec<Waypoint>,
}

impl RouteDescriptor {
    /// Fails when the route has no waypoint, since it would have neither start nor target.
    pub fn new(
        id: impl Into<String>,
        town: impl Into<String>,
        waypoints: Vec<Waypoint>,
    ) -> Result<Self, ConfigurationError> {
        let id = id.into();
        if waypoints.is_empty() {
            return Err(ConfigurationError::MalformedRoute {
                route_id: id,
                message: "route has no waypoint".to_owned(),
            });
        }
        Ok(Self {
            id,
            town: town.into(),
            waypoints,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn town(&self) -> &str {
        &self.town
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }
}

/// Sum of the distances between consecutive poses.
pub fn path_length<'a>(poses: impl IntoIterator<Item = &'a Waypoint>) -> f64 {
    let mut total = 0.0;
    let mut previous: Option<&Waypoint> = None;
    for pose in poses {
        if let Some(prev) = previous {
            total += prev.distance(pose);
        }
        previous = Some(pose);
    }
    total
}

/// Read and parse a route file.
#[instrument]
pub fn parse_routes_file(path: &Path) -> Result<Vec<RouteDescriptor>, ConfigurationError> {
    let xml = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_routes(&xml)
}

/// Parse the XML content of a route file.
pub fn parse_routes(xml: &str) -> Result<Vec<RouteDescriptor>, ConfigurationError> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "routes" {
        return Err(ConfigurationError::MalformedRoute {
            route_id: String::new(),
            message: format!(
                "root element must be <routes>, found <{}>",
                root.tag_name().name()
            ),
        });
    }

    let mut routes = vec![];
    for node in root
        .children()
        .filter(|n| n.tag_name().name() == "route")
    {
        let route_id = node.attribute("id").unwrap_or_default().to_owned();
        let Some(town) = node.attribute("map").or_else(|| node.attribute("town")) else {
            return Err(ConfigurationError::MalformedRoute {
                route_id,
                message: "missing 'map' attribute".to_owned(),
            });
        };

        let waypoints = node
            .children()
            .filter(|n| n.tag_name().name() == "waypoint")
            .enumerate()
            .map(|(i, wp)| parse_waypoint(&wp, &route_id, i))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(route_id, town, waypoints = waypoints.len(), "parsed route");
        routes.push(RouteDescriptor::new(route_id, town, waypoints)?);
    }
    Ok(routes)
}

fn parse_waypoint(
    node: &roxmltree::Node,
    route_id: &str,
    index: usize,
) -> Result<Waypoint, ConfigurationError> {
    let attr = |name: &str, required: bool| -> Result<f64, ConfigurationError> {
        match node.attribute(name) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigurationError::MalformedRoute {
                    route_id: route_id.to_owned(),
                    message: format!("waypoint #{index}: '{name}' is not a number ('{raw}')"),
                }),
            None if required => Err(ConfigurationError::MalformedRoute {
                route_id: route_id.to_owned(),
                message: format!("waypoint #{index}: missing '{name}'"),
            }),
            None => Ok(0.0),
        }
    };

    Ok(Waypoint {
        x: attr("x", true)?,
        y: attr("y", true)?,
        z: attr("z", false)?,
        yaw: attr("yaw", false)?,
        pitch: attr("pitch", false)?,
    })
}
