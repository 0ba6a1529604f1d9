//! Node-based graph input document (JSON)
//!
//! ```json
//! {
//!   "nodes": [{"lat": 52.5, "lon": 13.4, "osm_id": 1}],
//!   "edges": [{"source": 0, "target": 1, "weight": 30, "name_id": 4}],
//!   "restrictions": [{"from": {"node": 0}, "via": {"node": 1}, "to": {"node": 2}}],
//!   "barriers": [5],
//!   "traffic_lights": [3]
//! }
//! ```

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use turnpike_common::{Error, NodeId};

use crate::graph::{ImportEdge, NodeBasedDynamicGraph, QueryNode};
use crate::restriction::TurnRestriction;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputNode {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub osm_id: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeBasedInput {
    pub nodes: Vec<InputNode>,
    pub edges: Vec<ImportEdge>,
    #[serde(default)]
    pub restrictions: Vec<TurnRestriction>,
    #[serde(default)]
    pub barriers: Vec<NodeId>,
    #[serde(default)]
    pub traffic_lights: Vec<NodeId>,
}

/// Imported network, ready for the factory
#[derive(Debug)]
pub struct NodeBasedNetwork {
    pub graph: NodeBasedDynamicGraph,
    pub node_info: Vec<QueryNode>,
    pub restrictions: Vec<TurnRestriction>,
    pub barrier_nodes: FxHashSet<NodeId>,
    pub traffic_lights: FxHashSet<NodeId>,
}

impl NodeBasedInput {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let input: NodeBasedInput =
            serde_json::from_reader(reader).context("malformed node-based graph document")?;
        input.validate()?;
        Ok(input)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Every referenced node id must exist
    pub fn validate(&self) -> std::result::Result<(), Error> {
        let number_of_nodes = self.nodes.len();
        if number_of_nodes >= NodeId::MAX as usize {
            return Err(Error::InvalidInput(format!(
                "{number_of_nodes} nodes exceed the id space"
            )));
        }
        let check = |what: &str, id: NodeId| {
            if (id as usize) < number_of_nodes {
                Ok(())
            } else {
                Err(Error::InvalidInput(format!(
                    "{what} references node {id}, but there are only {number_of_nodes} nodes"
                )))
            }
        };

        for (i, edge) in self.edges.iter().enumerate() {
            check(&format!("edge {i}"), edge.source)?;
            check(&format!("edge {i}"), edge.target)?;
        }
        for &node in &self.barriers {
            check("barrier", node)?;
        }
        for &node in &self.traffic_lights {
            check("traffic light", node)?;
        }
        for (i, restriction) in self.restrictions.iter().enumerate() {
            if let Some((from, via, to)) = restriction.resolved() {
                for node in [from, via, to] {
                    check(&format!("restriction {i}"), node)?;
                }
            }
        }
        for (i, node) in self.nodes.iter().enumerate() {
            let in_range = (-90.0..=90.0).contains(&node.lat) && (-180.0..=180.0).contains(&node.lon);
            if !in_range {
                return Err(Error::InvalidInput(format!(
                    "node {i} has invalid coordinate ({}, {})",
                    node.lat, node.lon
                )));
            }
        }
        Ok(())
    }

    pub fn into_network(self) -> NodeBasedNetwork {
        let node_info: Vec<QueryNode> = self
            .nodes
            .iter()
            .map(|node| QueryNode::from_degrees(node.lat, node.lon, node.osm_id))
            .collect();
        let graph = NodeBasedDynamicGraph::from_import_edges(node_info.len() as u32, &self.edges);

        NodeBasedNetwork {
            graph,
            node_info,
            restrictions: self.restrictions,
            barrier_nodes: self.barriers.into_iter().collect(),
            traffic_lights: self.traffic_lights.into_iter().collect(),
        }
    }
}
