//! Node-based street graph
//!
//! Nodes are intersections and shape points, edges are street segments. Every
//! non-split import edge is stored in both orientations, so each directed edge
//! `u -> v` has a twin `v -> u`; the `forward`/`backward` flags say which of the
//! two orientations may actually be driven.

mod dynamic;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use turnpike_common::{EdgeId, NodeId, COORDINATE_PRECISION, SPECIAL_EDGEID};

pub use dynamic::{DynamicGraph, InputEdge};

/// Travel mode tag carried through to the outputs
pub type TravelMode = u8;

pub const TRAVEL_MODE_INACCESSIBLE: TravelMode = 0;
pub const TRAVEL_MODE_DEFAULT: TravelMode = 1;

/// Edge weight in deciseconds
pub type EdgeWeight = i32;

/// A node with its fixed-point coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryNode {
    /// Latitude in 1e-6 degrees
    pub lat: i32,
    /// Longitude in 1e-6 degrees
    pub lon: i32,
    /// External (OSM) node id
    pub node_id: u64,
}

impl QueryNode {
    pub fn from_degrees(lat: f64, lon: f64, node_id: u64) -> Self {
        Self {
            lat: (lat * COORDINATE_PRECISION).round() as i32,
            lon: (lon * COORDINATE_PRECISION).round() as i32,
            node_id,
        }
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }
}

/// Street segment as delivered by the extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportEdge {
    pub source: NodeId,
    pub target: NodeId,
    /// Weight in deciseconds
    pub weight: EdgeWeight,
    #[serde(default = "default_true")]
    pub forward: bool,
    #[serde(default = "default_true")]
    pub backward: bool,
    #[serde(default)]
    pub name_id: u32,
    #[serde(default)]
    pub way_id: u64,
    #[serde(default)]
    pub roundabout: bool,
    #[serde(default)]
    pub access_restricted: bool,
    #[serde(default = "default_travel_mode")]
    pub travel_mode: TravelMode,
    /// Split edges are only inserted in the given orientation
    #[serde(default)]
    pub is_split: bool,
}

fn default_true() -> bool {
    true
}

fn default_travel_mode() -> TravelMode {
    TRAVEL_MODE_DEFAULT
}

impl ImportEdge {
    /// Bidirectional segment with default attributes
    pub fn new(source: NodeId, target: NodeId, weight: EdgeWeight) -> Self {
        Self {
            source,
            target,
            weight,
            forward: true,
            backward: true,
            name_id: 0,
            way_id: 0,
            roundabout: false,
            access_restricted: false,
            travel_mode: TRAVEL_MODE_DEFAULT,
            is_split: false,
        }
    }
}

/// Payload of a directed node-based edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBasedEdgeData {
    pub distance: EdgeWeight,
    /// Dense id assigned by edge renumbering, `SPECIAL_EDGEID` until then
    pub edge_based_node_id: EdgeId,
    pub name_id: u32,
    pub way_id: u64,
    pub forward: bool,
    pub backward: bool,
    pub roundabout: bool,
    pub access_restricted: bool,
    pub in_tiny_component: bool,
    pub travel_mode: TravelMode,
}

impl NodeBasedEdgeData {
    /// Two half-edges may be merged into one only when this holds
    pub fn is_compatible_to(&self, other: &Self) -> bool {
        self.forward == other.forward
            && self.backward == other.backward
            && self.name_id == other.name_id
            && self.roundabout == other.roundabout
            && self.access_restricted == other.access_restricted
            && self.in_tiny_component == other.in_tiny_component
            && self.travel_mode == other.travel_mode
    }
}

pub type NodeBasedDynamicGraph = DynamicGraph<NodeBasedEdgeData>;

impl NodeBasedDynamicGraph {
    /// Build the node-based graph from extractor edges.
    ///
    /// Self-loops are dropped. Parallel edges collapse to the cheapest edge per
    /// direction; when both directions end up with the same weight they are
    /// stored as one bidirectional edge.
    pub fn from_import_edges(number_of_nodes: u32, import_edges: &[ImportEdge]) -> Self {
        let mut edges_list: Vec<InputEdge<NodeBasedEdgeData>> =
            Vec::with_capacity(import_edges.len() * 2);

        for import_edge in import_edges {
            let (source, target, forward, backward) = if import_edge.forward {
                (
                    import_edge.source,
                    import_edge.target,
                    import_edge.forward,
                    import_edge.backward,
                )
            } else {
                (
                    import_edge.target,
                    import_edge.source,
                    import_edge.backward,
                    import_edge.forward,
                )
            };
            if source == target {
                continue;
            }

            let data = NodeBasedEdgeData {
                distance: import_edge.weight.max(1),
                edge_based_node_id: SPECIAL_EDGEID,
                name_id: import_edge.name_id,
                way_id: import_edge.way_id,
                forward,
                backward,
                roundabout: import_edge.roundabout,
                access_restricted: import_edge.access_restricted,
                in_tiny_component: false,
                travel_mode: import_edge.travel_mode,
            };

            if !import_edge.is_split {
                let mut twin = data;
                std::mem::swap(&mut twin.forward, &mut twin.backward);
                edges_list.push(InputEdge {
                    source: target,
                    target: source,
                    data: twin,
                });
            }
            edges_list.push(InputEdge {
                source,
                target,
                data,
            });
        }

        edges_list.sort_by_key(|e| (e.source, e.target));

        let mut merged = Vec::with_capacity(edges_list.len());
        let mut i = 0;
        while i < edges_list.len() {
            let source = edges_list[i].source;
            let target = edges_list[i].target;

            let mut forward_edge = edges_list[i].clone();
            let mut reverse_edge = edges_list[i].clone();
            forward_edge.data.forward = true;
            forward_edge.data.backward = false;
            reverse_edge.data.forward = false;
            reverse_edge.data.backward = true;
            let mut forward_distance: Option<EdgeWeight> = None;
            let mut reverse_distance: Option<EdgeWeight> = None;

            while i < edges_list.len()
                && edges_list[i].source == source
                && edges_list[i].target == target
            {
                let candidate = &edges_list[i].data;
                if candidate.forward {
                    forward_distance = Some(
                        forward_distance.map_or(candidate.distance, |d| d.min(candidate.distance)),
                    );
                }
                if candidate.backward {
                    reverse_distance = Some(
                        reverse_distance.map_or(candidate.distance, |d| d.min(candidate.distance)),
                    );
                }
                i += 1;
            }

            match (forward_distance, reverse_distance) {
                (Some(forward), Some(reverse)) if forward == reverse => {
                    forward_edge.data.distance = forward;
                    forward_edge.data.backward = true;
                    merged.push(forward_edge);
                }
                (forward, reverse) => {
                    if let Some(distance) = forward {
                        forward_edge.data.distance = distance;
                        merged.push(forward_edge);
                    }
                    if let Some(distance) = reverse {
                        reverse_edge.data.distance = distance;
                        merged.push(reverse_edge);
                    }
                }
            }
        }

        debug!(
            import_edges = import_edges.len(),
            directed_edges = merged.len(),
            "merged parallel edges"
        );
        let graph = DynamicGraph::new(number_of_nodes, merged);
        info!(
            nodes = graph.number_of_nodes(),
            edges = graph.number_of_edges(),
            "built node-based graph"
        );
        graph
    }

    /// Number of edges leaving `node` that may be driven
    pub fn directed_out_degree(&self, node: NodeId) -> u32 {
        self.adjacent_edge_range(node)
            .filter(|&e| self.data(e).forward)
            .count() as u32
    }
}
