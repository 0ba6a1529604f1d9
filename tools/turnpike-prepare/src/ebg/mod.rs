//! Edge-expanded graph construction
//!
//! Builds a turn-expanded graph where:
//! - Nodes = drivable directed node-based edges (u→v), split into one
//!   [`EdgeBasedNode`] per original segment when the edge was compressed
//! - Edges = legal turns `u → v → w` at intersections
//!
//! Every turn also yields an [`OriginalEdgeData`] record that a router uses to
//! unpack paths back into instructions.

use serde::{Deserialize, Serialize};
use turnpike_common::{edge_or_none, EdgeId, NodeId};

use crate::compressor::CompressorStatistics;
use crate::graph::{EdgeWeight, TravelMode};

mod factory;
pub mod turn_analysis;
pub mod turn_penalty;

pub use factory::EdgeBasedGraphFactory;
pub use turn_analysis::{analyze_turn, compute_angle, TurnInstruction};
pub use turn_penalty::{
    NoTurnPenalty, PenaltyEvaluationError, SigmoidTurnPenalty, TurnPenaltyConfig,
    TurnPenaltyFunction,
};

/// One segment of a node-based edge pair, the unit a router snaps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeBasedNode {
    pub forward_way_id: u64,
    pub reverse_way_id: u64,
    /// `SPECIAL_EDGEID` when `u → v` may not be driven
    pub forward_edge_based_node_id: EdgeId,
    /// `SPECIAL_EDGEID` when `v → u` may not be driven
    pub reverse_edge_based_node_id: EdgeId,
    pub u: NodeId,
    pub v: NodeId,
    pub name_id: u32,
    pub forward_weight: EdgeWeight,
    pub reverse_weight: EdgeWeight,
    /// Weight from the start of the forward edge up to `u`
    pub forward_offset: EdgeWeight,
    /// Weight from the start of the reverse edge up to `v`
    pub reverse_offset: EdgeWeight,
    /// Bucket slot in the geometry file, `SPECIAL_EDGEID` if uncompressed
    pub packed_geometry_id: u32,
    /// Tiny component id + 1, or 0 for the big components
    pub component_id: u32,
    pub fwd_segment_position: u32,
    pub forward_travel_mode: TravelMode,
    pub backward_travel_mode: TravelMode,
}

impl EdgeBasedNode {
    pub fn is_compressed(&self) -> bool {
        edge_or_none(self.packed_geometry_id).is_some()
    }
}

/// A legal turn between two edge-based nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeBasedEdge {
    pub source: EdgeId,
    pub target: EdgeId,
    /// Index of the matching [`OriginalEdgeData`] record
    pub edge_id: u32,
    pub weight: EdgeWeight,
    pub forward: bool,
    pub backward: bool,
}

/// Per-turn record persisted for path unpacking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalEdgeData {
    /// Via node, or the bucket slot of the incoming edge when it is compressed
    pub via_node: u32,
    pub name_id: u32,
    pub turn_instruction: TurnInstruction,
    pub compressed: bool,
    pub travel_mode: TravelMode,
}

/// One uncompressed piece of an edge-based node, coordinates in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SegmentInfo {
    pub way_id: u64,
    pub lat1: f64,
    pub lon1: f64,
    pub lat2: f64,
    pub lon2: f64,
}

/// Full geometry of an edge-based node
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EdgeBasedNodeData {
    pub segments: Vec<SegmentInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactoryStats {
    pub removed_nodes: u64,
    pub node_compression_ratio: f64,
    pub edge_compression_ratio: f64,
    pub geometry: CompressorStatistics,
    pub components: u64,
    pub size_one_components: u64,
    pub edge_based_nodes: u64,
    pub edge_based_node_segments: u64,
    pub edge_based_edges: u64,
    pub node_based_edges_scanned: u64,
    pub restricted_turns: u64,
    pub skipped_uturns: u64,
    pub skipped_barrier_turns: u64,
    pub compressed_turns: u64,
    pub live_restrictions: u64,
    pub penalty_failures: u64,
}

/// Everything [`EdgeBasedGraphFactory::run`] hands to the contractor
#[derive(Debug)]
pub struct EdgeExpandedGraph {
    pub nodes: Vec<EdgeBasedNode>,
    pub edges: Vec<EdgeBasedEdge>,
    /// Indexed by edge-based node id
    pub node_data: Vec<EdgeBasedNodeData>,
    pub number_of_edge_based_nodes: u32,
    pub stats: FactoryStats,
}
