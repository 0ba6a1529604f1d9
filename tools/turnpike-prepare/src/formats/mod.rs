//! On-disk formats of the edge-expansion stage
//!
//! Inputs:
//! - node-based graph document (JSON)
//!
//! Outputs:
//! - `ebg.original_edges`: one record per turn, count prefixed
//! - `ebg.geometry`: packed geometry buckets
//! - `ebg.nodes`, `ebg.edges`, `ebg.node_data`: CRC-framed tables

pub mod ebg_edges;
pub mod ebg_nodes;
pub mod frame;
pub mod geometry;
pub mod nbg_input;
pub mod node_data;
pub mod original_edges;

pub use ebg_edges::{EbgEdges, EbgEdgesFile};
pub use ebg_nodes::{EbgNodes, EbgNodesFile};
pub use geometry::PackedGeometry;
pub use nbg_input::{InputNode, NodeBasedInput, NodeBasedNetwork};
pub use node_data::{NodeDataFile, NodeDataTable};
pub use original_edges::{read_original_edges, OriginalEdgeDataWriter};
