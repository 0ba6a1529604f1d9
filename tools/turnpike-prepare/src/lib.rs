//! Edge-expanded (turn-aware) routing graph preprocessing
//!
//! Pipeline: import a node-based street graph, tag tiny islands, compress
//! degree-2 chains, then expand every legal turn into an edge of the
//! edge-based graph.

pub mod cli;
pub mod compressor;
pub mod config;
pub mod connectivity;
pub mod ebg;
pub mod formats;
pub mod graph;
pub mod lock;
pub mod prepare;
pub mod progress;
pub mod restriction;

pub use compressor::GeometryCompressor;
pub use config::SpeedProfile;
pub use ebg::{EdgeBasedGraphFactory, EdgeExpandedGraph};
pub use graph::NodeBasedDynamicGraph;
pub use restriction::RestrictionMap;
