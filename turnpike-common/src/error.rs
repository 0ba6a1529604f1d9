//! Error types for the turnpike toolkit
//!
//! Every variant except `Io` describes corrupted or inconsistent input that
//! aborts a preprocessing run. Recoverable conditions (for instance a failing
//! turn-penalty callback) have their own error types next to the code that
//! recovers from them.

use std::path::PathBuf;

use crate::ids::{EdgeId, NodeId};

/// Main error type for turnpike operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An edge the graph must contain was not found
    #[error("missing edge {source_node} -> {target_node} in node-based graph")]
    MissingEdge {
        source_node: NodeId,
        target_node: NodeId,
    },

    /// The same node appears twice in a row inside a reconstructed geometry
    #[error("duplicate node {node} in geometry of edge-based node {edge_based_node}")]
    DuplicateGeometryNode { node: NodeId, edge_based_node: EdgeId },

    /// The two directions of an edge disagree about their geometry
    #[error(
        "geometry of edge-based node {forward} is not the reverse of edge-based node {reverse}"
    )]
    InconsistentGeometry { forward: EdgeId, reverse: EdgeId },

    /// An edge-based node id was assigned zero or several times
    #[error("edge-based node {id} filled {times} times, expected exactly once")]
    UnfilledEdgeBasedNode { id: EdgeId, times: u32 },

    /// Invalid configuration or parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An output file could not be created
    #[error("cannot open output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for turnpike operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_edge_message_names_both_endpoints() {
        let err = Error::MissingEdge {
            source_node: 4,
            target_node: 7,
        };
        assert_eq!(err.to_string(), "missing edge 4 -> 7 in node-based graph");
    }

    #[test]
    fn test_io_error_converts() {
        fn open() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }

        let err = open().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
