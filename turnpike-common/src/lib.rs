//! Common types for the turnpike toolkit

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::{
    edge_or_none, node_or_none, EdgeId, NodeId, COORDINATE_PRECISION, SPECIAL_EDGEID,
    SPECIAL_NODEID,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_map_to_none() {
        assert_eq!(node_or_none(SPECIAL_NODEID), None);
        assert_eq!(node_or_none(3), Some(3));
        assert_eq!(edge_or_none(SPECIAL_EDGEID), None);
        assert_eq!(edge_or_none(0), Some(0));
    }
}
