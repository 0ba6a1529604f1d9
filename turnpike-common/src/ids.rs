//! Dense integer handles into the node-based graph

/// Node handle, dense and 0-based
pub type NodeId = u32;

/// Edge handle, dense and 0-based
pub type EdgeId = u32;

/// Reserved "no node" value
pub const SPECIAL_NODEID: NodeId = u32::MAX;

/// Reserved "no edge" value
pub const SPECIAL_EDGEID: EdgeId = u32::MAX;

/// Fixed-point coordinate scale (1e-6 degrees)
pub const COORDINATE_PRECISION: f64 = 1_000_000.0;

/// Map a sentinel-encoded node id to an `Option`
#[inline]
pub fn node_or_none(id: NodeId) -> Option<NodeId> {
    (id != SPECIAL_NODEID).then_some(id)
}

/// Map a sentinel-encoded edge id to an `Option`
#[inline]
pub fn edge_or_none(id: EdgeId) -> Option<EdgeId> {
    (id != SPECIAL_EDGEID).then_some(id)
}
