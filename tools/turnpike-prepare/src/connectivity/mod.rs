//! Turn- and barrier-aware connectivity analysis
//!
//! Two explorers share one result type:
//! - [`bfs_components`] walks the graph undirected and is used to tag tiny
//!   islands right after import
//! - [`tarjan_components`] computes strongly connected components of the
//!   compressed, directed graph
//!
//! Both honor barrier nodes and turn restrictions while exploring, so a
//! component is a set of nodes reachable through legal turns.

mod bfs;
mod tarjan;

use rustc_hash::FxHashSet;
use tracing::info;
use turnpike_common::NodeId;

use crate::graph::NodeBasedDynamicGraph;
use crate::restriction::RestrictionMap;

pub use bfs::bfs_components;
pub use tarjan::tarjan_components;

/// Components smaller than this are considered islands
pub const TINY_COMPONENT_THRESHOLD: u32 = 1000;

/// Per-node component assignment
#[derive(Debug, Clone)]
pub struct ComponentMap {
    component_ids: Vec<u32>,
    component_sizes: Vec<u32>,
    size_one_count: u32,
}

impl ComponentMap {
    fn new(component_ids: Vec<u32>, component_sizes: Vec<u32>) -> Self {
        let size_one_count = component_sizes.iter().filter(|&&size| size == 1).count() as u32;
        Self {
            component_ids,
            component_sizes,
            size_one_count,
        }
    }

    /// Dense component id, in discovery order
    pub fn component_id(&self, node: NodeId) -> u32 {
        self.component_ids[node as usize]
    }

    /// Size of the component that contains `node`
    pub fn component_size(&self, node: NodeId) -> u32 {
        self.component_sizes[self.component_id(node) as usize]
    }

    /// Number of components with fewer than `threshold` nodes
    pub fn count_smaller_than(&self, threshold: u32) -> u32 {
        self.component_sizes
            .iter()
            .filter(|&&size| size < threshold)
            .count() as u32
    }

    pub fn number_of_components(&self) -> u32 {
        self.component_sizes.len() as u32
    }

    pub fn size_one_count(&self) -> u32 {
        self.size_one_count
    }

    /// Size of the largest component, 0 for an empty graph
    pub fn largest_component_size(&self) -> u32 {
        self.component_sizes.iter().copied().max().unwrap_or(0)
    }
}

/// Mark every edge that touches a component smaller than `threshold`.
///
/// An edge is tiny when the smaller of its two endpoint components is; edges
/// ending at a barrier can join two distinct components.
pub fn tag_tiny_components(
    graph: &mut NodeBasedDynamicGraph,
    restrictions: &RestrictionMap,
    barrier_nodes: &FxHashSet<NodeId>,
    threshold: u32,
) -> ComponentMap {
    let components = bfs_components(graph, restrictions, barrier_nodes);

    let mut tagged_edges = 0u64;
    for u in 0..graph.number_of_nodes() {
        for edge in graph.adjacent_edge_range(u) {
            let v = graph.target(edge);
            let size = components
                .component_size(u)
                .min(components.component_size(v));
            if size < threshold {
                graph.data_mut(edge).in_tiny_component = true;
                tagged_edges += 1;
            }
        }
    }

    info!(
        components = components.number_of_components(),
        size_one = components.size_one_count(),
        largest = components.largest_component_size(),
        tagged_edges,
        threshold,
        "tagged tiny components"
    );
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ImportEdge;

    #[test]
    fn test_tag_tiny_components() {
        // Two islands: 0-1-2 and 3-4
        let mut graph = NodeBasedDynamicGraph::from_import_edges(
            5,
            &[
                ImportEdge::new(0, 1, 10),
                ImportEdge::new(1, 2, 10),
                ImportEdge::new(3, 4, 10),
            ],
        );
        let components = tag_tiny_components(
            &mut graph,
            &RestrictionMap::default(),
            &FxHashSet::default(),
            3,
        );
        assert_eq!(components.number_of_components(), 2);
        assert_eq!(components.largest_component_size(), 3);

        let big = graph.find_edge(0, 1).unwrap();
        let small = graph.find_edge(3, 4).unwrap();
        assert!(!graph.data(big).in_tiny_component);
        assert!(graph.data(small).in_tiny_component);
    }
}
