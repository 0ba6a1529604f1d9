//! Adjacency-array graph that supports in-place edge deletion and retargeting
//!
//! Every node owns a contiguous slice `[first_edge, first_edge + edges)` of the
//! edge array. Deleting an edge swaps the node's last edge into the freed slot
//! and shrinks the slice, so edge ids of the same node may move on deletion.
//! Edge ids of other nodes are never affected.

use std::ops::Range;

use turnpike_common::{EdgeId, NodeId, SPECIAL_NODEID};

#[derive(Debug, Clone, Copy)]
struct NodeEntry {
    first_edge: EdgeId,
    edges: u32,
}

#[derive(Debug, Clone)]
struct EdgeEntry<E> {
    target: NodeId,
    data: E,
}

/// Directed edge used to build a [`DynamicGraph`]
#[derive(Debug, Clone)]
pub struct InputEdge<E> {
    pub source: NodeId,
    pub target: NodeId,
    pub data: E,
}

#[derive(Debug, Clone)]
pub struct DynamicGraph<E> {
    nodes: Vec<NodeEntry>,
    edges: Vec<EdgeEntry<E>>,
    number_of_edges: u32,
}

impl<E: Clone> DynamicGraph<E> {
    /// Build from an edge list. Edges are grouped by source; the relative order
    /// of edges sharing a source is preserved.
    pub fn new(number_of_nodes: u32, mut input: Vec<InputEdge<E>>) -> Self {
        input.sort_by_key(|e| e.source);

        let mut nodes = Vec::with_capacity(number_of_nodes as usize);
        let mut edges = Vec::with_capacity(input.len());
        let mut cursor = 0usize;
        for node in 0..number_of_nodes {
            let first_edge = edges.len() as EdgeId;
            while cursor < input.len() && input[cursor].source == node {
                let edge = &input[cursor];
                edges.push(EdgeEntry {
                    target: edge.target,
                    data: edge.data.clone(),
                });
                cursor += 1;
            }
            nodes.push(NodeEntry {
                first_edge,
                edges: edges.len() as u32 - first_edge,
            });
        }

        let number_of_edges = edges.len() as u32;
        Self {
            nodes,
            edges,
            number_of_edges,
        }
    }

    pub fn number_of_nodes(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Number of live (not deleted) edges
    pub fn number_of_edges(&self) -> u32 {
        self.number_of_edges
    }

    /// Number of live edges leaving `node`, regardless of direction flags
    pub fn out_degree(&self, node: NodeId) -> u32 {
        self.nodes[node as usize].edges
    }

    pub fn begin_edges(&self, node: NodeId) -> EdgeId {
        self.nodes[node as usize].first_edge
    }

    pub fn end_edges(&self, node: NodeId) -> EdgeId {
        let entry = self.nodes[node as usize];
        entry.first_edge + entry.edges
    }

    /// Plain integer range, safe to hold while the graph is mutated
    pub fn adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        self.begin_edges(node)..self.end_edges(node)
    }

    pub fn target(&self, edge: EdgeId) -> NodeId {
        self.edges[edge as usize].target
    }

    pub fn data(&self, edge: EdgeId) -> &E {
        &self.edges[edge as usize].data
    }

    pub fn data_mut(&mut self, edge: EdgeId) -> &mut E {
        &mut self.edges[edge as usize].data
    }

    pub fn set_target(&mut self, edge: EdgeId, target: NodeId) {
        self.edges[edge as usize].target = target;
    }

    /// First edge `from -> to`, if any
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.adjacent_edge_range(from)
            .find(|&edge| self.target(edge) == to)
    }

    pub fn find_edge_in_either_direction(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.find_edge(from, to).or_else(|| self.find_edge(to, from))
    }

    /// Remove `edge` from the adjacency of `source`.
    ///
    /// The last edge of `source` moves into the slot of `edge`. When deleting
    /// several edges of one node, delete the highest id first.
    pub fn delete_edge(&mut self, source: NodeId, edge: EdgeId) {
        let entry = &mut self.nodes[source as usize];
        debug_assert!(entry.edges > 0);
        debug_assert!((entry.first_edge..entry.first_edge + entry.edges).contains(&edge));

        entry.edges -= 1;
        let last = (entry.first_edge + entry.edges) as usize;
        self.number_of_edges -= 1;

        self.edges.swap(edge as usize, last);
        self.edges[last].target = SPECIAL_NODEID;
    }
}
