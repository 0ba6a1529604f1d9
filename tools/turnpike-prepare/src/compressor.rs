//! Geometry of compressed degree-2 chains
//!
//! When the edge `u -> v` absorbs `v -> w`, the elided node `v` and the weights
//! of the two original segments are recorded in a bucket keyed by the id of the
//! surviving edge. A bucket lists, for every original segment of the chain, the
//! node the segment ends at and the segment weight:
//!
//! ```text
//! A - B - C - D - E   (compressed into A -> E)
//! bucket(A -> E) = [(B, 10), (C, 10), (D, 10), (E, 10)]
//! ```
//!
//! The last entry is always the current target of the edge.

use std::io::{self, Write};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use turnpike_common::{EdgeId, NodeId};

use crate::graph::EdgeWeight;

/// One original segment: (node it ends at, segment weight)
pub type CompressedNode = (NodeId, EdgeWeight);

/// Buckets are allocated this many at a time
const FREE_LIST_GROWTH: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressorStatistics {
    /// Total number of segments stored across all buckets
    pub compressed_segments: u64,
    /// Number of live buckets
    pub compressed_edges: u64,
    pub longest_chain_length: u64,
    pub average_chain_length: f64,
}

#[derive(Debug, Default)]
pub struct GeometryCompressor {
    edge_id_to_list_index: FxHashMap<EdgeId, u32>,
    compressed_geometries: Vec<Vec<CompressedNode>>,
    free_list: Vec<u32>,
}

impl GeometryCompressor {
    pub fn new() -> Self {
        let mut compressor = Self::default();
        compressor.increase_free_list();
        compressor
    }

    fn increase_free_list(&mut self) {
        let first = self.compressed_geometries.len() as u32;
        self.compressed_geometries
            .resize_with((first + FREE_LIST_GROWTH) as usize, Vec::new);
        // Hand out the lowest slot first
        self.free_list.extend((first..first + FREE_LIST_GROWTH).rev());
    }

    pub fn has_entry_for_id(&self, edge: EdgeId) -> bool {
        self.edge_id_to_list_index.contains_key(&edge)
    }

    /// Bucket slot of `edge`, the id persisted as packed geometry id
    pub fn position_for_id(&self, edge: EdgeId) -> Option<u32> {
        self.edge_id_to_list_index.get(&edge).copied()
    }

    /// Bucket of `edge`; empty for edges that were never compressed
    pub fn bucket(&self, edge: EdgeId) -> &[CompressedNode] {
        match self.position_for_id(edge) {
            Some(position) => &self.compressed_geometries[position as usize],
            None => &[],
        }
    }

    /// First node after the edge's source
    pub fn first_node_id_of_bucket(&self, edge: EdgeId) -> Option<NodeId> {
        let bucket = self.bucket(edge);
        (bucket.len() >= 2).then(|| bucket[0].0)
    }

    /// Last node before the edge's target
    pub fn last_node_id_of_bucket(&self, edge: EdgeId) -> Option<NodeId> {
        let bucket = self.bucket(edge);
        (bucket.len() >= 2).then(|| bucket[bucket.len() - 2].0)
    }

    /// Nodes elided from `edge`, in driving order
    pub fn unpack(&self, edge: EdgeId) -> Vec<NodeId> {
        let bucket = self.bucket(edge);
        bucket
            .iter()
            .take(bucket.len().saturating_sub(1))
            .map(|&(node, _)| node)
            .collect()
    }

    /// Weight driven from the edge's source up to the start of each segment
    pub fn prefix_sums(&self, edge: EdgeId) -> Vec<EdgeWeight> {
        self.bucket(edge)
            .iter()
            .scan(0, |sum, &(_, weight)| {
                let offset = *sum;
                *sum += weight;
                Some(offset)
            })
            .collect()
    }

    /// Record that `edge_1` (ending at `via_node`) absorbed `edge_2` (ending
    /// at `target_node`). `weight_1`/`weight_2` are the segment weights before
    /// the merge.
    pub fn compress_edge(
        &mut self,
        edge_1: EdgeId,
        edge_2: EdgeId,
        via_node: NodeId,
        target_node: NodeId,
        weight_1: EdgeWeight,
        weight_2: EdgeWeight,
    ) {
        debug_assert_ne!(edge_1, edge_2);

        let list_index_1 = match self.edge_id_to_list_index.get(&edge_1) {
            Some(&index) => index,
            None => {
                if self.free_list.is_empty() {
                    self.increase_free_list();
                }
                let index = self.free_list.pop().unwrap_or_default();
                self.edge_id_to_list_index.insert(edge_1, index);
                index
            }
        };

        if self.compressed_geometries[list_index_1 as usize].is_empty() {
            self.compressed_geometries[list_index_1 as usize].push((via_node, weight_1));
        }

        match self.edge_id_to_list_index.remove(&edge_2) {
            Some(list_index_2) => {
                // edge_2 was a chain itself
                let absorbed = std::mem::take(&mut self.compressed_geometries[list_index_2 as usize]);
                self.compressed_geometries[list_index_1 as usize].extend(absorbed);
                self.free_list.push(list_index_2);
            }
            None => {
                self.compressed_geometries[list_index_1 as usize].push((target_node, weight_2));
            }
        }
    }

    pub fn statistics(&self) -> CompressorStatistics {
        let mut stats = CompressorStatistics::default();
        for bucket in &self.compressed_geometries {
            stats.compressed_segments += bucket.len() as u64;
            stats.longest_chain_length = stats.longest_chain_length.max(bucket.len() as u64);
        }
        stats.compressed_edges = self.edge_id_to_list_index.len() as u64;
        stats.average_chain_length =
            stats.compressed_segments as f64 / stats.compressed_edges.max(1) as f64;
        stats
    }

    pub fn print_statistics(&self) {
        let stats = self.statistics();
        info!(
            compressed_edges = stats.compressed_edges,
            compressed_segments = stats.compressed_segments,
            longest_chain_length = stats.longest_chain_length,
            average_chain_length = format!("{:.2}", stats.average_chain_length),
            "geometry successfully removed"
        );
    }

    /// Write every bucket slot as a list of node ids:
    ///
    /// `[u32 slots+1][slots+1 x u32 offsets][u32 total][total x u32 node ids]`
    ///
    /// Offsets are prefix sums of the list lengths, the last one being the total.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let number_of_offsets = self.compressed_geometries.len() as u32 + 1;
        writer.write_all(&number_of_offsets.to_le_bytes())?;

        let mut prefix_sum = 0u32;
        for bucket in &self.compressed_geometries {
            writer.write_all(&prefix_sum.to_le_bytes())?;
            prefix_sum += bucket.len() as u32;
        }
        // sentinel
        writer.write_all(&prefix_sum.to_le_bytes())?;
        writer.write_all(&prefix_sum.to_le_bytes())?;

        for bucket in &self.compressed_geometries {
            for &(node, _) in bucket {
                writer.write_all(&node.to_le_bytes())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NodeId = 0;
    const B: NodeId = 1;
    const C: NodeId = 2;
    const D: NodeId = 3;
    const E: NodeId = 4;

    fn read_u32s(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_single_merge() {
        let mut compressor = GeometryCompressor::new();
        compressor.compress_edge(10, 11, B, C, 7, 5);

        assert!(compressor.has_entry_for_id(10));
        assert!(!compressor.has_entry_for_id(11));
        assert_eq!(compressor.bucket(10), &[(B, 7), (C, 5)]);
        assert_eq!(compressor.position_for_id(10), Some(0));
        assert_eq!(compressor.first_node_id_of_bucket(10), Some(B));
        assert_eq!(compressor.last_node_id_of_bucket(10), Some(B));
        assert_eq!(compressor.unpack(10), vec![B]);
        assert!(compressor.bucket(99).is_empty());
        assert_eq!(compressor.first_node_id_of_bucket(99), None);
    }

    #[test]
    fn test_chain_compresses_left_to_right() {
        // Edge ids: A->B = 0, B->C = 1, C->D = 2, D->E = 3
        let mut compressor = GeometryCompressor::new();
        compressor.compress_edge(0, 1, B, C, 10, 10);
        compressor.compress_edge(0, 2, C, D, 20, 10);
        compressor.compress_edge(0, 3, D, E, 30, 10);

        assert_eq!(compressor.bucket(0), &[(B, 10), (C, 10), (D, 10), (E, 10)]);
        assert_eq!(compressor.prefix_sums(0), vec![0, 10, 20, 30]);
        assert_eq!(compressor.unpack(0), vec![B, C, D]);
        let total: EdgeWeight = compressor.bucket(0).iter().map(|&(_, w)| w).sum();
        assert_eq!(total, 40);
        assert_eq!(compressor.first_node_id_of_bucket(0), Some(B));
        assert_eq!(compressor.last_node_id_of_bucket(0), Some(D));
    }

    #[test]
    fn test_merging_two_chains_releases_bucket() {
        // A->B->C compressed into edge 0, C->D->E into edge 2, then joined at C
        let mut compressor = GeometryCompressor::new();
        compressor.compress_edge(0, 1, B, C, 10, 10);
        compressor.compress_edge(2, 3, D, E, 10, 10);
        let released = compressor.position_for_id(2).unwrap();

        compressor.compress_edge(0, 2, C, E, 20, 20);

        assert!(!compressor.has_entry_for_id(2));
        assert_eq!(compressor.bucket(0), &[(B, 10), (C, 10), (D, 10), (E, 10)]);
        assert_eq!(compressor.prefix_sums(0), vec![0, 10, 20, 30]);

        // The released slot is handed out next
        compressor.compress_edge(7, 8, A, B, 1, 1);
        assert_eq!(compressor.position_for_id(7), Some(released));
    }

    #[test]
    fn test_free_list_grows() {
        let mut compressor = GeometryCompressor::new();
        for edge in 0..(FREE_LIST_GROWTH + 5) {
            compressor.compress_edge(2 * edge, 2 * edge + 1, 1, 2, 1, 1);
        }
        assert_eq!(
            compressor.position_for_id(2 * FREE_LIST_GROWTH),
            Some(FREE_LIST_GROWTH)
        );
        assert_eq!(compressor.statistics().compressed_edges, (FREE_LIST_GROWTH + 5) as u64);
    }

    #[test]
    fn test_serialize_layout() {
        let mut compressor = GeometryCompressor::new();
        compressor.compress_edge(0, 1, B, C, 10, 10);
        compressor.compress_edge(5, 6, D, E, 10, 10);
        compressor.compress_edge(5, 7, E, A, 20, 10);

        let mut bytes = Vec::new();
        compressor.serialize(&mut bytes).unwrap();
        let words = read_u32s(&bytes);

        let slots = FREE_LIST_GROWTH as usize;
        assert_eq!(words[0] as usize, slots + 1);
        let offsets = &words[1..slots + 2];
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 2);
        assert_eq!(offsets[2], 5);
        assert_eq!(offsets[slots], 5);
        assert_eq!(words[slots + 2], 5);
        assert_eq!(&words[slots + 3..], &[B, C, D, E, A]);
    }

    #[test]
    fn test_statistics() {
        let mut compressor = GeometryCompressor::new();
        compressor.compress_edge(0, 1, B, C, 10, 10);
        compressor.compress_edge(0, 2, C, D, 20, 10);
        compressor.compress_edge(5, 6, D, E, 10, 10);

        let stats = compressor.statistics();
        assert_eq!(stats.compressed_edges, 2);
        assert_eq!(stats.compressed_segments, 5);
        assert_eq!(stats.longest_chain_length, 3);
        assert!((stats.average_chain_length - 2.5).abs() < 1e-9);
    }
}
