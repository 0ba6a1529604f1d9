//! Node-based to edge-expanded graph conversion
//!
//! [`EdgeBasedGraphFactory::run`] executes five stages in a fixed order:
//!
//! 1. compress degree-2 chains into single edges
//! 2. number every drivable directed edge densely
//! 3. emit one edge-based node per (segment of a) node-based edge pair
//! 4. emit one edge-based edge per legal turn, streaming turn records to disk
//! 5. rebuild the full geometry of every edge-based node
//!
//! The stages are private; `run` consumes the factory so none of them can be
//! repeated or reordered.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use std::time::Instant;

use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};
use turnpike_common::{
    edge_or_none, EdgeId, Error, NodeId, Result, COORDINATE_PRECISION, SPECIAL_EDGEID,
};

use super::turn_analysis::{analyze_turn, compute_angle, TurnInstruction};
use super::turn_penalty::TurnPenaltyFunction;
use super::{
    EdgeBasedEdge, EdgeBasedNode, EdgeBasedNodeData, EdgeExpandedGraph, FactoryStats,
    OriginalEdgeData, SegmentInfo,
};
use crate::compressor::GeometryCompressor;
use crate::config::SpeedProfile;
use crate::connectivity::{tarjan_components, TINY_COMPONENT_THRESHOLD};
use crate::formats::original_edges::OriginalEdgeDataWriter;
use crate::graph::{
    EdgeWeight, NodeBasedDynamicGraph, NodeBasedEdgeData, QueryNode, TRAVEL_MODE_INACCESSIBLE,
};
use crate::progress::Percent;
use crate::restriction::RestrictionMap;

pub struct EdgeBasedGraphFactory<'a> {
    graph: &'a mut NodeBasedDynamicGraph,
    /// Snapshot taken before compression, used to look up original way ids
    original_graph: NodeBasedDynamicGraph,
    node_info: &'a [QueryNode],
    restrictions: RestrictionMap,
    barrier_nodes: &'a FxHashSet<NodeId>,
    traffic_lights: &'a FxHashSet<NodeId>,
    profile: &'a SpeedProfile,
    turn_penalty: &'a dyn TurnPenaltyFunction,

    compressor: GeometryCompressor,
    edge_based_nodes: Vec<EdgeBasedNode>,
    edge_based_edges: Vec<EdgeBasedEdge>,
    node_data: Vec<EdgeBasedNodeData>,
    number_of_edge_based_nodes: u32,
    stats: FactoryStats,
}

fn create_output(path: &Path) -> Result<File> {
    File::create(path).map_err(|source| Error::Output {
        path: path.to_path_buf(),
        source,
    })
}

fn missing_edge(source_node: NodeId, target_node: NodeId) -> Error {
    Error::MissingEdge {
        source_node,
        target_node,
    }
}

impl<'a> EdgeBasedGraphFactory<'a> {
    pub fn new(
        graph: &'a mut NodeBasedDynamicGraph,
        node_info: &'a [QueryNode],
        restrictions: RestrictionMap,
        barrier_nodes: &'a FxHashSet<NodeId>,
        traffic_lights: &'a FxHashSet<NodeId>,
        profile: &'a SpeedProfile,
        turn_penalty: &'a dyn TurnPenaltyFunction,
    ) -> Result<Self> {
        if node_info.len() != graph.number_of_nodes() as usize {
            return Err(Error::InvalidInput(format!(
                "{} coordinates for {} nodes",
                node_info.len(),
                graph.number_of_nodes()
            )));
        }

        let original_graph = graph.clone();
        Ok(Self {
            graph,
            original_graph,
            node_info,
            restrictions,
            barrier_nodes,
            traffic_lights,
            profile,
            turn_penalty,
            compressor: GeometryCompressor::new(),
            edge_based_nodes: Vec::new(),
            edge_based_edges: Vec::new(),
            node_data: Vec::new(),
            number_of_edge_based_nodes: 0,
            stats: FactoryStats::default(),
        })
    }

    /// Run all stages. Both output files are created before any work starts.
    pub fn run(
        mut self,
        original_edge_data_path: &Path,
        geometry_path: &Path,
    ) -> Result<EdgeExpandedGraph> {
        let original_edge_file = create_output(original_edge_data_path)?;
        let geometry_file = create_output(geometry_path)?;
        let mut original_edges = OriginalEdgeDataWriter::new(BufWriter::new(original_edge_file))?;

        let timer = Instant::now();
        self.compress_geometry()?;
        let geometry_time = timer.elapsed();

        let timer = Instant::now();
        self.renumber_edges();
        let renumber_time = timer.elapsed();

        let timer = Instant::now();
        self.generate_edge_expanded_nodes()?;
        let nodes_time = timer.elapsed();

        let timer = Instant::now();
        self.generate_edge_expanded_edges(&mut original_edges)?;
        original_edges.finish()?;
        let edges_time = timer.elapsed();

        let timer = Instant::now();
        self.generate_edge_based_node_data()?;
        let node_data_time = timer.elapsed();

        let mut geometry_writer = BufWriter::new(geometry_file);
        self.compressor.serialize(&mut geometry_writer)?;
        geometry_writer.flush()?;

        info!(
            geometry_s = geometry_time.as_secs_f64(),
            renumber_s = renumber_time.as_secs_f64(),
            nodes_s = nodes_time.as_secs_f64(),
            edges_s = edges_time.as_secs_f64(),
            node_data_s = node_data_time.as_secs_f64(),
            "timing statistics for edge-expanded graph"
        );

        self.stats.geometry = self.compressor.statistics();
        self.stats.live_restrictions = self.restrictions.len() as u64;
        self.stats.edge_based_nodes = self.number_of_edge_based_nodes as u64;
        self.stats.edge_based_node_segments = self.edge_based_nodes.len() as u64;
        self.stats.edge_based_edges = self.edge_based_edges.len() as u64;

        Ok(EdgeExpandedGraph {
            nodes: self.edge_based_nodes,
            edges: self.edge_based_edges,
            node_data: self.node_data,
            number_of_edge_based_nodes: self.number_of_edge_based_nodes,
            stats: self.stats,
        })
    }

    fn compress_geometry(&mut self) -> Result<()> {
        info!("removing graph geometry while preserving topology");

        let original_number_of_nodes = self.graph.number_of_nodes();
        let original_number_of_edges = self.graph.number_of_edges();
        let signal_penalty = self.profile.traffic_signal_penalty_ds;
        let mut progress = Percent::new("compress geometry", original_number_of_nodes as u64);
        let mut removed_nodes = 0u64;

        for v in 0..original_number_of_nodes {
            progress.print_status(v as u64);

            // only degree 2 vertices that are neither barriers nor restriction vias
            if self.graph.out_degree(v) != 2 {
                continue;
            }
            if self.barrier_nodes.contains(&v) {
                continue;
            }
            if self.restrictions.is_via_node(v) {
                continue;
            }

            let begin = self.graph.begin_edges(v);
            let reverse_edge_order = !self.graph.data(begin).forward as EdgeId;
            let forward_e2 = begin + reverse_edge_order;
            let reverse_e2 = begin + 1 - reverse_edge_order;

            let w = self.graph.target(forward_e2);
            let u = self.graph.target(reverse_e2);
            if u == w {
                continue;
            }

            let forward_e1 = self.graph.find_edge(u, v).ok_or_else(|| missing_edge(u, v))?;
            let reverse_e1 = self.graph.find_edge(w, v).ok_or_else(|| missing_edge(w, v))?;

            if self.graph.find_edge_in_either_direction(u, w).is_some() {
                continue;
            }

            let forward_data_1 = *self.graph.data(forward_e1);
            let forward_data_2 = *self.graph.data(forward_e2);
            let reverse_data_1 = *self.graph.data(reverse_e1);
            let reverse_data_2 = *self.graph.data(reverse_e2);
            if !forward_data_1.is_compatible_to(&forward_data_2)
                || !reverse_data_1.is_compatible_to(&reverse_data_2)
            {
                continue;
            }

            let node_penalty = if self.traffic_lights.contains(&v) {
                signal_penalty
            } else {
                0
            };

            let overflow = || {
                Error::InvalidInput(format!(
                    "weight of the chain compressed through node {v} overflows"
                ))
            };
            let forward_weight_1 = forward_data_1
                .distance
                .checked_add(node_penalty)
                .ok_or_else(overflow)?;
            let reverse_weight_2 = reverse_data_2
                .distance
                .checked_add(node_penalty)
                .ok_or_else(overflow)?;
            let forward_distance = forward_weight_1
                .checked_add(forward_data_2.distance)
                .ok_or_else(overflow)?;
            let reverse_distance = reverse_data_1
                .distance
                .checked_add(reverse_weight_2)
                .ok_or_else(overflow)?;

            self.graph.data_mut(forward_e1).distance = forward_distance;
            self.graph.data_mut(reverse_e1).distance = reverse_distance;

            self.graph.set_target(forward_e1, w);
            self.graph.set_target(reverse_e1, u);

            // deleting moves the last edge of v, so the higher id goes first
            self.graph.delete_edge(v, forward_e2.max(reverse_e2));
            self.graph.delete_edge(v, forward_e2.min(reverse_e2));

            self.restrictions.fixup_starting_turn_restriction(u, v, w);
            self.restrictions
                .fixup_arriving_turn_restriction(u, v, w, &*self.graph);
            self.restrictions.fixup_starting_turn_restriction(w, v, u);
            self.restrictions
                .fixup_arriving_turn_restriction(w, v, u, &*self.graph);

            self.compressor.compress_edge(
                forward_e1,
                forward_e2,
                v,
                w,
                forward_weight_1,
                forward_data_2.distance,
            );
            self.compressor.compress_edge(
                reverse_e1,
                reverse_e2,
                v,
                u,
                reverse_data_1.distance,
                reverse_weight_2,
            );
            removed_nodes += 1;
        }

        info!(removed_nodes, "removed nodes");
        self.compressor.print_statistics();

        let mut new_node_count = 0u64;
        let mut new_edge_count = 0u64;
        for node in 0..self.graph.number_of_nodes() {
            let degree = self.graph.out_degree(node);
            if degree > 0 {
                new_node_count += 1;
                new_edge_count += degree as u64;
            }
        }

        self.stats.removed_nodes = removed_nodes;
        self.stats.node_compression_ratio =
            new_node_count as f64 / original_number_of_nodes.max(1) as f64;
        self.stats.edge_compression_ratio =
            new_edge_count as f64 / original_number_of_edges.max(1) as f64;
        info!(
            new_nodes = new_node_count,
            new_edges = new_edge_count,
            node_compression_ratio = self.stats.node_compression_ratio,
            edge_compression_ratio = self.stats.edge_compression_ratio,
            "compressed node-based graph"
        );
        Ok(())
    }

    /// Dense id for every drivable edge, in node and adjacency order
    fn renumber_edges(&mut self) {
        let mut numbered_edges_count = 0u32;
        for node in 0..self.graph.number_of_nodes() {
            for edge in self.graph.adjacent_edge_range(node) {
                let data = self.graph.data_mut(edge);
                if !data.forward {
                    continue;
                }
                data.edge_based_node_id = numbered_edges_count;
                numbered_edges_count += 1;
            }
        }
        self.number_of_edge_based_nodes = numbered_edges_count;
        debug!(edge_based_nodes = numbered_edges_count, "renumbered edges");
    }

    fn generate_edge_expanded_nodes(&mut self) -> Result<()> {
        info!("identifying components of the compressed road network");
        let components = tarjan_components(&*self.graph, &self.restrictions, self.barrier_nodes);

        // elided nodes are left behind as singletons
        self.stats.components =
            (components.number_of_components() as u64).saturating_sub(self.stats.removed_nodes);
        self.stats.size_one_components =
            (components.size_one_count() as u64).saturating_sub(self.stats.removed_nodes);
        info!(
            components = self.stats.components,
            size_one = self.stats.size_one_components,
            "identified components"
        );

        let number_of_nodes = self.graph.number_of_nodes();
        let mut progress = Percent::new("edge-expanded nodes", number_of_nodes as u64);
        for u in 0..number_of_nodes {
            progress.print_status(u as u64);
            for e1 in self.graph.adjacent_edge_range(u) {
                let v = self.graph.target(e1);
                // every pair once
                if u > v {
                    continue;
                }

                // Edges ending at barriers or restrictions may join two
                // components, the smaller one is used.
                let size_u = components.component_size(u);
                let size_v = components.component_size(v);
                let id_of_smaller_component = if size_u < size_v {
                    components.component_id(u)
                } else {
                    components.component_id(v)
                };
                let component_id = if size_u.min(size_v) < TINY_COMPONENT_THRESHOLD {
                    id_of_smaller_component + 1
                } else {
                    0
                };

                if edge_or_none(self.graph.data(e1).edge_based_node_id).is_none() {
                    self.insert_edge_based_node(v, u, component_id)?;
                } else {
                    self.insert_edge_based_node(u, v, component_id)?;
                }
            }
        }

        info!(
            edge_based_nodes = self.edge_based_nodes.len(),
            "generated edge-expanded nodes"
        );
        Ok(())
    }

    fn insert_edge_based_node(&mut self, u: NodeId, v: NodeId, component_id: u32) -> Result<()> {
        let e1 = self.graph.find_edge(u, v).ok_or_else(|| missing_edge(u, v))?;
        let e2 = self.graph.find_edge(v, u).ok_or_else(|| missing_edge(v, u))?;

        let forward_data = *self.graph.data(e1);
        let reverse_data = *self.graph.data(e2);
        if edge_or_none(forward_data.edge_based_node_id).is_none()
            && edge_or_none(reverse_data.edge_based_node_id).is_none()
        {
            return Ok(());
        }

        let travel_mode = |data: &NodeBasedEdgeData| {
            if data.forward {
                data.travel_mode
            } else {
                TRAVEL_MODE_INACCESSIBLE
            }
        };
        let inconsistent = || Error::InconsistentGeometry {
            forward: forward_data.edge_based_node_id,
            reverse: reverse_data.edge_based_node_id,
        };

        let node = EdgeBasedNode {
            forward_way_id: forward_data.way_id,
            reverse_way_id: reverse_data.way_id,
            forward_edge_based_node_id: forward_data.edge_based_node_id,
            reverse_edge_based_node_id: reverse_data.edge_based_node_id,
            u,
            v,
            name_id: forward_data.name_id,
            forward_weight: forward_data.distance,
            reverse_weight: reverse_data.distance,
            forward_offset: 0,
            reverse_offset: 0,
            packed_geometry_id: SPECIAL_EDGEID,
            component_id,
            fwd_segment_position: 0,
            forward_travel_mode: travel_mode(&forward_data),
            backward_travel_mode: travel_mode(&reverse_data),
        };

        if self.compressor.has_entry_for_id(e1) != self.compressor.has_entry_for_id(e2) {
            return Err(inconsistent());
        }
        let Some(packed_geometry_id) = self.compressor.position_for_id(e1) else {
            self.edge_based_nodes.push(node);
            return Ok(());
        };

        let forward_geometry = self.compressor.bucket(e1);
        let reverse_geometry = self.compressor.bucket(e2);
        if forward_geometry.len() != reverse_geometry.len() {
            return Err(inconsistent());
        }
        let geometry_size = forward_geometry.len();
        let forward_offsets = self.compressor.prefix_sums(e1);

        // Walk the forward bucket from the front and the reverse one from the back
        let mut current_source = u;
        let mut reverse_sum: EdgeWeight = 0;
        for i in 0..geometry_size {
            let (reverse_source, reverse_weight) = reverse_geometry[geometry_size - 1 - i];
            if reverse_source != current_source {
                return Err(inconsistent());
            }
            let (current_target, forward_weight) = forward_geometry[i];
            if current_target == current_source {
                return Err(Error::DuplicateGeometryNode {
                    node: current_target,
                    edge_based_node: forward_data.edge_based_node_id,
                });
            }
            reverse_sum += reverse_weight;

            self.edge_based_nodes.push(EdgeBasedNode {
                u: current_source,
                v: current_target,
                forward_weight,
                reverse_weight,
                forward_offset: forward_offsets[i],
                reverse_offset: reverse_data.distance - reverse_sum,
                packed_geometry_id,
                fwd_segment_position: i as u32,
                ..node
            });
            current_source = current_target;
        }

        if current_source != v {
            return Err(inconsistent());
        }
        Ok(())
    }

    fn generate_edge_expanded_edges<W: Write + Seek>(
        &mut self,
        original_edges: &mut OriginalEdgeDataWriter<W>,
    ) -> Result<()> {
        info!("generating edge-expanded edges");

        let graph: &NodeBasedDynamicGraph = &*self.graph;
        let signal_penalty = self.profile.traffic_signal_penalty_ds;
        let u_turn_penalty = self.profile.u_turn_penalty_ds;
        let number_of_nodes = graph.number_of_nodes();
        let mut progress = Percent::new("edge-expanded edges", number_of_nodes as u64);

        for u in 0..number_of_nodes {
            progress.print_status(u as u64);
            for e1 in graph.adjacent_edge_range(u) {
                let edge_data_1 = graph.data(e1);
                if !edge_data_1.forward {
                    continue;
                }
                self.stats.node_based_edges_scanned += 1;

                let v = graph.target(e1);
                let only_target = self.restrictions.check_for_emanating_is_only_turn(u, v);
                let is_barrier_node = self.barrier_nodes.contains(&v);

                for e2 in graph.adjacent_edge_range(v) {
                    let edge_data_2 = graph.data(e2);
                    if !edge_data_2.forward {
                        continue;
                    }
                    let w = graph.target(e2);

                    if is_barrier_node {
                        // doubling back is the only way out of a barrier
                        if w != u {
                            self.stats.skipped_barrier_turns += 1;
                            continue;
                        }
                    } else if w == u {
                        self.stats.skipped_uturns += 1;
                        continue;
                    }

                    if only_target.is_some_and(|target| target != w) {
                        self.stats.restricted_turns += 1;
                        continue;
                    }
                    if self.restrictions.check_if_turn_is_restricted(u, v, w) {
                        self.stats.restricted_turns += 1;
                        continue;
                    }

                    let mut distance = edge_data_1.distance;
                    if self.traffic_lights.contains(&v) {
                        distance = distance.saturating_add(signal_penalty);
                    }

                    // neighbours of v along the original geometry
                    let first = self.compressor.last_node_id_of_bucket(e1).unwrap_or(u);
                    let third = self.compressor.first_node_id_of_bucket(e2).unwrap_or(w);
                    let angle = compute_angle(
                        &self.node_info[first as usize],
                        &self.node_info[v as usize],
                        &self.node_info[third as usize],
                    );

                    let turn_penalty = match self.turn_penalty.turn_penalty(180.0 - angle) {
                        Ok(penalty) => penalty,
                        Err(error) => {
                            warn!(u, v, w, angle, %error, "turn penalty failed, using 0");
                            self.stats.penalty_failures += 1;
                            0
                        }
                    };

                    let turn_instruction = analyze_turn(
                        u,
                        w,
                        angle,
                        edge_data_1,
                        edge_data_2,
                        graph.out_degree(v),
                        graph.directed_out_degree(v),
                    );
                    if turn_instruction == TurnInstruction::UTurn {
                        distance = distance.saturating_add(u_turn_penalty);
                    }
                    distance = distance.saturating_add(turn_penalty);

                    let compressed_position = self.compressor.position_for_id(e1);
                    if compressed_position.is_some() {
                        self.stats.compressed_turns += 1;
                    }

                    original_edges.push(OriginalEdgeData {
                        via_node: compressed_position.unwrap_or(v),
                        name_id: edge_data_1.name_id,
                        turn_instruction,
                        compressed: compressed_position.is_some(),
                        travel_mode: edge_data_2.travel_mode,
                    })?;

                    let edge_id = self.edge_based_edges.len() as u32;
                    self.edge_based_edges.push(EdgeBasedEdge {
                        source: edge_data_1.edge_based_node_id,
                        target: edge_data_2.edge_based_node_id,
                        edge_id,
                        weight: distance,
                        forward: true,
                        backward: false,
                    });
                }
            }
        }

        info!(
            node_based_edges = self.stats.node_based_edges_scanned,
            edge_based_edges = self.edge_based_edges.len(),
            restricted_turns = self.stats.restricted_turns,
            skipped_uturns = self.stats.skipped_uturns,
            skipped_barrier_turns = self.stats.skipped_barrier_turns,
            compressed_turns = self.stats.compressed_turns,
            penalty_failures = self.stats.penalty_failures,
            "generated edge-expanded edges"
        );
        Ok(())
    }

    /// Node sequence `source, ..., target` of a drivable edge
    fn unpacked_nodes(&self, source: NodeId, edge: EdgeId) -> Vec<NodeId> {
        std::iter::once(source)
            .chain(self.compressor.unpack(edge))
            .chain(std::iter::once(self.graph.target(edge)))
            .collect()
    }

    fn segment(&self, way_id: u64, from: NodeId, to: NodeId) -> SegmentInfo {
        let a = &self.node_info[from as usize];
        let b = &self.node_info[to as usize];
        SegmentInfo {
            way_id,
            lat1: a.lat as f64 / COORDINATE_PRECISION,
            lon1: a.lon as f64 / COORDINATE_PRECISION,
            lat2: b.lat as f64 / COORDINATE_PRECISION,
            lon2: b.lon as f64 / COORDINATE_PRECISION,
        }
    }

    fn generate_edge_based_node_data(&mut self) -> Result<()> {
        let total = self.number_of_edge_based_nodes as usize;
        let mut node_data = vec![EdgeBasedNodeData::default(); total];
        let mut sequences: Vec<Vec<NodeId>> = vec![Vec::new(); total];
        let mut times_filled = vec![0u32; total];

        for current_node in 0..self.graph.number_of_nodes() {
            for edge in self.graph.adjacent_edge_range(current_node) {
                let edge_data = self.graph.data(edge);
                if !edge_data.forward {
                    continue;
                }
                let id = edge_data.edge_based_node_id;
                let nodes = self.unpacked_nodes(current_node, edge);
                let compressed = self.compressor.has_entry_for_id(edge);

                let mut segments = Vec::with_capacity(nodes.len() - 1);
                for pair in nodes.windows(2) {
                    let (from, to) = (pair[0], pair[1]);
                    if from == to {
                        return Err(Error::DuplicateGeometryNode {
                            node: from,
                            edge_based_node: id,
                        });
                    }
                    let way_id = if compressed {
                        let original = self
                            .original_graph
                            .find_edge(from, to)
                            .ok_or_else(|| missing_edge(from, to))?;
                        self.original_graph.data(original).way_id
                    } else {
                        edge_data.way_id
                    };
                    segments.push(self.segment(way_id, from, to));
                }

                times_filled[id as usize] += 1;
                node_data[id as usize] = EdgeBasedNodeData { segments };
                sequences[id as usize] = nodes;
            }
        }

        if let Some((id, &times)) = times_filled
            .iter()
            .enumerate()
            .find(|&(_, &times)| times != 1)
        {
            return Err(Error::UnfilledEdgeBasedNode {
                id: id as EdgeId,
                times,
            });
        }

        // Both drivable directions of an edge must trace the same nodes
        for u in 0..self.graph.number_of_nodes() {
            for forward_edge in self.graph.adjacent_edge_range(u) {
                let forward = self.graph.data(forward_edge);
                let v = self.graph.target(forward_edge);
                if !forward.forward || u > v {
                    continue;
                }
                for reverse_edge in self.graph.adjacent_edge_range(v) {
                    let reverse = self.graph.data(reverse_edge);
                    if !reverse.forward || self.graph.target(reverse_edge) != u {
                        continue;
                    }
                    let forward_id = forward.edge_based_node_id;
                    let reverse_id = reverse.edge_based_node_id;
                    let forward_nodes = &sequences[forward_id as usize];
                    let reverse_nodes = &sequences[reverse_id as usize];
                    if !forward_nodes.iter().eq(reverse_nodes.iter().rev()) {
                        return Err(Error::InconsistentGeometry {
                            forward: forward_id,
                            reverse: reverse_id,
                        });
                    }
                }
            }
        }

        info!(count = node_data.len(), "edge-based node data");
        self.node_data = node_data;
        Ok(())
    }
}
