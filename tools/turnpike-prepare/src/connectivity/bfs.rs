//! Undirected breadth-first component explorer

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::debug;
use turnpike_common::NodeId;

use super::ComponentMap;
use crate::graph::NodeBasedDynamicGraph;
use crate::progress::Percent;
use crate::restriction::RestrictionMap;

const UNASSIGNED: u32 = u32::MAX;

/// Assign every node to a component of legal-turn reachability, ignoring edge
/// directions. U-turns are never explored and barrier nodes are dead ends.
pub fn bfs_components(
    graph: &NodeBasedDynamicGraph,
    restrictions: &RestrictionMap,
    barrier_nodes: &FxHashSet<NodeId>,
) -> ComponentMap {
    let number_of_nodes = graph.number_of_nodes();
    let mut component_ids = vec![UNASSIGNED; number_of_nodes as usize];
    let mut component_sizes = Vec::new();
    // (node, parent) pairs
    let mut queue: VecDeque<(NodeId, NodeId)> = VecDeque::new();
    let mut progress = Percent::new("bfs components", number_of_nodes as u64);

    for start in 0..number_of_nodes {
        progress.print_status(start as u64);
        if component_ids[start as usize] != UNASSIGNED {
            continue;
        }

        let component = component_sizes.len() as u32;
        component_ids[start as usize] = component;
        let mut size = 1u32;
        queue.push_back((start, start));

        while let Some((v, parent)) = queue.pop_front() {
            if barrier_nodes.contains(&v) {
                continue;
            }
            let only_target = restrictions.check_for_emanating_is_only_turn(parent, v);

            for edge in graph.adjacent_edge_range(v) {
                let w = graph.target(edge);
                if only_target.is_some_and(|target| target != w) {
                    continue;
                }
                if w == parent {
                    continue;
                }
                if restrictions.check_if_turn_is_restricted(parent, v, w) {
                    continue;
                }
                if component_ids[w as usize] == UNASSIGNED {
                    component_ids[w as usize] = component;
                    size += 1;
                    queue.push_back((w, v));
                }
            }
        }

        component_sizes.push(size);
    }

    debug!(components = component_sizes.len(), "bfs exploration done");
    ComponentMap::new(component_ids, component_sizes)
}
