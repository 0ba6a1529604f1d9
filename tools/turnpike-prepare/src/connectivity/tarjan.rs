//! Strongly connected components without recursion
//!
//! Tarjan's algorithm driven by an explicit stack of `(node, parent)` frames.
//! Every node is pushed twice: once for the work done before descending into
//! its children and once, underneath them, for the work done after. A per-node
//! flag tells the two visits apart. Only edges flagged `forward` are followed.

use rustc_hash::FxHashSet;
use tracing::{debug, info};
use turnpike_common::NodeId;

use super::ComponentMap;
use crate::graph::NodeBasedDynamicGraph;
use crate::progress::Percent;
use crate::restriction::RestrictionMap;

const UNVISITED: u32 = u32::MAX;

/// Components above this size are logged individually
const LARGE_COMPONENT_SIZE: u32 = 1000;

#[derive(Debug, Clone, Copy)]
struct TarjanNode {
    index: u32,
    low_link: u32,
    on_stack: bool,
}

impl Default for TarjanNode {
    fn default() -> Self {
        Self {
            index: UNVISITED,
            low_link: UNVISITED,
            on_stack: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TarjanStackFrame {
    v: NodeId,
    parent: NodeId,
}

pub fn tarjan_components(
    graph: &NodeBasedDynamicGraph,
    restrictions: &RestrictionMap,
    barrier_nodes: &FxHashSet<NodeId>,
) -> ComponentMap {
    let number_of_nodes = graph.number_of_nodes();

    let mut recursion_stack: Vec<TarjanStackFrame> = Vec::new();
    let mut tarjan_stack: Vec<NodeId> = Vec::new();
    let mut tarjan_nodes = vec![TarjanNode::default(); number_of_nodes as usize];
    let mut before_recursion = vec![true; number_of_nodes as usize];
    let mut component_ids = vec![UNVISITED; number_of_nodes as usize];
    let mut component_sizes: Vec<u32> = Vec::new();
    let mut index = 0u32;
    let mut progress = Percent::new("tarjan components", number_of_nodes as u64);

    for node in 0..number_of_nodes {
        progress.print_status(node as u64);
        if component_ids[node as usize] == UNVISITED {
            recursion_stack.push(TarjanStackFrame {
                v: node,
                parent: node,
            });
        }

        while let Some(frame) = recursion_stack.pop() {
            let v = frame.v;
            let vi = v as usize;

            if before_recursion[vi] && tarjan_nodes[vi].index != UNVISITED {
                // Reached again through another edge before this frame came up
                if tarjan_nodes[vi].on_stack {
                    let reached = tarjan_nodes[vi].index;
                    let parent = &mut tarjan_nodes[frame.parent as usize];
                    parent.low_link = parent.low_link.min(reached);
                }
                continue;
            }

            if before_recursion[vi] {
                recursion_stack.push(frame);
                before_recursion[vi] = false;

                tarjan_nodes[vi] = TarjanNode {
                    index,
                    low_link: index,
                    on_stack: true,
                };
                tarjan_stack.push(v);
                index += 1;

                let is_barrier = barrier_nodes.contains(&v);
                let only_target = restrictions.check_for_emanating_is_only_turn(frame.parent, v);

                for edge in graph.adjacent_edge_range(v) {
                    if !graph.data(edge).forward {
                        continue;
                    }
                    let vprime = graph.target(edge);

                    if is_barrier && vprime != frame.parent {
                        continue;
                    }
                    if only_target.is_some_and(|target| target != vprime) {
                        continue;
                    }
                    if restrictions.check_if_turn_is_restricted(frame.parent, v, vprime) {
                        continue;
                    }

                    let target = tarjan_nodes[vprime as usize];
                    if target.index == UNVISITED {
                        recursion_stack.push(TarjanStackFrame { v: vprime, parent: v });
                    } else if target.on_stack && target.index < tarjan_nodes[vi].low_link {
                        tarjan_nodes[vi].low_link = target.index;
                    }
                }
            } else {
                before_recursion[vi] = true;
                let low_link = tarjan_nodes[vi].low_link;
                let parent = &mut tarjan_nodes[frame.parent as usize];
                parent.low_link = parent.low_link.min(low_link);

                if tarjan_nodes[vi].low_link == tarjan_nodes[vi].index {
                    let component = component_sizes.len() as u32;
                    let mut size = 0u32;
                    while let Some(vprime) = tarjan_stack.pop() {
                        tarjan_nodes[vprime as usize].on_stack = false;
                        component_ids[vprime as usize] = component;
                        size += 1;
                        if vprime == v {
                            break;
                        }
                    }

                    if size > LARGE_COMPONENT_SIZE {
                        debug!(component, size, "large component");
                    }
                    component_sizes.push(size);
                }
            }
        }
    }

    let components = ComponentMap::new(component_ids, component_sizes);
    info!(
        components = components.number_of_components(),
        size_one = components.size_one_count(),
        "identified strongly connected components"
    );
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ImportEdge;
    use crate::restriction::TurnRestriction;

    fn oneway(source: NodeId, target: NodeId) -> ImportEdge {
        ImportEdge {
            backward: false,
            ..ImportEdge::new(source, target, 10)
        }
    }

    #[test]
    fn test_directed_cycle_and_tail() {
        // 0 -> 1 -> 2 -> 0, 2 -> 3
        let g = NodeBasedDynamicGraph::from_import_edges(
            4,
            &[oneway(0, 1), oneway(1, 2), oneway(2, 0), oneway(2, 3)],
        );
        let c = tarjan_components(&g, &RestrictionMap::default(), &FxHashSet::default());

        assert_eq!(c.number_of_components(), 2);
        assert_eq!(c.component_size(0), 3);
        assert_eq!(c.component_id(0), c.component_id(1));
        assert_eq!(c.component_id(1), c.component_id(2));
        assert_eq!(c.component_size(3), 1);
        assert_eq!(c.size_one_count(), 1);
        // sink completes first
        assert_eq!(c.component_id(3), 0);
    }

    #[test]
    fn test_oneway_chain_is_all_singletons() {
        let g = NodeBasedDynamicGraph::from_import_edges(
            4,
            &[oneway(0, 1), oneway(1, 2), oneway(2, 3)],
        );
        let c = tarjan_components(&g, &RestrictionMap::default(), &FxHashSet::default());
        assert_eq!(c.number_of_components(), 4);
        assert_eq!(c.size_one_count(), 4);
    }

    #[test]
    fn test_two_way_street_is_one_component() {
        let g = NodeBasedDynamicGraph::from_import_edges(
            3,
            &[ImportEdge::new(0, 1, 10), ImportEdge::new(1, 2, 10)],
        );
        let c = tarjan_components(&g, &RestrictionMap::default(), &FxHashSet::default());
        assert_eq!(c.number_of_components(), 1);
        assert_eq!(c.component_size(2), 3);
    }

    #[test]
    fn test_node_reached_twice_before_its_frame() {
        // 0 -> 1, 0 -> 2, 2 -> 1, 1 -> 0: node 1 is pushed by 0 and by 2
        let g = NodeBasedDynamicGraph::from_import_edges(
            3,
            &[oneway(0, 1), oneway(0, 2), oneway(2, 1), oneway(1, 0)],
        );
        let c = tarjan_components(&g, &RestrictionMap::default(), &FxHashSet::default());
        assert_eq!(c.number_of_components(), 1);
        assert_eq!(c.component_size(0), 3);
    }

    #[test]
    fn test_restriction_breaks_cycle() {
        // Square 0 -> 1 -> 2 -> 3 -> 0 where 0 -> 1 -> 2 is forbidden
        let g = NodeBasedDynamicGraph::from_import_edges(
            4,
            &[oneway(0, 1), oneway(1, 2), oneway(2, 3), oneway(3, 0)],
        );
        let open = tarjan_components(&g, &RestrictionMap::default(), &FxHashSet::default());
        assert_eq!(open.number_of_components(), 1);

        let restrictions = RestrictionMap::new(&[TurnRestriction::new(0, 1, 2, false)]);
        let closed = tarjan_components(&g, &restrictions, &FxHashSet::default());
        assert!(closed.number_of_components() > 1);
    }

    #[test]
    fn test_barrier_only_allows_doubling_back() {
        // 0 - 1 - [2] - 3, all two-way
        let g = NodeBasedDynamicGraph::from_import_edges(
            4,
            &[
                ImportEdge::new(0, 1, 10),
                ImportEdge::new(1, 2, 10),
                ImportEdge::new(2, 3, 10),
            ],
        );
        let barriers: FxHashSet<NodeId> = [2].into_iter().collect();
        let c = tarjan_components(&g, &RestrictionMap::default(), &barriers);
        assert_eq!(c.component_id(0), c.component_id(2));
        assert_ne!(c.component_id(0), c.component_id(3));
    }
}
