//! Turn restrictions over the node-based graph
//!
//! A restriction forbids (or, for `is_only`, mandates) the turn
//! `from -> via -> to`. Restrictions are grouped by their `(from, via)` pair;
//! each group owns a bucket of targets. Compression of the graph rewrites the
//! keys and targets in place through the two `fixup_*` operations.
//!
//! ## Only-restriction precedence
//!
//! A bucket holds at most one `is_only` target. Inserting an `is_only` target
//! clears whatever the bucket held before; once a bucket starts with an
//! `is_only` target every later insertion for the same pair is ignored.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;
use turnpike_common::{node_or_none, EdgeId, NodeId, SPECIAL_EDGEID};

use crate::graph::NodeBasedDynamicGraph;

/// One member of a restriction relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionTarget {
    Node(NodeId),
    Way(EdgeId),
}

impl RestrictionTarget {
    /// Node id when this member is a resolved node
    pub fn as_node(&self) -> Option<NodeId> {
        match *self {
            RestrictionTarget::Node(id) => node_or_none(id),
            RestrictionTarget::Way(_) => None,
        }
    }
}

impl Default for RestrictionTarget {
    fn default() -> Self {
        RestrictionTarget::Way(SPECIAL_EDGEID)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRestriction {
    pub from: RestrictionTarget,
    pub via: RestrictionTarget,
    pub to: RestrictionTarget,
    #[serde(default)]
    pub is_only: bool,
    #[serde(default)]
    pub uses_via_way: bool,
}

impl TurnRestriction {
    /// Node-only restriction `from -> via -> to`
    pub fn new(from: NodeId, via: NodeId, to: NodeId, is_only: bool) -> Self {
        Self {
            from: RestrictionTarget::Node(from),
            via: RestrictionTarget::Node(via),
            to: RestrictionTarget::Node(to),
            is_only,
            uses_via_way: false,
        }
    }

    /// `(from, via, to)` when every member is a resolved node
    pub fn resolved(&self) -> Option<(NodeId, NodeId, NodeId)> {
        if self.uses_via_way {
            return None;
        }
        Some((self.from.as_node()?, self.via.as_node()?, self.to.as_node()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RestrictionSource {
    start_node: NodeId,
    via_node: NodeId,
}

impl RestrictionSource {
    fn new(start_node: NodeId, via_node: NodeId) -> Self {
        Self {
            start_node,
            via_node,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BucketEntry {
    target_node: NodeId,
    is_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RestrictionMap {
    index: FxHashMap<RestrictionSource, usize>,
    buckets: Vec<Vec<BucketEntry>>,
    start_nodes: FxHashSet<NodeId>,
    via_nodes: FxHashSet<NodeId>,
    count: usize,
}

impl RestrictionMap {
    /// Group restrictions by `(from, via)`. Unresolved restrictions are skipped.
    pub fn new(restrictions: &[TurnRestriction]) -> Self {
        let mut map = Self::default();
        let mut unresolved = 0usize;

        for restriction in restrictions {
            let Some((from, via, to)) = restriction.resolved() else {
                unresolved += 1;
                continue;
            };

            map.start_nodes.insert(from);
            map.via_nodes.insert(via);

            let source = RestrictionSource::new(from, via);
            let bucket_index = match map.index.get(&source) {
                None => {
                    let bucket_index = map.buckets.len();
                    map.buckets.push(Vec::new());
                    map.index.insert(source, bucket_index);
                    bucket_index
                }
                Some(&bucket_index) => {
                    let bucket = &mut map.buckets[bucket_index];
                    if bucket.first().is_some_and(|entry| entry.is_only) {
                        continue;
                    }
                    if restriction.is_only {
                        map.count -= bucket.len();
                        bucket.clear();
                    }
                    bucket_index
                }
            };

            map.count += 1;
            map.buckets[bucket_index].push(BucketEntry {
                target_node: to,
                is_only: restriction.is_only,
            });
        }

        debug!(
            restrictions = map.count,
            buckets = map.buckets.len(),
            unresolved,
            "built restriction map"
        );
        map
    }

    /// Number of live restriction targets
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether `node` is the via node of any restriction
    pub fn is_via_node(&self, node: NodeId) -> bool {
        self.via_nodes.contains(&node)
    }

    fn is_source_node(&self, node: NodeId) -> bool {
        self.start_nodes.contains(&node)
    }

    fn bucket(&self, u: NodeId, v: NodeId) -> Option<&[BucketEntry]> {
        self.index
            .get(&RestrictionSource::new(u, v))
            .map(|&i| self.buckets[i].as_slice())
    }

    /// Target of the only-restriction that starts with `u -> v`, if any
    pub fn check_for_emanating_is_only_turn(&self, u: NodeId, v: NodeId) -> Option<NodeId> {
        if !self.is_source_node(u) {
            return None;
        }
        self.bucket(u, v)?
            .iter()
            .find(|entry| entry.is_only)
            .map(|entry| entry.target_node)
    }

    /// Whether the turn `u -> v -> w` is forbidden
    pub fn check_if_turn_is_restricted(&self, u: NodeId, v: NodeId, w: NodeId) -> bool {
        if !self.is_source_node(u) {
            return false;
        }
        let Some(bucket) = self.bucket(u, v) else {
            return false;
        };
        bucket.iter().any(|entry| {
            if entry.is_only {
                entry.target_node != w
            } else {
                entry.target_node == w
            }
        })
    }

    /// Edge `v -> w` has been merged into `u -> w`: restrictions that started
    /// on `(v, w)` now start on `(u, w)`.
    pub fn fixup_starting_turn_restriction(&mut self, u: NodeId, v: NodeId, w: NodeId) {
        if !self.is_source_node(v) {
            return;
        }
        let Some(bucket_index) = self.index.remove(&RestrictionSource::new(v, w)) else {
            return;
        };
        self.start_nodes.insert(u);
        self.index
            .entry(RestrictionSource::new(u, w))
            .or_insert(bucket_index);
    }

    /// Node `v` has been elided from `u - v - w`, so the edge leaving `u`
    /// towards `v` now ends at `w`. Restrictions via `u` that targeted `v`
    /// target `w` instead.
    pub fn fixup_arriving_turn_restriction(
        &mut self,
        u: NodeId,
        v: NodeId,
        w: NodeId,
        graph: &NodeBasedDynamicGraph,
    ) {
        if !self.is_via_node(u) {
            return;
        }

        let predecessors: Vec<NodeId> = graph
            .adjacent_edge_range(u)
            .map(|edge| graph.target(edge))
            .filter(|&x| x != v)
            .collect();

        for x in predecessors {
            let Some(&bucket_index) = self.index.get(&RestrictionSource::new(x, u)) else {
                continue;
            };
            for entry in &mut self.buckets[bucket_index] {
                if entry.target_node == v {
                    entry.target_node = w;
                }
            }
        }
    }
}
