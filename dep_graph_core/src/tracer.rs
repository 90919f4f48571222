//! The tracer (§4.G): transitive closure of invalidated nodes over
//! `orderedUses`, with a persistent traced-flag per node.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::node::NodeId;
use crate::node_finder::NodeFinder;

/// Tracks which nodes have been visited since the last reset. Traversal
/// is a worklist BFS; visiting an already-traced node is a no-op, which
/// is what gives the engine its idempotence (§8: a second trace with the
/// same seeds returns nothing).
#[derive(Default)]
pub struct Tracer {
    traced: FxHashSet<NodeId>,
}

impl Tracer {
    pub fn new() -> Self {
        Tracer::default()
    }

    pub fn is_traced(&self, id: NodeId) -> bool {
        self.traced.contains(&id)
    }

    /// Traces from `seeds`, following `finder.ordered_uses`. Returns the
    /// previously-untraced nodes reached, in visitation order (seeds
    /// included, reflexively, when not already traced).
    pub fn trace(
        &mut self,
        seeds: impl IntoIterator<Item = NodeId>,
        finder: &NodeFinder,
    ) -> Vec<NodeId> {
        let mut newly_traced = Vec::new();
        let mut worklist: VecDeque<NodeId> = VecDeque::new();

        for seed in seeds {
            if self.traced.insert(seed) {
                newly_traced.push(seed);
                worklist.push_back(seed);
            }
        }

        while let Some(id) = worklist.pop_front() {
            for use_id in finder.ordered_uses(id) {
                if self.traced.insert(use_id) {
                    newly_traced.push(use_id);
                    worklist.push_back(use_id);
                }
            }
        }

        newly_traced
    }

    /// Clears the traced flag on `nodes`, so a subsequent trace will
    /// re-propagate through them. Used after a reload detects changes.
    pub fn ensure_will_retrace(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        for id in nodes {
            self.traced.remove(&id);
        }
    }
}
