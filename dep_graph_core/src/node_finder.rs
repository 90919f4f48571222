//! The indexed node store (§4.D): nodes keyed by `(source, key)` and by
//! `key` alone, plus the def→use multimap.
//!
//! Nodes live in an arena (`slots`) addressed by [`NodeId`]; every other
//! index stores handles, never node data, so a node is mutated only by
//! replacing its arena slot (§3 lifecycle).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::EngineError;
use crate::key::{Aspect, DependencyKey};
use crate::node::{Node, NodeId, Source};

#[derive(Default)]
pub struct NodeFinder {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,

    /// Owned nodes, indexed by their full identity.
    by_source_key: FxHashMap<(Source, DependencyKey), NodeId>,
    /// The at-most-one expat per key (§3 invariant 1 applied to `source = None`).
    expat_by_key: FxHashMap<DependencyKey, NodeId>,
    /// All nodes (owned or expat) sharing a key, for "which sources provide this key".
    nodes_by_key: FxHashMap<DependencyKey, FxHashSet<NodeId>>,
    /// Nodes owned by a given source.
    nodes_by_source: FxHashMap<Source, FxHashSet<NodeId>>,

    /// `key -> {nodes using a provider of key}`. Keyed by key, not node
    /// identity, so multiple providers of the same key share a use-set
    /// (§3 invariant 4).
    uses_by_def: FxHashMap<DependencyKey, FxHashSet<NodeId>>,
    /// Reverse of `uses_by_def`, used so `remove` doesn't have to scan
    /// every def-key's use-set.
    defs_used_by_node: FxHashMap<NodeId, FxHashSet<DependencyKey>>,
}

impl NodeFinder {
    pub fn new() -> Self {
        NodeFinder::default()
    }

    pub fn get(&self, id: NodeId) -> &Node {
        self.slots[id.index()].as_ref().expect("NodeId referred to a removed slot")
    }

    pub fn get_owned_by(&self, source: &Source, key: &DependencyKey) -> Option<NodeId> {
        self.by_source_key.get(&(source.clone(), key.clone())).copied()
    }

    pub fn get_expat(&self, key: &DependencyKey) -> Option<NodeId> {
        self.expat_by_key.get(key).copied()
    }

    pub fn providers_of(&self, key: &DependencyKey) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_by_key.get(key).into_iter().flatten().copied()
    }

    pub fn owned_by(&self, source: &Source) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_by_source.get(source).into_iter().flatten().copied()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(node);
            id
        } else {
            let id = NodeId(self.slots.len() as u32);
            self.slots.push(Some(node));
            id
        }
    }

    fn index_insert(&mut self, id: NodeId) {
        let node = self.slots[id.index()].as_ref().unwrap();
        let key = node.key.clone();
        self.nodes_by_key.entry(key.clone()).or_default().insert(id);
        match node.source.clone() {
            Some(source) => {
                self.by_source_key.insert((source.clone(), key), id);
                self.nodes_by_source.entry(source).or_default().insert(id);
            }
            None => {
                self.expat_by_key.insert(key, id);
            }
        }
    }

    /// Replaces any prior node at `(source, key)`, returning it.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        let key = node.key.clone();
        let previous_id = match &node.source {
            Some(source) => self.by_source_key.get(&(source.clone(), key.clone())).copied(),
            None => self.expat_by_key.get(&key).copied(),
        };
        let previous = previous_id.map(|id| self.remove_by_id(id));
        let id = self.alloc(node);
        self.index_insert(id);
        previous
    }

    /// Removes `node`'s current incarnation, detaching it from every
    /// index including its reverse def→use entries.
    pub fn remove(&mut self, id: NodeId) {
        self.remove_by_id(id);
    }

    fn remove_by_id(&mut self, id: NodeId) -> Node {
        // First detach this node from every def-key's use-set that
        // references it as a use.
        if let Some(defs) = self.defs_used_by_node.remove(&id) {
            for def in defs {
                if let Some(set) = self.uses_by_def.get_mut(&def) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.uses_by_def.remove(&def);
                    }
                }
            }
        }

        let node = self.slots[id.index()].take().expect("double remove of NodeId");
        self.free.push(id);

        if let Some(set) = self.nodes_by_key.get_mut(&node.key) {
            set.remove(&id);
            if set.is_empty() {
                self.nodes_by_key.remove(&node.key);
            }
        }
        match &node.source {
            Some(source) => {
                self.by_source_key.remove(&(source.clone(), node.key.clone()));
                if let Some(set) = self.nodes_by_source.get_mut(source) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.nodes_by_source.remove(source);
                    }
                }
            }
            None => {
                self.expat_by_key.remove(&node.key);
            }
        }
        node
    }

    /// Adds `use_id` to the use-set of `def`. Returns whether the arc
    /// was new. Fails if `use_id` names an expat node (§3 invariant 1).
    pub fn record(&mut self, def: DependencyKey, use_id: NodeId) -> Result<bool, EngineError> {
        if self.get(use_id).is_expat() {
            return Err(EngineError::UseOfExpatNode);
        }
        let is_new = self.uses_by_def.entry(def.clone()).or_default().insert(use_id);
        self.defs_used_by_node.entry(use_id).or_default().insert(def);
        Ok(is_new)
    }

    /// Uses of `node_id`: every node using a provider of its key, plus
    /// (when `node_id`'s aspect is `Interface`) the implicit
    /// interface→implementation edge to the same-source, same-designator
    /// implementation node, if one exists.
    pub fn find_uses(&self, node_id: NodeId) -> Vec<NodeId> {
        let node = self.get(node_id);
        let mut uses: Vec<NodeId> =
            self.uses_by_def.get(&node.key).into_iter().flatten().copied().collect();

        if node.key.aspect == Aspect::Interface {
            if let Some(source) = &node.source {
                let impl_key = node
                    .key
                    .corresponding_implementation()
                    .expect("Interface aspect always has a corresponding implementation");
                if let Some(impl_id) = self.by_source_key.get(&(source.clone(), impl_key)) {
                    uses.push(*impl_id);
                }
            }
        }
        uses
    }

    /// Same as [`Self::find_uses`] but in deterministic key order, for
    /// reproducible tracing.
    pub fn ordered_uses(&self, node_id: NodeId) -> Vec<NodeId> {
        let mut uses = self.find_uses(node_id);
        uses.sort_by(|a, b| {
            let na = self.get(*a);
            let nb = self.get(*b);
            na.key.cmp(&nb.key).then_with(|| a.cmp(b))
        });
        uses
    }

    /// All live nodes, in arena (`NodeId`) order. Used by
    /// `dep_graph_codec` to assign on-disk node IDs deterministically.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|node| (NodeId(idx as u32), node)))
    }

    /// Every def-key that has at least one use, each with its use-set.
    /// Iterates in key order for a deterministic on-disk encoding.
    pub fn iter_arcs(&self) -> impl Iterator<Item = (&DependencyKey, &FxHashSet<NodeId>)> {
        let mut keys: Vec<&DependencyKey> = self.uses_by_def.keys().collect();
        keys.sort();
        keys.into_iter().map(move |key| (key, &self.uses_by_def[key]))
    }

    /// Debug-only consistency check (§4.D): every use-set member exists
    /// in the arena and is not expat.
    pub fn verify(&self) -> Result<(), EngineError> {
        for set in self.uses_by_def.values() {
            for &id in set {
                let node = self
                    .slots
                    .get(id.index())
                    .and_then(|s| s.as_ref())
                    .ok_or(EngineError::UseOfExpatNode)?;
                if node.is_expat() {
                    return Err(EngineError::UseOfExpatNode);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Designator;

    fn top_level(name: &str, aspect: Aspect) -> DependencyKey {
        DependencyKey::new(aspect, Designator::TopLevel { name: name.into() })
    }

    #[test]
    fn insert_returns_previous_at_same_identity() {
        let mut finder = NodeFinder::new();
        let source = Source::new("a.deps");
        let key = top_level("a", Aspect::Interface);
        let n1 = Node::provider(key.clone(), None, source.clone());
        let id1 = finder.insert(n1.clone());
        assert!(id1.is_none());
        let n2 = Node::provider(key.clone(), Some("fp".into()), source.clone());
        let prev = finder.insert(n2);
        assert_eq!(prev, Some(n1));
    }

    #[test]
    fn record_rejects_expat_use() {
        let mut finder = NodeFinder::new();
        let key = top_level("a", Aspect::Interface);
        let expat = Node::expat(key.clone());
        let def_id_holder = finder.alloc_for_test(expat);
        let err = finder.record(key, def_id_holder);
        assert!(matches!(err, Err(EngineError::UseOfExpatNode)));
    }

    #[test]
    fn remove_detaches_reverse_edges() {
        let mut finder = NodeFinder::new();
        let source_a = Source::new("a.deps");
        let source_b = Source::new("b.deps");
        let def_key = top_level("a", Aspect::Interface);
        let use_key = top_level("b", Aspect::Interface);

        let def_node = Node::provider(def_key.clone(), None, source_a.clone());
        finder.insert(def_node);
        let use_node = Node::provider(use_key, None, source_b);
        let use_id = finder.alloc_for_test(use_node);
        finder.record(def_key.clone(), use_id).unwrap();
        assert_eq!(finder.uses_by_def.get(&def_key).map(|s| s.len()), Some(1));

        finder.remove(use_id);
        assert!(finder.uses_by_def.get(&def_key).is_none());
    }

    impl NodeFinder {
        /// Test-only helper: insert a node without routing it through
        /// `insert`'s replace-previous semantics, for building fixtures.
        fn alloc_for_test(&mut self, node: Node) -> NodeId {
            let id = self.alloc(node);
            self.index_insert(id);
            id
        }
    }
}
