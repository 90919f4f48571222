//! The integrator (§4.F): folds one source's per-file dependency graph
//! into the module graph, detecting what changed.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::EngineError;
use crate::key::{DependencyKey, Designator};
use crate::node::{Node, NodeId, Source};
use crate::node_finder::NodeFinder;
use crate::per_file::{PerFileDependencyGraph, IMPLEMENTATION_FILE_SEQ, INTERFACE_FILE_SEQ};

#[derive(Debug, Default)]
pub struct IntegrationResult {
    /// Live node ids the tracer should seed from. Never contains a node
    /// removed by this integration — a disappeared node is represented
    /// here by its former uses, not by its own (now dangling) id.
    pub invalidated_nodes: Vec<NodeId>,
    pub newly_discovered_external_deps: Vec<Arc<str>>,
}

/// Folds `per_file` (just decoded for `source`) into `finder`. See §4.F
/// for the six-step algorithm; the tie-breaks below are spelled out
/// there too.
pub fn integrate(
    finder: &mut NodeFinder,
    source: Source,
    per_file: &PerFileDependencyGraph,
) -> Result<IntegrationResult, EngineError> {
    let pre_existing: FxHashSet<NodeId> = finder.owned_by(&source).collect();

    // Tie-break: two provides in the same file sharing a key can't
    // coexist; erase the fingerprint so either side changing invalidates.
    let mut provide_counts: FxHashMap<DependencyKey, u32> = FxHashMap::default();
    for pf_node in &per_file.nodes {
        if pf_node.is_provides {
            *provide_counts.entry(pf_node.key.clone()).or_insert(0) += 1;
        }
    }
    let duplicated: FxHashSet<DependencyKey> =
        provide_counts.into_iter().filter(|(_, count)| *count > 1).map(|(key, _)| key).collect();

    let mut node_id_for_seq: Vec<Option<NodeId>> = vec![None; per_file.nodes.len()];
    let mut touched: FxHashSet<NodeId> = FxHashSet::default();
    let mut invalidated: FxHashSet<NodeId> = FxHashSet::default();
    let mut provided_keys: FxHashMap<DependencyKey, NodeId> = FxHashMap::default();
    let mut external_deps = Vec::new();

    // Pass 1: every provided declaration, including the file's own
    // interface/implementation markers.
    for (seq, pf_node) in per_file.nodes.iter().enumerate() {
        if !pf_node.is_provides {
            continue;
        }
        let key = pf_node.key.clone();
        let fingerprint =
            if duplicated.contains(&key) { None } else { pf_node.fingerprint.clone() };

        // A prior *owned* node at this exact identity is the only case
        // fingerprints are compared; resolving an expat (or appearing
        // for the first time) always counts as a change, since there is
        // nothing meaningful to compare against (§4.F step 5/9: a node
        // "newly inserted and not an expat" is invalidated outright).
        let had_prior_owned = finder.get_owned_by(&source, &key);

        // Replacing an expat with a real provider is a manual step:
        // `insert` only replaces a *prior owned* node at (source, key),
        // not an expat (a different identity space).
        if had_prior_owned.is_none() {
            if let Some(expat_id) = finder.get_expat(&key) {
                finder.remove(expat_id);
            }
        }

        let replaced = finder.insert(Node::provider(key.clone(), fingerprint.clone(), source.clone()));
        let id = finder.get_owned_by(&source, &key).expect("node was just inserted");

        let invalidate = match replaced {
            Some(prior) => prior.fingerprint != fingerprint,
            None => true,
        };
        if invalidate {
            invalidated.insert(id);
        }

        node_id_for_seq[seq] = Some(id);
        touched.insert(id);
        provided_keys.insert(key, id);
    }

    // Step 6: an interface fingerprint change also dirties the
    // co-located implementation marker, even if its own fingerprint
    // happens not to have moved.
    if let (Some(iface_id), Some(impl_id)) =
        (node_id_for_seq[INTERFACE_FILE_SEQ], node_id_for_seq[IMPLEMENTATION_FILE_SEQ])
    {
        if invalidated.contains(&iface_id) {
            invalidated.insert(impl_id);
        }
    }

    // Pass 2: pure uses. A use sharing a key with something this file
    // provides collapses onto the provider (provider wins); otherwise it
    // resolves to whatever already represents that key, or a fresh expat.
    for (seq, pf_node) in per_file.nodes.iter().enumerate() {
        if pf_node.is_provides {
            continue;
        }
        let key = pf_node.key.clone();
        if let Some(&id) = provided_keys.get(&key) {
            node_id_for_seq[seq] = Some(id);
            continue;
        }

        let id = match finder.get_expat(&key).or_else(|| finder.providers_of(&key).next()) {
            Some(id) => id,
            None => {
                finder.insert(Node::expat(key.clone()));
                if let Designator::ExternalDepend { path } = &key.designator {
                    external_deps.push(path.clone());
                }
                finder.get_expat(&key).expect("just inserted")
            }
        };
        node_id_for_seq[seq] = Some(id);
    }

    // Pass 3: intra-file arcs become def→use entries in the module graph.
    for (seq, pf_node) in per_file.nodes.iter().enumerate() {
        for &dep_seq in &pf_node.defs_i_depend_upon {
            let def_key = per_file.nodes[dep_seq].key.clone();
            if provided_keys.contains_key(&def_key) {
                // Tie-break: an intra-file arc isn't stored as a
                // file→use arc, or any interface change in this file
                // would dirty the whole file and defeat fingerprints.
                continue;
            }
            let use_id = node_id_for_seq[seq].expect("every node got an id in pass 1/2");
            finder.record(def_key, use_id)?;
        }
    }

    // Step 4: anything previously owned by this source but not touched
    // this round has disappeared. Its own id becomes dangling the moment
    // `remove` runs, so the tracer can never seed from it directly;
    // capture what used to depend on it *before* removing it and seed
    // from those (still-live) nodes instead.
    for id in pre_existing.difference(&touched).copied().collect::<Vec<_>>() {
        invalidated.extend(finder.find_uses(id));
        finder.remove(id);
    }

    debug!(
        source = source.as_str(),
        invalidated = invalidated.len(),
        external_deps = external_deps.len(),
        "integrated per-file dependency graph"
    );

    Ok(IntegrationResult {
        invalidated_nodes: invalidated.into_iter().collect(),
        newly_discovered_external_deps: external_deps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Aspect;
    use crate::per_file::parse;

    fn ids_for_source(finder: &NodeFinder, source: &Source) -> FxHashSet<NodeId> {
        finder.owned_by(source).collect()
    }

    #[test]
    fn fresh_integration_invalidates_every_new_node() {
        let mut finder = NodeFinder::new();
        let source = Source::new("j0.deps");
        let per_file = parse(source.clone(), "a\nb\nc\n").unwrap();
        let result = integrate(&mut finder, source.clone(), &per_file).unwrap();
        // slot0, slot1, a, b, c = 5 new nodes.
        assert_eq!(result.invalidated_nodes.len(), 5);
        assert_eq!(ids_for_source(&finder, &source).len(), 5);
    }

    #[test]
    fn unchanged_reintegration_invalidates_nothing() {
        let mut finder = NodeFinder::new();
        let source = Source::new("j0.deps");
        let per_file = parse(source.clone(), "a\nb\nc\n").unwrap();
        integrate(&mut finder, source.clone(), &per_file).unwrap();
        let result = integrate(&mut finder, source.clone(), &per_file).unwrap();
        assert!(result.invalidated_nodes.is_empty());
    }

    #[test]
    fn disappeared_declaration_with_no_users_is_removed_and_invalidates_nothing_else() {
        let mut finder = NodeFinder::new();
        let source = Source::new("j0.deps");
        let first = parse(source.clone(), "a\nb\nc\n").unwrap();
        integrate(&mut finder, source.clone(), &first).unwrap();

        let second = parse(source.clone(), "a\nc\n").unwrap();
        let result = integrate(&mut finder, source.clone(), &second).unwrap();

        let b_key =
            DependencyKey::interface(Designator::TopLevel { name: "b".into() });
        assert!(finder.providers_of(&b_key).next().is_none());
        // Nothing depended on b, so its disappearance has nothing to seed.
        assert!(result.invalidated_nodes.is_empty());
    }

    #[test]
    fn disappeared_declaration_with_a_user_invalidates_the_user_not_a_dangling_id() {
        let mut finder = NodeFinder::new();
        let j0 = Source::new("j0.deps");
        let first = parse(j0.clone(), "b\n").unwrap();
        integrate(&mut finder, j0.clone(), &first).unwrap();

        let j1 = Source::new("j1.deps");
        let uses_b = parse(j1.clone(), "b->\n").unwrap();
        integrate(&mut finder, j1.clone(), &uses_b).unwrap();

        let b_key = DependencyKey::interface(Designator::TopLevel { name: "b".into() });
        assert!(finder.providers_of(&b_key).next().is_some());

        let second = parse(j0.clone(), "c\n").unwrap();
        let result = integrate(&mut finder, j0.clone(), &second).unwrap();

        assert!(finder.providers_of(&b_key).next().is_none());
        // Every id in `invalidated_nodes` must still resolve; b's own id
        // must not appear since it no longer exists.
        for &id in &result.invalidated_nodes {
            finder.get(id);
        }
        assert!(!result.invalidated_nodes.is_empty());
    }

    #[test]
    fn external_dependency_is_discovered_once() {
        let mut finder = NodeFinder::new();
        let source = Source::new("j0.deps");
        let per_file = parse(source.clone(), "external /foo->\nexternal /bar->\n").unwrap();
        let result = integrate(&mut finder, source.clone(), &per_file).unwrap();
        assert_eq!(result.newly_discovered_external_deps.len(), 2);

        let foo_key = DependencyKey::interface(Designator::ExternalDepend { path: "/foo".into() });
        assert_eq!(foo_key.aspect, Aspect::Interface);
        assert!(finder.get_expat(&foo_key).is_some());
    }
}
