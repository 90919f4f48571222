//! Binary persistence for the module dependency graph (§4.I, §6): the
//! `DDEP` record format, read and written directly against a
//! `dep_graph_core::NodeFinder`.
//!
//! A `DDEP` stream is a signature, a block-info block declaring the one
//! application block's id and its record kinds' names, then that
//! application block's contents (metadata, identifiers, nodes,
//! depends-on/use-id pairs, external deps) up to its end marker.
//!
//! Production callers go through [`SerializedModuleGraph`], which
//! applies the "scoped acquisition" pattern from the design notes: write
//! to a temporary file, then rename atomically into place, so a failed
//! write never corrupts the previous graph.

mod error;
mod records;

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use dep_data::intern::{InternedString, StringTable};
use dep_data::Fingerprint;
use dep_graph_core::{Aspect, DependencyKey, Designator, Node, NodeFinder, NodeId, Source};
use rustc_hash::FxHashMap;
use tracing::warn;

pub use error::CodecError;
pub use records::{FORMAT_MAJOR, FORMAT_MINOR};

fn key_parts(key: &DependencyKey, table: &mut StringTable) -> (u64, u64) {
    let (context, name) = key.designator.to_parts();
    let context_id = table.intern(context.unwrap_or("")).as_u32() as u64;
    let name_id = table.intern(name.unwrap_or("")).as_u32() as u64;
    (context_id, name_id)
}

/// Encodes every live node and def→use arc in `finder` to `out` in
/// `DDEP` format.
pub fn write_module_graph(
    finder: &NodeFinder,
    compiler_version: &str,
    mut out: impl Write,
) -> Result<(), CodecError> {
    let mut table = StringTable::new();
    for (_, node) in finder.iter_nodes() {
        key_parts(&node.key, &mut table);
        if let Some(source) = &node.source {
            table.intern(source.as_str());
        }
    }
    for (key, _) in finder.iter_arcs() {
        key_parts(key, &mut table);
    }

    records::write_signature(&mut out)?;
    records::write_block_info(&mut out)?;
    records::write_enter_block(&mut out)?;
    records::write_metadata(&mut out, compiler_version)?;
    for (handle, text) in table.iter() {
        if handle == InternedString::EMPTY {
            continue;
        }
        records::write_identifier(&mut out, text)?;
    }

    let mut on_disk_seq: FxHashMap<NodeId, u64> = FxHashMap::default();
    for (id, node) in finder.iter_nodes() {
        let seq = on_disk_seq.len() as u64;
        on_disk_seq.insert(id, seq);
        let fingerprint = node.fingerprint.as_ref().map(|fp| fp.as_str().as_bytes());

        if let Designator::ExternalDepend { path } = &node.key.designator {
            let path_id = table.intern(path).as_u32() as u64;
            records::write_external_dep(&mut out, path_id, fingerprint)?;
            continue;
        }

        let (context_id, name_id) = key_parts(&node.key, &mut table);
        let source_id = node.source.as_ref().map(|s| table.intern(s.as_str()).as_u32() as u64);
        records::write_node(
            &mut out,
            node.key.designator.code(),
            node.key.aspect == Aspect::Implementation,
            context_id,
            name_id,
            source_id,
            fingerprint,
        )?;
    }

    for (key, uses) in finder.iter_arcs() {
        let (context_id, name_id) = key_parts(key, &mut table);
        records::write_depends_on(
            &mut out,
            key.designator.code(),
            key.aspect == Aspect::Implementation,
            context_id,
            name_id,
        )?;
        let mut use_seqs: Vec<u64> = uses.iter().filter_map(|id| on_disk_seq.get(id).copied()).collect();
        use_seqs.sort_unstable();
        for seq in use_seqs {
            records::write_use_id(&mut out, seq)?;
        }
    }

    records::write_end_block(&mut out)?;
    Ok(())
}

fn decode_designator(
    code: u8,
    context_id: u64,
    name_id: u64,
    strings: &[String],
) -> Result<Designator, CodecError> {
    let context = strings.get(context_id as usize).map(String::as_str).filter(|s| !s.is_empty());
    let name = strings.get(name_id as usize).map(String::as_str).filter(|s| !s.is_empty());
    Ok(Designator::from_parts(code, context, name)?)
}

fn decode_fingerprint(bytes: Option<Vec<u8>>) -> Result<Option<Fingerprint>, CodecError> {
    match bytes {
        Some(bytes) => {
            let text = String::from_utf8(bytes).map_err(|_| CodecError::MalformedNodeRecord)?;
            Ok(Some(Fingerprint::from(text)))
        }
        None => Ok(None),
    }
}

/// Decodes a `DDEP` stream into a fresh [`NodeFinder`].
pub fn read_module_graph(mut input: impl Read) -> Result<NodeFinder, CodecError> {
    records::read_signature(&mut input)?;
    records::read_block_info(&mut input)?;
    records::read_enter_block(&mut input)?;
    let metadata = records::read_metadata(&mut input)?;
    warn!(
        compiler_version = metadata.compiler_version.as_str(),
        "decoded module dependency graph"
    );

    let mut strings: Vec<String> = vec![String::new()];
    let mut finder = NodeFinder::new();
    let mut node_ids: Vec<NodeId> = Vec::new();
    let mut current_def_key: Option<DependencyKey> = None;

    while let Some(record) = records::read_record(&mut input)? {
        match record {
            records::Record::Identifier(text) => strings.push(text),
            records::Record::Node {
                designator_code,
                aspect_is_implementation,
                context_id,
                name_id,
                source_id,
                fingerprint,
            } => {
                let designator = decode_designator(designator_code, context_id, name_id, &strings)?;
                let aspect = if aspect_is_implementation { Aspect::Implementation } else { Aspect::Interface };
                let key = DependencyKey::new(aspect, designator);
                let source = match source_id {
                    Some(id) => Some(Source::new(
                        strings.get(id as usize).cloned().ok_or(CodecError::MalformedNodeRecord)?,
                    )),
                    None => None,
                };
                let fp = decode_fingerprint(fingerprint)?;
                let node = Node::new(key.clone(), fp, source.clone());
                finder.insert(node);
                let id = match &source {
                    Some(src) => finder.get_owned_by(src, &key).expect("just inserted"),
                    None => finder.get_expat(&key).expect("just inserted"),
                };
                node_ids.push(id);
            }
            records::Record::ExternalDep { path_id, fingerprint } => {
                let path = strings.get(path_id as usize).cloned().ok_or(CodecError::MalformedNodeRecord)?;
                let key = DependencyKey::interface(Designator::ExternalDepend { path: path.into() });
                let fp = decode_fingerprint(fingerprint)?;
                finder.insert(Node::new(key.clone(), fp, None));
                node_ids.push(finder.get_expat(&key).expect("just inserted"));
            }
            records::Record::DependsOn { designator_code, aspect_is_implementation, context_id, name_id } => {
                let designator = decode_designator(designator_code, context_id, name_id, &strings)?;
                let aspect = if aspect_is_implementation { Aspect::Implementation } else { Aspect::Interface };
                current_def_key = Some(DependencyKey::new(aspect, designator));
            }
            records::Record::UseId(seq) => {
                let def_key = current_def_key.clone().ok_or(CodecError::MalformedNodeRecord)?;
                let use_id = *node_ids.get(seq as usize).ok_or(CodecError::MalformedNodeRecord)?;
                finder.record(def_key, use_id)?;
            }
        }
    }

    Ok(finder)
}

/// Atomic-rename persistence for the module graph file (design notes,
/// "scoped acquisition"): writes to `path.with_extension("tmp")`, then
/// renames over `path` only once the write fully succeeds, so a crash or
/// I/O error mid-write never corrupts a previously-good graph.
pub struct SerializedModuleGraph;

impl SerializedModuleGraph {
    pub fn write(finder: &NodeFinder, compiler_version: &str, path: &Path) -> Result<(), CodecError> {
        let tmp_path = path.with_extension("tmp");
        let mut tmp_file = fs::File::create(&tmp_path)?;
        write_module_graph(finder, compiler_version, &mut tmp_file)?;
        tmp_file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<NodeFinder, CodecError> {
        let file = fs::File::open(path)?;
        read_module_graph(file)
    }
}
