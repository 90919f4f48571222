//! The per-file dependency graph (§4.E): the structure the compiler
//! back-end emits for one source file, consumed by the [`crate::Integrator`].

use dep_data::Fingerprint;

use crate::key::{DependencyKey, Designator};
use crate::node::Source;

/// Sequence number: a node's index within one [`PerFileDependencyGraph`].
pub type SeqNo = usize;

/// Slot 0: the file's own interface marker (§4.E).
pub const INTERFACE_FILE_SEQ: SeqNo = 0;
/// Slot 1: the file's own implementation marker (§4.E).
pub const IMPLEMENTATION_FILE_SEQ: SeqNo = 1;

#[derive(Clone, Debug)]
pub struct PerFileNode {
    pub key: DependencyKey,
    pub fingerprint: Option<Fingerprint>,
    pub is_provides: bool,
    /// Sequence numbers of other nodes in the *same* per-file graph that
    /// this node depends upon (intra-file arcs).
    pub defs_i_depend_upon: Vec<SeqNo>,
}

/// The per-file dependency graph for one source, as emitted by the
/// compiler back-end. `nodes[0]` and `nodes[1]` are conventionally the
/// file's interface and implementation `sourceFileProvide` markers.
#[derive(Clone, Debug)]
pub struct PerFileDependencyGraph {
    pub source: Source,
    pub nodes: Vec<PerFileNode>,
}

impl PerFileDependencyGraph {
    /// Starts a graph for `source` with the conventional slot 0/1
    /// `sourceFileProvide` markers already in place.
    pub fn new(source: Source, file_fingerprint: Option<Fingerprint>) -> Self {
        let name: std::sync::Arc<str> = source.as_str().into();
        let iface = PerFileNode {
            key: DependencyKey::interface(Designator::SourceFileProvide { name: name.clone() }),
            fingerprint: file_fingerprint.clone(),
            is_provides: true,
            defs_i_depend_upon: Vec::new(),
        };
        let implementation = PerFileNode {
            key: DependencyKey::implementation(Designator::SourceFileProvide { name }),
            fingerprint: file_fingerprint,
            is_provides: true,
            defs_i_depend_upon: Vec::new(),
        };
        PerFileDependencyGraph { source, nodes: vec![iface, implementation] }
    }

    pub fn push_provides(
        &mut self,
        key: DependencyKey,
        fingerprint: Option<Fingerprint>,
    ) -> SeqNo {
        let seq = self.nodes.len();
        self.nodes.push(PerFileNode {
            key,
            fingerprint,
            is_provides: true,
            defs_i_depend_upon: Vec::new(),
        });
        seq
    }

    /// Adds a pure-use node referencing `key` and wires it as a
    /// dependency of `from` (conventionally [`INTERFACE_FILE_SEQ`] for a
    /// cascading use, [`IMPLEMENTATION_FILE_SEQ`] for a non-cascading/
    /// file-private one, per §4's `#`-marked scenarios).
    pub fn push_depends(&mut self, from: SeqNo, key: DependencyKey) -> SeqNo {
        let seq = self.nodes.len();
        self.nodes.push(PerFileNode {
            key,
            fingerprint: None,
            is_provides: false,
            defs_i_depend_upon: Vec::new(),
        });
        self.nodes[from].defs_i_depend_upon.push(seq);
        seq
    }

    pub fn file_interface_fingerprint(&self) -> Option<&Fingerprint> {
        self.nodes[INTERFACE_FILE_SEQ].fingerprint.as_ref()
    }
}

/// Errors from the textual on-ramp grammar (§4.E.1). Independent of
/// [`crate::error::EngineError`]: these are about malformed *text*, not
/// violated graph invariants.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected a designator kind, found {token:?}")]
    UnknownKind { line: usize, token: String },
    #[error("line {line}: `member` designators need `Context.name`, found {token:?}")]
    MissingMemberContext { line: usize, token: String },
    #[error("line {line}: empty declaration")]
    Empty { line: usize },
}

/// Parses the line-oriented textual artifact grammar described in
/// §4.E.1:
///
/// ```text
/// [#] kind[(context)] name[->] [@fingerprint]
/// ```
///
/// `kind` is one of `top`, `nominal`, `potential_member`, `member`,
/// `dynamic`, `external`, omitted entirely for a plain name (defaults to
/// `top`). A trailing `->` marks a depend rather than a provide. A
/// leading `#` marks a depend as file-private/non-cascading, wiring it
/// to the file's implementation marker instead of its interface marker.
/// Blank lines and lines starting with `//` are ignored.
pub fn parse(source: Source, text: &str) -> Result<PerFileDependencyGraph, ParseError> {
    let mut graph = PerFileDependencyGraph::new(source, None);

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        let (non_cascading, rest) = match line.strip_prefix('#') {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };
        if rest.is_empty() {
            return Err(ParseError::Empty { line: line_no });
        }

        let (body, fingerprint) = match rest.split_once('@') {
            Some((body, fp)) => (body.trim(), Some(Fingerprint::from(fp.trim()))),
            None => (rest, None),
        };

        let (is_depend, body) = match body.strip_suffix("->") {
            Some(body) => (true, body.trim()),
            None => (false, body),
        };

        let mut tokens = body.split_whitespace();
        let first = tokens.next().ok_or(ParseError::Empty { line: line_no })?;
        let (kind, designator_text) = match tokens.next() {
            Some(second) => (first, second),
            None => ("top", first),
        };

        let designator = match kind {
            "top" => Designator::TopLevel { name: designator_text.into() },
            "nominal" => Designator::Nominal { context: designator_text.into() },
            "potential_member" => Designator::PotentialMember { context: designator_text.into() },
            "member" => {
                let (context, name) = designator_text.split_once('.').ok_or_else(|| {
                    ParseError::MissingMemberContext {
                        line: line_no,
                        token: designator_text.to_string(),
                    }
                })?;
                Designator::Member { context: context.into(), name: name.into() }
            }
            "dynamic" => Designator::DynamicLookup { name: designator_text.into() },
            "external" => Designator::ExternalDepend { path: designator_text.into() },
            "file" => Designator::SourceFileProvide { name: designator_text.into() },
            other => return Err(ParseError::UnknownKind { line: line_no, token: other.to_string() }),
        };

        let key = DependencyKey::interface(designator);

        if is_depend {
            let from = if non_cascading { IMPLEMENTATION_FILE_SEQ } else { INTERFACE_FILE_SEQ };
            graph.push_depends(from, key);
        } else {
            graph.push_provides(key, fingerprint);
        }
    }

    Ok(graph)
}
