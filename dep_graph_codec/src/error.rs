//! On-disk format errors (§7.1). Distinct from `dep_graph_core::EngineError`:
//! these describe malformed *bytes*, not a misused in-memory API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("bad signature {0:?}, expected `DDEP`")]
    BadSignature([u8; 4]),

    #[error("unknown record kind {0}")]
    UnknownRecord(u32),

    #[error("malformed metadata record: format version {major}.{minor} is unsupported")]
    MalformedMetadataRecord { major: u16, minor: u16 },

    #[error("malformed node record")]
    MalformedNodeRecord,

    #[error("unknown designator kind {0}")]
    UnknownDesignatorKind(u32),

    #[error("a record's name/context combination is forbidden for its designator kind")]
    BogusNameContext,

    #[error("missing or malformed block-info/application-block framing")]
    MalformedBlockStructure,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<dep_graph_core::EngineError> for CodecError {
    fn from(err: dep_graph_core::EngineError) -> Self {
        match err {
            dep_graph_core::EngineError::UnknownDesignatorCode(code) => {
                CodecError::UnknownDesignatorKind(code as u32)
            }
            dep_graph_core::EngineError::EmptinessViolation { .. } => CodecError::BogusNameContext,
            dep_graph_core::EngineError::UseOfExpatNode => CodecError::MalformedNodeRecord,
        }
    }
}
