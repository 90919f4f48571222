//! The `DDEP` record kinds (§6) and the byte-level primitives they're
//! built from. The spec calls for an LLVM-bitstream-style sub-byte
//! `vbr13` encoding; this codec uses byte-aligned LEB128 varints for the
//! same fields instead (see DESIGN.md) — same record shapes, simpler
//! reader/writer. The block-info block and single application block the
//! spec's bitstream framing calls for are kept (see `write_block_info`/
//! `write_enter_block` below); only the sub-byte integer packing within
//! records is simplified to byte-aligned varints.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::CodecError;

pub const SIGNATURE: [u8; 4] = *b"DDEP";
pub const FORMAT_MAJOR: u16 = 1;
pub const FORMAT_MINOR: u16 = 0;

pub const KIND_METADATA: u8 = 1;
pub const KIND_NODE: u8 = 2;
pub const KIND_DEPENDS_ON: u8 = 3;
pub const KIND_USE_ID: u8 = 4;
pub const KIND_EXTERNAL_DEP: u8 = 5;
pub const KIND_IDENTIFIER: u8 = 6;

/// Marks the block-info block, which declares the one application block's
/// id/name and its record kinds' names, mirroring LLVM bitstream's
/// BLOCKINFO_BLOCK (§1/§6: "a block-info block declaring block and record
/// names, followed by one application block"). Distinct from every
/// `KIND_*` record tag so a reader can tell a block marker from a record.
pub const BLOCKINFO_MARKER: u8 = 0xFE;
/// Opens the application block that holds the metadata/identifier/node/
/// depends-on/use-id/external-dep record stream.
pub const ENTER_BLOCK_MARKER: u8 = 0xFD;
/// Closes the application block opened by `ENTER_BLOCK_MARKER`.
pub const END_BLOCK_MARKER: u8 = 0xFC;

pub const APPLICATION_BLOCK_ID: u64 = 1;
pub const APPLICATION_BLOCK_NAME: &str = "dep_graph";

/// Record kind code/name pairs declared in the block-info block, in the
/// order a reader should expect to find them.
pub const RECORD_NAMES: &[(u8, &str)] = &[
    (KIND_METADATA, "metadata"),
    (KIND_IDENTIFIER, "identifier"),
    (KIND_NODE, "node"),
    (KIND_DEPENDS_ON, "depends_on"),
    (KIND_USE_ID, "use_id"),
    (KIND_EXTERNAL_DEP, "external_dep"),
];

pub fn write_varint(w: &mut impl Write, value: u64) -> io::Result<()> {
    leb128::write::unsigned(w, value).map(|_| ())
}

pub fn read_varint(r: &mut impl Read) -> io::Result<u64> {
    leb128::read::unsigned(r).map_err(|e| match e {
        leb128::read::Error::IoError(e) => e,
        leb128::read::Error::Overflow => io::Error::new(io::ErrorKind::InvalidData, "leb128 overflow"),
    })
}

pub fn write_blob(w: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
    write_varint(w, bytes.len() as u64)?;
    w.write_all(bytes)
}

pub fn read_blob(r: &mut impl Read) -> io::Result<Vec<u8>> {
    let len = read_varint(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_signature(w: &mut impl Write) -> io::Result<()> {
    w.write_all(&SIGNATURE)
}

pub fn read_signature(r: &mut impl Read) -> Result<(), CodecError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    if buf != SIGNATURE {
        return Err(CodecError::BadSignature(buf));
    }
    Ok(())
}

/// Declares the application block's id/name and its record kinds' names,
/// once, up front — the bitstream block-info convention.
pub fn write_block_info(w: &mut impl Write) -> io::Result<()> {
    w.write_u8(BLOCKINFO_MARKER)?;
    write_varint(w, APPLICATION_BLOCK_ID)?;
    write_blob(w, APPLICATION_BLOCK_NAME.as_bytes())?;
    for (code, name) in RECORD_NAMES.iter().copied() {
        write_varint(w, code as u64)?;
        write_blob(w, name.as_bytes())?;
    }
    Ok(())
}

pub fn read_block_info(r: &mut impl Read) -> Result<(), CodecError> {
    let marker = r.read_u8()?;
    if marker != BLOCKINFO_MARKER {
        return Err(CodecError::MalformedBlockStructure);
    }
    let block_id = read_varint(r)?;
    if block_id != APPLICATION_BLOCK_ID {
        return Err(CodecError::MalformedBlockStructure);
    }
    read_blob(r)?;
    for (expected_code, _) in RECORD_NAMES.iter().copied() {
        let code = read_varint(r)?;
        if code != expected_code as u64 {
            return Err(CodecError::MalformedBlockStructure);
        }
        read_blob(r)?;
    }
    Ok(())
}

/// Opens the single application block every `DDEP` file carries.
pub fn write_enter_block(w: &mut impl Write) -> io::Result<()> {
    w.write_u8(ENTER_BLOCK_MARKER)?;
    write_varint(w, APPLICATION_BLOCK_ID)
}

pub fn read_enter_block(r: &mut impl Read) -> Result<(), CodecError> {
    let marker = r.read_u8()?;
    if marker != ENTER_BLOCK_MARKER {
        return Err(CodecError::MalformedBlockStructure);
    }
    let block_id = read_varint(r)?;
    if block_id != APPLICATION_BLOCK_ID {
        return Err(CodecError::MalformedBlockStructure);
    }
    Ok(())
}

pub fn write_end_block(w: &mut impl Write) -> io::Result<()> {
    w.write_u8(END_BLOCK_MARKER)
}

pub fn write_metadata(w: &mut impl Write, compiler_version: &str) -> io::Result<()> {
    w.write_u8(KIND_METADATA)?;
    w.write_u16::<LittleEndian>(FORMAT_MAJOR)?;
    w.write_u16::<LittleEndian>(FORMAT_MINOR)?;
    write_blob(w, compiler_version.as_bytes())
}

pub struct Metadata {
    pub major: u16,
    pub minor: u16,
    pub compiler_version: String,
}

pub fn read_metadata(r: &mut impl Read) -> Result<Metadata, CodecError> {
    let kind = r.read_u8()?;
    if kind != KIND_METADATA {
        return Err(CodecError::UnknownRecord(kind as u32));
    }
    let major = r.read_u16::<LittleEndian>()?;
    let minor = r.read_u16::<LittleEndian>()?;
    if (major, minor) != (FORMAT_MAJOR, FORMAT_MINOR) {
        return Err(CodecError::MalformedMetadataRecord { major, minor });
    }
    let blob = read_blob(r)?;
    let compiler_version = String::from_utf8(blob).map_err(|_| CodecError::MalformedMetadataRecord {
        major,
        minor,
    })?;
    Ok(Metadata { major, minor, compiler_version })
}

pub fn write_identifier(w: &mut impl Write, text: &str) -> io::Result<()> {
    w.write_u8(KIND_IDENTIFIER)?;
    write_blob(w, text.as_bytes())
}

/// A decoded record, tagged by kind. `None` is returned by the caller's
/// read loop at end of stream rather than represented here.
pub enum Record {
    Identifier(String),
    Node {
        designator_code: u8,
        aspect_is_implementation: bool,
        context_id: u64,
        name_id: u64,
        source_id: Option<u64>,
        fingerprint: Option<Vec<u8>>,
    },
    DependsOn { designator_code: u8, aspect_is_implementation: bool, context_id: u64, name_id: u64 },
    UseId(u64),
    ExternalDep { path_id: u64, fingerprint: Option<Vec<u8>> },
}

pub fn write_node(
    w: &mut impl Write,
    designator_code: u8,
    aspect_is_implementation: bool,
    context_id: u64,
    name_id: u64,
    source_id: Option<u64>,
    fingerprint: Option<&[u8]>,
) -> io::Result<()> {
    w.write_u8(KIND_NODE)?;
    w.write_u8(designator_code)?;
    w.write_u8(aspect_is_implementation as u8)?;
    write_varint(w, context_id)?;
    write_varint(w, name_id)?;
    match source_id {
        Some(id) => {
            w.write_u8(1)?;
            write_varint(w, id)?;
        }
        None => w.write_u8(0)?,
    }
    match fingerprint {
        Some(bytes) => {
            w.write_u8(1)?;
            write_blob(w, bytes)?;
        }
        None => w.write_u8(0)?,
    }
    Ok(())
}

pub fn write_depends_on(
    w: &mut impl Write,
    designator_code: u8,
    aspect_is_implementation: bool,
    context_id: u64,
    name_id: u64,
) -> io::Result<()> {
    w.write_u8(KIND_DEPENDS_ON)?;
    w.write_u8(designator_code)?;
    w.write_u8(aspect_is_implementation as u8)?;
    write_varint(w, context_id)?;
    write_varint(w, name_id)
}

pub fn write_use_id(w: &mut impl Write, node_id: u64) -> io::Result<()> {
    w.write_u8(KIND_USE_ID)?;
    write_varint(w, node_id)
}

pub fn write_external_dep(w: &mut impl Write, path_id: u64, fingerprint: Option<&[u8]>) -> io::Result<()> {
    w.write_u8(KIND_EXTERNAL_DEP)?;
    write_varint(w, path_id)?;
    match fingerprint {
        Some(bytes) => {
            w.write_u8(1)?;
            write_blob(w, bytes)?;
        }
        None => w.write_u8(0)?,
    }
    Ok(())
}

/// Reads the next record, or `None` at the application block's
/// `END_BLOCK_MARKER` (or, defensively, a clean end of stream).
pub fn read_record(r: &mut impl Read) -> Result<Option<Record>, CodecError> {
    let kind = match r.read_u8() {
        Ok(k) => k,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if kind == END_BLOCK_MARKER {
        return Ok(None);
    }
    match kind {
        KIND_IDENTIFIER => {
            let blob = read_blob(r)?;
            let text = String::from_utf8(blob).map_err(|_| CodecError::MalformedNodeRecord)?;
            Ok(Some(Record::Identifier(text)))
        }
        KIND_NODE => {
            let designator_code = r.read_u8()?;
            let aspect_is_implementation = r.read_u8()? != 0;
            let context_id = read_varint(r)?;
            let name_id = read_varint(r)?;
            let has_source = r.read_u8()?;
            let source_id = if has_source != 0 { Some(read_varint(r)?) } else { None };
            let has_fingerprint = r.read_u8()?;
            let fingerprint = if has_fingerprint != 0 { Some(read_blob(r)?) } else { None };
            Ok(Some(Record::Node {
                designator_code,
                aspect_is_implementation,
                context_id,
                name_id,
                source_id,
                fingerprint,
            }))
        }
        KIND_DEPENDS_ON => {
            let designator_code = r.read_u8()?;
            let aspect_is_implementation = r.read_u8()? != 0;
            let context_id = read_varint(r)?;
            let name_id = read_varint(r)?;
            Ok(Some(Record::DependsOn { designator_code, aspect_is_implementation, context_id, name_id }))
        }
        KIND_USE_ID => Ok(Some(Record::UseId(read_varint(r)?))),
        KIND_EXTERNAL_DEP => {
            let path_id = read_varint(r)?;
            let has_fingerprint = r.read_u8()?;
            let fingerprint = if has_fingerprint != 0 { Some(read_blob(r)?) } else { None };
            Ok(Some(Record::ExternalDep { path_id, fingerprint }))
        }
        other => Err(CodecError::UnknownRecord(other as u32)),
    }
}
