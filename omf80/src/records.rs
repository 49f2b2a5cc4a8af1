//! The OMF-80 record codec.
//!
//! An OMF-80 object file is a sequence of framed records. Each frame is
//! `type:u8, length:u16, payload, checksum:u8`, where `length` counts the
//! payload plus the checksum byte and the arithmetic sum of every byte of the
//! frame is zero mod 256. [`read_records`] splits a byte stream into frames,
//! verifies each checksum, and decodes the payloads; [`write_records`] is the
//! inverse.
//!
//! Decoding and re-encoding a valid frame reproduces it byte for byte.

use crate::encoder::Encoder;
use crate::error::Error;
use crate::parser::Parser;
use bstr::BString;
use zerocopy::byteorder::{LE, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Identifies a record type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordKind(pub u8);

macro_rules! record_kinds {
    (
        $(
            $code:expr, $name:ident, $display:expr ;
        )*
    ) => {
        #[allow(missing_docs)]
        impl RecordKind {
            $(
                pub const $name: RecordKind = RecordKind($code);
            )*
        }

        static RECORD_KIND_NAMES: &[(RecordKind, &str)] = &[
            $(
                (RecordKind($code), $display),
            )*
        ];
    }
}

record_kinds! {
    0x02, MODULE_HEADER, "MODULE HEADER";
    0x04, MODULE_END, "MODULE END";
    0x06, CONTENT, "CONTENT";
    0x08, LINE_NUMBERS, "LINE NUMBERS";
    0x0e, END_OF_FILE, "END OF FILE";
    0x10, MODULE_ANCESTOR, "MODULE ANCESTOR";
    0x12, LOCAL_SYMBOLS, "LOCAL SYMBOLS";
    0x16, PUBLIC_DECLARATION, "PUBLIC DECLARATION";
    0x18, EXTERNAL_NAMES, "EXTERNAL NAMES";
    0x20, EXTERNAL_REFERENCES, "EXTERNAL REFERENCES";
    0x22, RELOCATION, "RELOCATION";
    0x24, INTERSEGMENT_REFERENCES, "INTERSEGMENT REFERENCES";
    0x26, LIBRARY_MODULE_LOCATIONS, "LIBRARY MODULE LOCATIONS";
    0x28, LIBRARY_MODULE_NAMES, "LIBRARY MODULE NAMES";
    0x2a, LIBRARY_DICTIONARY, "LIBRARY DICTIONARY";
    0x2c, LIBRARY_HEADER, "LIBRARY HEADER";
    0x2e, NAMED_COMMON_DEFINITIONS, "NAMED COMMON DEFINITIONS";
}

impl RecordKind {
    /// Returns the name of a known record kind.
    pub fn name(self) -> Option<&'static str> {
        RECORD_KIND_NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, name)| *name)
    }
}

impl std::fmt::Debug for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "RecordKind(0x{:02x})", self.0),
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// One segment declaration in a MODULE HEADER record.
#[derive(IntoBytes, FromBytes, Unaligned, Immutable, KnownLayout, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
#[allow(missing_docs)]
pub struct SegmentDef {
    pub seg_id: u8,
    pub length: U16<LE>,
    pub align: u8,
}

/// One `(offset, line)` pair in a LINE NUMBERS record.
#[derive(IntoBytes, FromBytes, Unaligned, Immutable, KnownLayout, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
#[allow(missing_docs)]
pub struct LineNumberDef {
    pub offset: U16<LE>,
    pub line: U16<LE>,
}

/// One use site in an EXTERNAL REFERENCES record. `name_index` selects a name
/// from the module's EXTERNAL NAMES record, in declaration order.
#[derive(IntoBytes, FromBytes, Unaligned, Immutable, KnownLayout, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
#[allow(missing_docs)]
pub struct ExternalRefDef {
    pub name_index: U16<LE>,
    pub offset: U16<LE>,
}

/// One `(block, byte)` position in a LIBRARY MODULE LOCATIONS record.
#[derive(IntoBytes, FromBytes, Unaligned, Immutable, KnownLayout, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
#[allow(missing_docs)]
pub struct LibraryLocation {
    pub block: U16<LE>,
    pub byte: U16<LE>,
}

/// A named offset within a segment, as carried by LOCAL SYMBOLS and PUBLIC
/// DECLARATION records. On the wire each entry is followed by one pad byte.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct NamedOffset {
    pub offset: u16,
    pub name: BString,
}

/// One entry of a NAMED COMMON DEFINITIONS record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CommonName {
    pub seg_id: u8,
    pub name: BString,
}

/// MODULE HEADER (0x02). Opens a module, names it, and declares its segments.
///
/// The payload carries two filler bytes between the name and the segment
/// array; they are always written as zero.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ModuleHeader {
    pub name: BString,
    pub segments: Vec<SegmentDef>,
}

/// MODULE END (0x04). `mod_typ` is 1 for a main module, 0 otherwise.
///
/// Trailing optional-info bytes are accepted and discarded; none are written.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ModuleEnd {
    pub mod_typ: u8,
    pub seg_id: u8,
    pub offset: u16,
}

/// CONTENT (0x06). A blob of bytes placed at `offset` within a segment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Content {
    pub seg_id: u8,
    pub offset: u16,
    pub data: Vec<u8>,
}

/// LINE NUMBERS (0x08).
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LineNumbers {
    pub seg_id: u8,
    pub line_numbers: Vec<LineNumberDef>,
}

/// MODULE ANCESTOR (0x10). Names the module a debug-information block
/// originates from.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ModuleAncestor {
    pub module_name: BString,
}

/// LOCAL SYMBOLS (0x12).
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LocalSymbols {
    pub seg_id: u8,
    pub symbols: Vec<NamedOffset>,
}

/// PUBLIC DECLARATION (0x16). Symbols this module exports.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct PublicDeclaration {
    pub seg_id: u8,
    pub publics: Vec<NamedOffset>,
}

/// EXTERNAL NAMES (0x18). Symbols this module imports; position in the list
/// is the index used by EXTERNAL REFERENCES records.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExternalNames {
    pub names: Vec<BString>,
}

/// EXTERNAL REFERENCES (0x20). Use sites to be patched with the resolved
/// address of an imported symbol. `width` selects the patched bytes:
/// 1 = low byte, 2 = high byte, 3 = both.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExternalReferences {
    pub width: u8,
    pub references: Vec<ExternalRefDef>,
}

/// RELOCATION (0x22). Patch sites whose target is the containing content
/// definition's own segment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Relocation {
    pub width: u8,
    pub offsets: Vec<u16>,
}

/// INTERSEGMENT REFERENCES (0x24). Patch sites targeting an explicit segment.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct IntersegmentReferences {
    pub seg_id: u8,
    pub width: u8,
    pub offsets: Vec<u16>,
}

/// LIBRARY MODULE LOCATIONS (0x26).
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LibraryModuleLocations {
    pub locations: Vec<LibraryLocation>,
}

/// LIBRARY MODULE NAMES (0x28).
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LibraryModuleNames {
    pub names: Vec<BString>,
}

/// LIBRARY DICTIONARY (0x2a). Group `i` lists the public names provided by
/// library module `i`; each group is terminated by a zero byte.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LibraryDictionary {
    pub groups: Vec<Vec<BString>>,
}

/// LIBRARY HEADER (0x2c).
#[derive(IntoBytes, FromBytes, Unaligned, Immutable, KnownLayout, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
#[allow(missing_docs)]
pub struct LibraryHeader {
    pub module_count: U16<LE>,
    pub block: U16<LE>,
    pub byte: U16<LE>,
}

/// NAMED COMMON DEFINITIONS (0x2e).
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct NamedCommonDefinitions {
    pub seg_id: u8,
    pub commons: Vec<CommonName>,
}

/// A decoded OMF-80 record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Record {
    ModuleHeader(ModuleHeader),
    ModuleEnd(ModuleEnd),
    Content(Content),
    LineNumbers(LineNumbers),
    EndOfFile,
    ModuleAncestor(ModuleAncestor),
    LocalSymbols(LocalSymbols),
    PublicDeclaration(PublicDeclaration),
    ExternalNames(ExternalNames),
    ExternalReferences(ExternalReferences),
    Relocation(Relocation),
    IntersegmentReferences(IntersegmentReferences),
    LibraryModuleLocations(LibraryModuleLocations),
    LibraryModuleNames(LibraryModuleNames),
    LibraryDictionary(LibraryDictionary),
    LibraryHeader(LibraryHeader),
    NamedCommonDefinitions(NamedCommonDefinitions),
}

fn str8(p: &mut Parser) -> Result<BString, Error> {
    match p.str8() {
        Ok(s) => Ok(s.to_owned()),
        Err(_) => Err(Error::BadString),
    }
}

fn named_offsets(p: &mut Parser) -> Result<Vec<NamedOffset>, Error> {
    let mut entries = Vec::new();
    while !p.is_empty() {
        let offset = p.u16()?;
        let name = str8(p)?;
        p.skip(1)?; // pad byte
        entries.push(NamedOffset { offset, name });
    }
    Ok(entries)
}

fn offsets16(p: &mut Parser) -> Result<Vec<u16>, Error> {
    let mut offsets = Vec::with_capacity(p.len() / 2);
    while !p.is_empty() {
        offsets.push(p.u16()?);
    }
    Ok(offsets)
}

impl ModuleHeader {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let name = str8(p)?;
        p.skip(2)?; // filler, written as zero
        let mut segments = Vec::new();
        while !p.is_empty() {
            segments.push(p.copy::<SegmentDef>()?);
        }
        Ok(Self { name, segments })
    }

    fn emit(&self, e: &mut Encoder) {
        e.str8(self.name.as_ref());
        e.u8(0);
        e.u8(0);
        for segment in &self.segments {
            e.t(segment);
        }
    }
}

impl ModuleEnd {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let mod_typ = p.u8()?;
        let seg_id = p.u8()?;
        let offset = p.u16()?;
        let _optional_info = p.take_rest();
        Ok(Self {
            mod_typ,
            seg_id,
            offset,
        })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.mod_typ);
        e.u8(self.seg_id);
        e.u16(self.offset);
    }
}

impl Content {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let seg_id = p.u8()?;
        let offset = p.u16()?;
        let data = p.take_rest().to_vec();
        Ok(Self {
            seg_id,
            offset,
            data,
        })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.seg_id);
        e.u16(self.offset);
        e.bytes(&self.data);
    }
}

impl LineNumbers {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let seg_id = p.u8()?;
        let mut line_numbers = Vec::with_capacity(p.len() / 4);
        while !p.is_empty() {
            line_numbers.push(p.copy::<LineNumberDef>()?);
        }
        Ok(Self {
            seg_id,
            line_numbers,
        })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.seg_id);
        for line in &self.line_numbers {
            e.t(line);
        }
    }
}

impl ModuleAncestor {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        Ok(Self {
            module_name: str8(p)?,
        })
    }

    fn emit(&self, e: &mut Encoder) {
        e.str8(self.module_name.as_ref());
    }
}

impl LocalSymbols {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let seg_id = p.u8()?;
        let symbols = named_offsets(p)?;
        Ok(Self { seg_id, symbols })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.seg_id);
        for symbol in &self.symbols {
            e.u16(symbol.offset);
            e.str8(symbol.name.as_ref());
            e.u8(0);
        }
    }
}

impl PublicDeclaration {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let seg_id = p.u8()?;
        let publics = named_offsets(p)?;
        Ok(Self { seg_id, publics })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.seg_id);
        for public in &self.publics {
            e.u16(public.offset);
            e.str8(public.name.as_ref());
            e.u8(0);
        }
    }
}

impl ExternalNames {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let mut names = Vec::new();
        while !p.is_empty() {
            names.push(str8(p)?);
            p.skip(1)?; // pad byte
        }
        Ok(Self { names })
    }

    fn emit(&self, e: &mut Encoder) {
        for name in &self.names {
            e.str8(name.as_ref());
            e.u8(0);
        }
    }
}

impl ExternalReferences {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let width = p.u8()?;
        let mut references = Vec::with_capacity(p.len() / 4);
        while !p.is_empty() {
            references.push(p.copy::<ExternalRefDef>()?);
        }
        Ok(Self { width, references })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.width);
        for reference in &self.references {
            e.t(reference);
        }
    }
}

impl Relocation {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let width = p.u8()?;
        let offsets = offsets16(p)?;
        Ok(Self { width, offsets })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.width);
        for &offset in &self.offsets {
            e.u16(offset);
        }
    }
}

impl IntersegmentReferences {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let seg_id = p.u8()?;
        let width = p.u8()?;
        let offsets = offsets16(p)?;
        Ok(Self {
            seg_id,
            width,
            offsets,
        })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.seg_id);
        e.u8(self.width);
        for &offset in &self.offsets {
            e.u16(offset);
        }
    }
}

impl LibraryModuleLocations {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let mut locations = Vec::with_capacity(p.len() / 4);
        while !p.is_empty() {
            locations.push(p.copy::<LibraryLocation>()?);
        }
        Ok(Self { locations })
    }

    fn emit(&self, e: &mut Encoder) {
        for location in &self.locations {
            e.t(location);
        }
    }
}

impl LibraryModuleNames {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let mut names = Vec::new();
        while !p.is_empty() {
            names.push(str8(p)?);
        }
        Ok(Self { names })
    }

    fn emit(&self, e: &mut Encoder) {
        for name in &self.names {
            e.str8(name.as_ref());
        }
    }
}

impl LibraryDictionary {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let mut groups = Vec::new();
        while !p.is_empty() {
            let mut group = Vec::new();
            loop {
                match p.peek_rest().first() {
                    None => return Err(Error::BadLibraryDictionary),
                    Some(0) => {
                        p.skip(1)?;
                        break;
                    }
                    Some(_) => group.push(str8(p)?),
                }
            }
            groups.push(group);
        }
        Ok(Self { groups })
    }

    fn emit(&self, e: &mut Encoder) {
        for group in &self.groups {
            for name in group {
                e.str8(name.as_ref());
            }
            e.u8(0);
        }
    }
}

impl NamedCommonDefinitions {
    fn parse(p: &mut Parser) -> Result<Self, Error> {
        let seg_id = p.u8()?;
        let mut commons = Vec::new();
        while !p.is_empty() {
            let seg_id = p.u8()?;
            let name = str8(p)?;
            commons.push(CommonName { seg_id, name });
        }
        Ok(Self { seg_id, commons })
    }

    fn emit(&self, e: &mut Encoder) {
        e.u8(self.seg_id);
        for common in &self.commons {
            e.u8(common.seg_id);
            e.str8(common.name.as_ref());
        }
    }
}

impl Record {
    /// Returns the wire type code of this record.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::ModuleHeader(_) => RecordKind::MODULE_HEADER,
            Record::ModuleEnd(_) => RecordKind::MODULE_END,
            Record::Content(_) => RecordKind::CONTENT,
            Record::LineNumbers(_) => RecordKind::LINE_NUMBERS,
            Record::EndOfFile => RecordKind::END_OF_FILE,
            Record::ModuleAncestor(_) => RecordKind::MODULE_ANCESTOR,
            Record::LocalSymbols(_) => RecordKind::LOCAL_SYMBOLS,
            Record::PublicDeclaration(_) => RecordKind::PUBLIC_DECLARATION,
            Record::ExternalNames(_) => RecordKind::EXTERNAL_NAMES,
            Record::ExternalReferences(_) => RecordKind::EXTERNAL_REFERENCES,
            Record::Relocation(_) => RecordKind::RELOCATION,
            Record::IntersegmentReferences(_) => RecordKind::INTERSEGMENT_REFERENCES,
            Record::LibraryModuleLocations(_) => RecordKind::LIBRARY_MODULE_LOCATIONS,
            Record::LibraryModuleNames(_) => RecordKind::LIBRARY_MODULE_NAMES,
            Record::LibraryDictionary(_) => RecordKind::LIBRARY_DICTIONARY,
            Record::LibraryHeader(_) => RecordKind::LIBRARY_HEADER,
            Record::NamedCommonDefinitions(_) => RecordKind::NAMED_COMMON_DEFINITIONS,
        }
    }

    /// Decodes a record payload. The caller has already stripped the frame
    /// (type, length, checksum) and verified the checksum.
    pub fn parse(kind: RecordKind, payload: &[u8]) -> Result<Record, Error> {
        let mut p = Parser::new(payload);
        Ok(match kind {
            RecordKind::MODULE_HEADER => Record::ModuleHeader(ModuleHeader::parse(&mut p)?),
            RecordKind::MODULE_END => Record::ModuleEnd(ModuleEnd::parse(&mut p)?),
            RecordKind::CONTENT => Record::Content(Content::parse(&mut p)?),
            RecordKind::LINE_NUMBERS => Record::LineNumbers(LineNumbers::parse(&mut p)?),
            RecordKind::END_OF_FILE => Record::EndOfFile,
            RecordKind::MODULE_ANCESTOR => Record::ModuleAncestor(ModuleAncestor::parse(&mut p)?),
            RecordKind::LOCAL_SYMBOLS => Record::LocalSymbols(LocalSymbols::parse(&mut p)?),
            RecordKind::PUBLIC_DECLARATION => {
                Record::PublicDeclaration(PublicDeclaration::parse(&mut p)?)
            }
            RecordKind::EXTERNAL_NAMES => Record::ExternalNames(ExternalNames::parse(&mut p)?),
            RecordKind::EXTERNAL_REFERENCES => {
                Record::ExternalReferences(ExternalReferences::parse(&mut p)?)
            }
            RecordKind::RELOCATION => Record::Relocation(Relocation::parse(&mut p)?),
            RecordKind::INTERSEGMENT_REFERENCES => {
                Record::IntersegmentReferences(IntersegmentReferences::parse(&mut p)?)
            }
            RecordKind::LIBRARY_MODULE_LOCATIONS => {
                Record::LibraryModuleLocations(LibraryModuleLocations::parse(&mut p)?)
            }
            RecordKind::LIBRARY_MODULE_NAMES => {
                Record::LibraryModuleNames(LibraryModuleNames::parse(&mut p)?)
            }
            RecordKind::LIBRARY_DICTIONARY => {
                Record::LibraryDictionary(LibraryDictionary::parse(&mut p)?)
            }
            RecordKind::LIBRARY_HEADER => Record::LibraryHeader(p.copy::<LibraryHeader>()?),
            RecordKind::NAMED_COMMON_DEFINITIONS => {
                Record::NamedCommonDefinitions(NamedCommonDefinitions::parse(&mut p)?)
            }
            _ => return Err(Error::UnknownRecordType(kind.0)),
        })
    }

    fn emit_payload(&self, e: &mut Encoder) {
        match self {
            Record::ModuleHeader(r) => r.emit(e),
            Record::ModuleEnd(r) => r.emit(e),
            Record::Content(r) => r.emit(e),
            Record::LineNumbers(r) => r.emit(e),
            Record::EndOfFile => {}
            Record::ModuleAncestor(r) => r.emit(e),
            Record::LocalSymbols(r) => r.emit(e),
            Record::PublicDeclaration(r) => r.emit(e),
            Record::ExternalNames(r) => r.emit(e),
            Record::ExternalReferences(r) => r.emit(e),
            Record::Relocation(r) => r.emit(e),
            Record::IntersegmentReferences(r) => r.emit(e),
            Record::LibraryModuleLocations(r) => r.emit(e),
            Record::LibraryModuleNames(r) => r.emit(e),
            Record::LibraryDictionary(r) => r.emit(e),
            Record::LibraryHeader(r) => e.t(r),
            Record::NamedCommonDefinitions(r) => r.emit(e),
        }
    }
}

/// Appends one framed record to `out`, computing the length field and the
/// checksum byte.
pub fn write_record(record: &Record, out: &mut Vec<u8>) {
    let start = out.len();
    out.push(record.kind().0);
    out.push(0);
    out.push(0);
    record.emit_payload(&mut Encoder::new(out));

    let payload_len = out.len() - start - 3;
    debug_assert!(payload_len < 0xffff);
    let length = (payload_len + 1) as u16; // payload plus checksum byte
    out[start + 1..start + 3].copy_from_slice(&length.to_le_bytes());

    let sum = out[start..]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b));
    out.push(sum.wrapping_neg());
}

/// Encodes a sequence of records as a stream of frames.
pub fn write_records(records: &[Record]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        write_record(record, &mut out);
    }
    out
}

/// Splits a byte stream into record frames, verifies each checksum, and
/// decodes the payloads. Reading stops at the end of the input or after an
/// END OF FILE record.
pub fn read_records(data: &[u8]) -> Result<Vec<Record>, Error> {
    let mut records = Vec::new();
    let mut rest = data;
    while !rest.is_empty() {
        let mut p = Parser::new(rest);
        let kind = RecordKind(p.u8()?);
        let length = p.u16()? as usize;
        if length == 0 {
            // length counts the checksum byte, so zero is impossible
            return Err(Error::CorruptFrame);
        }
        let payload = p.bytes(length - 1)?;
        p.skip(1)?; // checksum byte

        let frame_len = 3 + length;
        let frame = &rest[..frame_len];
        if frame.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) != 0 {
            return Err(Error::CorruptFrame);
        }

        let record = Record::parse(kind, payload)?;
        let end_of_file = matches!(record, Record::EndOfFile);
        records.push(record);
        rest = &rest[frame_len..];
        if end_of_file {
            break;
        }
    }
    Ok(records)
}
