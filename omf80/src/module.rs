//! The in-memory model of an OMF-80 object module.
//!
//! A [`Module`] is assembled from a record sequence with
//! [`Module::from_records`] and turned back into records with
//! [`Module::to_records`]. The model canonicalizes a few things the wire
//! format leaves open: per-segment symbol lists are kept sorted by offset,
//! and maps iterate in ascending key order.

use crate::error::Error;
use crate::records::{
    Content, ExternalNames, ExternalRefDef, ExternalReferences, IntersegmentReferences,
    LineNumberDef, LineNumbers, LocalSymbols, ModuleAncestor, ModuleEnd, ModuleHeader,
    NamedCommonDefinitions, NamedOffset, PublicDeclaration, Record, SegmentDef,
};
use bstr::{BStr, BString, ByteSlice};
use std::collections::BTreeMap;
use zerocopy::byteorder::U16;

/// Fixed-address content; never rebased.
pub const ABSOLUTE_SEGMENT: u8 = 0;
/// Program code; concatenated across modules and rebased to the code origin.
pub const CODE_SEGMENT: u8 = 1;
/// Initialized data; concatenated across modules and rebased to the data origin.
pub const DATA_SEGMENT: u8 = 2;
/// Uninitialized stack; its size is a link-time parameter.
pub const STACK_SEGMENT: u8 = 3;
/// Uninitialized scratch memory; never rebased.
pub const MEMORY_SEGMENT: u8 = 4;
/// Reserved by the format.
pub const RESERVED_SEGMENT: u8 = 5;
/// The unnamed common block.
pub const UNNAMED_COMMON_SEGMENT: u8 = 255;

/// A segment descriptor: how long the segment is and how it is aligned.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Segment {
    pub length: u16,
    pub align: u8,
}

/// One `(offset, line)` pair of debug line-number information.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct LineNumber {
    pub offset: u16,
    pub line: u16,
}

/// A use site of an imported symbol, to be patched with the symbol's
/// resolved address.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ExternalFixup {
    pub name: BString,
    pub offset: u16,
}

/// One contiguous byte blob placed at a segment offset, together with its
/// patch sites.
///
/// `internal` maps `(target_seg_id, width)` to the offsets (within the
/// containing segment) of 16-bit words that must be adjusted when the target
/// segment is placed. `external` maps a patch width to unresolved symbol use
/// sites. Every site lies within `offset .. offset + data.len()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ContentDef {
    pub seg_id: u8,
    pub offset: u16,
    pub data: Vec<u8>,
    pub internal: BTreeMap<(u8, u8), Vec<u16>>,
    pub external: BTreeMap<u8, Vec<ExternalFixup>>,
}

/// Debug information contributed by one ancestor module.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct DebugBlock {
    pub ancestor_name: Option<BString>,
    pub local_symbols: BTreeMap<u8, Vec<NamedOffset>>,
    pub line_numbers: BTreeMap<u8, Vec<LineNumber>>,
}

/// An object module: segments, symbols, content, and debug information.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Module {
    /// Module name, at most 255 bytes.
    pub name: BString,
    /// Whether this module supplies the program entry.
    pub is_main: bool,
    /// Segment descriptors, keyed by segment id.
    pub segments: BTreeMap<u8, Segment>,
    /// NAMED COMMON DEFINITIONS content, carried verbatim.
    pub common_names: Option<NamedCommonDefinitions>,
    /// Imported symbol names; position is the index used by external
    /// reference records.
    pub external_names: Vec<BString>,
    /// Exported symbols per segment, sorted by ascending offset.
    pub public_declarations: BTreeMap<u8, Vec<NamedOffset>>,
    /// Content blobs in input order.
    pub content_definitions: Vec<ContentDef>,
    /// Debug blocks in input order.
    pub debug_info: Vec<DebugBlock>,
}

fn current_block(blocks: &mut Vec<DebugBlock>) -> &mut DebugBlock {
    if blocks.is_empty() {
        blocks.push(DebugBlock::default());
    }
    let last = blocks.len() - 1;
    &mut blocks[last]
}

fn current_content(cdefs: &mut [ContentDef]) -> Result<&mut ContentDef, Error> {
    cdefs
        .last_mut()
        .ok_or(Error::BadInput("reference record before any content definition"))
}

impl Module {
    /// Folds a record sequence, starting with MODULE HEADER and ending with
    /// MODULE END, into a module.
    pub fn from_records(records: &[Record]) -> Result<Module, Error> {
        match records.first() {
            Some(Record::ModuleHeader(_)) => {}
            _ => return Err(Error::BadInput("module does not begin with MODULE HEADER")),
        }
        match records.last() {
            Some(Record::ModuleEnd(_)) => {}
            _ => return Err(Error::BadInput("module does not end with MODULE END")),
        }

        let mut module = Module::default();
        for record in records {
            match record {
                Record::ModuleHeader(header) => {
                    module.name = header.name.clone();
                    for seg in &header.segments {
                        module.segments.insert(
                            seg.seg_id,
                            Segment {
                                length: seg.length.get(),
                                align: seg.align,
                            },
                        );
                    }
                }
                Record::ModuleEnd(end) => {
                    module.is_main = end.mod_typ == 1;
                    // seg_id and offset are not kept; they re-emit as (1, 0)
                }
                Record::NamedCommonDefinitions(commons) => {
                    module.common_names = Some(commons.clone());
                }
                Record::ExternalNames(names) => {
                    module.external_names = names.names.clone();
                }
                Record::PublicDeclaration(decl) => {
                    let list = module.public_declarations.entry(decl.seg_id).or_default();
                    list.extend(decl.publics.iter().cloned());
                    list.sort_by_key(|p| p.offset);
                }
                Record::ModuleAncestor(ancestor) => {
                    module.debug_info.push(DebugBlock {
                        ancestor_name: Some(ancestor.module_name.clone()),
                        ..DebugBlock::default()
                    });
                }
                Record::LocalSymbols(symbols) => {
                    let block = current_block(&mut module.debug_info);
                    let list = block.local_symbols.entry(symbols.seg_id).or_default();
                    list.extend(symbols.symbols.iter().cloned());
                    list.sort_by_key(|s| s.offset);
                }
                Record::LineNumbers(lines) => {
                    let block = current_block(&mut module.debug_info);
                    let list = block.line_numbers.entry(lines.seg_id).or_default();
                    list.extend(lines.line_numbers.iter().map(|l| LineNumber {
                        offset: l.offset.get(),
                        line: l.line.get(),
                    }));
                    list.sort_by_key(|l| l.offset);
                }
                Record::Content(content) => {
                    module.content_definitions.push(ContentDef {
                        seg_id: content.seg_id,
                        offset: content.offset,
                        data: content.data.clone(),
                        ..ContentDef::default()
                    });
                }
                Record::Relocation(reloc) => {
                    let cdef = current_content(&mut module.content_definitions)?;
                    // a relocation targets the content's own segment
                    let target = cdef.seg_id;
                    cdef.internal
                        .entry((target, reloc.width))
                        .or_default()
                        .extend_from_slice(&reloc.offsets);
                }
                Record::IntersegmentReferences(refs) => {
                    let cdef = current_content(&mut module.content_definitions)?;
                    cdef.internal
                        .entry((refs.seg_id, refs.width))
                        .or_default()
                        .extend_from_slice(&refs.offsets);
                }
                Record::ExternalReferences(refs) => {
                    let mut resolved = Vec::with_capacity(refs.references.len());
                    for r in &refs.references {
                        let name = module
                            .external_names
                            .get(r.name_index.get() as usize)
                            .ok_or(Error::BadInput("external name index out of range"))?
                            .clone();
                        resolved.push(ExternalFixup {
                            name,
                            offset: r.offset.get(),
                        });
                    }
                    let cdef = current_content(&mut module.content_definitions)?;
                    let list = cdef.external.entry(refs.width).or_default();
                    list.extend(resolved);
                    list.sort_by_key(|e| e.offset);
                }
                _ => return Err(Error::BadInput("record not valid in a module body")),
            }
        }
        Ok(module)
    }

    /// Emits this module as a record sequence (without a trailing END OF
    /// FILE record).
    ///
    /// Intra-segment relocations re-emit as INTERSEGMENT REFERENCES records
    /// naming the content's own segment, which encodes the same semantics.
    /// Fails with [`Error::UnresolvedExternal`] if a content definition
    /// references a name absent from `external_names`.
    pub fn to_records(&self) -> Result<Vec<Record>, Error> {
        let mut records = Vec::new();

        records.push(Record::ModuleHeader(ModuleHeader {
            name: self.name.clone(),
            segments: self
                .segments
                .iter()
                .map(|(&seg_id, seg)| SegmentDef {
                    seg_id,
                    length: U16::new(seg.length),
                    align: seg.align,
                })
                .collect(),
        }));

        if let Some(commons) = &self.common_names {
            records.push(Record::NamedCommonDefinitions(commons.clone()));
        }

        if !self.external_names.is_empty() {
            records.push(Record::ExternalNames(ExternalNames {
                names: self.external_names.clone(),
            }));
        }

        for (&seg_id, publics) in &self.public_declarations {
            if publics.is_empty() {
                continue;
            }
            records.push(Record::PublicDeclaration(PublicDeclaration {
                seg_id,
                publics: publics.clone(),
            }));
        }

        for block in &self.debug_info {
            if let Some(name) = &block.ancestor_name {
                records.push(Record::ModuleAncestor(ModuleAncestor {
                    module_name: name.clone(),
                }));
            }
            for (&seg_id, symbols) in &block.local_symbols {
                if symbols.is_empty() {
                    continue;
                }
                records.push(Record::LocalSymbols(LocalSymbols {
                    seg_id,
                    symbols: symbols.clone(),
                }));
            }
            for (&seg_id, lines) in &block.line_numbers {
                if lines.is_empty() {
                    continue;
                }
                records.push(Record::LineNumbers(LineNumbers {
                    seg_id,
                    line_numbers: lines
                        .iter()
                        .map(|l| LineNumberDef {
                            offset: U16::new(l.offset),
                            line: U16::new(l.line),
                        })
                        .collect(),
                }));
            }
        }

        let mut index_of: BTreeMap<&BStr, u16> = BTreeMap::new();
        for (index, name) in self.external_names.iter().enumerate() {
            index_of.insert(name.as_bstr(), index as u16);
        }

        for cdef in &self.content_definitions {
            records.push(Record::Content(Content {
                seg_id: cdef.seg_id,
                offset: cdef.offset,
                data: cdef.data.clone(),
            }));
            for (&(seg_id, width), offsets) in &cdef.internal {
                records.push(Record::IntersegmentReferences(IntersegmentReferences {
                    seg_id,
                    width,
                    offsets: offsets.clone(),
                }));
            }
            for (&width, fixups) in &cdef.external {
                let mut references = Vec::with_capacity(fixups.len());
                for fixup in fixups {
                    let &name_index = index_of
                        .get(fixup.name.as_bstr())
                        .ok_or_else(|| Error::UnresolvedExternal(fixup.name.clone()))?;
                    references.push(ExternalRefDef {
                        name_index: U16::new(name_index),
                        offset: U16::new(fixup.offset),
                    });
                }
                records.push(Record::ExternalReferences(ExternalReferences {
                    width,
                    references,
                }));
            }
        }

        records.push(Record::ModuleEnd(ModuleEnd {
            mod_typ: self.is_main as u8,
            seg_id: 1,
            offset: 0,
        }));
        Ok(records)
    }
}

/// Adds `value` to the 16-bit little-endian word that `site` addresses
/// within a content blob starting at segment offset `start`. The addition
/// wraps mod 2^16.
pub(crate) fn patch16(data: &mut [u8], start: u16, site: u16, value: u16) -> Result<(), Error> {
    const OUT_OF_RANGE: Error = Error::BadInput("patch site outside its content definition");
    let index = site.checked_sub(start).ok_or(OUT_OF_RANGE)? as usize;
    let bytes = data.get_mut(index..index + 2).ok_or(OUT_OF_RANGE)?;
    let word = u16::from_le_bytes([bytes[0], bytes[1]]).wrapping_add(value);
    bytes.copy_from_slice(&word.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{read_records, write_records, CommonName, Relocation};

    fn u16le(x: u16) -> U16<zerocopy::byteorder::LE> {
        U16::new(x)
    }

    #[test]
    fn empty_module_round_trip() {
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "A".into(),
                segments: vec![SegmentDef {
                    seg_id: 1,
                    length: u16le(0),
                    align: 0,
                }],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ];
        let bytes = write_records(&records);

        let module = Module::from_records(&read_records(&bytes).unwrap()).unwrap();
        assert_eq!(module.name, "A");
        assert!(!module.is_main);
        assert_eq!(module.segments[&1], Segment { length: 0, align: 0 });

        // a zero-length segment parsed from the header is kept, so the
        // re-emitted bytes are identical to the input
        assert_eq!(write_records(&module.to_records().unwrap()), bytes);
    }

    #[test]
    fn module_end_fields_are_canonicalized() {
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "M".into(),
                segments: vec![],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 1,
                seg_id: 3,
                offset: 0x77,
            }),
        ];
        let module = Module::from_records(&records).unwrap();
        assert!(module.is_main);

        let out = module.to_records().unwrap();
        assert_eq!(
            out.last(),
            Some(&Record::ModuleEnd(ModuleEnd {
                mod_typ: 1,
                seg_id: 1,
                offset: 0,
            }))
        );
    }

    #[test]
    fn publics_merge_sorted() {
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "M".into(),
                segments: vec![SegmentDef {
                    seg_id: 1,
                    length: u16le(0x20),
                    align: 0,
                }],
            }),
            Record::PublicDeclaration(PublicDeclaration {
                seg_id: 1,
                publics: vec![NamedOffset {
                    offset: 9,
                    name: "LATE".into(),
                }],
            }),
            Record::PublicDeclaration(PublicDeclaration {
                seg_id: 1,
                publics: vec![NamedOffset {
                    offset: 2,
                    name: "EARLY".into(),
                }],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ];
        let module = Module::from_records(&records).unwrap();
        let publics = &module.public_declarations[&1];
        assert_eq!(publics[0].name, "EARLY");
        assert_eq!(publics[1].name, "LATE");

        // a single record per segment comes back out
        let out = module.to_records().unwrap();
        let decls: Vec<_> = out
            .iter()
            .filter(|r| matches!(r, Record::PublicDeclaration(_)))
            .collect();
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn references_attach_to_latest_content() {
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "M".into(),
                segments: vec![
                    SegmentDef {
                        seg_id: 1,
                        length: u16le(8),
                        align: 0,
                    },
                    SegmentDef {
                        seg_id: 2,
                        length: u16le(4),
                        align: 0,
                    },
                ],
            }),
            Record::ExternalNames(ExternalNames {
                names: vec!["PUTC".into()],
            }),
            Record::Content(Content {
                seg_id: 1,
                offset: 0,
                data: vec![0xcd, 0x00, 0x00, 0x21, 0x00, 0x00, 0x76, 0x00],
            }),
            Record::Relocation(Relocation {
                width: 3,
                offsets: vec![4],
            }),
            Record::IntersegmentReferences(IntersegmentReferences {
                seg_id: 2,
                width: 3,
                offsets: vec![1],
            }),
            Record::ExternalReferences(ExternalReferences {
                width: 3,
                references: vec![ExternalRefDef {
                    name_index: u16le(0),
                    offset: u16le(1),
                }],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ];
        let module = Module::from_records(&records).unwrap();
        let cdef = &module.content_definitions[0];
        // the relocation targets the content's own segment
        assert_eq!(cdef.internal[&(1, 3)], vec![4]);
        assert_eq!(cdef.internal[&(2, 3)], vec![1]);
        assert_eq!(
            cdef.external[&3],
            vec![ExternalFixup {
                name: "PUTC".into(),
                offset: 1,
            }]
        );

        // relocations re-emit as intersegment references naming the own
        // segment, and external names map back to indices
        let out = module.to_records().unwrap();
        assert!(out.contains(&Record::IntersegmentReferences(IntersegmentReferences {
            seg_id: 1,
            width: 3,
            offsets: vec![4],
        })));
        assert!(out.contains(&Record::ExternalReferences(ExternalReferences {
            width: 3,
            references: vec![ExternalRefDef {
                name_index: u16le(0),
                offset: u16le(1),
            }],
        })));
    }

    #[test]
    fn local_symbols_open_an_implicit_debug_block() {
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "M".into(),
                segments: vec![],
            }),
            Record::LocalSymbols(LocalSymbols {
                seg_id: 1,
                symbols: vec![NamedOffset {
                    offset: 6,
                    name: "TMP".into(),
                }],
            }),
            Record::ModuleAncestor(ModuleAncestor {
                module_name: "LIB".into(),
            }),
            Record::LocalSymbols(LocalSymbols {
                seg_id: 1,
                symbols: vec![NamedOffset {
                    offset: 0,
                    name: "BUF".into(),
                }],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ];
        let module = Module::from_records(&records).unwrap();
        assert_eq!(module.debug_info.len(), 2);
        assert_eq!(module.debug_info[0].ancestor_name, None);
        assert_eq!(module.debug_info[0].local_symbols[&1][0].name, "TMP");
        assert_eq!(
            module.debug_info[1].ancestor_name,
            Some(BString::from("LIB"))
        );
        assert_eq!(module.debug_info[1].local_symbols[&1][0].name, "BUF");
    }

    #[test]
    fn common_names_carried_verbatim() {
        let commons = NamedCommonDefinitions {
            seg_id: 0,
            commons: vec![CommonName {
                seg_id: 255,
                name: "SHARED".into(),
            }],
        };
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "M".into(),
                segments: vec![],
            }),
            Record::NamedCommonDefinitions(commons.clone()),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ];
        let module = Module::from_records(&records).unwrap();
        assert_eq!(module.common_names, Some(commons.clone()));
        assert!(module
            .to_records()
            .unwrap()
            .contains(&Record::NamedCommonDefinitions(commons)));
    }

    #[test]
    fn reference_record_before_content_is_rejected() {
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "M".into(),
                segments: vec![],
            }),
            Record::Relocation(Relocation {
                width: 3,
                offsets: vec![0],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ];
        assert!(matches!(
            Module::from_records(&records),
            Err(Error::BadInput(_))
        ));
    }

    #[test]
    fn external_index_out_of_range_is_rejected() {
        let records = vec![
            Record::ModuleHeader(ModuleHeader {
                name: "M".into(),
                segments: vec![],
            }),
            Record::Content(Content {
                seg_id: 1,
                offset: 0,
                data: vec![0, 0],
            }),
            Record::ExternalReferences(ExternalReferences {
                width: 3,
                references: vec![ExternalRefDef {
                    name_index: u16le(7),
                    offset: u16le(0),
                }],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ];
        assert!(matches!(
            Module::from_records(&records),
            Err(Error::BadInput(_))
        ));
    }

    #[test]
    fn stream_shape_is_checked() {
        assert!(matches!(
            Module::from_records(&[]),
            Err(Error::BadInput(_))
        ));
        assert!(matches!(
            Module::from_records(&[Record::EndOfFile]),
            Err(Error::BadInput(_))
        ));
        let unterminated = [Record::ModuleHeader(ModuleHeader {
            name: "M".into(),
            segments: vec![],
        })];
        assert!(matches!(
            Module::from_records(&unterminated),
            Err(Error::BadInput(_))
        ));
    }

    #[test]
    fn patch16_wraps_and_checks_bounds() {
        let mut data = vec![0xff, 0xff, 0x00];
        patch16(&mut data, 0x10, 0x10, 2).unwrap();
        assert_eq!(data, vec![0x01, 0x00, 0x00]);

        assert!(patch16(&mut data, 0x10, 0x0f, 1).is_err()); // before the blob
        assert!(patch16(&mut data, 0x10, 0x12, 1).is_err()); // straddles the end
    }
}
