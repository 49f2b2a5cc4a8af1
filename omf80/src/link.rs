//! The linker: combines object modules, pulling in library members on
//! demand, and resolves external references.
//!
//! Linking is a pure fold over the inputs: a new combined [`Module`] is
//! produced and the inputs are left untouched (content bytes are deep-copied
//! before patching). Any error discards the partial result.

use crate::error::Error;
use crate::library::Library;
use crate::module::{
    patch16, ContentDef, DebugBlock, ExternalFixup, LineNumber, Module, Segment,
    ABSOLUTE_SEGMENT, CODE_SEGMENT, DATA_SEGMENT, MEMORY_SEGMENT, STACK_SEGMENT,
};
use crate::records::{NamedOffset, Record};
use bstr::BString;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// One linker input: either an object module or an object library.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum LinkItem {
    Module(Module),
    Library(Library),
}

impl LinkItem {
    /// Classifies a record stream by its first record and assembles it.
    pub fn from_records(records: &[Record]) -> Result<LinkItem, Error> {
        match records.first() {
            Some(Record::ModuleHeader(_)) => Ok(LinkItem::Module(Module::from_records(records)?)),
            Some(Record::LibraryHeader(_)) => {
                Ok(LinkItem::Library(Library::from_records(records)?))
            }
            _ => Err(Error::BadInput(
                "input begins with neither MODULE HEADER nor LIBRARY HEADER",
            )),
        }
    }
}

/// A public symbol registered while combining modules.
#[derive(Clone, Debug)]
struct PublicSymbol {
    seg_id: u8,
    value: u16,
}

/// Links the given items, in order, into a single combined module.
///
/// Modules are always included. A library contributes only the members that
/// provide a symbol some earlier input imports; members transitively needed
/// through other members of the same library are found as well. A library is
/// never re-scanned once a later input item has been processed.
pub fn link(items: Vec<LinkItem>) -> Result<Module, Error> {
    link_modules(&select_modules(items))
}

fn absorb_names(module: &Module, publics: &mut BTreeSet<BString>, externs: &mut BTreeSet<BString>) {
    externs.extend(module.external_names.iter().cloned());
    for declarations in module.public_declarations.values() {
        for public in declarations {
            publics.insert(public.name.clone());
        }
    }
    externs.retain(|name| !publics.contains(name));
}

fn select_modules(items: Vec<LinkItem>) -> Vec<Module> {
    let mut selected = Vec::new();
    let mut publics = BTreeSet::new();
    let mut externs = BTreeSet::new();

    for item in items {
        match item {
            LinkItem::Module(module) => {
                absorb_names(&module, &mut publics, &mut externs);
                selected.push(module);
            }
            LinkItem::Library(library) => {
                let mut included: BTreeSet<usize> = BTreeSet::new();
                loop {
                    let mut needed = BTreeSet::new();
                    for (name, &index) in &library.dictionary {
                        if externs.contains(name) && !included.contains(&index) {
                            needed.insert(index);
                        }
                    }
                    if needed.is_empty() {
                        break;
                    }
                    for index in needed {
                        let module = library.modules[index].clone();
                        debug!(module = %module.name, index, "including library module");
                        absorb_names(&module, &mut publics, &mut externs);
                        selected.push(module);
                        included.insert(index);
                    }
                }
            }
        }
    }
    selected
}

fn rebase(seg_id: u8, code_offset: u16, data_offset: u16) -> Result<u16, Error> {
    match seg_id {
        ABSOLUTE_SEGMENT | MEMORY_SEGMENT => Ok(0),
        CODE_SEGMENT => Ok(code_offset),
        // stack content is laid out adjacent to data
        DATA_SEGMENT | STACK_SEGMENT => Ok(data_offset),
        other => Err(Error::UnknownSegment(other)),
    }
}

/// Combines the given modules, in order, into one module.
///
/// CODE and DATA segments are concatenated; every offset that names a
/// position within a rebased segment (publics, patch sites, debug entries)
/// is shifted by the cursor of its segment, and every patch site's 16-bit
/// word is incremented by its target segment's shift. External references
/// are then resolved against the combined public table; resolved sites whose
/// target segment is not absolute are registered as internal relocations so
/// a later image fixup can place them.
pub fn link_modules(modules: &[Module]) -> Result<Module, Error> {
    let mut combined = Module::default();
    let mut pub_table: BTreeMap<BString, PublicSymbol> = BTreeMap::new();
    let mut code_offset: u16 = 0;
    let mut data_offset: u16 = 0;

    for module in modules {
        // segment lengths accumulate; alignment comes from the first
        // declaration of each segment
        for (&seg_id, seg) in &module.segments {
            let entry = combined.segments.entry(seg_id).or_insert(Segment {
                length: 0,
                align: seg.align,
            });
            entry.length = entry.length.wrapping_add(seg.length);
        }

        if module.is_main {
            if combined.is_main {
                return Err(Error::DuplicateMain);
            }
            combined.is_main = true;
            combined.name = module.name.clone();
        }

        for (&seg_id, declarations) in &module.public_declarations {
            let base = rebase(seg_id, code_offset, data_offset)?;
            let list = combined.public_declarations.entry(seg_id).or_default();
            for public in declarations {
                let offset = public.offset.wrapping_add(base);
                list.push(NamedOffset {
                    offset,
                    name: public.name.clone(),
                });
                pub_table.insert(
                    public.name.clone(),
                    PublicSymbol {
                        seg_id,
                        value: offset,
                    },
                );
            }
        }

        for cdef in &module.content_definitions {
            let base = rebase(cdef.seg_id, code_offset, data_offset)?;
            let mut data = cdef.data.clone();

            let mut internal = BTreeMap::new();
            for (&(target, width), sites) in &cdef.internal {
                let target_base = rebase(target, code_offset, data_offset)?;
                let mut rebased = Vec::with_capacity(sites.len());
                for &site in sites {
                    patch16(&mut data, cdef.offset, site, target_base)?;
                    rebased.push(site.wrapping_add(base));
                }
                internal.insert((target, width), rebased);
            }

            let mut external = BTreeMap::new();
            for (&width, fixups) in &cdef.external {
                let carried: Vec<ExternalFixup> = fixups
                    .iter()
                    .map(|fixup| ExternalFixup {
                        name: fixup.name.clone(),
                        offset: fixup.offset.wrapping_add(base),
                    })
                    .collect();
                external.insert(width, carried);
            }

            combined.content_definitions.push(ContentDef {
                seg_id: cdef.seg_id,
                offset: cdef.offset.wrapping_add(base),
                data,
                internal,
                external,
            });
        }

        // debug ancestry is rebuilt from the contributing module's name
        for block in &module.debug_info {
            let mut copied = DebugBlock {
                ancestor_name: Some(module.name.clone()),
                ..DebugBlock::default()
            };
            for (&seg_id, symbols) in &block.local_symbols {
                let base = rebase(seg_id, code_offset, data_offset)?;
                copied.local_symbols.insert(
                    seg_id,
                    symbols
                        .iter()
                        .map(|symbol| NamedOffset {
                            offset: symbol.offset.wrapping_add(base),
                            name: symbol.name.clone(),
                        })
                        .collect(),
                );
            }
            for (&seg_id, lines) in &block.line_numbers {
                let base = rebase(seg_id, code_offset, data_offset)?;
                copied.line_numbers.insert(
                    seg_id,
                    lines
                        .iter()
                        .map(|line| LineNumber {
                            offset: line.offset.wrapping_add(base),
                            line: line.line,
                        })
                        .collect(),
                );
            }
            combined.debug_info.push(copied);
        }

        code_offset = code_offset
            .wrapping_add(module.segments.get(&CODE_SEGMENT).map_or(0, |s| s.length));
        data_offset = data_offset
            .wrapping_add(module.segments.get(&DATA_SEGMENT).map_or(0, |s| s.length));
        debug!(module = %module.name, code_offset, data_offset, "module combined");
    }

    combined.segments.retain(|_, seg| seg.length != 0);

    // resolve external references against the combined public table
    for cdef in &mut combined.content_definitions {
        let external = std::mem::take(&mut cdef.external);
        for (width, fixups) in external {
            for fixup in fixups {
                let Some(symbol) = pub_table.get(&fixup.name) else {
                    return Err(Error::UnresolvedExternal(fixup.name));
                };
                patch16(&mut cdef.data, cdef.offset, fixup.offset, symbol.value)?;
                if symbol.seg_id != ABSOLUTE_SEGMENT {
                    cdef.internal
                        .entry((symbol.seg_id, width))
                        .or_default()
                        .push(fixup.offset);
                }
            }
        }
    }

    Ok(combined)
}
