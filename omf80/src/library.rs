//! The in-memory model of an OMF-80 object library.

use crate::error::Error;
use crate::module::Module;
use crate::records::Record;
use bstr::BString;
use std::collections::BTreeMap;

/// An object library: a list of modules plus a dictionary indexing which
/// module provides each public symbol.
///
/// Libraries are read-only after assembly; this linker consumes them but
/// never writes one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Library {
    /// The member modules, in file order.
    pub modules: Vec<Module>,
    /// Maps a public symbol name to the index of the providing module.
    pub dictionary: BTreeMap<BString, usize>,
}

impl Library {
    /// Assembles a library from a record sequence.
    ///
    /// LIBRARY HEADER, LIBRARY MODULE NAMES, and LIBRARY MODULE LOCATIONS
    /// records describe the physical file layout and are not needed to
    /// reconstruct the logical library; they are accepted and discarded.
    pub fn from_records(records: &[Record]) -> Result<Library, Error> {
        let mut library = Library::default();
        let mut run_start: Option<usize> = None;
        for (i, record) in records.iter().enumerate() {
            match record {
                Record::LibraryHeader(_)
                | Record::LibraryModuleNames(_)
                | Record::LibraryModuleLocations(_)
                | Record::EndOfFile => {}
                Record::LibraryDictionary(dict) => {
                    for (index, group) in dict.groups.iter().enumerate() {
                        for name in group {
                            library.dictionary.insert(name.clone(), index);
                        }
                    }
                }
                Record::ModuleHeader(_) => {
                    if run_start.is_some() {
                        return Err(Error::BadInput("module header inside another module"));
                    }
                    run_start = Some(i);
                }
                Record::ModuleEnd(_) => {
                    let start = run_start
                        .take()
                        .ok_or(Error::BadInput("module end without module header"))?;
                    library
                        .modules
                        .push(Module::from_records(&records[start..=i])?);
                }
                _ => {
                    if run_start.is_none() {
                        return Err(Error::BadInput("record outside any module in a library"));
                    }
                }
            }
        }

        if run_start.is_some() {
            return Err(Error::BadInput("library ends inside a module"));
        }
        for &index in library.dictionary.values() {
            if index >= library.modules.len() {
                return Err(Error::BadLibraryDictionary);
            }
        }
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        LibraryDictionary, LibraryHeader, ModuleEnd, ModuleHeader, PublicDeclaration, NamedOffset,
    };
    use zerocopy::byteorder::U16;

    fn member(name: &str, public: &str) -> Vec<Record> {
        vec![
            Record::ModuleHeader(ModuleHeader {
                name: name.into(),
                segments: vec![],
            }),
            Record::PublicDeclaration(PublicDeclaration {
                seg_id: 1,
                publics: vec![NamedOffset {
                    offset: 0,
                    name: public.into(),
                }],
            }),
            Record::ModuleEnd(ModuleEnd {
                mod_typ: 0,
                seg_id: 1,
                offset: 0,
            }),
        ]
    }

    fn sample_library() -> Vec<Record> {
        let mut records = vec![
            Record::LibraryHeader(LibraryHeader {
                module_count: U16::new(2),
                block: U16::new(0),
                byte: U16::new(0),
            }),
            Record::LibraryDictionary(LibraryDictionary {
                groups: vec![vec!["X".into()], vec!["Y".into()]],
            }),
        ];
        records.extend(member("M0", "X"));
        records.extend(member("M1", "Y"));
        records
    }

    #[test]
    fn assemble() {
        let library = Library::from_records(&sample_library()).unwrap();
        assert_eq!(library.modules.len(), 2);
        assert_eq!(library.modules[0].name, "M0");
        assert_eq!(library.modules[1].name, "M1");
        assert_eq!(library.dictionary[&BString::from("X")], 0);
        assert_eq!(library.dictionary[&BString::from("Y")], 1);
    }

    #[test]
    fn dictionary_index_must_name_a_member() {
        let mut records = vec![Record::LibraryDictionary(LibraryDictionary {
            groups: vec![vec!["X".into()], vec!["GHOST".into()]],
        })];
        records.extend(member("M0", "X"));
        assert_eq!(
            Library::from_records(&records),
            Err(Error::BadLibraryDictionary)
        );
    }

    #[test]
    fn unterminated_member_is_rejected() {
        let records = vec![Record::ModuleHeader(ModuleHeader {
            name: "M0".into(),
            segments: vec![],
        })];
        assert!(matches!(
            Library::from_records(&records),
            Err(Error::BadInput(_))
        ));
    }
}
