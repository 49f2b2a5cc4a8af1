use anyhow::{Context, Result};
use omf80::Record;
use pretty_hex::PrettyHex;
use std::path::PathBuf;

/// Prints a human-readable listing of every record in an object file.
#[derive(clap::Parser)]
pub struct DumpOptions {
    /// The object file or library to dump.
    file: PathBuf,
}

pub fn command(options: DumpOptions) -> Result<()> {
    let data = std::fs::read(&options.file)
        .with_context(|| format!("reading {}", options.file.display()))?;
    let records = omf80::read_records(&data)
        .with_context(|| format!("decoding {}", options.file.display()))?;

    for record in &records {
        print_record(record);
    }
    Ok(())
}

fn print_record(record: &Record) {
    println!("{} RECORD", record.kind());
    match record {
        Record::ModuleHeader(r) => {
            println!("\tMODULE NAME = \"{}\"", r.name);
            for seg in &r.segments {
                println!(
                    "\tSEG ID = {:02x}, LENGTH = {}, ALN = {}",
                    seg.seg_id,
                    seg.length.get(),
                    seg.align
                );
            }
        }
        Record::ModuleEnd(r) => {
            println!("\tMOD TYP = {}", r.mod_typ);
            println!("\tSEG ID = {}", r.seg_id);
            println!("\tOFFSET = 0x{:04x}", r.offset);
        }
        Record::Content(r) => {
            println!("\tSEG ID = {}", r.seg_id);
            println!("\tOFFSET = 0x{:04x}", r.offset);
            println!("{:?}", r.data.hex_dump());
        }
        Record::LineNumbers(r) => {
            println!("\tSEG ID = {}", r.seg_id);
            for line in &r.line_numbers {
                println!(
                    "\tOFFSET = 0x{:04x}, LINE NUMBER = {}",
                    line.offset.get(),
                    line.line.get()
                );
            }
        }
        Record::EndOfFile => {}
        Record::ModuleAncestor(r) => {
            println!("\tMODULE NAME = \"{}\"", r.module_name);
        }
        Record::LocalSymbols(r) => {
            println!("\tSEG ID = {}", r.seg_id);
            for symbol in &r.symbols {
                println!(
                    "\tOFFSET = 0x{:04x}, SYMBOL NAME = {}",
                    symbol.offset, symbol.name
                );
            }
        }
        Record::PublicDeclaration(r) => {
            println!("\tSEG ID = {}", r.seg_id);
            for public in &r.publics {
                println!(
                    "\tOFFSET = 0x{:04x}, PUBLIC NAME = {}",
                    public.offset, public.name
                );
            }
        }
        Record::ExternalNames(r) => {
            for name in &r.names {
                println!("\tEXTERNAL NAME = {name}");
            }
        }
        Record::ExternalReferences(r) => {
            println!("\tLO HI BOTH = {}", r.width);
            for reference in &r.references {
                println!(
                    "\tEXTERNAL NAME INDEX = 0x{:04x}, OFFSET = 0x{:04x}",
                    reference.name_index.get(),
                    reference.offset.get()
                );
            }
        }
        Record::Relocation(r) => {
            println!("\tLO HI BOTH = {}", r.width);
            for offset in &r.offsets {
                println!("\tOFFSET = 0x{offset:04x}");
            }
        }
        Record::IntersegmentReferences(r) => {
            println!("\tSEG ID = {}", r.seg_id);
            println!("\tLO HI BOTH = {}", r.width);
            for offset in &r.offsets {
                println!("\tOFFSET = 0x{offset:04x}");
            }
        }
        Record::LibraryModuleLocations(r) => {
            for location in &r.locations {
                println!(
                    "\tBLOCK NUMBER = {}, BYTE NUMBER = {}",
                    location.block.get(),
                    location.byte.get()
                );
            }
        }
        Record::LibraryModuleNames(r) => {
            for name in &r.names {
                println!("\t{name}");
            }
        }
        Record::LibraryDictionary(r) => {
            for group in &r.groups {
                println!("\t{group:?}");
            }
        }
        Record::LibraryHeader(r) => {
            println!("\tMODULE COUNT = {}", r.module_count.get());
            println!("\tBLOCK NUMBER = {}", r.block.get());
            println!("\tBYTE NUMBER = {}", r.byte.get());
        }
        Record::NamedCommonDefinitions(r) => {
            println!("\tSEG ID = {}", r.seg_id);
            for common in &r.commons {
                println!("\tSEG ID = {}, COMMON NAME = {}", common.seg_id, common.name);
            }
        }
    }
}
