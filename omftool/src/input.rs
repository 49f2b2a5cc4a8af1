use anyhow::{Context, Result};
use omf80::{LinkItem, Record};
use std::path::Path;
use tracing::debug;

/// Reads an object file or library and strips the END OF FILE terminator.
pub fn read_object_records(path: &Path) -> Result<Vec<Record>> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut records =
        omf80::read_records(&data).with_context(|| format!("decoding {}", path.display()))?;
    if !matches!(records.last(), Some(Record::EndOfFile)) {
        return Err(omf80::Error::BadInput("file lacks an END OF FILE record"))
            .with_context(|| path.display().to_string());
    }
    records.pop();
    debug!(path = %path.display(), records = records.len(), "object file decoded");
    Ok(records)
}

/// Reads one linker input, classifying it as a module or a library.
pub fn read_link_item(path: &Path) -> Result<LinkItem> {
    let records = read_object_records(path)?;
    LinkItem::from_records(&records).with_context(|| format!("assembling {}", path.display()))
}
