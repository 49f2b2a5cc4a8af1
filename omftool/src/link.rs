use crate::input::read_link_item;
use anyhow::{Context, Result};
use omf80::Record;
use std::path::PathBuf;
use tracing::{debug, info};

/// Links object modules and libraries into a single object module.
#[derive(clap::Parser)]
pub struct LinkOptions {
    /// Input object modules and libraries, in link order.
    #[arg(required = true)]
    files_in: Vec<PathBuf>,

    /// The output object file.
    #[arg(short, long)]
    out: PathBuf,
}

pub fn command(options: LinkOptions) -> Result<()> {
    let mut items = Vec::with_capacity(options.files_in.len());
    for path in &options.files_in {
        items.push(read_link_item(path)?);
    }

    let module = omf80::link(items)?;
    debug!(name = %module.name, main = module.is_main, "modules linked");

    let mut records = module.to_records()?;
    records.push(Record::EndOfFile);
    let bytes = omf80::write_records(&records);
    std::fs::write(&options.out, &bytes)
        .with_context(|| format!("writing {}", options.out.display()))?;
    info!("wrote {} ({} bytes)", options.out.display(), bytes.len());
    Ok(())
}
