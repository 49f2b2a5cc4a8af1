use crate::input::read_object_records;
use crate::util::Addr;
use anyhow::{Context, Result};
use omf80::{image, Module};
use std::path::PathBuf;
use tracing::{debug, info};

/// Converts one object module into a flat binary image.
#[derive(clap::Parser)]
pub struct MkbinOptions {
    /// The input object module.
    file_in: PathBuf,

    /// The output image file.
    #[arg(short, long)]
    out: PathBuf,

    /// Load address of the code segment (decimal, 0x-prefixed hex, or
    /// h-suffixed hex).
    #[arg(long, default_value = "0")]
    code: Addr,

    /// Size of the stack segment.
    #[arg(long, default_value = "0")]
    stack: Addr,
}

pub fn command(options: MkbinOptions) -> Result<()> {
    let records = read_object_records(&options.file_in)?;
    let mut module = Module::from_records(&records)
        .with_context(|| format!("assembling {}", options.file_in.display()))?;

    debug!(code = options.code.0, stack = options.stack.0, "placing image");
    image::adjust(&mut module, options.code.0, options.stack.0)?;
    let bytes = image::build_image(&module);

    std::fs::write(&options.out, &bytes)
        .with_context(|| format!("writing {}", options.out.display()))?;
    info!("wrote {} ({} bytes)", options.out.display(), bytes.len());
    Ok(())
}
