use crate::input::read_link_item;
use crate::util::Addr;
use anyhow::{Context, Result};
use omf80::image;
use std::path::PathBuf;
use tracing::{debug, info};

/// Links object modules and libraries and writes a flat binary image.
#[derive(clap::Parser)]
pub struct LinkbinOptions {
    /// Input object modules and libraries, in link order.
    #[arg(required = true)]
    files_in: Vec<PathBuf>,

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

pub fn command(options: LinkbinOptions) -> Result<()> {
    let mut items = Vec::with_capacity(options.files_in.len());
    for path in &options.files_in {
        items.push(read_link_item(path)?);
    }

    let mut module = omf80::link(items)?;
    debug!(code = options.code.0, stack = options.stack.0, "placing image");
    image::adjust(&mut module, options.code.0, options.stack.0)?;
    let bytes = image::build_image(&module);

    std::fs::write(&options.out, &bytes)
        .with_context(|| format!("writing {}", options.out.display()))?;
    info!("wrote {} ({} bytes)", options.out.display(), bytes.len());
    Ok(())
}
