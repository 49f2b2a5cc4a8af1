#![forbid(unused_must_use)]

use clap::Parser;

mod dump;
mod input;
mod link;
mod linkbin;
mod mkbin;
mod util;

#[derive(clap::Parser)]
#[command(
    name = "omftool",
    about = "Links Intel OMF-80 object modules and builds flat binary images"
)]
struct CommandWithFlags {
    /// Reduce logging to just warnings and errors.
    #[arg(long)]
    quiet: bool,

    /// Turn on debug output. Noisy!
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Links object modules and libraries into a single object module.
    Link(link::LinkOptions),
    /// Links object modules and libraries and writes a flat binary image.
    Linkbin(linkbin::LinkbinOptions),
    /// Converts one object module into a flat binary image.
    Mkbin(mkbin::MkbinOptions),
    /// Prints a human-readable listing of every record in an object file.
    Dump(dump::DumpOptions),
}

fn main() -> anyhow::Result<()> {
    let command_with_flags = CommandWithFlags::parse();
    configure_tracing(&command_with_flags);

    match command_with_flags.command {
        Command::Link(args) => link::command(args)?,
        Command::Linkbin(args) => linkbin::command(args)?,
        Command::Mkbin(args) => mkbin::command(args)?,
        Command::Dump(args) => dump::command(args)?,
    }

    Ok(())
}

fn configure_tracing(args: &CommandWithFlags) {
    use tracing_subscriber::filter::LevelFilter;

    let max_level = if args.quiet {
        LevelFilter::WARN
    } else if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
}
