use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sigscout")]
#[command(about = "Signature scanning and symbol resolution for binary image dumps")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a signature catalogue against image dumps
    Resolve(commands::resolve::ResolveArgs),
    /// Scan one pattern against an image dump
    Scan(commands::scan::ScanArgs),
    /// Decode a relative call or lea operand at an address
    Fixup(commands::fixup::FixupArgs),
    /// Compile every pattern in a catalogue
    Validate(commands::validate::ValidateArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sigscout=info".parse()?))
        .init();

    let args = Args::parse();
    match args.command {
        Command::Resolve(args) => commands::resolve::run(args),
        Command::Scan(args) => commands::scan::run(args),
        Command::Fixup(args) => commands::fixup::run(args),
        Command::Validate(args) => commands::validate::run(args),
    }
}
