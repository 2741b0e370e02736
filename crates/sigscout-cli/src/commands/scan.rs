//! Scan command implementation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use sigscout_core::Pattern;

use super::hex_utils::parse_hex_address;

#[derive(Args)]
pub struct ScanArgs {
    /// Image dump to scan
    #[arg(long)]
    image: PathBuf,

    /// Load address the image was dumped at (hex)
    #[arg(long, default_value = "0")]
    base: String,

    /// Signature text, e.g. "48 8B ?? 0D"
    #[arg(long)]
    pattern: String,

    /// Report every match instead of only the first
    #[arg(long)]
    all: bool,
}

pub fn run(args: ScanArgs) -> Result<()> {
    let base = parse_hex_address(&args.base)?;
    let pattern = Pattern::compile(&args.pattern)?;
    let data = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;

    println!(
        "Scanning {} ({} bytes) for [{}]",
        args.image.display(),
        data.len(),
        pattern.format()
    );

    let offsets = if args.all {
        pattern.find_all(&data)
    } else {
        pattern.find(&data).into_iter().collect()
    };

    if offsets.is_empty() {
        println!("No match.");
        return Ok(());
    }

    for offset in &offsets {
        println!("  0x{:X}  (offset 0x{:X})", base + *offset as u64, offset);
    }
    println!("{} match(es).", offsets.len());

    Ok(())
}
