//! Validate command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use sigscout_core::load_catalog;

#[derive(Args)]
pub struct ValidateArgs {
    /// Signature catalogue (JSON)
    #[arg(long)]
    signatures: PathBuf,
}

pub fn run(args: ValidateArgs) -> Result<()> {
    let catalog = load_catalog(&args.signatures)
        .with_context(|| format!("loading catalogue {}", args.signatures.display()))?;

    let total = catalog.discovery.len() + catalog.specs.len() + catalog.post_specs.len();
    println!(
        "Catalogue {} ({} discovery, {} specs, {} post)",
        catalog.version,
        catalog.discovery.len(),
        catalog.specs.len(),
        catalog.post_specs.len()
    );

    match catalog.validate() {
        Ok(()) => {
            println!("{} all {} patterns compile", "✓".green(), total);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            Err(e.into())
        }
    }
}
