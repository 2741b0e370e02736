//! Resolve command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use owo_colors::OwoColorize;
use sigscout_core::{
    DeploymentMode, FileImageProvider, SymbolResolver, load_catalog,
};
use tracing::info;

use super::hex_utils::parse_hex_address;

#[derive(Args)]
pub struct ResolveArgs {
    /// Primary image dump
    #[arg(long)]
    image: PathBuf,

    /// Load address the primary image was dumped at (hex)
    #[arg(long)]
    base: String,

    /// Support library as name=path@hexbase
    #[arg(long)]
    support: Option<String>,

    /// Signature catalogue (JSON)
    #[arg(long)]
    signatures: PathBuf,

    /// Also run the post-startup catalogue
    #[arg(long)]
    post: bool,
}

pub fn run(args: ResolveArgs) -> Result<()> {
    let base = parse_hex_address(&args.base)?;
    let catalog = load_catalog(&args.signatures)
        .with_context(|| format!("loading catalogue {}", args.signatures.display()))?;
    info!("Loaded catalogue version: {}", catalog.version);

    let mut provider = FileImageProvider::new(&args.image, base);
    let mode = match &args.support {
        Some(support) => {
            let (name, path, support_base) = parse_support(support)?;
            provider = provider.with_library(&name, path, support_base);
            DeploymentMode::WithSupportLibrary { library: name }
        }
        None => DeploymentMode::SingleImage,
    };

    let mut resolver = SymbolResolver::new(mode, catalog)?;
    resolver.run(&provider)?;
    if args.post && !resolver.status().is_critical_failure() {
        resolver.run_post_startup()?;
    }
    let failed_names = resolver.status().failed_specs().to_vec();

    println!("=== Resolution Report ===");
    println!("Phase: {}", resolver.phase());
    println!();
    println!("Resolved slots:");
    for (slot, symbol) in resolver.table().iter() {
        println!(
            "  {} {:<28} {:>10} @ 0x{:X}",
            "✓".green(),
            slot,
            symbol.kind.to_string(),
            symbol.addr
        );
    }
    if !failed_names.is_empty() {
        println!();
        println!("Unresolved specs:");
        for name in &failed_names {
            println!("  {} {}", "✗".red(), name);
        }
    }
    if !resolver.registry().is_empty() {
        println!();
        println!("Discovered libraries:");
        for entry in resolver.registry().iter() {
            println!(
                "  base 0x{:X}  init 0x{:X}  free 0x{:X}  refs {}",
                entry.base, entry.init_fn, entry.free_fn, entry.ref_count
            );
        }
    }

    println!();
    let status = resolver.status();
    println!(
        "Critical failure: {}   Soft failure: {}",
        status.is_critical_failure(),
        status.is_soft_failure()
    );

    if status.is_critical_failure() {
        bail!("critical resolution failure");
    }
    Ok(())
}

fn parse_support(s: &str) -> Result<(String, PathBuf, u64)> {
    let (name, rest) = s
        .split_once('=')
        .context("expected --support name=path@hexbase")?;
    let (path, base) = rest
        .rsplit_once('@')
        .context("expected --support name=path@hexbase")?;
    Ok((
        name.to_string(),
        PathBuf::from(path),
        parse_hex_address(base)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_support() {
        let (name, path, base) = parse_support("corelib=dumps/core.bin@0x7FF800000000").unwrap();
        assert_eq!(name, "corelib");
        assert_eq!(path, PathBuf::from("dumps/core.bin"));
        assert_eq!(base, 0x7FF8_0000_0000);

        assert!(parse_support("corelib").is_err());
        assert!(parse_support("corelib=core.bin").is_err());
    }
}
