//! Fixup command implementation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use sigscout_core::{LocatedImages, ModuleImage, fixup};

use super::hex_utils::parse_hex_address;

#[derive(Args)]
pub struct FixupArgs {
    /// Image dump containing the instruction
    #[arg(long)]
    image: PathBuf,

    /// Load address the image was dumped at (hex)
    #[arg(long)]
    base: String,

    /// Address of the instruction (hex)
    #[arg(long)]
    at: String,

    /// Decode a lea operand instead of a near call: disp_offset,instr_len
    #[arg(long)]
    lea: Option<String>,
}

pub fn run(args: FixupArgs) -> Result<()> {
    let base = parse_hex_address(&args.base)?;
    let at = parse_hex_address(&args.at)?;
    let data = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;

    let name = args
        .image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.image.display().to_string());
    let images = LocatedImages::new(ModuleImage::new(name, base, data), None);

    let target = match &args.lea {
        Some(lea) => {
            let (disp_offset, instr_len) = parse_lea(lea)?;
            fixup::lea_target(&images, at, disp_offset, instr_len)?
        }
        None => fixup::call_target(&images, at)?,
    };

    println!("Instruction: 0x{at:X}");
    println!("Target:      0x{target:X}");

    Ok(())
}

fn parse_lea(s: &str) -> Result<(usize, usize)> {
    let Some((disp_offset, instr_len)) = s.split_once(',') else {
        bail!("expected --lea disp_offset,instr_len (e.g. 3,7)");
    };
    Ok((disp_offset.trim().parse()?, instr_len.trim().parse()?))
}
