//! Relative-operand decoding for matched instructions.
//!
//! Signatures usually land on a call or load-address instruction whose
//! operand is a signed 32-bit displacement from the end of the
//! instruction. These helpers recover the absolute target from the image
//! snapshot. Only that one operand form is decoded; this is not a
//! disassembler.

use crate::error::{Error, Result};
use crate::module::LocatedImages;

/// Total encoded length of a near relative call: opcode plus a 32-bit
/// signed displacement.
pub const NEAR_CALL_LEN: usize = 5;

/// Absolute target of the near relative call at `instruction`.
///
/// Reads the displacement at `instruction + 1`; the target is
/// `instruction + 5 + displacement`.
pub fn call_target(images: &LocatedImages, instruction: u64) -> Result<u64> {
    relative_target(images, instruction, 1, NEAR_CALL_LEN)
}

/// Absolute target of a register-relative load-address instruction.
///
/// The displacement field offset and total instruction length vary with
/// the addressing-mode encoding, so the catalogue supplies both; they are
/// never inferred from the instruction bytes.
pub fn lea_target(
    images: &LocatedImages,
    instruction: u64,
    disp_offset: usize,
    instr_len: usize,
) -> Result<u64> {
    relative_target(images, instruction, disp_offset, instr_len)
}

fn relative_target(
    images: &LocatedImages,
    instruction: u64,
    disp_offset: usize,
    instr_len: usize,
) -> Result<u64> {
    let image = images
        .containing(instruction)
        .ok_or_else(|| Error::InvalidOperand {
            instruction,
            message: "instruction is outside every known image".to_string(),
        })?;

    let disp = image
        .read_i32(instruction + disp_offset as u64)
        .ok_or_else(|| Error::InvalidOperand {
            instruction,
            message: "displacement bytes are outside the image".to_string(),
        })?;

    let next_ip = instruction + instr_len as u64;
    let target = next_ip.wrapping_add_signed(disp as i64);

    if !images.contains(target) {
        return Err(Error::InvalidOperand {
            instruction,
            message: format!("target {target:#x} is outside every known image"),
        });
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{LocatedImages, ModuleImage};

    fn images_with(data: Vec<u8>, base: u64) -> LocatedImages {
        LocatedImages::new(ModuleImage::new("host", base, data), None)
    }

    #[test]
    fn test_call_target_forward_displacement() {
        let base = 0x1000;
        let mut data = vec![0u8; 0x100];
        // call +0x10 at offset 0x20
        data[0x20] = 0xE8;
        data[0x21..0x25].copy_from_slice(&0x10i32.to_le_bytes());
        let images = images_with(data, base);

        let at = base + 0x20;
        assert_eq!(call_target(&images, at).unwrap(), at + 5 + 16);
    }

    #[test]
    fn test_call_target_negative_displacement() {
        let base = 0x1000;
        let mut data = vec![0u8; 0x100];
        data[0x80] = 0xE8;
        data[0x81..0x85].copy_from_slice(&(-0x40i32).to_le_bytes());
        let images = images_with(data, base);

        let at = base + 0x80;
        assert_eq!(call_target(&images, at).unwrap(), at + 5 - 0x40);
    }

    #[test]
    fn test_lea_target_caller_supplied_encoding() {
        let base = 0x2000;
        let mut data = vec![0u8; 0x100];
        // lea rcx, [rip + 0x30] encoded as 48 8D 0D <disp32>
        data[0x10..0x13].copy_from_slice(&[0x48, 0x8D, 0x0D]);
        data[0x13..0x17].copy_from_slice(&0x30i32.to_le_bytes());
        let images = images_with(data, base);

        let at = base + 0x10;
        assert_eq!(lea_target(&images, at, 3, 7).unwrap(), at + 7 + 0x30);
    }

    #[test]
    fn test_target_outside_every_image_is_rejected() {
        let base = 0x1000;
        let mut data = vec![0u8; 0x40];
        data[0x00] = 0xE8;
        data[0x01..0x05].copy_from_slice(&0x7FFF_0000i32.to_le_bytes());
        let images = images_with(data, base);

        assert!(matches!(
            call_target(&images, base),
            Err(Error::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_displacement_truncated_at_image_end_is_rejected() {
        let base = 0x1000;
        let data = vec![0xE8u8; 0x10];
        let images = images_with(data, base);

        // Opcode sits on the last mapped byte; no room for the displacement.
        assert!(matches!(
            call_target(&images, base + 0x0F),
            Err(Error::InvalidOperand { .. })
        ));
        // Instruction address itself unmapped.
        assert!(matches!(
            call_target(&images, base + 0x100),
            Err(Error::InvalidOperand { .. })
        ));
    }

    #[test]
    fn test_target_in_support_image_is_accepted() {
        let base = 0x1000;
        let mut data = vec![0u8; 0x40];
        data[0x00] = 0xE8;
        // Lands at 0x3005, inside the support image below.
        data[0x01..0x05].copy_from_slice(&0x2000i32.to_le_bytes());
        let primary = ModuleImage::new("host", base, data);
        let support = ModuleImage::new("corelib", 0x3000, vec![0u8; 0x40]);
        let images = LocatedImages::new(primary, Some(support));

        assert_eq!(call_target(&images, base).unwrap(), 0x3005);
    }
}
