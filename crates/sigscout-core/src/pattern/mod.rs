//! Byte signatures with wildcard and nibble masks.
//!
//! A signature is authored as whitespace-separated tokens: `48 8B ?? 0D`
//! matches any byte in the third position, and `4?` / `?D` constrain only
//! one nibble. Compilation turns the text into `(byte, mask)` pairs; a
//! position matches when `value & mask == byte & mask`.

mod scan;

pub use scan::Matches;

use crate::error::{Error, Result};

/// One compiled signature byte.
///
/// `mask` selects the bits that must match: `0xFF` is an exact byte,
/// `0x00` accepts anything, `0xF0`/`0x0F` pin a single nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternByte {
    pub byte: u8,
    pub mask: u8,
}

impl PatternByte {
    #[inline]
    fn matches(&self, value: u8) -> bool {
        value & self.mask == self.byte & self.mask
    }

    #[inline]
    fn is_exact(&self) -> bool {
        self.mask == 0xFF
    }
}

/// Scan strategy, selected from the number of leading exact bytes.
///
/// The wider variants reject candidate positions with a single machine-word
/// compare before verifying the masked remainder; all variants produce the
/// same match set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanClass {
    Generic,
    Prefix1,
    Prefix2,
    Prefix4,
}

/// A compiled signature. Immutable once built.
#[derive(Debug, Clone)]
pub struct Pattern {
    bytes: Vec<PatternByte>,
    class: ScanClass,
}

impl Pattern {
    /// Compile a signature from text.
    ///
    /// Tokens: two hex digits (exact byte), `??` or `?` (any byte),
    /// `4?` / `?D` (masked nibble). Anything else, or an empty signature,
    /// is a `MalformedSignature` error.
    pub fn compile(text: &str) -> Result<Self> {
        let bytes = text
            .split_whitespace()
            .map(parse_token)
            .collect::<Result<Vec<_>>>()?;
        Self::from_pattern_bytes(bytes)
    }

    /// Build an exact-match pattern from a literal byte buffer.
    ///
    /// Used when the signature is embedded data (a string constant, a
    /// serialized structure) rather than an authored text signature.
    pub fn from_raw(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes
            .iter()
            .map(|&byte| PatternByte { byte, mask: 0xFF })
            .collect();
        Self::from_pattern_bytes(bytes)
    }

    fn from_pattern_bytes(bytes: Vec<PatternByte>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::MalformedSignature("signature is empty".to_string()));
        }

        let leading = bytes.iter().take_while(|b| b.is_exact()).count();
        let class = if leading >= 4 {
            ScanClass::Prefix4
        } else if leading >= 2 {
            ScanClass::Prefix2
        } else if leading >= 1 {
            ScanClass::Prefix1
        } else {
            ScanClass::Generic
        };

        Ok(Self { bytes, class })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        // Compilation rejects empty signatures.
        false
    }

    pub(crate) fn bytes(&self) -> &[PatternByte] {
        &self.bytes
    }

    pub(crate) fn class(&self) -> ScanClass {
        self.class
    }

    /// Render the pattern back as signature text.
    pub fn format(&self) -> String {
        self.bytes
            .iter()
            .map(|b| match b.mask {
                0xFF => format!("{:02X}", b.byte),
                0x00 => "??".to_string(),
                0xF0 => format!("{:X}?", b.byte >> 4),
                0x0F => format!("?{:X}", b.byte & 0x0F),
                mask => format!("{:02X}&{:02X}", b.byte, mask),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whether the pattern matches at the start of `window`.
    ///
    /// `window` must be at least `len()` bytes.
    #[inline]
    pub(crate) fn matches_at(&self, window: &[u8]) -> bool {
        self.matches_from(0, window)
    }

    /// Verify pattern bytes from `skip` onward, for callers that already
    /// compared the leading exact prefix.
    #[inline]
    pub(crate) fn matches_from(&self, skip: usize, window: &[u8]) -> bool {
        self.bytes[skip..]
            .iter()
            .zip(&window[skip..])
            .all(|(p, &v)| p.matches(v))
    }

    /// Lazily iterate match offsets in `region`, ascending.
    ///
    /// Overlapping matches are reported; the iterator never reads past
    /// `region.len() - len()`. A region shorter than the pattern yields
    /// nothing.
    pub fn matches<'a>(&'a self, region: &'a [u8]) -> Matches<'a> {
        Matches::new(self, region)
    }

    /// First match offset in `region`, if any.
    pub fn find(&self, region: &[u8]) -> Option<usize> {
        self.matches(region).next()
    }

    /// All match offsets in `region`.
    pub fn find_all(&self, region: &[u8]) -> Vec<usize> {
        self.matches(region).collect()
    }
}

fn parse_token(token: &str) -> Result<PatternByte> {
    if token == "?" || token == "??" {
        return Ok(PatternByte {
            byte: 0x00,
            mask: 0x00,
        });
    }

    let mut chars = token.chars();
    let (Some(hi), Some(lo), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(Error::MalformedSignature(format!(
            "invalid token '{token}'"
        )));
    };

    let (hi_val, hi_mask) = parse_nibble(hi, token)?;
    let (lo_val, lo_mask) = parse_nibble(lo, token)?;

    Ok(PatternByte {
        byte: (hi_val << 4) | lo_val,
        mask: (hi_mask << 4) | lo_mask,
    })
}

fn parse_nibble(c: char, token: &str) -> Result<(u8, u8)> {
    if c == '?' {
        return Ok((0x0, 0x0));
    }
    let value = c.to_digit(16).ok_or_else(|| {
        Error::MalformedSignature(format!("invalid token '{token}'"))
    })? as u8;
    Ok((value, 0xF))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_with_wildcards() {
        let pattern = Pattern::compile("48 8D 0D ?? ?? ?? ??").unwrap();
        assert_eq!(pattern.len(), 7);
        assert_eq!(pattern.bytes()[0], PatternByte { byte: 0x48, mask: 0xFF });
        assert_eq!(pattern.bytes()[3], PatternByte { byte: 0x00, mask: 0x00 });
    }

    #[test]
    fn test_compile_nibble_masks() {
        let pattern = Pattern::compile("4? ?D").unwrap();
        assert_eq!(pattern.bytes()[0], PatternByte { byte: 0x40, mask: 0xF0 });
        assert_eq!(pattern.bytes()[1], PatternByte { byte: 0x0D, mask: 0x0F });

        assert!(pattern.bytes()[0].matches(0x48));
        assert!(pattern.bytes()[0].matches(0x4F));
        assert!(!pattern.bytes()[0].matches(0x58));
        assert!(pattern.bytes()[1].matches(0x8D));
        assert!(!pattern.bytes()[1].matches(0x8E));
    }

    #[test]
    fn test_compile_rejects_bad_tokens() {
        assert!(matches!(
            Pattern::compile("48 GG"),
            Err(Error::MalformedSignature(_))
        ));
        assert!(matches!(
            Pattern::compile("488B"),
            Err(Error::MalformedSignature(_))
        ));
        assert!(matches!(
            Pattern::compile(""),
            Err(Error::MalformedSignature(_))
        ));
        assert!(matches!(
            Pattern::compile("   "),
            Err(Error::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_from_raw_is_exact() {
        let pattern = Pattern::from_raw(b"5.1.1.").unwrap();
        assert_eq!(pattern.len(), 6);
        assert!(pattern.bytes().iter().all(|b| b.mask == 0xFF));
        assert!(Pattern::from_raw(b"").is_err());
    }

    #[test]
    fn test_format_roundtrip() {
        let text = "48 8B ?? 0D 4? ?1 FF";
        let pattern = Pattern::compile(text).unwrap();
        assert_eq!(pattern.format(), text);
        let reparsed = Pattern::compile(&pattern.format()).unwrap();
        assert_eq!(reparsed.bytes(), pattern.bytes());
    }

    #[test]
    fn test_scan_class_from_leading_exact_bytes() {
        let cases = [
            ("48 8B 05 11 22", ScanClass::Prefix4),
            ("48 8B 05 11", ScanClass::Prefix4),
            ("48 8B 05 ?? 22", ScanClass::Prefix2),
            ("48 8B ?? 11", ScanClass::Prefix2),
            ("48 ?? 05", ScanClass::Prefix1),
            ("4? 8B 05", ScanClass::Generic),
            ("?? 8B 05 11 22", ScanClass::Generic),
        ];
        for (text, class) in cases {
            assert_eq!(Pattern::compile(text).unwrap().class(), class, "{text}");
        }
    }
}
