//! Prefix-length-specialised signature scanning.
//!
//! The scan variants use the pattern's leading exact bytes as a rejection
//! filter: a 4- or 2-byte little-endian word compare (or a `memchr` sweep
//! for a single byte) runs before the full masked verification. The variant
//! choice never changes the match set.

use memchr::memchr;

use super::{Pattern, ScanClass};

/// Lazy iterator over match offsets, ascending.
///
/// Each `next` resumes one byte after the previous match start, so
/// overlapping matches are reported. The iterator is finite and not
/// restartable; scan again via [`Pattern::matches`].
pub struct Matches<'a> {
    pattern: &'a Pattern,
    region: &'a [u8],
    pos: usize,
}

impl<'a> Matches<'a> {
    pub(super) fn new(pattern: &'a Pattern, region: &'a [u8]) -> Self {
        Self {
            pattern,
            region,
            pos: 0,
        }
    }
}

impl Iterator for Matches<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        // `last` is the highest offset at which the whole pattern still fits;
        // no scan variant reads past `last + len`.
        let last = self.region.len().checked_sub(self.pattern.len())?;
        if self.pos > last {
            return None;
        }

        let found = match self.pattern.class() {
            ScanClass::Prefix4 => next_prefix4(self.pattern, self.region, self.pos, last),
            ScanClass::Prefix2 => next_prefix2(self.pattern, self.region, self.pos, last),
            ScanClass::Prefix1 => next_prefix1(self.pattern, self.region, self.pos, last),
            ScanClass::Generic => next_generic(self.pattern, self.region, self.pos, last),
        }?;

        self.pos = found + 1;
        Some(found)
    }
}

fn next_prefix4(pattern: &Pattern, region: &[u8], mut pos: usize, last: usize) -> Option<usize> {
    let bytes = pattern.bytes();
    let prefix = u32::from_le_bytes([bytes[0].byte, bytes[1].byte, bytes[2].byte, bytes[3].byte]);
    let len = pattern.len();

    while pos <= last {
        let word = u32::from_le_bytes([
            region[pos],
            region[pos + 1],
            region[pos + 2],
            region[pos + 3],
        ]);
        if word == prefix && pattern.matches_from(4, &region[pos..pos + len]) {
            return Some(pos);
        }
        pos += 1;
    }

    None
}

fn next_prefix2(pattern: &Pattern, region: &[u8], mut pos: usize, last: usize) -> Option<usize> {
    let bytes = pattern.bytes();
    let prefix = u16::from_le_bytes([bytes[0].byte, bytes[1].byte]);
    let len = pattern.len();

    while pos <= last {
        let word = u16::from_le_bytes([region[pos], region[pos + 1]]);
        if word == prefix && pattern.matches_from(2, &region[pos..pos + len]) {
            return Some(pos);
        }
        pos += 1;
    }

    None
}

fn next_prefix1(pattern: &Pattern, region: &[u8], mut pos: usize, last: usize) -> Option<usize> {
    let first = pattern.bytes()[0].byte;
    let len = pattern.len();

    while pos <= last {
        let found = pos + memchr(first, &region[pos..=last])?;
        if pattern.matches_from(1, &region[found..found + len]) {
            return Some(found);
        }
        pos = found + 1;
    }

    None
}

fn next_generic(pattern: &Pattern, region: &[u8], mut pos: usize, last: usize) -> Option<usize> {
    let len = pattern.len();

    while pos <= last {
        if pattern.matches_at(&region[pos..pos + len]) {
            return Some(pos);
        }
        pos += 1;
    }

    None
}
