//! Module images, deployment modes and the provider seam.
//!
//! A [`ModuleImage`] is an immutable snapshot of one loaded executable or
//! shared library. [`DeploymentMode`] fixes, once, whether resolution runs
//! against the host executable alone or together with a support library;
//! [`ModuleProvider`] abstracts where the snapshots come from (the live
//! process, files on disk, test fixtures).

mod file;
#[cfg(test)]
pub mod mock;
mod registry;
#[cfg(windows)]
mod windows;

pub use file::FileImageProvider;
pub use registry::{LibraryRegistry, LibraryRegistryEntry};
#[cfg(windows)]
pub use windows::LiveProcessProvider;

use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::debug;

use crate::error::{Error, Result};

/// Snapshot of one loaded module: a contiguous readable byte range
/// `[base, base + size)`. Address and contents are fixed at creation.
#[derive(Debug, Clone)]
pub struct ModuleImage {
    name: String,
    base: u64,
    data: Vec<u8>,
}

impl ModuleImage {
    pub fn new(name: impl Into<String>, base: u64, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            base,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// One past the last mapped address.
    pub fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.end()
    }

    /// Byte offset of `addr` inside the image, if mapped.
    pub fn offset_of(&self, addr: u64) -> Option<usize> {
        self.contains(addr).then(|| (addr - self.base) as usize)
    }

    /// Little-endian i32 at `addr`, if all four bytes are mapped.
    pub fn read_i32(&self, addr: u64) -> Option<i32> {
        let offset = self.offset_of(addr)?;
        if offset + 4 > self.data.len() {
            return None;
        }
        Some(i32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }
}

/// Which located image a signature is scanned against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageSel {
    #[default]
    Primary,
    Support,
}

/// Deployment shape, fixed per build of the host: either the host
/// executable alone carries all targets, or a support library carries part
/// of them. Chosen once; never re-branched per lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentMode {
    SingleImage,
    WithSupportLibrary { library: String },
}

impl DeploymentMode {
    pub fn has_support(&self) -> bool {
        matches!(self, Self::WithSupportLibrary { .. })
    }

    /// Snapshot the image(s) this mode scans.
    ///
    /// Fails with `ModuleNotFound` when an expected image is absent from
    /// the provider's module list.
    pub fn locate(&self, provider: &impl ModuleProvider) -> Result<LocatedImages> {
        let primary = provider.primary_image()?;
        debug!(
            "Located primary image {} at {:#x} ({} bytes)",
            primary.name(),
            primary.base(),
            primary.size()
        );

        let support = match self {
            Self::SingleImage => None,
            Self::WithSupportLibrary { library } => {
                let image = provider.library_image(library)?;
                debug!(
                    "Located support library {} at {:#x} ({} bytes)",
                    image.name(),
                    image.base(),
                    image.size()
                );
                Some(image)
            }
        };

        Ok(LocatedImages { primary, support })
    }
}

/// The outcome of locating: one or two immutable image snapshots.
#[derive(Debug, Clone)]
pub struct LocatedImages {
    primary: ModuleImage,
    support: Option<ModuleImage>,
}

impl LocatedImages {
    pub fn new(primary: ModuleImage, support: Option<ModuleImage>) -> Self {
        Self { primary, support }
    }

    pub fn primary(&self) -> &ModuleImage {
        &self.primary
    }

    pub fn support(&self) -> Option<&ModuleImage> {
        self.support.as_ref()
    }

    /// The image a spec selects. Selecting the support image in
    /// single-image mode is a catalogue authoring error.
    pub fn image(&self, sel: ImageSel) -> Result<&ModuleImage> {
        match sel {
            ImageSel::Primary => Ok(&self.primary),
            ImageSel::Support => self
                .support
                .as_ref()
                .ok_or(Error::SupportImageNotConfigured),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleImage> {
        std::iter::once(&self.primary).chain(self.support.as_ref())
    }

    /// The image that maps `addr`, if any.
    pub fn containing(&self, addr: u64) -> Option<&ModuleImage> {
        self.iter().find(|image| image.contains(addr))
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.containing(addr).is_some()
    }
}

/// Source of module snapshots: the host platform's loaded-module list, or
/// any stand-in for it.
pub trait ModuleProvider {
    /// Snapshot of the host executable image.
    fn primary_image(&self) -> Result<ModuleImage>;

    /// Snapshot of a loaded shared library by name.
    fn library_image(&self, name: &str) -> Result<ModuleImage>;
}
