//! File-backed module images, for offline resolution against dumps.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::{ModuleImage, ModuleProvider};

/// Serves module snapshots from image dumps on disk, each paired with the
/// load address it was dumped at.
#[derive(Debug, Clone)]
pub struct FileImageProvider {
    primary_path: PathBuf,
    primary_base: u64,
    libraries: HashMap<String, (PathBuf, u64)>,
}

impl FileImageProvider {
    pub fn new(path: impl Into<PathBuf>, base: u64) -> Self {
        Self {
            primary_path: path.into(),
            primary_base: base,
            libraries: HashMap::new(),
        }
    }

    pub fn with_library(mut self, name: impl Into<String>, path: impl Into<PathBuf>, base: u64) -> Self {
        self.libraries.insert(name.into(), (path.into(), base));
        self
    }

    fn load(path: &Path, name: &str, base: u64) -> Result<ModuleImage> {
        let data = fs::read(path)
            .map_err(|e| Error::ModuleNotFound(format!("{}: {e}", path.display())))?;
        Ok(ModuleImage::new(name, base, data))
    }
}

impl ModuleProvider for FileImageProvider {
    fn primary_image(&self) -> Result<ModuleImage> {
        let name = self
            .primary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.primary_path.display().to_string());
        Self::load(&self.primary_path, &name, self.primary_base)
    }

    fn library_image(&self, name: &str) -> Result<ModuleImage> {
        let (path, base) = self
            .libraries
            .get(name)
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))?;
        Self::load(path, name, *base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_primary_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.bin");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[0x48, 0x8B, 0x0D, 0x00]).unwrap();

        let provider = FileImageProvider::new(&path, 0x1400_0000);
        let image = provider.primary_image().unwrap();
        assert_eq!(image.name(), "host.bin");
        assert_eq!(image.base(), 0x1400_0000);
        assert_eq!(image.data(), &[0x48, 0x8B, 0x0D, 0x00]);
    }

    #[test]
    fn test_missing_library_is_module_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.bin");
        fs::write(&path, [0u8; 4]).unwrap();

        let provider = FileImageProvider::new(&path, 0);
        assert!(matches!(
            provider.library_image("corelib"),
            Err(Error::ModuleNotFound(_))
        ));

        let provider = FileImageProvider::new(dir.path().join("gone.bin"), 0);
        assert!(matches!(
            provider.primary_image(),
            Err(Error::ModuleNotFound(_))
        ));
    }
}
