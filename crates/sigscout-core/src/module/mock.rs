//! In-memory module provider for tests.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::{ModuleImage, ModuleProvider};

#[derive(Default)]
pub struct MockProvider {
    primary: Option<ModuleImage>,
    libraries: HashMap<String, ModuleImage>,
}

impl MockProvider {
    pub fn new(primary: ModuleImage) -> Self {
        Self {
            primary: Some(primary),
            libraries: HashMap::new(),
        }
    }

    /// A provider with no modules at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, image: ModuleImage) -> Self {
        self.libraries.insert(image.name().to_string(), image);
        self
    }
}

impl ModuleProvider for MockProvider {
    fn primary_image(&self) -> Result<ModuleImage> {
        self.primary
            .clone()
            .ok_or_else(|| Error::ModuleNotFound("<host executable>".to_string()))
    }

    fn library_image(&self, name: &str) -> Result<ModuleImage> {
        self.libraries
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ModuleNotFound(name.to_string()))
    }
}
