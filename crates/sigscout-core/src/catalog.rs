//! The signature catalogue: a versioned, data-authored list of named
//! lookups, one per function or global the host needs resolved.
//!
//! Catalogues are serialized as JSON and compiled once per resolver; the
//! compiled form caches every pattern so repeated passes never reparse.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Error, Result};
use crate::module::{DeploymentMode, ImageSel};
use crate::pattern::Pattern;
use crate::table::SlotKind;

/// Signature body: authored text, or a literal byte buffer when the
/// signature is embedded data rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSource {
    Text(String),
    Raw(Vec<u8>),
}

impl PatternSource {
    pub fn compile(&self) -> Result<Pattern> {
        match self {
            Self::Text(text) => Pattern::compile(text),
            Self::Raw(bytes) => Pattern::from_raw(bytes),
        }
    }
}

/// How a failed lookup affects overall availability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Criticality {
    Critical,
    #[default]
    Optional,
}

/// Operand decoding applied to the matched instruction before the slot is
/// written. The lea encoding fields come from the catalogue because the
/// displacement offset and length vary with the addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FixupKind {
    #[default]
    None,
    CallTarget,
    LeaTarget { disp_offset: usize, instr_len: usize },
}

/// One named lookup: a signature expected to match exactly once, and the
/// slot its (fixed-up) address is written into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSpec {
    pub name: String,
    pub pattern: PatternSource,
    pub slot: String,
    #[serde(default)]
    pub kind: SlotKind,
    #[serde(default)]
    pub image: ImageSel,
    #[serde(default)]
    pub criticality: Criticality,
    /// Offset from the match start to the instruction (or data) the slot
    /// refers to.
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub fixup: FixupKind,
}

/// Position and encoding of a load-address operand inside a matched
/// registration site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaOperand {
    /// Offset from the match start to the lea instruction.
    pub offset: usize,
    pub disp_offset: usize,
    pub instr_len: usize,
}

/// A multi-match lookup over library registration sites. Every match
/// contributes one registry entry: the lea operand names the library base,
/// the two call sites name its init and free functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySpec {
    pub name: String,
    pub pattern: PatternSource,
    #[serde(default)]
    pub image: ImageSel,
    #[serde(default)]
    pub criticality: Criticality,
    pub base_lea: LeaOperand,
    /// Offset from the match start to the init-function call.
    pub init_call_offset: usize,
    /// Offset from the match start to the free-function call.
    pub free_call_offset: usize,
}

/// The full versioned catalogue. `specs` runs during the main pass,
/// `post_specs` during the post-startup pass; `discovery` populates the
/// library registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureCatalog {
    pub version: String,
    #[serde(default)]
    pub discovery: Vec<DiscoverySpec>,
    #[serde(default)]
    pub specs: Vec<SignatureSpec>,
    #[serde(default)]
    pub post_specs: Vec<SignatureSpec>,
}

impl SignatureCatalog {
    pub fn spec(&self, name: &str) -> Option<&SignatureSpec> {
        self.specs
            .iter()
            .chain(&self.post_specs)
            .find(|spec| spec.name == name)
    }

    /// Compile every pattern without binding to a deployment mode.
    ///
    /// Authoring-time check for catalogue lint tools; a vetted catalogue
    /// never fails this.
    pub fn validate(&self) -> Result<()> {
        for spec in self.specs.iter().chain(&self.post_specs) {
            compile_named(&spec.pattern, &spec.name)?;
        }
        for spec in &self.discovery {
            compile_named(&spec.pattern, &spec.name)?;
        }
        Ok(())
    }

    /// Compile the catalogue against a deployment mode: every pattern is
    /// parsed exactly once, and specs targeting the support image are
    /// rejected when the mode has none.
    pub fn compile(&self, mode: &DeploymentMode) -> Result<CompiledCatalog> {
        let check_image = |image: ImageSel| -> Result<()> {
            if image == ImageSel::Support && !mode.has_support() {
                return Err(Error::SupportImageNotConfigured);
            }
            Ok(())
        };

        let mut discovery = Vec::with_capacity(self.discovery.len());
        for spec in &self.discovery {
            check_image(spec.image)?;
            let pattern = compile_named(&spec.pattern, &spec.name)?;
            discovery.push(CompiledDiscovery {
                spec: spec.clone(),
                pattern,
            });
        }

        let compile_specs = |specs: &[SignatureSpec]| -> Result<Vec<CompiledSpec>> {
            specs
                .iter()
                .map(|spec| {
                    check_image(spec.image)?;
                    let pattern = compile_named(&spec.pattern, &spec.name)?;
                    Ok(CompiledSpec {
                        spec: spec.clone(),
                        pattern,
                    })
                })
                .collect()
        };

        Ok(CompiledCatalog {
            version: self.version.clone(),
            discovery,
            specs: compile_specs(&self.specs)?,
            post_specs: compile_specs(&self.post_specs)?,
        })
    }
}

fn compile_named(source: &PatternSource, name: &str) -> Result<Pattern> {
    source.compile().map_err(|e| match e {
        Error::MalformedSignature(message) => {
            Error::MalformedSignature(format!("{name}: {message}"))
        }
        other => other,
    })
}

/// A spec with its pattern compiled once, reused across passes.
#[derive(Debug, Clone)]
pub struct CompiledSpec {
    pub spec: SignatureSpec,
    pub pattern: Pattern,
}

#[derive(Debug, Clone)]
pub struct CompiledDiscovery {
    pub spec: DiscoverySpec,
    pub pattern: Pattern,
}

#[derive(Debug, Clone)]
pub struct CompiledCatalog {
    pub version: String,
    pub discovery: Vec<CompiledDiscovery>,
    pub specs: Vec<CompiledSpec>,
    pub post_specs: Vec<CompiledSpec>,
}

pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<SignatureCatalog> {
    let content = fs::read_to_string(&path)?;
    let catalog = serde_json::from_str(&content)?;
    Ok(catalog)
}

pub fn save_catalog<P: AsRef<Path>>(path: P, catalog: &SignatureCatalog) -> Result<()> {
    let content = serde_json::to_string_pretty(catalog)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> SignatureCatalog {
        SignatureCatalog {
            version: "2026-08".to_string(),
            discovery: vec![],
            specs: vec![
                SignatureSpec {
                    name: "createStatus".to_string(),
                    pattern: PatternSource::Text("40 53 48 83 EC ?? E8".to_string()),
                    slot: "create_status".to_string(),
                    kind: SlotKind::Function,
                    image: ImageSel::Primary,
                    criticality: Criticality::Critical,
                    offset: 6,
                    fixup: FixupKind::CallTarget,
                },
                SignatureSpec {
                    name: "globalStrings".to_string(),
                    pattern: PatternSource::Raw(b"str_table".to_vec()),
                    slot: "global_strings".to_string(),
                    kind: SlotKind::Data,
                    image: ImageSel::Support,
                    criticality: Criticality::Optional,
                    offset: 0,
                    fixup: FixupKind::None,
                },
            ],
            post_specs: vec![],
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let catalog = sample_catalog();
        let json = serde_json::to_string_pretty(&catalog).unwrap();
        let parsed: SignatureCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, catalog.version);
        assert_eq!(parsed.specs.len(), 2);
        assert!(matches!(parsed.specs[0].pattern, PatternSource::Text(_)));
        assert!(matches!(parsed.specs[1].pattern, PatternSource::Raw(_)));
        assert_eq!(parsed.specs[0].fixup, FixupKind::CallTarget);
        assert_eq!(parsed.specs[1].criticality, Criticality::Optional);
    }

    #[test]
    fn test_defaults_from_sparse_json() {
        let json = r#"{
            "version": "1",
            "specs": [
                { "name": "levelManager", "pattern": "48 8B 05 ?? ?? ?? ??", "slot": "level_manager" }
            ]
        }"#;
        let catalog: SignatureCatalog = serde_json::from_str(json).unwrap();
        let spec = &catalog.specs[0];
        assert_eq!(spec.kind, SlotKind::Function);
        assert_eq!(spec.image, ImageSel::Primary);
        assert_eq!(spec.criticality, Criticality::Optional);
        assert_eq!(spec.offset, 0);
        assert_eq!(spec.fixup, FixupKind::None);
        assert!(catalog.discovery.is_empty());
        assert!(catalog.post_specs.is_empty());
    }

    #[test]
    fn test_compile_rejects_support_spec_in_single_image_mode() {
        let catalog = sample_catalog();
        assert!(matches!(
            catalog.compile(&DeploymentMode::SingleImage),
            Err(Error::SupportImageNotConfigured)
        ));

        let mode = DeploymentMode::WithSupportLibrary {
            library: "corelib".to_string(),
        };
        let compiled = catalog.compile(&mode).unwrap();
        assert_eq!(compiled.specs.len(), 2);
        assert_eq!(compiled.specs[0].pattern.len(), 7);
    }

    #[test]
    fn test_validate_names_the_offending_spec() {
        let mut catalog = sample_catalog();
        catalog.specs[0].pattern = PatternSource::Text("ZZ".to_string());
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("createStatus"), "{err}");
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signatures.json");
        let catalog = sample_catalog();
        save_catalog(&path, &catalog).unwrap();
        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.version, catalog.version);
        assert_eq!(loaded.specs.len(), catalog.specs.len());
    }

    #[test]
    fn test_spec_lookup_spans_both_passes() {
        let mut catalog = sample_catalog();
        catalog.post_specs.push(SignatureSpec {
            name: "networkStrings".to_string(),
            pattern: PatternSource::Text("4C 8D 05 ?? ?? ?? ??".to_string()),
            slot: "network_strings".to_string(),
            kind: SlotKind::Data,
            image: ImageSel::Primary,
            criticality: Criticality::Optional,
            offset: 0,
            fixup: FixupKind::LeaTarget {
                disp_offset: 3,
                instr_len: 7,
            },
        });
        assert!(catalog.spec("networkStrings").is_some());
        assert!(catalog.spec("createStatus").is_some());
        assert!(catalog.spec("missing").is_none());
    }
}
