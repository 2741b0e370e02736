//! # sigscout-core
//!
//! Signature scanning and symbol resolution for unsymbolized 64-bit
//! binary images.
//!
//! This crate provides:
//! - Byte-signature compilation with wildcard and nibble masks
//! - Prefix-specialised pattern scanning over module image snapshots
//! - Relative call/lea operand decoding into absolute targets
//! - Module location, deployment modes and a discovered-library registry
//! - A catalogue-driven resolver that publishes a write-once symbol table
//!
//! The resolver runs single-threaded to completion; once a pass is done
//! its [`table::SymbolTable`] is read-only and safe to share.

pub mod catalog;
pub mod error;
pub mod fixup;
pub mod module;
pub mod pattern;
pub mod resolver;
pub mod table;

pub use catalog::{
    Criticality, DiscoverySpec, FixupKind, LeaOperand, PatternSource, SignatureCatalog,
    SignatureSpec, load_catalog, save_catalog,
};
pub use error::{Error, Result};
#[cfg(windows)]
pub use module::LiveProcessProvider;
pub use module::{
    DeploymentMode, FileImageProvider, ImageSel, LibraryRegistry, LibraryRegistryEntry,
    LocatedImages, ModuleImage, ModuleProvider,
};
pub use pattern::{Matches, Pattern, PatternByte};
pub use resolver::{Phase, ResolverStatus, SymbolResolver};
pub use table::{DataSlot, FnPointer, FuncSlot, ResolvedSymbol, SlotKind, SymbolTable};
