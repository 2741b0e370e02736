//! Catalogue orchestration: locate, resolve, publish.
//!
//! The resolver owns the whole resolution context (located images, library
//! registry, symbol table, aggregate status), so callers hold one handle
//! instead of reaching into process-wide state. Resolution is
//! single-threaded and runs to completion; the table it publishes is
//! read-only afterwards.

use strum::Display;
use tracing::{debug, error, warn};

use crate::catalog::{
    CompiledCatalog, CompiledDiscovery, CompiledSpec, Criticality, FixupKind, SignatureCatalog,
};
use crate::error::{Error, Result};
use crate::fixup;
use crate::module::{
    DeploymentMode, LibraryRegistry, LibraryRegistryEntry, LocatedImages, ModuleProvider,
};
use crate::table::{ResolvedSymbol, SymbolTable};

/// Resolution lifecycle. `Failed`, `Degraded` and `Ready` terminate the
/// main pass; the post-startup pass moves `Ready`/`Degraded` on to
/// `PostReady`/`PostDegraded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    Uninitialized,
    Locating,
    Resolving,
    Ready,
    Degraded,
    Failed,
    PostResolving,
    PostReady,
    PostDegraded,
}

/// Aggregate outcome of a pass: one flag per failure class, plus the
/// failed spec names for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ResolverStatus {
    critical_failure: bool,
    soft_failure: bool,
    failed: Vec<String>,
}

impl ResolverStatus {
    /// A Critical spec is unresolved, or the module images were not found.
    pub fn is_critical_failure(&self) -> bool {
        self.critical_failure
    }

    /// An Optional spec is unresolved.
    pub fn is_soft_failure(&self) -> bool {
        self.soft_failure
    }

    pub fn failed_specs(&self) -> &[String] {
        &self.failed
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn record(&mut self, name: &str, criticality: Criticality) {
        match criticality {
            Criticality::Critical => self.critical_failure = true,
            Criticality::Optional => self.soft_failure = true,
        }
        self.failed.push(name.to_string());
    }
}

/// Invoked once per first-time library registration.
pub type LibraryHook = Box<dyn FnMut(&LibraryRegistryEntry)>;

/// Owns the resolution context and runs the catalogue against the located
/// images.
pub struct SymbolResolver {
    mode: DeploymentMode,
    catalog: CompiledCatalog,
    phase: Phase,
    images: Option<LocatedImages>,
    registry: LibraryRegistry,
    table: SymbolTable,
    status: ResolverStatus,
    library_hook: Option<LibraryHook>,
}

impl SymbolResolver {
    /// Compile the catalogue for `mode`. Malformed signatures and
    /// mode/image mismatches surface here, before anything is scanned.
    pub fn new(mode: DeploymentMode, catalog: SignatureCatalog) -> Result<Self> {
        let catalog = catalog.compile(&mode)?;
        Ok(Self {
            mode,
            catalog,
            phase: Phase::Uninitialized,
            images: None,
            registry: LibraryRegistry::new(),
            table: SymbolTable::new(),
            status: ResolverStatus::default(),
            library_hook: None,
        })
    }

    /// Run `hook` for every library whose registration is first-time
    /// (count 0 → 1).
    pub fn on_first_registration(&mut self, hook: impl FnMut(&LibraryRegistryEntry) + 'static) {
        self.library_hook = Some(Box::new(hook));
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> &ResolverStatus {
        &self.status
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn registry(&self) -> &LibraryRegistry {
        &self.registry
    }

    pub fn images(&self) -> Option<&LocatedImages> {
        self.images.as_ref()
    }

    /// The full locate-and-resolve pass.
    ///
    /// Every spec is always attempted; per-spec failures are recorded in
    /// the status, never propagated. The only error is `ModuleNotFound`
    /// from locating, which fails the pass outright.
    pub fn run(&mut self, provider: &impl ModuleProvider) -> Result<&ResolverStatus> {
        self.status.reset();
        self.table.clear();
        self.registry.clear();
        self.images = None;

        self.phase = Phase::Locating;
        let images = match self.mode.locate(provider) {
            Ok(images) => images,
            Err(e) => {
                error!("Module location failed: {e}");
                self.status.critical_failure = true;
                self.phase = Phase::Failed;
                return Err(e);
            }
        };

        self.phase = Phase::Resolving;
        debug!(
            "Resolving {} discovery + {} slot specs (catalogue {})",
            self.catalog.discovery.len(),
            self.catalog.specs.len(),
            self.catalog.version
        );

        for spec in &self.catalog.discovery {
            let registered = run_discovery_spec(
                &images,
                spec,
                &mut self.registry,
                &mut self.library_hook,
            );
            if registered == 0 {
                report_failure(&spec.spec.name, spec.spec.criticality, "no registration sites");
                self.status.record(&spec.spec.name, spec.spec.criticality);
            } else {
                debug!("  {}: {} registration sites", spec.spec.name, registered);
            }
        }

        for spec in &self.catalog.specs {
            match resolve_spec(&images, spec, &mut self.table) {
                Ok(addr) => debug!("  {}: {:#x}", spec.spec.name, addr),
                Err(reason) => {
                    report_failure(&spec.spec.name, spec.spec.criticality, &reason);
                    self.status.record(&spec.spec.name, spec.spec.criticality);
                }
            }
        }

        self.images = Some(images);
        self.phase = if self.status.is_critical_failure() {
            Phase::Failed
        } else if self.status.is_soft_failure() {
            Phase::Degraded
        } else {
            Phase::Ready
        };
        debug!("Resolution pass finished: {}", self.phase);

        Ok(&self.status)
    }

    /// The post-startup pass, over globals that exist only once the host
    /// finished its own initialization.
    ///
    /// Must be invoked exactly once, after a completed main pass; a second
    /// invocation is an error, not a silent re-resolution.
    pub fn run_post_startup(&mut self) -> Result<&ResolverStatus> {
        match self.phase {
            Phase::Ready | Phase::Degraded => {}
            Phase::PostResolving | Phase::PostReady | Phase::PostDegraded => {
                return Err(Error::PostResolveAlreadyRan);
            }
            _ => return Err(Error::PostResolveNotReady),
        }

        self.phase = Phase::PostResolving;
        let images = self.images.as_ref().ok_or(Error::PostResolveNotReady)?;

        let failed_before = self.status.failed.len();
        for spec in &self.catalog.post_specs {
            match resolve_spec(images, spec, &mut self.table) {
                Ok(addr) => debug!("  {}: {:#x}", spec.spec.name, addr),
                Err(reason) => {
                    report_failure(&spec.spec.name, spec.spec.criticality, &reason);
                    self.status.record(&spec.spec.name, spec.spec.criticality);
                }
            }
        }

        self.phase = if self.status.failed.len() > failed_before {
            Phase::PostDegraded
        } else {
            Phase::PostReady
        };
        debug!("Post-startup pass finished: {}", self.phase);

        Ok(&self.status)
    }

    /// Tear the context down to `Uninitialized`, keeping the compiled
    /// catalogue so a fresh pass never reparses patterns.
    pub fn reset(&mut self) {
        self.phase = Phase::Uninitialized;
        self.images = None;
        self.registry.clear();
        self.table.clear();
        self.status.reset();
    }
}

fn report_failure(name: &str, criticality: Criticality, reason: &str) {
    match criticality {
        Criticality::Critical => error!("  {name}: unresolved ({reason})"),
        Criticality::Optional => warn!("  {name}: unresolved ({reason})"),
    }
}

/// Resolve one single-match spec into its slot. Returns the written
/// address, or a diagnostic reason on failure.
fn resolve_spec(
    images: &LocatedImages,
    compiled: &CompiledSpec,
    table: &mut SymbolTable,
) -> std::result::Result<u64, String> {
    let spec = &compiled.spec;
    let image = images.image(spec.image).map_err(|e| e.to_string())?;

    let mut matches = compiled.pattern.matches(image.data());
    let Some(first) = matches.next() else {
        return Err("signature not found".to_string());
    };
    if matches.next().is_some() {
        return Err("signature is ambiguous".to_string());
    }

    let instruction = image.base() + (first + spec.offset) as u64;
    let addr = match spec.fixup {
        FixupKind::None => instruction,
        FixupKind::CallTarget => {
            fixup::call_target(images, instruction).map_err(|e| e.to_string())?
        }
        FixupKind::LeaTarget {
            disp_offset,
            instr_len,
        } => fixup::lea_target(images, instruction, disp_offset, instr_len)
            .map_err(|e| e.to_string())?,
    };

    table
        .insert(
            &spec.slot,
            ResolvedSymbol {
                addr,
                kind: spec.kind,
            },
        )
        .map_err(|e| e.to_string())?;

    Ok(addr)
}

/// Scan all registration sites for one discovery spec and register each
/// decoded library. Returns how many sites registered successfully.
fn run_discovery_spec(
    images: &LocatedImages,
    compiled: &CompiledDiscovery,
    registry: &mut LibraryRegistry,
    hook: &mut Option<LibraryHook>,
) -> usize {
    let spec = &compiled.spec;
    let Ok(image) = images.image(spec.image) else {
        return 0;
    };

    let mut registered = 0;
    for offset in compiled.pattern.matches(image.data()) {
        let site = image.base() + offset as u64;

        let lea = spec.base_lea;
        let base = match fixup::lea_target(
            images,
            site + lea.offset as u64,
            lea.disp_offset,
            lea.instr_len,
        ) {
            Ok(addr) => addr,
            Err(e) => {
                warn!("  {}: skipping site {site:#x}: {e}", spec.name);
                continue;
            }
        };
        let init_fn = match fixup::call_target(images, site + spec.init_call_offset as u64) {
            Ok(addr) => addr,
            Err(e) => {
                warn!("  {}: skipping site {site:#x}: {e}", spec.name);
                continue;
            }
        };
        let free_fn = match fixup::call_target(images, site + spec.free_call_offset as u64) {
            Ok(addr) => addr,
            Err(e) => {
                warn!("  {}: skipping site {site:#x}: {e}", spec.name);
                continue;
            }
        };

        let first_time = registry.register(base, init_fn, free_fn);
        if first_time
            && let Some(hook) = hook.as_mut()
            && let Some(entry) = registry.get(base)
        {
            hook(entry);
        }
        registered += 1;
    }

    registered
}
