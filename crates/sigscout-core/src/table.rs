//! Write-once resolved-symbol table and typed slot handles.
//!
//! The resolver writes each slot at most once during a resolution phase;
//! afterwards the table is read-only and safe to share across threads.
//! Consumers must check presence before use; an absent slot is never
//! dereferenced by this crate.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::error::{Error, Result};

/// What a slot holds once resolved.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SlotKind {
    #[default]
    Function,
    Data,
}

/// A resolved address together with its declared kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSymbol {
    pub addr: u64,
    pub kind: SlotKind,
}

/// Slot-name → resolved address map with write-once semantics.
#[derive(Debug, Default)]
pub struct SymbolTable {
    slots: BTreeMap<String, ResolvedSymbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved slot. A second write to the same slot is a
    /// catalogue bug and is rejected.
    pub(crate) fn insert(&mut self, slot: &str, symbol: ResolvedSymbol) -> Result<()> {
        if self.slots.contains_key(slot) {
            return Err(Error::SlotAlreadyResolved(slot.to_string()));
        }
        self.slots.insert(slot.to_string(), symbol);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    /// Presence flag consumers must check before use.
    pub fn present(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    pub fn get(&self, slot: &str) -> Option<ResolvedSymbol> {
        self.slots.get(slot).copied()
    }

    pub fn address(&self, slot: &str) -> Option<u64> {
        self.get(slot).map(|s| s.addr)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolved slots in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ResolvedSymbol)> {
        self.slots.iter().map(|(name, sym)| (name.as_str(), *sym))
    }

    /// Typed function pointer for a declared slot, if resolved as a
    /// function.
    ///
    /// # Safety
    ///
    /// The catalogue entry writing `slot` must locate a function whose
    /// signature and ABI are exactly `F`; calling through a mistyped
    /// pointer is undefined behavior.
    pub unsafe fn function<F: FnPointer>(&self, slot: &FuncSlot<F>) -> Option<F> {
        self.slots
            .get(slot.name())
            .filter(|sym| sym.kind == SlotKind::Function)
            .map(|sym| unsafe { F::from_addr(sym.addr) })
    }

    /// Typed pointer to a resolved global, if resolved as data. The
    /// caller is responsible for any dereference.
    pub fn data<T>(&self, slot: &DataSlot<T>) -> Option<*mut T> {
        self.slots
            .get(slot.name())
            .filter(|sym| sym.kind == SlotKind::Data)
            .map(|sym| sym.addr as *mut T)
    }
}

/// Handle declaring, once, the call signature of a function slot. The
/// catalogue writes the address; consumers go through the handle so a slot
/// cannot be called with the wrong signature.
pub struct FuncSlot<F> {
    name: &'static str,
    _sig: PhantomData<fn() -> F>,
}

impl<F> FuncSlot<F> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _sig: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Handle declaring the pointee type of a global-pointer slot.
pub struct DataSlot<T> {
    name: &'static str,
    _ty: PhantomData<fn() -> T>,
}

impl<T> DataSlot<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _ty: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

/// Raw function-pointer types constructible from a resolved address.
pub trait FnPointer: Copy {
    /// # Safety
    ///
    /// `addr` must be the entry point of a function with exactly this
    /// signature and ABI.
    unsafe fn from_addr(addr: u64) -> Self;
}

macro_rules! impl_fn_pointer {
    ($($arg:ident),*) => {
        impl<R $(, $arg)*> FnPointer for unsafe extern "C" fn($($arg),*) -> R {
            unsafe fn from_addr(addr: u64) -> Self {
                // SAFETY: caller vouches for the target per the trait contract.
                unsafe { std::mem::transmute(addr as usize) }
            }
        }
    };
}

impl_fn_pointer!();
impl_fn_pointer!(A1);
impl_fn_pointer!(A1, A2);
impl_fn_pointer!(A1, A2, A3);
impl_fn_pointer!(A1, A2, A3, A4);
impl_fn_pointer!(A1, A2, A3, A4, A5);
impl_fn_pointer!(A1, A2, A3, A4, A5, A6);
impl_fn_pointer!(A1, A2, A3, A4, A5, A6, A7);
impl_fn_pointer!(A1, A2, A3, A4, A5, A6, A7, A8);
