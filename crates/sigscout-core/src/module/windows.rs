//! In-process module snapshots from the Win32 loaded-module list.

use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::ProcessStatus::{K32GetModuleInformation, MODULEINFO};
use windows::Win32::System::Threading::GetCurrentProcess;
use windows::core::{HSTRING, PCWSTR};

use crate::error::{Error, Result};

use super::{ModuleImage, ModuleProvider};

/// Snapshots modules of the current process.
///
/// Intended for the in-process deployment: the resolver runs inside the
/// host, so the images are already mapped and readable.
#[derive(Debug, Default)]
pub struct LiveProcessProvider;

impl LiveProcessProvider {
    pub fn new() -> Self {
        Self
    }

    fn snapshot(name: Option<&str>) -> Result<ModuleImage> {
        let display = name.unwrap_or("<host executable>");

        let handle = unsafe {
            match name {
                Some(library) => GetModuleHandleW(&HSTRING::from(library)),
                None => GetModuleHandleW(PCWSTR::null()),
            }
        }
        .map_err(|_| Error::ModuleNotFound(display.to_string()))?;

        let mut info = MODULEINFO::default();
        unsafe {
            K32GetModuleInformation(
                GetCurrentProcess(),
                handle,
                &mut info,
                size_of::<MODULEINFO>() as u32,
            )
        }
        .ok()
        .map_err(|_| Error::ModuleNotFound(display.to_string()))?;

        let base = info.lpBaseOfDll as u64;
        // The loader keeps the whole SizeOfImage range mapped for the
        // lifetime of the module, so a one-shot copy is sound here.
        let data = unsafe {
            std::slice::from_raw_parts(info.lpBaseOfDll as *const u8, info.SizeOfImage as usize)
        }
        .to_vec();

        Ok(ModuleImage::new(display, base, data))
    }
}

impl ModuleProvider for LiveProcessProvider {
    fn primary_image(&self) -> Result<ModuleImage> {
        Self::snapshot(None)
    }

    fn library_image(&self, name: &str) -> Result<ModuleImage> {
        Self::snapshot(Some(name))
    }
}
