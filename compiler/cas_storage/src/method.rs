//! Per-method artifact bundle.

use crate::{ArtifactStorage, LinkerPatch, StoredArray};

/// The stored arrays of one compiled method.
///
/// Built from raw arrays through an [`ArtifactStorage`], so identical arrays
/// across methods share one canonical copy. Dropping the method hands every
/// array back to the storage.
#[derive(Debug)]
pub struct CompiledMethod<'s> {
    storage: &'s ArtifactStorage,
    code: Option<StoredArray<'s, u8>>,
    method_info: Option<StoredArray<'s, u8>>,
    vmap_table: Option<StoredArray<'s, u8>>,
    cfi_info: Option<StoredArray<'s, u8>>,
    linker_patches: Option<StoredArray<'s, LinkerPatch>>,
}

fn slice_of<'a, T: Copy>(stored: Option<&'a StoredArray<'_, T>>) -> &'a [T] {
    match stored {
        Some(stored) => stored.as_slice(),
        None => &[],
    }
}

impl<'s> CompiledMethod<'s> {
    pub fn new(
        storage: &'s ArtifactStorage,
        code: &[u8],
        method_info: &[u8],
        vmap_table: &[u8],
        cfi_info: &[u8],
        linker_patches: &[LinkerPatch],
    ) -> Self {
        Self {
            storage,
            code: storage.intern_code(code),
            method_info: storage.intern_method_info(method_info),
            vmap_table: storage.intern_vmap_table(vmap_table),
            cfi_info: storage.intern_cfi_info(cfi_info),
            linker_patches: storage.intern_linker_patches(linker_patches),
        }
    }

    pub fn code(&self) -> &[u8] {
        slice_of(self.code.as_ref())
    }

    pub fn method_info(&self) -> &[u8] {
        slice_of(self.method_info.as_ref())
    }

    pub fn vmap_table(&self) -> &[u8] {
        slice_of(self.vmap_table.as_ref())
    }

    pub fn cfi_info(&self) -> &[u8] {
        slice_of(self.cfi_info.as_ref())
    }

    pub fn linker_patches(&self) -> &[LinkerPatch] {
        slice_of(self.linker_patches.as_ref())
    }

    /// The stored code array, `None` when the method has no code.
    pub fn code_array(&self) -> Option<&StoredArray<'s, u8>> {
        self.code.as_ref()
    }

    pub fn method_info_array(&self) -> Option<&StoredArray<'s, u8>> {
        self.method_info.as_ref()
    }

    pub fn vmap_table_array(&self) -> Option<&StoredArray<'s, u8>> {
        self.vmap_table.as_ref()
    }

    pub fn cfi_info_array(&self) -> Option<&StoredArray<'s, u8>> {
        self.cfi_info.as_ref()
    }

    pub fn linker_patches_array(&self) -> Option<&StoredArray<'s, LinkerPatch>> {
        self.linker_patches.as_ref()
    }

    pub fn storage(&self) -> &'s ArtifactStorage {
        self.storage
    }
}

impl Drop for CompiledMethod<'_> {
    fn drop(&mut self) {
        let storage = self.storage;
        storage.release_code(self.code.take());
        storage.release_method_info(self.method_info.take());
        storage.release_vmap_table(self.vmap_table.take());
        storage.release_cfi_info(self.cfi_info.take());
        storage.release_linker_patches(self.linker_patches.take());
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
