//! The artifact storage façade.
//!
//! One [`ArtifactStorage`] lives for a compilation session. It owns the
//! swap arena (if any), a dedupe set per [`ArtifactKind`], and the flag that
//! decides whether new arrays are interned or copied privately.

use std::fmt;
use std::fs::File;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cas_arena::{LengthPrefixedArray, SwapAllocator, SwapArena};
use cas_dedupe::{ContentHash, DedupeSet, DedupeStats, FxContentHash, Murmur3Hash};

use crate::{
    ArtifactKind, LinkerPatch, MemoryUsage, StorageError, StorageOptions,
    DEFAULT_INITIAL_SWAP_SIZE,
};

/// Shard count of every dedupe set in the façade.
pub const DEDUPE_SHARDS: usize = 4;

type ByteDedupe = DedupeSet<u8, Murmur3Hash, DEDUPE_SHARDS>;
type PatchDedupe = DedupeSet<LinkerPatch, FxContentHash, DEDUPE_SHARDS>;

/// Which mode produced a [`StoredArray`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Shared canonical copy owned by the storage's dedupe set.
    Canonical,
    /// Copy owned by the handle alone, freed when the handle is released.
    Private,
}

/// Handle to an array stored in an [`ArtifactStorage`].
///
/// The handle borrows the storage, so it can never outlive the memory it
/// points at. It is not `Clone`: a private array has exactly one
/// owner, and releasing (or dropping) the handle frees it. Canonical arrays
/// stay in the storage until the storage itself drops.
///
/// Equality is identity: two handles are equal when they point at the same
/// stored array.
pub struct StoredArray<'s, T: Copy> {
    array: LengthPrefixedArray<T>,
    origin: Origin,
    owner: &'s ArtifactStorage,
}

impl<T: Copy> StoredArray<'_, T> {
    /// The stored elements.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: a canonical array lives until the owning storage drops,
        // which the `'s` borrow rules out. A private array is freed only by
        // this handle's `Drop`, which cannot run while `self` is borrowed.
        unsafe { self.array.as_slice() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    #[inline]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Whether this handle points at the shared canonical copy.
    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.origin == Origin::Canonical
    }

    /// Address of the stored block; stable for the life of the array.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.array.as_ptr()
    }
}

impl<T: Copy> PartialEq for StoredArray<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array
    }
}

impl<T: Copy> Eq for StoredArray<'_, T> {}

impl<T: Copy> fmt::Debug for StoredArray<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredArray")
            .field("ptr", &self.as_ptr())
            .field("len", &self.len())
            .field("origin", &self.origin)
            .finish()
    }
}

impl<T: Copy> Drop for StoredArray<'_, T> {
    fn drop(&mut self) {
        if self.origin == Origin::Private {
            // SAFETY: private arrays are created by `copy_from` on the owner's
            // allocator, and this handle is their only owner. `Drop` runs once.
            unsafe { self.array.destroy(&self.owner.allocator) };
        }
    }
}

/// Deduplicating storage for the arrays of compiled methods.
///
/// # Thread Safety
/// Interning and releasing take `&self` and may run from any number of
/// threads; all synchronization lives in the arena and the dedupe shards.
/// The dedupe flag is atomic, but toggling it mid-session produces a mix of
/// canonical and private handles (each release still does the right thing,
/// since it follows the handle's [`Origin`]).
pub struct ArtifactStorage {
    allocator: SwapAllocator,
    dedupe_enabled: AtomicBool,
    dedupe_code: ByteDedupe,
    dedupe_method_info: ByteDedupe,
    dedupe_vmap_table: ByteDedupe,
    dedupe_cfi_info: ByteDedupe,
    dedupe_linker_patches: PatchDedupe,
}

impl ArtifactStorage {
    /// Create storage over `swap_file`, or on the heap when `None`, reserving
    /// the default initial swap size.
    pub fn new(swap_file: Option<File>) -> Self {
        Self::with_initial_size(swap_file, DEFAULT_INITIAL_SWAP_SIZE)
    }

    /// Create storage reserving `initial_size` bytes of swap up front.
    ///
    /// `initial_size` is ignored without a swap file.
    pub fn with_initial_size(swap_file: Option<File>, initial_size: usize) -> Self {
        let arena = swap_file.map(|file| Arc::new(SwapArena::new(file, initial_size)));
        Self::from_allocator(SwapAllocator::new(arena))
    }

    /// Create storage whose arrays all come from `allocator`.
    pub fn from_allocator(allocator: SwapAllocator) -> Self {
        tracing::debug!(
            swap_backed = allocator.is_swap_backed(),
            "created artifact storage"
        );
        Self {
            dedupe_enabled: AtomicBool::new(true),
            dedupe_code: DedupeSet::new(allocator.clone()),
            dedupe_method_info: DedupeSet::new(allocator.clone()),
            dedupe_vmap_table: DedupeSet::new(allocator.clone()),
            dedupe_cfi_info: DedupeSet::new(allocator.clone()),
            dedupe_linker_patches: DedupeSet::new(allocator.clone()),
            allocator,
        }
    }

    /// Create storage as described by `options`.
    #[tracing::instrument(level = "debug", skip_all, fields(
        initial_swap_size = options.initial_swap_size,
        dedupe = options.dedupe_enabled,
    ))]
    pub fn open(options: StorageOptions) -> Result<Self, StorageError> {
        let swap_file = options.swap.open()?;
        let storage = Self::with_initial_size(swap_file, options.initial_swap_size);
        storage.set_dedupe_enabled(options.dedupe_enabled);
        Ok(storage)
    }

    /// The swap arena, when storage is swap-backed.
    pub fn swap_arena(&self) -> Option<&Arc<SwapArena>> {
        self.allocator.arena()
    }

    /// The allocator every stored array comes from.
    pub fn allocator(&self) -> &SwapAllocator {
        &self.allocator
    }

    /// Choose between canonical (interned) and private copies for arrays
    /// stored from now on. Existing handles keep their [`Origin`].
    pub fn set_dedupe_enabled(&self, enabled: bool) {
        self.dedupe_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_dedupe_enabled(&self) -> bool {
        self.dedupe_enabled.load(Ordering::Relaxed)
    }

    fn store<T, H>(
        &self,
        set: &DedupeSet<T, H, DEDUPE_SHARDS>,
        content: &[T],
    ) -> Option<StoredArray<'_, T>>
    where
        T: Copy + Eq,
        H: ContentHash<T>,
    {
        if content.is_empty() {
            return None;
        }

        let (array, origin) = if self.is_dedupe_enabled() {
            (set.intern(content), Origin::Canonical)
        } else {
            (
                LengthPrefixedArray::copy_from(&self.allocator, content),
                Origin::Private,
            )
        };

        Some(StoredArray {
            array,
            origin,
            owner: self,
        })
    }

    fn release<T: Copy>(&self, handle: Option<StoredArray<'_, T>>) {
        if let Some(handle) = handle {
            debug_assert!(
                ptr::eq(handle.owner, self),
                "array released through a storage that does not own it"
            );
            drop(handle);
        }
    }

    /// Store machine code; `None` for empty input.
    pub fn intern_code(&self, code: &[u8]) -> Option<StoredArray<'_, u8>> {
        self.store(&self.dedupe_code, code)
    }

    /// Store encoded method metadata; `None` for empty input.
    pub fn intern_method_info(&self, method_info: &[u8]) -> Option<StoredArray<'_, u8>> {
        self.store(&self.dedupe_method_info, method_info)
    }

    /// Store a stack-map table; `None` for empty input.
    pub fn intern_vmap_table(&self, vmap_table: &[u8]) -> Option<StoredArray<'_, u8>> {
        self.store(&self.dedupe_vmap_table, vmap_table)
    }

    /// Store a frame-unwind table; `None` for empty input.
    pub fn intern_cfi_info(&self, cfi_info: &[u8]) -> Option<StoredArray<'_, u8>> {
        self.store(&self.dedupe_cfi_info, cfi_info)
    }

    /// Store linker patches; `None` for empty input.
    pub fn intern_linker_patches(
        &self,
        patches: &[LinkerPatch],
    ) -> Option<StoredArray<'_, LinkerPatch>> {
        self.store(&self.dedupe_linker_patches, patches)
    }

    /// Release a code handle. Private copies are freed; canonical copies
    /// and `None` are left alone.
    pub fn release_code(&self, code: Option<StoredArray<'_, u8>>) {
        self.release(code);
    }

    pub fn release_method_info(&self, method_info: Option<StoredArray<'_, u8>>) {
        self.release(method_info);
    }

    pub fn release_vmap_table(&self, vmap_table: Option<StoredArray<'_, u8>>) {
        self.release(vmap_table);
    }

    pub fn release_cfi_info(&self, cfi_info: Option<StoredArray<'_, u8>>) {
        self.release(cfi_info);
    }

    pub fn release_linker_patches(&self, patches: Option<StoredArray<'_, LinkerPatch>>) {
        self.release(patches);
    }

    /// Dedupe statistics for one category.
    pub fn dedupe_stats(&self, kind: ArtifactKind) -> DedupeStats {
        match kind {
            ArtifactKind::Code => self.dedupe_code.stats(),
            ArtifactKind::MethodInfo => self.dedupe_method_info.stats(),
            ArtifactKind::VmapTable => self.dedupe_vmap_table.stats(),
            ArtifactKind::CfiInfo => self.dedupe_cfi_info.stats(),
            ArtifactKind::LinkerPatches => self.dedupe_linker_patches.stats(),
        }
    }

    /// Number of canonical arrays held for one category.
    pub fn canonical_count(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Code => self.dedupe_code.len(),
            ArtifactKind::MethodInfo => self.dedupe_method_info.len(),
            ArtifactKind::VmapTable => self.dedupe_vmap_table.len(),
            ArtifactKind::CfiInfo => self.dedupe_cfi_info.len(),
            ArtifactKind::LinkerPatches => self.dedupe_linker_patches.len(),
        }
    }

    /// Snapshot of swap size and, when `extended`, per-category statistics.
    pub fn memory_usage(&self, extended: bool) -> MemoryUsage {
        let dedupe = if extended {
            ArtifactKind::ALL
                .iter()
                .map(|&kind| (kind, self.dedupe_stats(kind)))
                .collect()
        } else {
            Vec::new()
        };
        MemoryUsage {
            swap_size: self.swap_arena().map(|arena| arena.size()),
            dedupe,
        }
    }

    /// Human-readable [`MemoryUsage`].
    pub fn dump_memory_usage(&self, extended: bool) -> String {
        self.memory_usage(extended).to_string()
    }
}

impl fmt::Debug for ArtifactStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStorage")
            .field("swap_backed", &self.allocator.is_swap_backed())
            .field("dedupe_enabled", &self.is_dedupe_enabled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
