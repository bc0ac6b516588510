//! File-backed swap arena.
//!
//! The arena maps regions of a (normally unlinked) file and hands out
//! sub-ranges of them. Free space is tracked as a set of [`FreeChunk`]s held
//! in two indices that always describe the same chunks:
//!
//! - **by address** (`start -> size`): finds the neighbours of a freed block
//!   so it can be merged with them
//! - **by size** (`(size, start)`): finds the smallest chunk that fits a
//!   request (best fit, lowest address on ties)
//!
//! A chunk never changes in place. Every resize is a remove from both
//! indices followed by an insert into both, so the two orders can never be
//! corrupted by a mutation that happens to reorder an entry.
//!
//! # Growth
//!
//! When no free chunk fits, the file is extended and a new region of at least
//! [`MINIMUM_MAP_SIZE`] bytes is mapped at the old end of the file. The arena
//! never shrinks; regions stay mapped until the arena is dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::ptr::NonNull;

use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;

use crate::{alloc_size, checked_round_up, fatal};

/// Granularity of file growth and mapping.
pub const PAGE_SIZE: usize = 4096;

/// Smallest region mapped when the arena grows (16 MiB).
///
/// Growing in coarse steps keeps the number of mappings small over a long
/// compilation session.
pub const MINIMUM_MAP_SIZE: usize = 16 * 1024 * 1024;

/// A contiguous extent of unused arena memory.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FreeChunk {
    /// Address of the first free byte.
    pub start: usize,
    /// Length in bytes (always a multiple of [`ALIGNMENT`](crate::ALIGNMENT)).
    pub size: usize,
}

impl FreeChunk {
    /// One past the last free byte.
    #[inline]
    pub const fn end(self) -> usize {
        self.start + self.size
    }
}

/// The two synchronized views of the free chunk set.
#[derive(Default)]
struct FreeIndex {
    by_start: BTreeMap<usize, usize>,
    by_size: BTreeSet<(usize, usize)>,
}

impl FreeIndex {
    fn insert(&mut self, chunk: FreeChunk) {
        debug_assert!(chunk.size > 0, "empty free chunk at {:#x}", chunk.start);
        let previous = self.by_start.insert(chunk.start, chunk.size);
        debug_assert!(
            previous.is_none(),
            "free chunk at {:#x} inserted twice",
            chunk.start
        );
        self.by_size.insert((chunk.size, chunk.start));
    }

    fn remove(&mut self, chunk: FreeChunk) {
        let by_start = self.by_start.remove(&chunk.start);
        let by_size = self.by_size.remove(&(chunk.size, chunk.start));
        debug_assert_eq!(by_start, Some(chunk.size));
        debug_assert!(by_size, "chunk {chunk:?} missing from size index");
    }

    /// Smallest chunk of at least `size` bytes.
    fn best_fit(&self, size: usize) -> Option<FreeChunk> {
        self.by_size
            .range((size, 0)..)
            .next()
            .map(|&(size, start)| FreeChunk { start, size })
    }

    /// Last chunk starting before `address`.
    fn predecessor(&self, address: usize) -> Option<FreeChunk> {
        self.by_start
            .range(..address)
            .next_back()
            .map(|(&start, &size)| FreeChunk { start, size })
    }

    /// First chunk starting at or after `address`.
    fn successor(&self, address: usize) -> Option<FreeChunk> {
        self.by_start
            .range(address..)
            .next()
            .map(|(&start, &size)| FreeChunk { start, size })
    }

    /// Insert `chunk`, merging it with any free neighbour it touches.
    fn insert_coalesced(&mut self, chunk: FreeChunk) {
        let mut merged = chunk;

        if let Some(prev) = self.predecessor(chunk.start) {
            debug_assert!(
                prev.end() <= chunk.start,
                "block {chunk:?} overlaps free chunk {prev:?}"
            );
            if prev.end() == chunk.start {
                self.remove(prev);
                merged = FreeChunk {
                    start: prev.start,
                    size: prev.size + merged.size,
                };
            }
        }

        if let Some(next) = self.successor(chunk.start) {
            debug_assert!(
                next.start >= chunk.end(),
                "block {chunk:?} overlaps free chunk {next:?}"
            );
            if next.start == chunk.end() {
                self.remove(next);
                merged.size += next.size;
            }
        }

        self.insert(merged);
    }

    fn total_bytes(&self) -> usize {
        self.by_start.values().sum()
    }

    fn iter(&self) -> impl Iterator<Item = FreeChunk> + '_ {
        self.by_start
            .iter()
            .map(|(&start, &size)| FreeChunk { start, size })
    }

    /// Cross-check both indices; any disagreement is heap corruption.
    fn verify(&self) {
        let by_start: usize = self.by_start.values().sum();
        let by_size: usize = self.by_size.iter().map(|&(size, _)| size).sum();
        if by_start != by_size || self.by_start.len() != self.by_size.len() {
            fatal(format_args!(
                "swap arena free indices disagree: {by_start} bytes in {} chunks by address, \
                 {by_size} bytes in {} chunks by size",
                self.by_start.len(),
                self.by_size.len()
            ));
        }
    }
}

/// Everything guarded by the arena lock.
struct ArenaState {
    /// Total bytes mapped (and length of the backing file).
    size: usize,
    free: FreeIndex,
    /// Mapped regions, unmapped when the arena drops.
    regions: Vec<MmapMut>,
}

impl ArenaState {
    #[inline]
    fn check(&self) {
        if cfg!(debug_assertions) {
            self.free.verify();
        }
    }

    fn contains(&self, address: usize) -> bool {
        self.regions.iter().any(|region| {
            let base = region.as_ptr() as usize;
            address >= base && address < base + region.len()
        })
    }
}

/// Growable, file-backed memory pool.
///
/// # Thread Safety
/// A single lock guards both free indices, so `allocate` and `free` are
/// mutually exclusive across all callers. Most memory reuse in artifact
/// storage happens through deduplication rather than raw allocation, so the
/// coarse lock is not the contention point.
pub struct SwapArena {
    file: File,
    state: Mutex<ArenaState>,
}

impl SwapArena {
    /// Create an arena over `file`, mapping at least `initial_size` bytes.
    ///
    /// The file should be writable and is assumed to be private to the
    /// arena (typically already unlinked). Its contents are overwritten.
    pub fn new(file: File, initial_size: usize) -> Self {
        let arena = Self {
            file,
            state: Mutex::new(ArenaState {
                size: 0,
                free: FreeIndex::default(),
                regions: Vec::new(),
            }),
        };

        {
            let mut state = arena.state.lock();
            let chunk = arena.map_region(&mut state, initial_size);
            state.free.insert(chunk);
            state.check();
            tracing::debug!(initial_size, mapped = state.size, "swap arena created");
        }

        arena
    }

    /// Allocate `size` bytes (rounded up to [`ALIGNMENT`](crate::ALIGNMENT)).
    ///
    /// Serves the request from the smallest free chunk that fits, growing the
    /// arena when none does. Aborts the process if growing fails.
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        let size = alloc_size(size);
        let mut state = self.state.lock();

        let chunk = if let Some(chunk) = state.free.best_fit(size) {
            state.free.remove(chunk);
            chunk
        } else {
            self.map_region(&mut state, size)
        };

        if chunk.size > size {
            state.free.insert_coalesced(FreeChunk {
                start: chunk.start + size,
                size: chunk.size - size,
            });
        }
        state.check();

        tracing::trace!(size, address = chunk.start, "swap arena allocate");
        to_pointer(chunk.start)
    }

    /// Return a block to the arena, merging it with adjacent free space.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`SwapArena::allocate`] on this arena
    /// for a request that rounds to the same size as `size`, and must not
    /// have been freed since. The block must not be accessed afterwards.
    pub unsafe fn free(&self, ptr: NonNull<u8>, size: usize) {
        let chunk = FreeChunk {
            start: ptr.as_ptr() as usize,
            size: alloc_size(size),
        };
        let mut state = self.state.lock();
        debug_assert!(
            state.contains(chunk.start) && state.contains(chunk.end() - 1),
            "freeing {chunk:?} outside the swap arena"
        );

        state.free.insert_coalesced(chunk);
        state.check();

        tracing::trace!(size = chunk.size, address = chunk.start, "swap arena free");
    }

    /// Total bytes mapped by the arena.
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// Total bytes currently free.
    pub fn free_bytes(&self) -> usize {
        self.state.lock().free.total_bytes()
    }

    /// Number of free chunks (1 for a fresh or fully released arena).
    pub fn free_chunk_count(&self) -> usize {
        self.state.lock().free.by_start.len()
    }

    /// Snapshot of the free chunks in address order.
    pub fn free_chunks(&self) -> Vec<FreeChunk> {
        self.state.lock().free.iter().collect()
    }

    /// The largest free chunk, if any.
    pub fn largest_free_chunk(&self) -> Option<FreeChunk> {
        self.state
            .lock()
            .free
            .by_size
            .iter()
            .next_back()
            .map(|&(size, start)| FreeChunk { start, size })
    }

    /// Number of regions mapped so far.
    pub fn region_count(&self) -> usize {
        self.state.lock().regions.len()
    }

    /// Extend the file and map a new region of at least `min_size` bytes.
    ///
    /// The returned chunk is in neither free index.
    fn map_region(&self, state: &mut ArenaState, min_size: usize) -> FreeChunk {
        let old_size = state.size;
        let Some(next_part) = checked_round_up(min_size, PAGE_SIZE) else {
            fatal(format_args!(
                "swap arena size overflow: {old_size} bytes mapped, {min_size} requested"
            ));
        };
        let next_part = next_part.max(MINIMUM_MAP_SIZE);
        let Some(new_size) = old_size.checked_add(next_part) else {
            fatal(format_args!(
                "swap arena size overflow: {old_size} bytes mapped, {min_size} requested"
            ));
        };

        if let Err(err) = self.file.set_len(new_size as u64) {
            fatal(format_args!(
                "unable to resize swap file from {old_size} to {new_size} bytes \
                 ({min_size} requested): {err}"
            ));
        }

        // SAFETY: the mapping covers only the bytes just added by `set_len`,
        // which nothing else reads or writes. The region is kept in
        // `state.regions` until the arena drops, so no block outlives it.
        let mapped = unsafe {
            MmapOptions::new()
                .offset(old_size as u64)
                .len(next_part)
                .map_mut(&self.file)
        };
        let mut region = match mapped {
            Ok(region) => region,
            Err(err) => fatal(format_args!(
                "unable to map {next_part} bytes of swap at offset {old_size} \
                 ({min_size} requested): {err}"
            )),
        };

        let start = region.as_mut_ptr() as usize;
        state.size = new_size;
        state.regions.push(region);

        tracing::debug!(
            old_size,
            new_size,
            requested = min_size,
            "swap arena grew"
        );

        FreeChunk {
            start,
            size: next_part,
        }
    }
}

impl fmt::Debug for SwapArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SwapArena")
            .field("size", &state.size)
            .field("free_bytes", &state.free.total_bytes())
            .field("free_chunks", &state.free.by_start.len())
            .field("regions", &state.regions.len())
            .finish_non_exhaustive()
    }
}

impl Drop for SwapArena {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        tracing::debug!(
            size = state.size,
            free = state.free.total_bytes(),
            "swap arena released"
        );
    }
}

#[inline]
fn to_pointer(address: usize) -> NonNull<u8> {
    match NonNull::new(address as *mut u8) {
        Some(ptr) => ptr,
        None => fatal(format_args!("swap arena produced a null block")),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
