//! Allocator adapter over the swap arena or the process heap.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::{alloc_size, fatal, SwapArena, ALIGNMENT};

/// Allocation interface shared by the dedupe sets and the storage façade.
///
/// Delegates to a [`SwapArena`] when one is configured and to the global
/// allocator otherwise, so callers never care which backing store is in use
/// and tests can run without a swap file at all.
///
/// Cloning is cheap: clones share the same arena.
#[derive(Clone, Debug, Default)]
pub struct SwapAllocator {
    arena: Option<Arc<SwapArena>>,
}

impl SwapAllocator {
    /// Create an allocator over `arena`, or over the heap when `None`.
    pub fn new(arena: Option<Arc<SwapArena>>) -> Self {
        Self { arena }
    }

    /// Create a heap-backed allocator.
    pub fn heap() -> Self {
        Self { arena: None }
    }

    /// The backing arena, if any.
    pub fn arena(&self) -> Option<&Arc<SwapArena>> {
        self.arena.as_ref()
    }

    /// Whether allocations land in a swap arena.
    pub fn is_swap_backed(&self) -> bool {
        self.arena.is_some()
    }

    /// Allocate `size` bytes aligned to [`ALIGNMENT`].
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        match &self.arena {
            Some(arena) => arena.allocate(size),
            None => {
                let layout = heap_layout(size);
                // SAFETY: `heap_layout` never produces a zero-sized layout.
                let ptr = unsafe { alloc::alloc(layout) };
                match NonNull::new(ptr) {
                    Some(ptr) => ptr,
                    None => alloc::handle_alloc_error(layout),
                }
            }
        }
    }

    /// Release a block obtained from [`SwapAllocator::allocate`].
    ///
    /// # Safety
    /// `ptr` must come from `allocate` on this allocator (or a clone of it)
    /// with the same `size`, and must not be used or released again.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        match &self.arena {
            Some(arena) => arena.free(ptr, size),
            // Same layout as `allocate`, which `heap_layout` derives from
            // `size` alone.
            None => alloc::dealloc(ptr.as_ptr(), heap_layout(size)),
        }
    }
}

fn heap_layout(size: usize) -> Layout {
    match Layout::from_size_align(alloc_size(size), ALIGNMENT) {
        Ok(layout) => layout,
        Err(err) => fatal(format_args!("invalid heap allocation of {size} bytes: {err}")),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
