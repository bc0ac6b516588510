//! Swap arena for compiled-artifact storage.
//!
//! This crate owns the raw memory side of artifact storage:
//! - [`SwapArena`]: a growable pool of memory backed by a file, serving
//!   variable-size allocations with best-fit selection and coalescing frees
//! - [`SwapAllocator`]: a thin adapter that allocates from a [`SwapArena`]
//!   when one is configured and from the process heap otherwise
//! - [`LengthPrefixedArray`]: the canonical storage shape for artifacts, a
//!   count followed by that many elements
//!
//! # Failure Model
//!
//! Nothing in this crate returns a recoverable error. Failing to grow the
//! backing file or map a new region is resource exhaustion with no fallback,
//! so it goes through [`fatal`], which logs and aborts the process.

mod allocator;
mod arena;
mod array;
mod fatal;

pub use allocator::SwapAllocator;
pub use arena::{FreeChunk, SwapArena, MINIMUM_MAP_SIZE, PAGE_SIZE};
pub use array::LengthPrefixedArray;
pub use fatal::fatal;

/// Alignment of every block handed out by the arena or the heap fallback.
pub const ALIGNMENT: usize = 8;

/// Round `size` up to [`ALIGNMENT`], never returning zero.
///
/// Both allocation paths and both free paths go through this, so a block is
/// always released with exactly the size it was carved with. A size that
/// cannot be rounded without overflow is fatal.
#[inline]
pub fn alloc_size(size: usize) -> usize {
    let size = if size == 0 { 1 } else { size };
    match checked_round_up(size, ALIGNMENT) {
        Some(rounded) => rounded,
        None => fatal(format_args!("allocation of {size} bytes overflows")),
    }
}

/// Round `value` up to a multiple of `align` (a power of two), or `None`
/// when the result does not fit in a `usize`.
#[inline]
pub(crate) const fn checked_round_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    match value.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}
