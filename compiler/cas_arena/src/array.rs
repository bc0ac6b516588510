//! Length-prefixed arrays: the storage shape of every artifact.
//!
//! Layout (native byte order and alignment):
//!
//! ```text
//! +-----------+-----------+-----------+-----+
//! | len:usize | elem[0]   | elem[1]   | ... |
//! +-----------+-----------+-----------+-----+
//! ^ block start            (elements start at DATA_OFFSET)
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};
use std::slice;

use crate::{fatal, SwapAllocator, ALIGNMENT};

/// Handle to a length-prefixed array living in a [`SwapAllocator`] block.
///
/// The handle is a raw identity: copying it does not copy the array, and
/// equality compares addresses, not contents. Whoever allocated the array
/// decides how long it lives; reading through a handle is `unsafe` because
/// the handle cannot know whether that owner has released it.
pub struct LengthPrefixedArray<T> {
    block: NonNull<u8>,
    len: usize,
    _marker: PhantomData<T>,
}

// SAFETY: the handle only grants shared access to `T`s (`as_slice`), so it
// may cross threads whenever `&T` may.
unsafe impl<T: Sync> Send for LengthPrefixedArray<T> {}
// SAFETY: as above.
unsafe impl<T: Sync> Sync for LengthPrefixedArray<T> {}

impl<T: Copy> LengthPrefixedArray<T> {
    /// Byte offset of the first element from the block start.
    pub const DATA_OFFSET: usize = {
        let align = align_of::<T>();
        (size_of::<usize>() + align - 1) & !(align - 1)
    };

    const LAYOUT_CHECK: () = assert!(
        align_of::<T>() <= ALIGNMENT && align_of::<usize>() <= ALIGNMENT,
        "element alignment exceeds the allocator alignment"
    );

    /// Bytes needed to store `len` elements including the prefix.
    pub fn storage_size(len: usize) -> usize {
        len.checked_mul(size_of::<T>())
            .and_then(|bytes| bytes.checked_add(Self::DATA_OFFSET))
            .unwrap_or_else(|| fatal(format_args!("length-prefixed array of {len} elements overflows")))
    }

    /// Copy `elements` into a fresh block from `allocator`.
    pub fn copy_from(allocator: &SwapAllocator, elements: &[T]) -> Self {
        let () = Self::LAYOUT_CHECK;
        let block = allocator.allocate(Self::storage_size(elements.len()));

        // SAFETY: `block` spans `storage_size(len)` writable bytes aligned to
        // ALIGNMENT, which covers the prefix at offset 0 and the elements at
        // DATA_OFFSET (both sufficiently aligned per LAYOUT_CHECK). The fresh
        // block cannot overlap `elements`.
        unsafe {
            block.as_ptr().cast::<usize>().write(elements.len());
            ptr::copy_nonoverlapping(
                elements.as_ptr(),
                block.as_ptr().add(Self::DATA_OFFSET).cast::<T>(),
                elements.len(),
            );
        }

        Self {
            block,
            len: elements.len(),
            _marker: PhantomData,
        }
    }

    /// Release the block back to `allocator`.
    ///
    /// # Safety
    /// `allocator` must be the allocator (or a clone of it) that created this
    /// array, the array must not have been destroyed already, and no handle
    /// to it may be read afterwards.
    pub unsafe fn destroy(self, allocator: &SwapAllocator) {
        allocator.deallocate(self.block, Self::storage_size(self.len));
    }

    /// View the elements.
    ///
    /// # Safety
    /// The array must still be alive (not destroyed) for all of `'a`.
    pub unsafe fn as_slice<'a>(self) -> &'a [T] {
        slice::from_raw_parts(self.block.as_ptr().add(Self::DATA_OFFSET).cast::<T>(), self.len)
    }

    /// Read the count field stored in the block.
    ///
    /// # Safety
    /// The array must still be alive.
    pub unsafe fn stored_len(self) -> usize {
        self.block.as_ptr().cast::<usize>().read()
    }
}

impl<T> LengthPrefixedArray<T> {
    /// Number of elements.
    #[inline]
    pub fn len(self) -> usize {
        self.len
    }

    /// Whether the array has no elements.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.len == 0
    }

    /// Address of the block (the canonical identity).
    #[inline]
    pub fn as_ptr(self) -> *const u8 {
        self.block.as_ptr()
    }
}

impl<T> Clone for LengthPrefixedArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for LengthPrefixedArray<T> {}

impl<T> PartialEq for LengthPrefixedArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block
    }
}

impl<T> Eq for LengthPrefixedArray<T> {}

impl<T> Hash for LengthPrefixedArray<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.block.hash(state);
    }
}

impl<T> fmt::Debug for LengthPrefixedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LengthPrefixedArray({:p}, len={})", self.block, self.len)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
