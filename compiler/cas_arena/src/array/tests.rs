use super::*;
use crate::{alloc_size, SwapArena, MINIMUM_MAP_SIZE};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Record {
    offset: u32,
    kind: u8,
    target: u64,
}

#[test]
fn test_copy_from_heap() {
    let allocator = SwapAllocator::heap();
    let array = LengthPrefixedArray::copy_from(&allocator, &[1u8, 2, 3, 4]);

    assert_eq!(array.len(), 4);
    assert!(!array.is_empty());
    unsafe {
        assert_eq!(array.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(array.stored_len(), 4);
        array.destroy(&allocator);
    }
}

#[test]
fn test_empty_array_still_has_prefix() {
    let allocator = SwapAllocator::heap();
    let array = LengthPrefixedArray::<u8>::copy_from(&allocator, &[]);

    assert!(array.is_empty());
    unsafe {
        assert_eq!(array.stored_len(), 0);
        assert!(array.as_slice().is_empty());
        array.destroy(&allocator);
    }
}

#[test]
fn test_records_are_aligned() {
    let allocator = SwapAllocator::heap();
    let records = [
        Record { offset: 4, kind: 1, target: 99 },
        Record { offset: 12, kind: 2, target: 7 },
    ];

    let array = LengthPrefixedArray::copy_from(&allocator, &records);

    let data = array.as_ptr() as usize + LengthPrefixedArray::<Record>::DATA_OFFSET;
    assert_eq!(data % std::mem::align_of::<Record>(), 0);
    unsafe {
        assert_eq!(array.as_slice(), &records);
        array.destroy(&allocator);
    }
}

#[test]
fn test_storage_size_includes_prefix() {
    assert_eq!(
        LengthPrefixedArray::<u8>::storage_size(5),
        std::mem::size_of::<usize>() + 5
    );
    assert_eq!(
        LengthPrefixedArray::<u32>::storage_size(3),
        LengthPrefixedArray::<u32>::DATA_OFFSET + 12
    );
}

#[test]
fn test_identity_is_address() {
    let allocator = SwapAllocator::heap();
    let a = LengthPrefixedArray::copy_from(&allocator, &[9u8]);
    let b = LengthPrefixedArray::copy_from(&allocator, &[9u8]);

    let copy = a;
    assert_eq!(a, copy);
    assert_ne!(a, b);
    unsafe {
        a.destroy(&allocator);
        b.destroy(&allocator);
    }
}

#[test]
fn test_arena_destroy_returns_exact_block() {
    let arena = Arc::new(SwapArena::new(tempfile::tempfile().unwrap(), 0));
    let allocator = SwapAllocator::new(Some(Arc::clone(&arena)));

    let array = LengthPrefixedArray::copy_from(&allocator, &[0u8; 17]);
    let used = alloc_size(LengthPrefixedArray::<u8>::storage_size(17));
    assert_eq!(arena.free_bytes(), MINIMUM_MAP_SIZE - used);

    unsafe { array.destroy(&allocator) };
    assert_eq!(arena.free_bytes(), MINIMUM_MAP_SIZE);
    assert_eq!(arena.free_chunk_count(), 1);
}
