//! Content hash functions for dedupe sets.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Hash function over an array's contents.
///
/// Implementations must be deterministic for the life of a set: equal
/// contents must always produce equal hashes. The low bits select the shard,
/// so they should be well mixed.
pub trait ContentHash<T>: Default + Send + Sync {
    /// Hash `content`.
    fn hash(&self, content: &[T]) -> u64;
}

/// MurmurHash3 (`x86_32` variant, seed 0) over raw bytes.
///
/// Used for code and the byte-table categories, where inputs are long and
/// the avalanche behaviour keeps shard selection uniform.
#[derive(Clone, Copy, Debug, Default)]
pub struct Murmur3Hash;

impl ContentHash<u8> for Murmur3Hash {
    #[inline]
    fn hash(&self, content: &[u8]) -> u64 {
        u64::from(murmur3_32(content, 0))
    }
}

/// `FxHasher` over the elements' [`Hash`] implementations.
///
/// Used for record arrays, where hashing field by field avoids reading
/// padding bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct FxContentHash;

impl<T: Hash> ContentHash<T> for FxContentHash {
    #[inline]
    fn hash(&self, content: &[T]) -> u64 {
        let mut hasher = FxHasher::default();
        content.hash(&mut hasher);
        hasher.finish()
    }
}

/// MurmurHash3 `x86_32`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "MurmurHash3 mixes in the length modulo 2^32 by definition"
)]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;
    const R1: u32 = 15;
    const R2: u32 = 13;
    const M: u32 = 5;
    const N: u32 = 0xe654_6b64;

    let mut hash = seed;

    let mut blocks = data.chunks_exact(4);
    for block in &mut blocks {
        let mut k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        k = k.wrapping_mul(C1).rotate_left(R1).wrapping_mul(C2);
        hash ^= k;
        hash = hash.rotate_left(R2).wrapping_mul(M).wrapping_add(N);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &byte) in tail.iter().enumerate() {
            k |= u32::from(byte) << (8 * i);
        }
        k = k.wrapping_mul(C1).rotate_left(R1).wrapping_mul(C2);
        hash ^= k;
    }

    hash ^= data.len() as u32;
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;
    hash
}
