//! Sharded dedupe set.
//!
//! Each shard maps an in-shard hash to the canonical arrays carrying that
//! hash. Lookups take the shard's read lock first and only upgrade to the
//! write lock (re-checking under it) when the content is new, following the
//! same fast/slow path as the compiler's string and type interners.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use cas_arena::{LengthPrefixedArray, SwapAllocator};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::ContentHash;

/// Canonical arrays sharing one in-shard hash, in insertion order.
type Bucket<T> = SmallVec<[LengthPrefixedArray<T>; 1]>;

/// One independently locked partition of a [`DedupeSet`].
struct Shard<T> {
    buckets: FxHashMap<u64, Bucket<T>>,
    len: usize,
}

impl<T: Copy + Eq> Shard<T> {
    fn new() -> Self {
        Self {
            buckets: FxHashMap::default(),
            len: 0,
        }
    }

    fn find(&self, hash: u64, key: &[T]) -> Option<LengthPrefixedArray<T>> {
        self.buckets.get(&hash)?.iter().copied().find(|stored| {
            // SAFETY: stored arrays are owned by the set and freed only when
            // it drops, which cannot happen while a shard is borrowed.
            unsafe { stored.as_slice() == key }
        })
    }

    fn insert(&mut self, hash: u64, stored: LengthPrefixedArray<T>) {
        self.buckets.entry(hash).or_default().push(stored);
        self.len += 1;
    }

    fn accumulate_stats(&self, stats: &mut DedupeStats) {
        for bucket in self.buckets.values() {
            let count = bucket.len();
            if count > 1 {
                stats.collision_sum += count - 1;
                stats.collision_max = stats.collision_max.max(count);
            }
            // The i-th array of a bucket is reached after i failed compares.
            stats.total_probe_distance += count * (count - 1) / 2;
        }
        stats.total_size += self.len;
    }
}

/// Diagnostics for a [`DedupeSet`], aggregated over all shards.
///
/// Informational only; nothing depends on these numbers for correctness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DedupeStats {
    /// Arrays that share their hash with an earlier array.
    pub collision_sum: usize,
    /// Largest number of arrays sharing a single hash (0 when none collide).
    pub collision_max: usize,
    /// Total content compares needed to reach every stored array.
    pub total_probe_distance: usize,
    /// Number of canonical arrays stored.
    pub total_size: usize,
    /// Cumulative time spent hashing interned keys.
    pub hash_time_ns: u64,
}

impl fmt::Display for DedupeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} collisions, {} max hash collisions, {}/{} probe distance, {} ns hash time",
            self.collision_sum,
            self.collision_max,
            self.total_probe_distance,
            self.total_size,
            self.hash_time_ns
        )
    }
}

/// Sharded content-addressed set of length-prefixed arrays.
///
/// `intern` returns one canonical [`LengthPrefixedArray`] per distinct
/// content. The handle stays valid, and keeps the same address, until the set
/// is dropped; the set then destroys every canonical array through its
/// allocator.
///
/// # Thread Safety
/// Each of the `SHARDS` partitions has its own `RwLock`. An `intern` call
/// locks only the shard its hash selects, so calls landing in different
/// shards never contend.
pub struct DedupeSet<T, H, const SHARDS: usize>
where
    T: Copy + Eq,
    H: ContentHash<T>,
{
    shards: [RwLock<Shard<T>>; SHARDS],
    hasher: H,
    allocator: SwapAllocator,
    hash_time_ns: AtomicU64,
}

impl<T, H, const SHARDS: usize> DedupeSet<T, H, SHARDS>
where
    T: Copy + Eq,
    H: ContentHash<T>,
{
    const SHARD_CHECK: () = assert!(SHARDS > 0, "a dedupe set needs at least one shard");

    /// Create an empty set storing canonical arrays through `allocator`.
    pub fn new(allocator: SwapAllocator) -> Self {
        Self::with_hasher(allocator, H::default())
    }

    /// Create an empty set with an explicit hasher instance.
    pub fn with_hasher(allocator: SwapAllocator, hasher: H) -> Self {
        let () = Self::SHARD_CHECK;
        Self {
            shards: std::array::from_fn(|_| RwLock::new(Shard::new())),
            hasher,
            allocator,
            hash_time_ns: AtomicU64::new(0),
        }
    }

    /// Split a content hash into (shard index, in-shard hash).
    #[inline]
    fn split_hash(hash: u64) -> (usize, u64) {
        let shards = SHARDS as u64;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "the remainder is below SHARDS, which is a usize"
        )]
        let shard = (hash % shards) as usize;
        (shard, hash / shards)
    }

    fn hash_content(&self, key: &[T]) -> u64 {
        let start = Instant::now();
        let hash = self.hasher.hash(key);
        let elapsed = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.hash_time_ns.fetch_add(elapsed, Ordering::Relaxed);
        hash
    }

    /// The shard `key` lands in.
    pub fn shard_for(&self, key: &[T]) -> usize {
        Self::split_hash(self.hasher.hash(key)).0
    }

    /// Return the canonical copy of `key`, storing one if none exists.
    ///
    /// Equal contents always yield the same handle; no allocation happens
    /// when the content is already present. The handle may be read until
    /// this set is dropped.
    pub fn intern(&self, key: &[T]) -> LengthPrefixedArray<T> {
        let (shard_idx, hash) = Self::split_hash(self.hash_content(key));
        let shard = &self.shards[shard_idx];

        // Fast path: already interned
        {
            let guard = shard.read();
            if let Some(existing) = guard.find(hash, key) {
                return existing;
            }
        }

        // Slow path: re-check under the write lock, then store
        let mut guard = shard.write();
        if let Some(existing) = guard.find(hash, key) {
            return existing;
        }

        let stored = LengthPrefixedArray::copy_from(&self.allocator, key);
        guard.insert(hash, stored);
        tracing::trace!(
            shard = shard_idx,
            len = key.len(),
            "stored new canonical array"
        );
        stored
    }

    /// Number of canonical arrays stored.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len).sum()
    }

    /// Whether nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The allocator canonical arrays live in.
    pub fn allocator(&self) -> &SwapAllocator {
        &self.allocator
    }

    /// Collision and timing statistics across all shards.
    pub fn stats(&self) -> DedupeStats {
        let mut stats = DedupeStats::default();
        for shard in &self.shards {
            shard.read().accumulate_stats(&mut stats);
        }
        stats.hash_time_ns = self.hash_time_ns.load(Ordering::Relaxed);
        stats
    }

    /// Human-readable [`DedupeStats`].
    pub fn dump_stats(&self) -> String {
        self.stats().to_string()
    }
}

impl<T, H, const SHARDS: usize> fmt::Debug for DedupeSet<T, H, SHARDS>
where
    T: Copy + Eq,
    H: ContentHash<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupeSet")
            .field("shards", &SHARDS)
            .field("len", &self.len())
            .field("swap_backed", &self.allocator.is_swap_backed())
            .finish_non_exhaustive()
    }
}

impl<T, H, const SHARDS: usize> Drop for DedupeSet<T, H, SHARDS>
where
    T: Copy + Eq,
    H: ContentHash<T>,
{
    fn drop(&mut self) {
        let Self {
            shards, allocator, ..
        } = self;

        let mut released = 0usize;
        for shard in shards.iter_mut() {
            let shard = shard.get_mut();
            for (_, bucket) in shard.buckets.drain() {
                for stored in bucket {
                    // SAFETY: every stored array was created by this set
                    // through `allocator` and is destroyed exactly once here.
                    // Handles returned by `intern` are only valid while the
                    // set is alive.
                    unsafe { stored.destroy(allocator) };
                    released += 1;
                }
            }
            shard.len = 0;
        }

        tracing::debug!(released, "dedupe set released canonical arrays");
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
