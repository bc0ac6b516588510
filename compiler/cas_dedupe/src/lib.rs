//! Sharded content-addressed dedupe sets.
//!
//! A [`DedupeSet`] stores at most one canonical copy of every distinct array
//! it is asked to intern and hands back the same [`LengthPrefixedArray`]
//! handle for every equal request. Canonical copies are allocated through a
//! [`SwapAllocator`] and live until the set is dropped.
//!
//! # Design
//!
//! - **Sharding**: the content hash selects one of `SHARDS` partitions, each
//!   with its own lock, so compiler worker threads interning unrelated
//!   artifacts rarely wait on each other.
//! - **Monomorphization**: element type, hash function and shard count are
//!   type parameters; each artifact category gets its own specialized set.
//! - **Pluggable hashing**: [`ContentHash`] decouples the set from the hash
//!   function ([`Murmur3Hash`] for raw bytes, [`FxContentHash`] for records).
//!
//! [`LengthPrefixedArray`]: cas_arena::LengthPrefixedArray
//! [`SwapAllocator`]: cas_arena::SwapAllocator

mod dedupe_set;
mod hash;

pub use dedupe_set::{DedupeSet, DedupeStats};
pub use hash::{murmur3_32, ContentHash, FxContentHash, Murmur3Hash};
