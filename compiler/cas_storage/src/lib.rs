//! Deduplicating storage for compiled method artifacts.
//!
//! A compiled method is a handful of arrays: machine code, method metadata,
//! stack-map (vmap) tables, frame-unwind (CFI) tables and linker patches.
//! Many methods produce byte-identical arrays, so [`ArtifactStorage`] keeps
//! one canonical copy per distinct content in five typed dedupe sets, all
//! allocated from an optional file-backed swap arena.
//!
//! # Ownership
//!
//! Every intern call returns a [`StoredArray`] tagged with the mode that
//! produced it:
//! - **canonical**: owned by the storage, freed when the storage drops;
//!   releasing it is a no-op
//! - **private**: produced while deduplication is disabled, owned by the
//!   handle; releasing it frees the memory
//!
//! Release consumes the handle, so a private array cannot be freed twice.
//! [`CompiledMethod`] bundles the five handles of one method and releases
//! them when it is dropped.
//!
//! # Configuration
//!
//! [`StorageOptions`] selects the swap target, the initial swap reservation
//! and the dedupe mode; [`SwapPolicy`] decides whether an input set is large
//! enough to be worth swapping.

mod error;
mod kind;
mod linker_patch;
mod method;
mod options;
mod report;
mod storage;
mod tracing_setup;

pub use error::StorageError;
pub use kind::ArtifactKind;
pub use linker_patch::{LinkerPatch, LinkerPatchKind};
pub use method::CompiledMethod;
pub use options::{StorageOptions, SwapPolicy, SwapTarget, DEFAULT_INITIAL_SWAP_SIZE};
pub use report::{pretty_size, MemoryUsage};
pub use storage::{ArtifactStorage, Origin, StoredArray, DEDUPE_SHARDS};
pub use tracing_setup::init_tracing;

pub use cas_arena::{SwapAllocator, SwapArena};
pub use cas_dedupe::DedupeStats;
