//! Storage configuration.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use crate::StorageError;

/// Swap reserved up front when none is requested explicitly.
pub const DEFAULT_INITIAL_SWAP_SIZE: usize = 10 * 1024 * 1024;

/// Where stored arrays live.
#[derive(Debug, Default)]
pub enum SwapTarget {
    /// Keep everything on the heap.
    #[default]
    None,
    /// An already opened, writable file.
    File(File),
    /// A file at this path, created or truncated on open.
    Path(PathBuf),
    /// An unnamed temporary file, removed by the OS once closed.
    Anonymous,
}

impl SwapTarget {
    /// Open the swap file this target describes, or `None` for the heap.
    pub fn open(self) -> Result<Option<File>, StorageError> {
        match self {
            SwapTarget::None => Ok(None),
            SwapTarget::File(file) => Ok(Some(file)),
            SwapTarget::Path(path) => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .map(Some)
                .map_err(|source| StorageError::OpenSwapFile { path, source }),
            SwapTarget::Anonymous => tempfile::tempfile()
                .map(Some)
                .map_err(StorageError::CreateSwapFile),
        }
    }
}

/// Configuration for [`ArtifactStorage::open`].
///
/// [`ArtifactStorage::open`]: crate::ArtifactStorage::open
#[derive(Debug)]
pub struct StorageOptions {
    pub swap: SwapTarget,
    /// Bytes of swap mapped at startup; ignored for heap storage.
    pub initial_swap_size: usize,
    pub dedupe_enabled: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            swap: SwapTarget::None,
            initial_swap_size: DEFAULT_INITIAL_SWAP_SIZE,
            dedupe_enabled: true,
        }
    }
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_swap_file(mut self, file: File) -> Self {
        self.swap = SwapTarget::File(file);
        self
    }

    #[must_use]
    pub fn with_swap_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.swap = SwapTarget::Path(path.into());
        self
    }

    #[must_use]
    pub fn with_anonymous_swap(mut self) -> Self {
        self.swap = SwapTarget::Anonymous;
        self
    }

    #[must_use]
    pub fn without_swap(mut self) -> Self {
        self.swap = SwapTarget::None;
        self
    }

    #[must_use]
    pub fn with_initial_swap_size(mut self, bytes: usize) -> Self {
        self.initial_swap_size = bytes;
        self
    }

    #[must_use]
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe_enabled = enabled;
        self
    }
}

/// Decides whether a compilation is large enough to run with swap.
///
/// Small inputs finish faster on the heap; swap pays off only once the
/// input set is both made of several files and large in total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SwapPolicy {
    /// Fewer input files than this never use swap.
    pub min_dex_files: usize,
    /// Cumulative input size (bytes) from which swap is used.
    pub min_cumulative_dex_size: usize,
}

impl Default for SwapPolicy {
    fn default() -> Self {
        Self {
            min_dex_files: 2,
            min_cumulative_dex_size: 20 * 1024 * 1024,
        }
    }
}

impl SwapPolicy {
    /// Whether inputs of `dex_file_sizes` bytes each should be compiled with
    /// swap. Boot images never are.
    pub fn should_use_swap(&self, is_boot_image: bool, dex_file_sizes: &[usize]) -> bool {
        if is_boot_image || dex_file_sizes.len() < self.min_dex_files {
            return false;
        }

        let total = dex_file_sizes
            .iter()
            .fold(0usize, |total, &size| total.saturating_add(size));
        if total >= self.min_cumulative_dex_size {
            tracing::info!(
                dex_files = dex_file_sizes.len(),
                total_bytes = total,
                "Large app, accepted running with swap."
            );
            return true;
        }
        false
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
