//! Errors from configuring artifact storage.

use std::io;
use std::path::PathBuf;

/// Failure to set up the swap file backing an [`ArtifactStorage`].
///
/// Once storage exists, interning and releasing never fail; only
/// construction from [`StorageOptions`] can.
///
/// [`ArtifactStorage`]: crate::ArtifactStorage
/// [`StorageOptions`]: crate::StorageOptions
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The swap file at `path` could not be opened for writing.
    #[error("unable to open swap file {}: {source}", path.display())]
    OpenSwapFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No anonymous temporary file could be created.
    #[error("unable to create anonymous swap file: {0}")]
    CreateSwapFile(#[source] io::Error),
}
