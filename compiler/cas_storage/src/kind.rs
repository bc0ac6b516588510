//! Artifact categories.

use std::fmt;

/// The five categories of per-method output, each with its own dedupe set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArtifactKind {
    /// Machine code bytes.
    Code,
    /// Encoded method metadata.
    MethodInfo,
    /// Stack-map (vmap) tables.
    VmapTable,
    /// Frame-unwind (CFI) tables.
    CfiInfo,
    /// Linker patch records.
    LinkerPatches,
}

impl ArtifactKind {
    /// All categories in report order.
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Code,
        ArtifactKind::MethodInfo,
        ArtifactKind::VmapTable,
        ArtifactKind::CfiInfo,
        ArtifactKind::LinkerPatches,
    ];

    /// Human-readable name used in memory reports.
    pub const fn label(self) -> &'static str {
        match self {
            ArtifactKind::Code => "Code",
            ArtifactKind::MethodInfo => "Method info",
            ArtifactKind::VmapTable => "Vmap table",
            ArtifactKind::CfiInfo => "CFI info",
            ArtifactKind::LinkerPatches => "Linker patches",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
