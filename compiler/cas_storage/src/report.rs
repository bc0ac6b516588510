//! Memory usage reports.

use std::fmt;

use cas_dedupe::DedupeStats;

use crate::ArtifactKind;

const KB: usize = 1024;
const MB: usize = KB * 1024;
const GB: usize = MB * 1024;

/// (threshold, bytes per unit, unit), largest unit first.
const UNITS: [(usize, usize, &str); 4] = [
    (10 * GB, GB, "GB"),
    (10 * MB, MB, "MB"),
    (10 * KB, KB, "KB"),
    (0, 1, "B"),
];

/// Format a byte count with the largest unit it holds at least ten of.
///
/// ```
/// assert_eq!(cas_storage::pretty_size(1024 * 1024), "1024KB");
/// assert_eq!(cas_storage::pretty_size(16 * 1024 * 1024), "16MB");
/// ```
pub fn pretty_size(bytes: usize) -> String {
    let (_, per_unit, unit) = UNITS
        .iter()
        .copied()
        .find(|&(threshold, _, _)| bytes >= threshold)
        .unwrap_or(UNITS[UNITS.len() - 1]);
    format!("{}{unit}", bytes / per_unit)
}

/// Snapshot of what an [`ArtifactStorage`] is holding.
///
/// Displays as `swap=<pretty> (<bytes>B)` (or `swap=none` on the heap),
/// followed by one `<Category> dedupe: <stats>` line per collected category.
///
/// [`ArtifactStorage`]: crate::ArtifactStorage
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryUsage {
    /// Mapped swap bytes, `None` for heap storage.
    pub swap_size: Option<usize>,
    /// Per-category statistics, empty unless an extended report was asked for.
    pub dedupe: Vec<(ArtifactKind, DedupeStats)>,
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.swap_size {
            Some(size) => write!(f, "swap={} ({size}B)", pretty_size(size))?,
            None => f.write_str("swap=none")?,
        }
        for (kind, stats) in &self.dedupe {
            write!(f, "\n{kind} dedupe: {stats}")?;
        }
        Ok(())
    }
}
