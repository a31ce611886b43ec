#![forbid(unsafe_code)]

//! Engine configuration.

use std::path::{Path, PathBuf};

use crate::field_state::BASELINE_SUFFIX;

/// Configuration for a document's undo history.
///
/// The one policy decision is where baseline snapshots live: with a snapshot
/// directory set, each section's first (complete) checkpoint is serialized to
/// disk and dropped from memory, bounding peak memory on large sections.
/// Without one, baselines stay in memory and nothing touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct HistoryConfig {
    snapshot_dir: Option<PathBuf>,
}

impl HistoryConfig {
    /// In-memory configuration: baselines are never spilled to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Spill baseline snapshots into `dir`.
    ///
    /// The directory must already exist; snapshot writes do not create it.
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// The configured snapshot directory, if any.
    #[must_use]
    pub fn snapshot_dir(&self) -> Option<&Path> {
        self.snapshot_dir.as_deref()
    }

    /// Deterministic baseline path for one section of the named document,
    /// or `None` when baselines stay in memory.
    #[must_use]
    pub(crate) fn baseline_path(&self, series_name: &str, snum: u32) -> Option<PathBuf> {
        self.snapshot_dir
            .as_ref()
            .map(|dir| dir.join(format!("{series_name}.{snum}.{BASELINE_SUFFIX}")))
    }
}
