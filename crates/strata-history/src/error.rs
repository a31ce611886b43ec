#![forbid(unsafe_code)]

//! Errors surfaced by the undo engine.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors that can occur while taking or restoring checkpoints.
///
/// All variants concern the per-section baseline snapshot file. A missing or
/// unreadable baseline is fatal for the session's undo history — it is never
/// silently replaced with empty data.
#[derive(Debug)]
pub enum StateError {
    /// The baseline snapshot file could not be written.
    SnapshotWrite { path: PathBuf, source: io::Error },
    /// The baseline snapshot file could not be read (including not found).
    SnapshotRead { path: PathBuf, source: io::Error },
    /// The baseline snapshot file exists but does not parse, or carries an
    /// unsupported format version.
    SnapshotFormat { path: PathBuf, detail: String },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SnapshotWrite { path, source } => {
                write!(f, "failed to write baseline snapshot {}: {}", path.display(), source)
            }
            Self::SnapshotRead { path, source } => {
                write!(f, "failed to read baseline snapshot {}: {}", path.display(), source)
            }
            Self::SnapshotFormat { path, detail } => {
                write!(f, "corrupt baseline snapshot {}: {}", path.display(), detail)
            }
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SnapshotWrite { source, .. } | Self::SnapshotRead { source, .. } => Some(source),
            Self::SnapshotFormat { .. } => None,
        }
    }
}
