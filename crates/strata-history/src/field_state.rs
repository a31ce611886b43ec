#![forbid(unsafe_code)]

//! One checkpoint of a section's annotation state.
//!
//! A [`FieldState`] freezes a section's contours, the ztraces touching it,
//! its transforms, and its flags at one commit. Contour payloads use a
//! hybrid storage policy behind a single accessor surface:
//!
//! - the first checkpoint ever taken for a section is a **complete** contour
//!   set (the baseline), held in memory or spilled to a per-section JSON
//!   file;
//! - every later checkpoint is **differential** — only the contour names
//!   that changed since the previous commit, always in memory.
//!
//! Ztraces, transforms, and flags are assumed small: the changed-ztrace
//! subset and full transform/flag copies are retained in memory regardless
//! of the contour policy.
//!
//! # File format
//!
//! Spilled baselines are versioned JSON written with a
//! temp-file-then-rename so a crash cannot leave a half-written snapshot:
//!
//! ```json
//! {
//!   "version": 1,
//!   "section": 41,
//!   "contours": { "axon01": { "name": "axon01", "traces": [ ... ] } }
//! }
//! ```

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use strata_model::{Contour, Flag, Section, Series, Transform, Ztrace};

use crate::error::StateError;

/// Fixed suffix of per-section baseline snapshot files.
pub const BASELINE_SUFFIX: &str = "baseline.json";

/// Current baseline snapshot format version.
const FORMAT_VERSION: u64 = 1;

/// Commit timestamp in deciseconds since the Unix epoch.
///
/// The coarse 100ms granularity is deliberate and load-bearing: checkpoint
/// recency comparisons treat two commits in the same decisecond as a tie,
/// and ties resolve toward the section-level choice.
#[must_use]
pub(crate) fn commit_stamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64 / 100)
        .unwrap_or(0)
}

/// On-disk representation of a spilled baseline.
#[derive(Debug, Serialize, Deserialize)]
struct BaselineFile {
    version: u64,
    section: u32,
    contours: BTreeMap<String, Contour>,
}

/// Contour storage backing a checkpoint.
#[derive(Debug, Clone)]
pub enum ContourPayload {
    /// Complete contour set, in memory.
    FullInMemory(BTreeMap<String, Contour>),
    /// Complete contour set, serialized to a per-section file.
    FullOnDisk(PathBuf),
    /// Only the names that changed since the previous checkpoint.
    Differential(BTreeMap<String, Contour>),
}

/// One immutable-by-convention checkpoint of a section.
#[derive(Debug, Clone)]
pub struct FieldState {
    payload: ContourPayload,
    ztraces: BTreeMap<String, Ztrace>,
    tforms: BTreeMap<String, Transform>,
    flags: Vec<Flag>,
    commit_time: u64,
}

impl FieldState {
    /// Build the complete baseline checkpoint for a section.
    ///
    /// Copies the entire contour set plus every ztrace, transform, and flag.
    /// With `disk_path` set, the contour set is serialized there and nothing
    /// contour-shaped is kept in memory.
    pub fn baseline(
        section: &Section,
        series: &Series,
        disk_path: Option<PathBuf>,
    ) -> Result<Self, StateError> {
        let payload = match disk_path {
            Some(path) => {
                write_baseline(&path, section.n, &section.contours)?;
                ContourPayload::FullOnDisk(path)
            }
            None => ContourPayload::FullInMemory(section.contours.clone()),
        };
        Ok(Self {
            payload,
            ztraces: series.ztraces.clone(),
            tforms: section.tforms.clone(),
            flags: section.flags.clone(),
            commit_time: commit_stamp(),
        })
    }

    /// Build a differential checkpoint holding only the listed names.
    ///
    /// Contour names absent from the live section are stored as empty
    /// contours, so that re-applying this state re-deletes them. Ztrace
    /// names absent from the live series are skipped.
    #[must_use]
    pub fn differential(
        section: &Section,
        series: &Series,
        contour_names: &BTreeSet<String>,
        ztrace_names: &BTreeSet<String>,
    ) -> Self {
        let contours = contour_names
            .iter()
            .map(|name| {
                let contour = section
                    .contours
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| Contour::new(name.as_str()));
                (name.clone(), contour)
            })
            .collect();
        let ztraces = ztrace_names
            .iter()
            .filter_map(|name| series.ztraces.get(name).map(|z| (name.clone(), z.clone())))
            .collect();
        Self {
            payload: ContourPayload::Differential(contours),
            ztraces,
            tforms: section.tforms.clone(),
            flags: section.flags.clone(),
            commit_time: commit_stamp(),
        }
    }

    /// The checkpoint's commit time, in deciseconds since the Unix epoch.
    #[must_use]
    pub fn commit_time(&self) -> u64 {
        self.commit_time
    }

    /// Re-stamp the commit time. Done when the state is pushed onto an undo
    /// stack, so the stack records when the *next* edit displaced it.
    pub(crate) fn stamp(&mut self, commit_time: u64) {
        self.commit_time = commit_time;
    }

    #[cfg(test)]
    pub(crate) fn set_commit_time_for_test(&mut self, commit_time: u64) {
        self.commit_time = commit_time;
    }

    /// Whether this checkpoint carries a complete contour set.
    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(
            self.payload,
            ContourPayload::FullInMemory(_) | ContourPayload::FullOnDisk(_)
        )
    }

    /// The path of the spilled baseline, if this state lives on disk.
    #[must_use]
    pub fn disk_path(&self) -> Option<&Path> {
        match &self.payload {
            ContourPayload::FullOnDisk(path) => Some(path),
            _ => None,
        }
    }

    /// The checkpoint's contour map, regardless of backing store.
    ///
    /// In-memory payloads borrow; disk payloads load and parse the snapshot
    /// file. A missing or corrupt file is an error — never empty data.
    pub fn contours(&self) -> Result<Cow<'_, BTreeMap<String, Contour>>, StateError> {
        match &self.payload {
            ContourPayload::FullInMemory(map) | ContourPayload::Differential(map) => {
                Ok(Cow::Borrowed(map))
            }
            ContourPayload::FullOnDisk(path) => read_baseline(path).map(Cow::Owned),
        }
    }

    /// The contour names this checkpoint has values for.
    ///
    /// For differential states these are the modified names; for full states,
    /// every name that existed at commit time.
    pub fn modified_contour_names(&self) -> Result<BTreeSet<String>, StateError> {
        Ok(self.contours()?.keys().cloned().collect())
    }

    /// The ztraces frozen in this checkpoint (changed subset; full set at
    /// the baseline).
    #[must_use]
    pub fn ztraces(&self) -> &BTreeMap<String, Ztrace> {
        &self.ztraces
    }

    /// The full transform map at commit time.
    #[must_use]
    pub fn tforms(&self) -> &BTreeMap<String, Transform> {
        &self.tforms
    }

    /// The full flag list at commit time.
    #[must_use]
    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }
}

fn write_baseline(
    path: &Path,
    snum: u32,
    contours: &BTreeMap<String, Contour>,
) -> Result<(), StateError> {
    let file = BaselineFile {
        version: FORMAT_VERSION,
        section: snum,
        contours: contours.clone(),
    };
    let json = serde_json::to_string(&file).map_err(|e| StateError::SnapshotFormat {
        path: path.to_owned(),
        detail: format!("failed to serialize: {e}"),
    })?;

    // Atomic write: temp file then rename.
    let temp = path.with_extension("tmp");
    fs::write(&temp, json).map_err(|source| StateError::SnapshotWrite {
        path: temp.clone(),
        source,
    })?;
    fs::rename(&temp, path).map_err(|source| StateError::SnapshotWrite {
        path: path.to_owned(),
        source,
    })?;

    tracing::debug!(snum, path = %path.display(), "baseline snapshot written");
    Ok(())
}

fn read_baseline(path: &Path) -> Result<BTreeMap<String, Contour>, StateError> {
    let contents = fs::read_to_string(path).map_err(|source| StateError::SnapshotRead {
        path: path.to_owned(),
        source,
    })?;
    let file: BaselineFile =
        serde_json::from_str(&contents).map_err(|e| StateError::SnapshotFormat {
            path: path.to_owned(),
            detail: e.to_string(),
        })?;
    if file.version != FORMAT_VERSION {
        return Err(StateError::SnapshotFormat {
            path: path.to_owned(),
            detail: format!(
                "unsupported snapshot version {} (expected {FORMAT_VERSION})",
                file.version
            ),
        });
    }
    Ok(file.contours)
}
