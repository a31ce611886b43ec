#![forbid(unsafe_code)]

//! Per-section undo/redo stacks of [`FieldState`] checkpoints.
//!
//! # Invariants
//!
//! 1. The first checkpoint taken for a section is complete (the baseline);
//!    every later one is differential.
//! 2. `redo_states` is empty immediately after any [`add_state`].
//! 3. `current_state` always mirrors the section's live, already-applied
//!    configuration.
//!
//! # Restore strategy
//!
//! Because intermediate checkpoints are differential, undoing cannot simply
//! re-apply the top of the stack — most checkpoints never mention a given
//! contour at all. [`undo_state`] instead walks the stack newest-to-oldest
//! performing a last-writer lookup per pending name, bounded by the pending
//! set shrinking to empty. A name never mentioned all the way down to the
//! (complete) baseline was created after it, and is restored to an empty
//! contour. Redo needs no walk: a redo checkpoint was built from live values
//! at commit time, so every name it lists carries its direct forward value.
//!
//! [`add_state`]: SectionStates::add_state
//! [`undo_state`]: SectionStates::undo_state

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use strata_model::{Contour, Section, Series};

use crate::error::StateError;
use crate::field_state::{commit_stamp, FieldState};
use crate::reconcile::restore_ztrace_on_section;

/// Undo/redo history for one section.
///
/// Created empty and filled by [`initialize`](Self::initialize) on the
/// section's first touch, so untouched sections of a large series cost
/// nothing.
#[derive(Debug, Default)]
pub struct SectionStates {
    current_state: Option<FieldState>,
    /// Oldest → newest; index 0 is always the baseline once non-empty.
    undo_states: Vec<FieldState>,
    redo_states: Vec<FieldState>,
    snapshot_path: Option<PathBuf>,
}

impl SectionStates {
    /// Create an empty, uninitialized history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`initialize`](Self::initialize) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.current_state.is_some()
    }

    /// Build the baseline checkpoint from the section's complete current
    /// state. With `snapshot_path` set, the baseline contour set is spilled
    /// there and dropped from memory.
    ///
    /// # Panics
    ///
    /// Panics if called twice for the same section.
    pub fn initialize(
        &mut self,
        section: &Section,
        series: &Series,
        snapshot_path: Option<PathBuf>,
    ) -> Result<(), StateError> {
        assert!(!self.is_initialized(), "section history initialized twice");
        let baseline = FieldState::baseline(section, series, snapshot_path.clone())?;
        self.snapshot_path = snapshot_path;
        self.current_state = Some(baseline);
        tracing::debug!(
            snum = section.n,
            on_disk = self.snapshot_path.is_some(),
            "section history initialized"
        );
        Ok(())
    }

    /// Take a checkpoint after an edit has been applied to the live section.
    ///
    /// Clears the redo stack, pushes the displaced `current_state` (stamped
    /// now), and rebuilds `current_state` as a differential over the names
    /// the section/series report as touched. Drains both mutation-tracking
    /// sets as a side effect.
    ///
    /// # Panics
    ///
    /// Panics if the section was never initialized.
    pub fn add_state(&mut self, section: &mut Section, series: &mut Series) {
        let mut displaced = self
            .current_state
            .take()
            .expect("add_state requires an initialized section history");

        self.redo_states.clear();
        displaced.stamp(commit_stamp());
        self.undo_states.push(displaced);

        let contour_names = section.modified_names();
        let ztrace_names = series.modified_ztraces().clone();
        self.current_state = Some(FieldState::differential(
            section,
            series,
            &contour_names,
            &ztrace_names,
        ));

        section.clear_tracking();
        series.clear_ztrace_tracking();

        tracing::debug!(
            snum = section.n,
            contours = contour_names.len(),
            ztraces = ztrace_names.len(),
            depth = self.undo_states.len(),
            "section checkpoint pushed"
        );
    }

    /// Restore the section and series to the previous checkpoint, in place.
    ///
    /// Callers must gate on a non-empty undo stack (`SeriesStates::can_undo`
    /// in the full engine); an empty-stack call is a programming error, not
    /// a recoverable condition.
    ///
    /// # Panics
    ///
    /// Panics if the undo stack is empty or the section was never
    /// initialized.
    pub fn undo_state(&mut self, section: &mut Section, series: &mut Series) -> Result<(), StateError> {
        assert!(self.is_initialized(), "undo_state on an uninitialized section history");
        assert!(!self.undo_states.is_empty(), "undo_state with an empty undo stack");

        let mut restored_contours: BTreeSet<String> = BTreeSet::new();
        let mut restored_ztraces: BTreeSet<String> = BTreeSet::new();

        if self.undo_states.len() == 1 {
            // Only the baseline remains, and the baseline is complete:
            // restore the whole contour set and every checkpointed ztrace.
            let baseline = &self.undo_states[0];
            let full = baseline.contours()?.into_owned();
            restored_contours.extend(section.contours.keys().cloned());
            restored_contours.extend(full.keys().cloned());
            section.contours = full;
            for (name, saved) in baseline.ztraces() {
                let merged = restore_ztrace_on_section(saved, series.ztraces.get(name), section.n);
                series.ztraces.insert(name.clone(), merged);
                restored_ztraces.insert(name.clone());
            }
        } else {
            let current = self
                .current_state
                .as_ref()
                .expect("checked initialized above");
            let mut pending_contours = current.modified_contour_names()?;
            let mut pending_ztraces: BTreeSet<String> =
                current.ztraces().keys().cloned().collect();

            // Last-writer lookup across the differential log, newest first.
            for state in self.undo_states.iter().rev() {
                if pending_contours.is_empty() && pending_ztraces.is_empty() {
                    break;
                }
                let stored = state.contours()?;
                pending_contours.retain(|name| {
                    if let Some(contour) = stored.get(name) {
                        section.contours.insert(name.clone(), contour.clone());
                        restored_contours.insert(name.clone());
                        false
                    } else {
                        true
                    }
                });
                pending_ztraces.retain(|name| {
                    if let Some(saved) = state.ztraces().get(name) {
                        let merged =
                            restore_ztrace_on_section(saved, series.ztraces.get(name), section.n);
                        series.ztraces.insert(name.clone(), merged);
                        restored_ztraces.insert(name.clone());
                        false
                    } else {
                        true
                    }
                });
            }

            // Never mentioned down to the complete baseline: the contour was
            // created after it, so restoring means removing it.
            for name in pending_contours {
                section.contours.insert(name.clone(), Contour::new(name.as_str()));
                restored_contours.insert(name);
            }
            for name in pending_ztraces {
                tracing::warn!(
                    ztrace = %name,
                    snum = section.n,
                    "ztrace absent from undo history; keeping live value"
                );
            }
        }

        // Transforms and flags are never diffed; they come whole from the
        // checkpoint being made current.
        restore_tforms_flags(
            self.undo_states.last().expect("stack checked non-empty"),
            section,
            series,
        );

        let displaced = self
            .current_state
            .take()
            .expect("checked initialized above");
        self.redo_states.push(displaced);
        self.current_state = self.undo_states.pop();

        self.mark_restored(section, series, &restored_contours, &restored_ztraces);
        tracing::debug!(
            snum = section.n,
            contours = restored_contours.len(),
            ztraces = restored_ztraces.len(),
            depth = self.undo_states.len(),
            "section state undone"
        );
        Ok(())
    }

    /// Re-apply the most recently undone checkpoint, in place.
    ///
    /// Every name in a redo checkpoint carries its direct forward value, so
    /// no backward walk is needed.
    ///
    /// # Panics
    ///
    /// Panics if the redo stack is empty or the section was never
    /// initialized.
    pub fn redo_state(&mut self, section: &mut Section, series: &mut Series) -> Result<(), StateError> {
        assert!(self.is_initialized(), "redo_state on an uninitialized section history");
        assert!(!self.redo_states.is_empty(), "redo_state with an empty redo stack");

        let mut restored_contours: BTreeSet<String> = BTreeSet::new();
        let mut restored_ztraces: BTreeSet<String> = BTreeSet::new();

        {
            let state = self.redo_states.last().expect("stack checked non-empty");
            let stored = state.contours()?;
            for (name, contour) in stored.iter() {
                section.contours.insert(name.clone(), contour.clone());
                restored_contours.insert(name.clone());
            }
            for (name, saved) in state.ztraces() {
                let merged = restore_ztrace_on_section(saved, series.ztraces.get(name), section.n);
                series.ztraces.insert(name.clone(), merged);
                restored_ztraces.insert(name.clone());
            }
            restore_tforms_flags(state, section, series);
        }

        let displaced = self
            .current_state
            .take()
            .expect("checked initialized above");
        self.undo_states.push(displaced);
        self.current_state = self.redo_states.pop();

        self.mark_restored(section, series, &restored_contours, &restored_ztraces);
        tracing::debug!(
            snum = section.n,
            contours = restored_contours.len(),
            ztraces = restored_ztraces.len(),
            depth = self.undo_states.len(),
            "section state redone"
        );
        Ok(())
    }

    /// Depth of the undo stack.
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo_states.len()
    }

    /// Depth of the redo stack.
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo_states.len()
    }

    /// Commit time of the newest checkpoint on the chosen stack.
    #[must_use]
    pub fn top_commit_time(&self, redo: bool) -> Option<u64> {
        let stack = if redo { &self.redo_states } else { &self.undo_states };
        stack.last().map(FieldState::commit_time)
    }

    /// The checkpoint mirroring the live section, once initialized.
    #[must_use]
    pub fn current_state(&self) -> Option<&FieldState> {
        self.current_state.as_ref()
    }

    /// The baseline snapshot file, if this section spilled one.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    fn mark_restored(
        &self,
        section: &mut Section,
        series: &mut Series,
        contours: &BTreeSet<String>,
        ztraces: &BTreeSet<String>,
    ) {
        for name in contours {
            section.mark_contour_modified(name);
        }
        for name in ztraces {
            series.mark_ztrace_modified(name);
        }
        series.cache.mark_section_stale(section.n);
    }

    #[cfg(test)]
    pub(crate) fn set_top_undo_time_for_test(&mut self, commit_time: u64) {
        if let Some(state) = self.undo_states.last_mut() {
            state.set_commit_time_for_test(commit_time);
        }
    }
}

/// Restore transforms and flags wholesale from a checkpoint, logging a
/// change-log event only when the restored value actually differs.
fn restore_tforms_flags(target: &FieldState, section: &mut Section, series: &mut Series) {
    let mut changed: Vec<String> = Vec::new();
    for (alignment, tform) in target.tforms() {
        let differs = section
            .tforms
            .get(alignment)
            .is_none_or(|live| !live.approx_eq(tform));
        if differs {
            changed.push(alignment.clone());
        }
    }
    for alignment in section.tforms.keys() {
        if !target.tforms().contains_key(alignment) {
            changed.push(alignment.clone());
        }
    }
    section.tforms = target.tforms().clone();
    for alignment in changed {
        series.append_log(
            None,
            Some(section.n),
            format!("alignment '{alignment}' transform restored"),
        );
    }

    if section.flags.as_slice() != target.flags() {
        section.flags = target.flags().to_vec();
        series.append_log(None, Some(section.n), "flag set restored");
    }
}
