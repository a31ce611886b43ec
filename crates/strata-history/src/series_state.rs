#![forbid(unsafe_code)]

//! One cross-section checkpoint of series-wide state.

use std::collections::BTreeMap;

use strata_model::{Series, SeriesAttributes};

use crate::field_state::commit_stamp;

/// A checkpoint of the series-wide attribute bundle, plus the anchor depths
/// of every section the originating batch action touched.
///
/// `undo_lens` records, per touched section, the expected length of that
/// section's local undo stack right after the batch's per-section checkpoint
/// ran. A later mismatch means an independent local edit has invalidated
/// this checkpoint's assumptions for that section.
#[derive(Debug, Clone)]
pub struct SeriesState {
    commit_time: u64,
    breakable: bool,
    undo_lens: BTreeMap<u32, usize>,
    attrs: SeriesAttributes,
}

impl SeriesState {
    /// Capture a checkpoint of the live series attributes.
    ///
    /// Taken before the batch action mutates anything, so the stored bundle
    /// is the pre-edit snapshot.
    #[must_use]
    pub fn new(breakable: bool, series: &Series) -> Self {
        Self {
            commit_time: commit_stamp(),
            breakable,
            undo_lens: BTreeMap::new(),
            attrs: series.attrs.clone(),
        }
    }

    /// Whether a conflicting single-section undo may silently dissolve this
    /// checkpoint (`true`) or must be refused outright (`false`).
    #[must_use]
    pub fn breakable(&self) -> bool {
        self.breakable
    }

    /// Commit time in deciseconds since the Unix epoch.
    #[must_use]
    pub fn commit_time(&self) -> u64 {
        self.commit_time
    }

    /// Expected local undo-stack depth per touched section.
    #[must_use]
    pub fn undo_lens(&self) -> &BTreeMap<u32, usize> {
        &self.undo_lens
    }

    /// The captured attribute bundle.
    #[must_use]
    pub fn series_attributes(&self) -> &SeriesAttributes {
        &self.attrs
    }

    /// Replace the captured bundle with the live series' current attributes.
    pub fn reset_series_attributes(&mut self, series: &Series) {
        self.attrs = series.attrs.clone();
    }

    /// Record a touched section's post-edit undo depth.
    pub(crate) fn record_section_depth(&mut self, snum: u32, undo_len: usize) {
        self.undo_lens.insert(snum, undo_len);
    }

    /// Swap the captured bundle with the live series attributes.
    ///
    /// After one application this state holds the displaced (post-edit)
    /// bundle, making it its own inverse: the same object serves undo and
    /// then redo of the series attributes.
    ///
    /// When the checkpoint touched no sections but the per-object alignment
    /// preferences changed, no section-level restore will flag the
    /// aggregate cache, so it is marked fully stale here.
    pub fn apply_series_attributes(&mut self, series: &mut Series) {
        let prefs_changed =
            self.attrs.alignment_preferences() != series.attrs.alignment_preferences();

        std::mem::swap(&mut self.attrs, &mut series.attrs);

        if self.undo_lens.is_empty() && prefs_changed {
            tracing::debug!("alignment preferences changed with no section anchor; aggregate cache marked stale");
            series.cache.mark_all_stale();
        }
    }

    #[cfg(test)]
    pub(crate) fn set_commit_time_for_test(&mut self, commit_time: u64) {
        self.commit_time = commit_time;
    }
}
