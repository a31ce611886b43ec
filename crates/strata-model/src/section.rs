#![forbid(unsafe_code)]

//! One section: the editable annotation state of a single image plane.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::flag::Flag;
use crate::trace::{Contour, Trace};
use crate::transform::Transform;

/// A single 2D image plane's editable annotation state.
///
/// The contour map, transforms, and flags are public: the undo engine
/// restores them in place. The mutation-tracking sets are private and only
/// move through the editing helpers plus [`mark_contour_modified`]
/// (`strata-history` uses that one to flag restored names for dependent
/// caches).
///
/// # Mutation tracking
///
/// Every editing helper records the touched contour name in one of three
/// sets — `added_traces`, `removed_traces`, `modified_contours` — which the
/// undo engine drains into a differential checkpoint via
/// [`modified_names`](Self::modified_names) + [`clear_tracking`](Self::clear_tracking).
///
/// [`mark_contour_modified`]: Self::mark_contour_modified
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Section number (index within the series).
    pub n: u32,
    /// Contours keyed by label.
    pub contours: BTreeMap<String, Contour>,
    /// One transform per named alignment.
    pub tforms: BTreeMap<String, Transform>,
    /// Flags pinned to this section, in creation order.
    pub flags: Vec<Flag>,

    added_traces: BTreeSet<String>,
    removed_traces: BTreeSet<String>,
    modified_contours: BTreeSet<String>,
}

impl Section {
    /// Create an empty section.
    #[must_use]
    pub fn new(n: u32) -> Self {
        Self {
            n,
            contours: BTreeMap::new(),
            tforms: BTreeMap::new(),
            flags: Vec::new(),
            added_traces: BTreeSet::new(),
            removed_traces: BTreeSet::new(),
            modified_contours: BTreeSet::new(),
        }
    }

    // ========================================================================
    // Editing helpers (maintain the tracking sets)
    // ========================================================================

    /// Add a trace to the named contour, creating the contour if absent.
    pub fn add_trace(&mut self, contour: &str, trace: Trace) {
        self.contours
            .entry(contour.to_owned())
            .or_insert_with(|| Contour::new(contour))
            .push(trace);
        self.added_traces.insert(contour.to_owned());
    }

    /// Remove the first structurally-equal trace from the named contour.
    ///
    /// Returns `true` if a trace was removed; no-ops are not tracked.
    pub fn remove_trace(&mut self, contour: &str, trace: &Trace) -> bool {
        let removed = self
            .contours
            .get_mut(contour)
            .is_some_and(|c| c.remove_trace(trace));
        if removed {
            self.removed_traces.insert(contour.to_owned());
        }
        removed
    }

    /// Replace (or insert) a whole contour, tracking it as modified.
    pub fn replace_contour(&mut self, contour: Contour) {
        let name = contour.name().to_owned();
        self.contours.insert(name.clone(), contour);
        self.modified_contours.insert(name);
    }

    /// Remove a whole contour, tracking its traces as removed.
    pub fn remove_contour(&mut self, name: &str) -> Option<Contour> {
        let removed = self.contours.remove(name);
        if removed.is_some() {
            self.removed_traces.insert(name.to_owned());
        }
        removed
    }

    /// Flag a contour as modified without changing it.
    ///
    /// Used both by geometry edits applied directly through the public map
    /// and by the undo engine after restoring a name.
    pub fn mark_contour_modified(&mut self, name: &str) {
        self.modified_contours.insert(name.to_owned());
    }

    /// Set (or replace) the transform for a named alignment.
    ///
    /// Transforms are checkpointed whole, so no name tracking is needed.
    pub fn set_tform(&mut self, alignment: &str, tform: Transform) {
        self.tforms.insert(alignment.to_owned(), tform);
    }

    /// Pin a flag to this section.
    pub fn push_flag(&mut self, flag: Flag) {
        self.flags.push(flag);
    }

    // ========================================================================
    // Tracking-set access
    // ========================================================================

    /// Contour names with traces added since the last checkpoint.
    #[must_use]
    pub fn added_traces(&self) -> &BTreeSet<String> {
        &self.added_traces
    }

    /// Contour names with traces removed since the last checkpoint.
    #[must_use]
    pub fn removed_traces(&self) -> &BTreeSet<String> {
        &self.removed_traces
    }

    /// Contour names explicitly flagged as modified since the last checkpoint.
    #[must_use]
    pub fn modified_contours(&self) -> &BTreeSet<String> {
        &self.modified_contours
    }

    /// Union of the three tracking sets: every contour name touched since the
    /// last checkpoint.
    #[must_use]
    pub fn modified_names(&self) -> BTreeSet<String> {
        let mut names = self.modified_contours.clone();
        names.extend(self.added_traces.iter().cloned());
        names.extend(self.removed_traces.iter().cloned());
        names
    }

    /// Reset all three tracking sets. Called once a checkpoint has been taken.
    pub fn clear_tracking(&mut self) {
        self.added_traces.clear();
        self.removed_traces.clear();
        self.modified_contours.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri() -> Trace {
        Trace::new(vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)])
    }

    #[test]
    fn add_trace_creates_contour_and_tracks() {
        let mut section = Section::new(4);
        section.add_trace("axon", tri());

        assert_eq!(section.contours["axon"].len(), 1);
        assert!(section.added_traces().contains("axon"));
        assert_eq!(
            section.modified_names().into_iter().collect::<Vec<_>>(),
            vec!["axon".to_owned()]
        );
    }

    #[test]
    fn remove_trace_noop_is_untracked() {
        let mut section = Section::new(0);
        assert!(!section.remove_trace("missing", &tri()));
        assert!(section.modified_names().is_empty());

        section.add_trace("axon", tri());
        section.clear_tracking();
        assert!(section.remove_trace("axon", &tri()));
        assert!(section.removed_traces().contains("axon"));
    }

    #[test]
    fn modified_names_unions_all_sets() {
        let mut section = Section::new(0);
        section.add_trace("a", tri());
        section.add_trace("b", tri());
        section.clear_tracking();

        section.add_trace("a", tri());
        section.remove_trace("b", &tri());
        section.mark_contour_modified("c");

        let names = section.modified_names();
        assert_eq!(names.len(), 3);
        assert!(names.contains("a") && names.contains("b") && names.contains("c"));

        section.clear_tracking();
        assert!(section.modified_names().is_empty());
    }

    #[test]
    fn remove_contour_tracks_removed() {
        let mut section = Section::new(0);
        section.add_trace("soma", tri());
        section.clear_tracking();

        assert!(section.remove_contour("soma").is_some());
        assert!(section.removed_traces().contains("soma"));
        assert!(section.remove_contour("soma").is_none());
    }
}
