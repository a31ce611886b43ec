#![forbid(unsafe_code)]

//! Document-wide undo coordination across two granularities.
//!
//! [`SeriesStates`] owns every section's local history plus the two
//! series-level checkpoint stacks, and arbitrates whether an undo request is
//! legal at section granularity, series granularity, or both — and whether
//! the two are linked (the series checkpoint's anchor for the current
//! section is intact).
//!
//! ```text
//!                    ┌───────────────────────────────┐
//!                    │          SeriesStates          │
//!                    │  undos / redos: [SeriesState]  │
//!                    │  section_states:               │
//!                    │    snum → SectionStates        │
//!                    │            (lazily initialized)│
//!                    └──────────────┬────────────────┘
//!            can_undo / favor_3d    │
//!          ┌────────────────────────┼──────────────────────┐
//!          ▼                        ▼                      ▼
//!    undo_section(snum)       undo_state()          check_overwrite(snum)
//!    one section's stack      every anchored        drop checkpoints a
//!    (dissolves or refuses    section + attribute   fresh edit made stale
//!    anchored checkpoints)    bundle swap
//! ```
//!
//! This is document-scoped mutable state: one `SeriesStates` is created per
//! open document, handed explicitly to every edit operation, and [`clear`]ed
//! on reload/close. It is not a global.
//!
//! [`clear`]: SeriesStates::clear

use std::collections::BTreeMap;
use std::fs;

use strata_model::{Section, Series};

use crate::config::HistoryConfig;
use crate::error::StateError;
use crate::section_states::SectionStates;
use crate::series_state::SeriesState;

/// What `can_undo` permits, per granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoCapability {
    /// Series-level undo/redo is legal: every touched section still sits at
    /// the depth the top checkpoint recorded.
    pub series: bool,
    /// Section-level undo/redo is legal for the current section.
    pub section: bool,
    /// The top series checkpoint's anchor for the current section is intact,
    /// so the two granularities would restore consistent state.
    pub linked: bool,
}

/// Top-level coordinator: per-section histories plus series checkpoints.
#[derive(Debug, Default)]
pub struct SeriesStates {
    section_states: BTreeMap<u32, SectionStates>,
    undos: Vec<SeriesState>,
    redos: Vec<SeriesState>,
    config: HistoryConfig,
}

impl SeriesStates {
    /// Create the coordinator for a freshly opened document.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Access (lazily creating and initializing) one section's history.
    ///
    /// The first access for a section takes its complete baseline snapshot,
    /// spilling it to the configured snapshot directory if one is set.
    pub fn section_states(
        &mut self,
        section: &Section,
        series: &Series,
    ) -> Result<&mut SectionStates, StateError> {
        let entry = self.section_states.entry(section.n).or_default();
        if !entry.is_initialized() {
            let path = self.config.baseline_path(&series.name, section.n);
            entry.initialize(section, series, path)?;
        }
        Ok(entry)
    }

    // ========================================================================
    // Checkpoint intake
    // ========================================================================

    /// Open a series-level checkpoint for a batch action.
    ///
    /// Called once per logical batch, before any touched section is edited,
    /// so the captured attribute bundle is the pre-edit snapshot. A fresh
    /// batch invalidates all series-level forward history.
    pub fn add_state(&mut self, breakable: bool, series: &Series) {
        self.redos.clear();
        self.undos.push(SeriesState::new(breakable, series));
        tracing::debug!(breakable, depth = self.undos.len(), "series checkpoint pushed");
    }

    /// Anchor the newest series checkpoint to a touched section.
    ///
    /// Call after that section's own `add_state` ran for this batch, so the
    /// recorded depth is the post-edit depth.
    ///
    /// # Panics
    ///
    /// Panics if no series checkpoint has been pushed.
    pub fn add_section_undo(&mut self, snum: u32) {
        let undo_len = self.local_undo_len(snum);
        let top = self
            .undos
            .last_mut()
            .expect("add_section_undo requires an open series checkpoint");
        top.record_section_depth(snum, undo_len);
    }

    /// Drop checkpoints a fresh local edit to `snum` has made stale.
    ///
    /// Call immediately after the edit's `add_state` commits. If the fresh
    /// edit left the section at exactly the depth the top series-undo
    /// checkpoint recorded, that checkpoint would validate against the wrong
    /// content and is dropped. Every series-redo checkpoint touching the
    /// section is dropped unconditionally: a fresh edit always invalidates
    /// forward history for the sections it touches.
    pub fn check_overwrite(&mut self, snum: u32) {
        let undo_len = self.local_undo_len(snum);
        if let Some(top) = self.undos.last() {
            if top.undo_lens().get(&snum).copied() == Some(undo_len) {
                self.undos.pop();
                tracing::debug!(
                    snum,
                    "stale series checkpoint dropped: fresh edit reproduced its anchor depth"
                );
            }
        }
        let before = self.redos.len();
        self.redos.retain(|st| !st.undo_lens().contains_key(&snum));
        if before != self.redos.len() {
            tracing::debug!(
                snum,
                dropped = before - self.redos.len(),
                "series redo checkpoints invalidated by fresh edit"
            );
        }
    }

    // ========================================================================
    // Arbitration
    // ========================================================================

    /// Decide which granularities of undo (or redo) are currently legal.
    ///
    /// This is the mandatory gate before [`undo_state`](Self::undo_state) /
    /// [`undo_section`](Self::undo_section).
    #[must_use]
    pub fn can_undo(&self, current_section: u32, redo: bool) -> UndoCapability {
        let stack = if redo { &self.redos } else { &self.undos };
        let local_len = self.local_stack_len(current_section, redo);

        let Some(top) = stack.last() else {
            return UndoCapability {
                series: false,
                section: local_len > 0,
                linked: false,
            };
        };

        // A series checkpoint expects each touched section at the depth it
        // recorded (one less on the undo stack when checking redo, since the
        // series undo popped one state per section).
        let adj = usize::from(redo);
        let all_match = top
            .undo_lens()
            .iter()
            .all(|(&snum, &expected)| self.local_undo_len(snum) + adj == expected);
        let current_match = top.undo_lens().get(&current_section).copied()
            == Some(self.local_undo_len(current_section) + adj);
        let in_unbreakable = stack.iter().any(|st| {
            !st.breakable()
                && st.undo_lens().get(&current_section).copied()
                    == Some(self.local_undo_len(current_section) + adj)
        });

        UndoCapability {
            series: all_match,
            section: local_len > 0 && !in_unbreakable,
            linked: current_match,
        }
    }

    /// When both granularities are legal and unlinked, pick the one whose
    /// newest checkpoint is strictly more recent.
    ///
    /// Returns `true` to favor the series-level (3D) choice. Commit times
    /// have decisecond granularity, so two checkpoints within ~100ms tie —
    /// and a tie favors the section-level choice.
    #[must_use]
    pub fn favor_3d(&self, current_section: u32, redo: bool) -> bool {
        let stack = if redo { &self.redos } else { &self.undos };
        let series_time = stack.last().map(SeriesState::commit_time);
        let local_time = self
            .section_states
            .get(&current_section)
            .and_then(|s| s.top_commit_time(redo));

        match (series_time, local_time) {
            (Some(series_time), Some(local_time)) => series_time > local_time,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    // ========================================================================
    // Restores
    // ========================================================================

    /// Series-level undo (or redo): restore every section the top checkpoint
    /// anchored, then swap the attribute bundle, then move the checkpoint to
    /// the opposite stack.
    ///
    /// # Panics
    ///
    /// Panics if [`can_undo`](Self::can_undo) does not permit a series-level
    /// operation, or if an anchored section is missing from the series.
    pub fn undo_state(&mut self, series: &mut Series, redo: bool) -> Result<(), StateError> {
        let capability = self.can_undo(series.current_section, redo);
        assert!(
            capability.series,
            "series-level undo/redo not permitted; gate on can_undo"
        );
        let stack = if redo { &mut self.redos } else { &mut self.undos };
        let mut checkpoint = stack.pop().expect("series stack checked non-empty");

        let snums: Vec<u32> = checkpoint.undo_lens().keys().copied().collect();
        for snum in snums {
            // Detach the section so it and the series can be borrowed apart.
            let mut section = series
                .sections
                .remove(&snum)
                .expect("checkpointed section missing from series");
            let states = self
                .section_states
                .get_mut(&snum)
                .expect("checkpointed section has no local history");
            let result = if redo {
                states.redo_state(&mut section, series)
            } else {
                states.undo_state(&mut section, series)
            };
            series.sections.insert(snum, section);
            result?;
        }

        checkpoint.apply_series_attributes(series);
        if redo {
            self.undos.push(checkpoint);
        } else {
            self.redos.push(checkpoint);
        }
        tracing::debug!(redo, "series checkpoint applied");
        Ok(())
    }

    /// Section-level undo (or redo) for one section.
    ///
    /// Series checkpoints anchored exactly at the section's present depth
    /// conflict with this operation: breakable ones are dissolved (their
    /// other sections stay independently undoable), an unbreakable one
    /// refuses the whole operation. Returns `Ok(false)` — state unchanged —
    /// on refusal, `Ok(true)` once the local restore ran.
    ///
    /// # Panics
    ///
    /// Panics if the section is missing from the series, has no local
    /// history, or its relevant local stack is empty (gate on
    /// [`can_undo`](Self::can_undo)).
    pub fn undo_section(
        &mut self,
        series: &mut Series,
        snum: u32,
        redo: bool,
    ) -> Result<bool, StateError> {
        let undo_len = self.local_undo_len(snum);
        let adj = usize::from(redo);
        let stack = if redo { &mut self.redos } else { &mut self.undos };

        let anchored =
            |st: &SeriesState| st.undo_lens().get(&snum).copied() == Some(undo_len + adj);
        if stack.iter().any(|st| anchored(st) && !st.breakable()) {
            tracing::debug!(
                snum,
                redo,
                "section undo refused: unbreakable series checkpoint anchored at current depth"
            );
            return Ok(false);
        }
        let before = stack.len();
        stack.retain(|st| !anchored(st));
        let dissolved = before - stack.len();
        if dissolved > 0 {
            tracing::debug!(snum, redo, dissolved, "breakable series checkpoint dissolved");
        }

        let mut section = series
            .sections
            .remove(&snum)
            .expect("section missing from series");
        let states = self
            .section_states
            .get_mut(&snum)
            .expect("undo_section requires local history for the section");
        let result = if redo {
            states.redo_state(&mut section, series)
        } else {
            states.undo_state(&mut section, series)
        };
        series.sections.insert(snum, section);
        result?;
        Ok(true)
    }

    // ========================================================================
    // Lifecycle and introspection
    // ========================================================================

    /// Reset everything on document reload/close.
    ///
    /// Baseline snapshot files are removed best-effort; a failure is logged
    /// and does not abort the reset.
    pub fn clear(&mut self) {
        for states in self.section_states.values() {
            if let Some(path) = states.snapshot_path() {
                if path.exists() {
                    if let Err(error) = fs::remove_file(path) {
                        tracing::warn!(
                            path = %path.display(),
                            %error,
                            "failed to remove baseline snapshot"
                        );
                    }
                }
            }
        }
        self.section_states.clear();
        self.undos.clear();
        self.redos.clear();
        tracing::debug!("series history cleared");
    }

    /// Depth of the series-level undo stack.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undos.len()
    }

    /// Depth of the series-level redo stack.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redos.len()
    }

    /// One section's history, if it has been touched.
    #[must_use]
    pub fn get_section_states(&self, snum: u32) -> Option<&SectionStates> {
        self.section_states.get(&snum)
    }

    fn local_undo_len(&self, snum: u32) -> usize {
        self.section_states
            .get(&snum)
            .map_or(0, SectionStates::undo_len)
    }

    fn local_stack_len(&self, snum: u32, redo: bool) -> usize {
        self.section_states
            .get(&snum)
            .map_or(0, |s| if redo { s.redo_len() } else { s.undo_len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_model::Trace;

    fn tri(seed: f64) -> Trace {
        Trace::new(vec![(seed, 0.0), (seed + 1.0, 0.0), (seed, 1.0)])
    }

    /// One section in the series, one committed edit on it.
    fn fixture() -> (Series, SeriesStates) {
        let mut series = Series::new("doc");
        let mut section = Section::new(0);
        section.add_trace("circle", tri(0.0));
        section.clear_tracking();

        let mut engine = SeriesStates::new(HistoryConfig::in_memory());
        engine.section_states(&section, &series).unwrap();

        section.add_trace("circle", tri(1.0));
        engine
            .section_states(&section, &series)
            .unwrap()
            .add_state(&mut section, &mut series);
        engine.check_overwrite(0);

        series.insert_section(section);
        (series, engine)
    }

    #[test]
    fn fresh_section_has_no_capability() {
        let series = Series::new("doc");
        let section = Section::new(0);
        let mut engine = SeriesStates::new(HistoryConfig::in_memory());
        engine.section_states(&section, &series).unwrap();

        let capability = engine.can_undo(0, false);
        assert_eq!(
            capability,
            UndoCapability {
                series: false,
                section: false,
                linked: false
            }
        );
    }

    #[test]
    fn favor_3d_tie_prefers_section() {
        let (series, mut engine) = fixture();
        engine.add_state(true, &series);

        engine
            .undos
            .last_mut()
            .unwrap()
            .set_commit_time_for_test(1000);
        engine
            .section_states
            .get_mut(&0)
            .unwrap()
            .set_top_undo_time_for_test(1000);
        assert!(!engine.favor_3d(0, false));

        engine
            .undos
            .last_mut()
            .unwrap()
            .set_commit_time_for_test(1001);
        assert!(engine.favor_3d(0, false));

        engine.undos.last_mut().unwrap().set_commit_time_for_test(999);
        assert!(!engine.favor_3d(0, false));
    }

    #[test]
    fn favor_3d_with_no_series_checkpoint_is_false() {
        let (_, engine) = fixture();
        assert!(!engine.favor_3d(0, false));
    }

    #[test]
    #[should_panic(expected = "requires an open series checkpoint")]
    fn add_section_undo_without_checkpoint_panics() {
        let (_, mut engine) = fixture();
        engine.add_section_undo(0);
    }

    #[test]
    fn section_undo_survives_new_series_checkpoint() {
        let (mut series, mut engine) = fixture();

        // A section-level redo exists after the local undo; opening a new
        // series checkpoint leaves it alone (only series redos are forward
        // history at this granularity).
        engine.undo_section(&mut series, 0, false).unwrap();
        engine.add_state(true, &series);
        assert_eq!(engine.redo_depth(), 0);
        assert_eq!(engine.undo_depth(), 1);
        assert_eq!(engine.get_section_states(0).unwrap().redo_len(), 1);
    }
}
