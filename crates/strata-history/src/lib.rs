#![forbid(unsafe_code)]

//! Undo/redo state engine for a serial-section annotation editor.
//!
//! Documents hold thousands of sections with large contour sets, so the
//! engine never snapshots the whole document per edit. Instead each section
//! keeps a log of checkpoints: one complete **baseline** taken on first
//! touch (optionally spilled to a per-section JSON file), then
//! **differential** checkpoints naming only what each edit changed. Batch
//! actions that touch many sections additionally push a series-level
//! checkpoint recording the attribute bundle and, per touched section, the
//! local stack depth it expects — the anchor that later decides whether the
//! batch can still be undone as a unit.
//!
//! # Architecture
//!
//! ```text
//! edit ──► SectionStates::add_state ──► differential FieldState
//!                                        │
//! batch ─► SeriesStates::add_state ──► SeriesState { attrs, undo_lens }
//!          + add_section_undo(snum) per touched section
//!
//! undo key ─► SeriesStates::can_undo ──► (series?, section?, linked?)
//!                    │ both legal, unlinked
//!                    ▼
//!              favor_3d (newest checkpoint wins; ties go to the section)
//!                    │
//!         ┌──────────┴───────────┐
//!         ▼                      ▼
//!   undo_section(snum)      undo_state()
//! ```
//!
//! Restores mutate the live [`Section`](strata_model::Section) and
//! [`Series`](strata_model::Series) in place and mark every restored name as
//! modified so dependent caches refresh. Undoing a differential log walks it
//! newest-to-oldest, resolving each pending name against the last checkpoint
//! that mentions it; the walk is bounded by the pending set draining and by
//! the complete baseline at the bottom.
//!
//! # Concurrency
//!
//! Single-threaded and cooperative: no internal locks, exactly one logical
//! mutator at a time. Series-level restores are atomic by convention — an
//! interrupted batch restore leaves inconsistent state by design.

pub mod config;
pub mod error;
pub mod field_state;
pub mod reconcile;
pub mod section_states;
pub mod series_state;
pub mod series_states;

pub use config::HistoryConfig;
pub use error::StateError;
pub use field_state::{ContourPayload, FieldState, BASELINE_SUFFIX};
pub use reconcile::restore_ztrace_on_section;
pub use section_states::SectionStates;
pub use series_state::SeriesState;
pub use series_states::{SeriesStates, UndoCapability};
