#![forbid(unsafe_code)]

//! End-to-end section-level undo/redo.
//!
//! Exercises the full engine surface the way the editing surface drives it:
//! every edit is applied to the live section/series first, then committed
//! with `add_state` + `check_overwrite`; every restore goes through the
//! lazily-initialized `SectionStates`.

use std::collections::BTreeMap;

use strata_history::{HistoryConfig, SeriesStates, StateError, BASELINE_SUFFIX};
use strata_model::{Contour, Flag, Section, Series, Trace, Transform, Ztrace, ZtracePoint};

fn tri(seed: f64) -> Trace {
    Trace::new(vec![(seed, 0.0), (seed + 1.0, 0.0), (seed, 1.0)])
}

/// One section with contour "circle", one ztrace spanning sections 0 and 1.
fn fixture(config: HistoryConfig) -> (Section, Series, SeriesStates) {
    let mut section = Section::new(0);
    section.add_trace("circle", tri(0.0));
    section.set_tform("default", Transform::identity());
    section.clear_tracking();

    let mut series = Series::new("doc");
    series.set_ztrace(Ztrace::with_points(
        "d1",
        vec![ZtracePoint::new(0.0, 0.0, 0), ZtracePoint::new(1.0, 1.0, 1)],
    ));
    series.clear_ztrace_tracking();

    let mut engine = SeriesStates::new(config);
    engine.section_states(&section, &series).unwrap();
    (section, series, engine)
}

fn commit(engine: &mut SeriesStates, section: &mut Section, series: &mut Series) {
    engine
        .section_states(section, series)
        .unwrap()
        .add_state(section, series);
    engine.check_overwrite(section.n);
}

fn undo(engine: &mut SeriesStates, section: &mut Section, series: &mut Series) -> Result<(), StateError> {
    engine
        .section_states(section, series)
        .unwrap()
        .undo_state(section, series)
}

fn redo(engine: &mut SeriesStates, section: &mut Section, series: &mut Series) -> Result<(), StateError> {
    engine
        .section_states(section, series)
        .unwrap()
        .redo_state(section, series)
}

/// Contours that actually exist: an empty contour is the engine's
/// representation of a removed name.
fn live_contours(section: &Section) -> BTreeMap<String, Contour> {
    section
        .contours
        .iter()
        .filter(|(_, c)| !c.is_empty())
        .map(|(name, c)| (name.clone(), c.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
struct Snap {
    contours: BTreeMap<String, Contour>,
    tforms: BTreeMap<String, Transform>,
    flags: Vec<Flag>,
    ztraces: BTreeMap<String, Ztrace>,
}

fn snap(section: &Section, series: &Series) -> Snap {
    Snap {
        contours: live_contours(section),
        tforms: section.tforms.clone(),
        flags: section.flags.clone(),
        ztraces: series.ztraces.clone(),
    }
}

#[test]
fn can_undo_is_all_false_after_bare_initialize() {
    let (_, _, engine) = fixture(HistoryConfig::in_memory());
    let capability = engine.can_undo(0, false);
    assert!(!capability.series && !capability.section && !capability.linked);
}

#[test]
fn circle_scenario_restores_each_intermediate_state() {
    let (mut section, mut series, mut engine) = fixture(HistoryConfig::in_memory());
    let original = tri(0.0);
    let added = tri(5.0);

    // S1: a second trace is added to "circle".
    section.add_trace("circle", added.clone());
    commit(&mut engine, &mut section, &mut series);
    assert_eq!(section.contours["circle"].len(), 2);

    // S2: the first trace is deleted.
    assert!(section.remove_trace("circle", &original));
    commit(&mut engine, &mut section, &mut series);
    assert_eq!(section.contours["circle"].traces(), &[added.clone()]);

    // First undo: back to S1 — both traces present.
    undo(&mut engine, &mut section, &mut series).unwrap();
    assert_eq!(
        section.contours["circle"].traces(),
        &[original.clone(), added.clone()]
    );

    // Second undo: back to S0 — the single original trace.
    undo(&mut engine, &mut section, &mut series).unwrap();
    assert_eq!(section.contours["circle"].traces(), &[original]);
    assert!(!engine.can_undo(0, false).section);
}

#[test]
fn n_edits_then_n_undos_round_trip() {
    let (mut section, mut series, mut engine) = fixture(HistoryConfig::in_memory());
    let mut snaps = vec![snap(&section, &series)];

    // Edit 1: another trace on "circle".
    section.add_trace("circle", tri(2.0));
    commit(&mut engine, &mut section, &mut series);
    snaps.push(snap(&section, &series));

    // Edit 2: a brand-new contour.
    section.add_trace("square", tri(4.0));
    commit(&mut engine, &mut section, &mut series);
    snaps.push(snap(&section, &series));

    // Edit 3: transform only.
    section.set_tform("default", Transform::translation(3.0, -1.0));
    commit(&mut engine, &mut section, &mut series);
    snaps.push(snap(&section, &series));

    // Edit 4: flag only.
    section.push_flag(Flag::new("check here", 8.0, 8.0));
    commit(&mut engine, &mut section, &mut series);
    snaps.push(snap(&section, &series));

    // Edit 5: move a ztrace point lying on this section.
    series.ztraces.get_mut("d1").unwrap().points_mut()[0].x = 42.0;
    series.mark_ztrace_modified("d1");
    commit(&mut engine, &mut section, &mut series);
    snaps.push(snap(&section, &series));

    // Walk all the way back, checking every intermediate state exactly.
    for expected in snaps.iter().rev().skip(1) {
        undo(&mut engine, &mut section, &mut series).unwrap();
        assert_eq!(&snap(&section, &series), expected);
    }
    assert!(!engine.can_undo(0, false).section);

    // And all the way forward again.
    for expected in snaps.iter().skip(1) {
        redo(&mut engine, &mut section, &mut series).unwrap();
        assert_eq!(&snap(&section, &series), expected);
    }
}

#[test]
fn undo_then_redo_is_identity() {
    let (mut section, mut series, mut engine) = fixture(HistoryConfig::in_memory());

    section.add_trace("circle", tri(7.0));
    commit(&mut engine, &mut section, &mut series);
    section.remove_trace("circle", &tri(0.0));
    commit(&mut engine, &mut section, &mut series);
    let latest = snap(&section, &series);

    undo(&mut engine, &mut section, &mut series).unwrap();
    redo(&mut engine, &mut section, &mut series).unwrap();
    assert_eq!(snap(&section, &series), latest);
}

#[test]
fn fresh_edit_discards_exactly_the_redo_entries() {
    let (mut section, mut series, mut engine) = fixture(HistoryConfig::in_memory());

    for seed in 1..=3 {
        section.add_trace("circle", tri(f64::from(seed)));
        commit(&mut engine, &mut section, &mut series);
    }
    undo(&mut engine, &mut section, &mut series).unwrap();
    undo(&mut engine, &mut section, &mut series).unwrap();
    assert_eq!(engine.get_section_states(0).unwrap().redo_len(), 2);

    section.add_trace("circle", tri(99.0));
    commit(&mut engine, &mut section, &mut series);

    assert_eq!(engine.get_section_states(0).unwrap().redo_len(), 0);
    assert!(!engine.can_undo(0, true).section);
}

#[test]
fn disk_backed_baseline_round_trips_and_clear_removes_it() {
    let dir = tempfile::tempdir().unwrap();
    let (mut section, mut series, mut engine) =
        fixture(HistoryConfig::in_memory().with_snapshot_dir(dir.path()));
    let baseline = dir.path().join(format!("doc.0.{BASELINE_SUFFIX}"));
    assert!(baseline.exists());

    let initial = snap(&section, &series);

    section.add_trace("circle", tri(1.0));
    commit(&mut engine, &mut section, &mut series);
    section.add_trace("square", tri(2.0));
    commit(&mut engine, &mut section, &mut series);

    undo(&mut engine, &mut section, &mut series).unwrap();
    undo(&mut engine, &mut section, &mut series).unwrap();
    assert_eq!(snap(&section, &series), initial);

    engine.clear();
    assert!(!baseline.exists());
}

#[test]
fn corrupt_baseline_snapshot_fails_the_restore() {
    let dir = tempfile::tempdir().unwrap();
    let (mut section, mut series, mut engine) =
        fixture(HistoryConfig::in_memory().with_snapshot_dir(dir.path()));
    let baseline = dir.path().join(format!("doc.0.{BASELINE_SUFFIX}"));

    section.add_trace("circle", tri(1.0));
    commit(&mut engine, &mut section, &mut series);

    std::fs::write(&baseline, "not json at all").unwrap();

    let result = undo(&mut engine, &mut section, &mut series);
    assert!(matches!(result, Err(StateError::SnapshotFormat { .. })));
}
