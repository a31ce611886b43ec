#![forbid(unsafe_code)]

//! Ztrace reconciliation for single-section restores.

use strata_model::{Ztrace, ZtracePoint};

/// Merge a checkpointed ztrace back into the live one, moving only the
/// points that lie on the given section.
///
/// Ztraces span many sections, but a section-level restore must not disturb
/// points living elsewhere. Points are reconciled independently by index:
///
/// - present in both: the saved point wins if it lies on `snum`, otherwise
///   the live point is kept;
/// - present on one side only (the point counts drifted apart): that side's
///   point is kept rather than failing the restore.
///
/// A live ztrace that no longer exists is restored wholesale from the saved
/// copy.
#[must_use]
pub fn restore_ztrace_on_section(saved: &Ztrace, live: Option<&Ztrace>, snum: u32) -> Ztrace {
    let Some(live) = live else {
        return saved.clone();
    };

    if saved.len() != live.len() {
        tracing::warn!(
            ztrace = saved.name(),
            saved_len = saved.len(),
            live_len = live.len(),
            snum,
            "ztrace point counts differ; reconciling index by index"
        );
    }

    let count = saved.len().max(live.len());
    let points: Vec<ZtracePoint> = (0..count)
        .filter_map(|i| match (saved.point(i), live.point(i)) {
            (Some(s), Some(l)) => Some(if s.snum == snum { *s } else { *l }),
            (Some(s), None) => Some(*s),
            (None, Some(l)) => Some(*l),
            (None, None) => None,
        })
        .collect();

    let mut restored = Ztrace::with_points(saved.name(), points);
    restored.color = saved.color;
    restored
}
