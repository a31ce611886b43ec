#![forbid(unsafe_code)]

//! Traces and contours: the 2D vector annotations drawn on a section.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A single polygon or polyline annotation instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Vertices in section (pixel) coordinates.
    pub points: Vec<(f64, f64)>,
    /// Closed polygon (`true`) or open polyline (`false`).
    pub closed: bool,
    /// Fill/stroke color as RGB.
    pub color: [u8; 3],
    /// Free-form tags attached by the user.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Trace {
    /// Create a closed trace from a list of vertices.
    #[must_use]
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self {
            points,
            closed: true,
            color: [255, 255, 255],
            tags: BTreeSet::new(),
        }
    }

    /// Create an open (polyline) trace.
    #[must_use]
    pub fn open(points: Vec<(f64, f64)>) -> Self {
        Self {
            closed: false,
            ..Self::new(points)
        }
    }

    /// Set the color.
    #[must_use]
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the trace has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A named ordered collection of traces sharing one label.
///
/// An empty contour (zero traces) is the canonical representation of "this
/// label does not exist on the section"; the undo engine restores a contour
/// to empty to fully remove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    name: String,
    traces: Vec<Trace>,
}

impl Contour {
    /// Create an empty contour with the given label.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            traces: Vec::new(),
        }
    }

    /// Create a contour from existing traces.
    #[must_use]
    pub fn with_traces(name: impl Into<String>, traces: Vec<Trace>) -> Self {
        Self {
            name: name.into(),
            traces,
        }
    }

    /// The contour's label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The traces, in draw order.
    #[must_use]
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Append a trace.
    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    /// Remove the first trace structurally equal to `trace`.
    ///
    /// Returns `true` if a trace was removed.
    pub fn remove_trace(&mut self, trace: &Trace) -> bool {
        if let Some(pos) = self.traces.iter().position(|t| t == trace) {
            self.traces.remove(pos);
            true
        } else {
            false
        }
    }

    /// Name-preserving union: append every trace from `other` that is not
    /// already structurally present. `other`'s name is ignored.
    pub fn merge_from(&mut self, other: &Contour) {
        for trace in &other.traces {
            if !self.traces.contains(trace) {
                self.traces.push(trace.clone());
            }
        }
    }

    /// Number of traces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// True if the contour holds no traces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}
