#![forbid(unsafe_code)]

//! Ztraces: 3D point paths spanning multiple sections.

use serde::{Deserialize, Serialize};

/// One vertex of a ztrace: a 2D position pinned to a section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZtracePoint {
    pub x: f64,
    pub y: f64,
    /// Section number the point lies on.
    pub snum: u32,
}

impl ZtracePoint {
    /// Create a point on the given section.
    #[must_use]
    pub fn new(x: f64, y: f64, snum: u32) -> Self {
        Self { x, y, snum }
    }
}

/// A named ordered path of points threading through the section stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ztrace {
    name: String,
    /// Display color as RGB.
    pub color: [u8; 3],
    points: Vec<ZtracePoint>,
}

impl Ztrace {
    /// Create an empty ztrace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: [255, 255, 0],
            points: Vec::new(),
        }
    }

    /// Create a ztrace from existing points.
    #[must_use]
    pub fn with_points(name: impl Into<String>, points: Vec<ZtracePoint>) -> Self {
        Self {
            points,
            ..Self::new(name)
        }
    }

    /// The ztrace's label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All points, in path order.
    #[must_use]
    pub fn points(&self) -> &[ZtracePoint] {
        &self.points
    }

    /// Mutable access to the points (used by the editing surface).
    pub fn points_mut(&mut self) -> &mut Vec<ZtracePoint> {
        &mut self.points
    }

    /// The point at `index`, if any.
    #[must_use]
    pub fn point(&self, index: usize) -> Option<&ZtracePoint> {
        self.points.get(index)
    }

    /// Append a point.
    pub fn push_point(&mut self, x: f64, y: f64, snum: u32) {
        self.points.push(ZtracePoint::new(x, y, snum));
    }

    /// Iterate over the points lying on one section.
    pub fn points_on_section(&self, snum: u32) -> impl Iterator<Item = &ZtracePoint> {
        self.points.iter().filter(move |p| p.snum == snum)
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the path has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
