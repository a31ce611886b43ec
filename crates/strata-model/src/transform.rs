#![forbid(unsafe_code)]

//! Affine alignment transforms.

use serde::{Deserialize, Serialize};

/// A 2D affine matrix, stored row-major as `[a, b, c, d, e, f]`:
///
/// ```text
/// x' = a*x + b*y + c
/// y' = d*x + e*y + f
/// ```
///
/// One transform exists per named alignment, per section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform([f64; 6]);

impl Transform {
    /// Absolute per-coefficient tolerance for [`approx_eq`](Self::approx_eq).
    pub const EPSILON: f64 = 1e-6;

    /// The identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    /// Create a transform from raw coefficients.
    #[must_use]
    pub const fn new(coefficients: [f64; 6]) -> Self {
        Self(coefficients)
    }

    /// A pure translation.
    #[must_use]
    pub const fn translation(dx: f64, dy: f64) -> Self {
        Self([1.0, 0.0, dx, 0.0, 1.0, dy])
    }

    /// The raw coefficients `[a, b, c, d, e, f]`.
    #[must_use]
    pub const fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// Apply the transform to a point.
    #[must_use]
    pub fn apply(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + b * y + c, d * x + e * y + f)
    }

    /// Numeric comparison with absolute tolerance [`Self::EPSILON`].
    ///
    /// Exact float equality is too strict for matrices that went through a
    /// round trip of arithmetic; restores compare with this instead.
    #[must_use]
    pub fn approx_eq(&self, other: &Transform) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= Self::EPSILON)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
