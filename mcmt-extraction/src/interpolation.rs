//! Edge crossing interpolation
//!
//! A crossing on the edge between samples `lo < hi` with cut values
//! `v0 = v_lo`, `v1 = v_hi` sits at
//!
//! ```text
//! t = v0 / (v0 - v1),    p = p_lo + t * (p_hi - p_lo)
//! dt/dv0 = -v1 / (v0 - v1)^2
//! dt/dv1 =  v0 / (v0 - v1)^2
//! ```
//!
//! The endpoints are always taken in ascending sample order, so every cell
//! that shares an edge computes a bit-identical crossing.

use crate::classify::Cut;
use mcmt_core::{Point3d, TetDecomposition, Vector3d};
use serde::{Deserialize, Serialize};

/// Default threshold for flat edges and for clamping `t` away from the ends
pub const DEFAULT_EPSILON: f64 = 1e-6;

/// Identity of a crossing: canonical edge plus the cut it was computed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub lo: u32,
    pub hi: u32,
    pub cut: Cut,
}

impl EdgeKey {
    /// Key for the edge between samples `a` and `b`, in either order
    #[inline]
    pub fn new(a: u32, b: u32, cut: Cut) -> Self {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        Self { lo, hi, cut }
    }
}

/// Interpolation parameter and its partials
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolation {
    pub t: f64,
    /// `[dt/dv_lo, dt/dv_hi]`
    pub dt: [f64; 2],
    /// Set when the edge is flat or `t` was clamped; partials are zero then
    pub degenerate: bool,
}

/// Interpolate the crossing between `v_lo` and `v_hi`.
///
/// Flat edges (`|v_hi - v_lo| < epsilon`) fall back to the midpoint, and `t`
/// is clamped to `[epsilon, 1 - epsilon]`. Both cases zero the partials.
pub fn interpolate(v_lo: f64, v_hi: f64, epsilon: f64) -> Interpolation {
    let denom = v_lo - v_hi;
    if denom.abs() < epsilon {
        return Interpolation {
            t: 0.5,
            dt: [0.0, 0.0],
            degenerate: true,
        };
    }

    let t = v_lo / denom;
    if t < epsilon || t > 1.0 - epsilon {
        return Interpolation {
            t: t.clamp(epsilon, 1.0 - epsilon),
            dt: [0.0, 0.0],
            degenerate: true,
        };
    }

    let denom2 = denom * denom;
    Interpolation {
        t,
        dt: [-v_hi / denom2, v_lo / denom2],
        degenerate: false,
    }
}

/// Everything needed to place one output vertex and differentiate it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossingRecord {
    pub key: EdgeKey,
    pub t: f64,
    /// `[dt/dv_lo, dt/dv_hi]`
    pub dt: [f64; 2],
    /// `p_hi - p_lo`
    pub direction: Vector3d,
    pub position: Point3d,
    pub degenerate: bool,
}

impl CrossingRecord {
    /// Build the record for `key` from the cut values at its endpoints
    pub fn new(
        key: EdgeKey,
        decomposition: &TetDecomposition,
        v_lo: f64,
        v_hi: f64,
        epsilon: f64,
    ) -> Self {
        let p_lo = decomposition.position(key.lo as usize);
        let direction = decomposition.position(key.hi as usize) - p_lo;
        let Interpolation { t, dt, degenerate } = interpolate(v_lo, v_hi, epsilon);

        Self {
            key,
            t,
            dt,
            direction,
            position: p_lo + direction * t,
            degenerate,
        }
    }
}
