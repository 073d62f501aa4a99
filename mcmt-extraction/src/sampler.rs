//! Field sampling on a decomposition
//!
//! Evaluates analytic fields at every decomposition sample. Mostly used to
//! build inputs for tests and benchmarks; real callers usually hand in a
//! buffer produced elsewhere (e.g. by a network).

use crate::parallel::parallel_map;
use mcmt_core::{Error, Point3d, Result, TetDecomposition};

/// Evaluate a scalar function at every sample
pub fn sample_field<F>(decomposition: &TetDecomposition, f: F) -> Vec<f64>
where
    F: Fn(&Point3d) -> f64 + Sync + Send,
{
    parallel_map(decomposition.positions(), f)
}

/// Evaluate a `channels`-valued function at every sample, sample-major
pub fn sample_channels<F>(decomposition: &TetDecomposition, channels: usize, f: F) -> Result<Vec<f64>>
where
    F: Fn(&Point3d, &mut [f64]) + Sync + Send,
{
    if channels == 0 {
        return Err(Error::InvalidData(
            "Field must have at least one channel".to_string(),
        ));
    }

    let per_sample = parallel_map(decomposition.positions(), |p| {
        let mut values = vec![0.0; channels];
        f(p, &mut values);
        values
    });
    Ok(per_sample.into_iter().flatten().collect())
}

/// Signed distance to a sphere, negative inside
pub fn sphere_sdf(center: Point3d, radius: f64) -> impl Fn(&Point3d) -> f64 + Sync + Send + Copy {
    move |p| (p - center).norm() - radius
}

/// Signed distance to an axis-aligned box with half extents `half`, negative inside
pub fn box_sdf(center: Point3d, half: [f64; 3]) -> impl Fn(&Point3d) -> f64 + Sync + Send + Copy {
    move |p| {
        let d = (p - center).abs() - nalgebra::Vector3::from(half);
        let outside = d.map(|c| c.max(0.0)).norm();
        let inside = d.x.max(d.y).max(d.z).min(0.0);
        outside + inside
    }
}
