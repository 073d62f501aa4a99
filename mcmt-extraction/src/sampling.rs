//! Error-density sampling
//!
//! Draws new sample positions with probability proportional to an error
//! estimate, so regions whose samples sit close to the surface receive most
//! of the new samples. Two strategies are offered: picking cells from the
//! cumulative per-cell error, and rejection sampling of uniform candidates
//! against the error of their nearest sample.

use crate::extraction::MarchingTets;
use crate::parallel::{parallel_map, parallel_map_indexed};
use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use mcmt_core::{Error, FieldBuffer, GridLayout, Point3d, Result, TetDecomposition, Vector3d};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Configuration for error-density sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Number of positions to draw
    pub samples: usize,
    /// Added to `|v|` before inverting, bounds the error of zero-valued samples
    pub error_offset: f64,
    /// Uniform candidates drawn per round of rejection sampling
    pub batch_size: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 1024,
            error_offset: 1e-6,
            batch_size: 4096,
        }
    }
}

impl SamplingConfig {
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_error_offset(mut self, offset: f64) -> Self {
        self.error_offset = offset;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Per-sample error `1 / (|v| + offset)`.
///
/// `v` is the value relative to `iso_level` for scalar fields and the gap
/// between the two largest channels otherwise.
pub fn sample_errors(field: &FieldBuffer<'_>, iso_level: f64, offset: f64) -> Vec<f64> {
    (0..field.sample_count())
        .map(|s| {
            let v = if field.channels() == 1 {
                field.value(s, 0) - iso_level
            } else {
                channel_margin(field.sample(s))
            };
            1.0 / (v.abs() + offset)
        })
        .collect()
}

fn channel_margin(values: &[f64]) -> f64 {
    let (first, second) = values
        .iter()
        .fold((f64::NEG_INFINITY, f64::NEG_INFINITY), |(a, b), &v| {
            if v > a {
                (v, a)
            } else if v > b {
                (a, v)
            } else {
                (a, b)
            }
        });
    first - second
}

/// Per-cell error: sum of corner errors times cell volume
pub fn cell_errors(decomposition: &TetDecomposition, sample_errors: &[f64]) -> Vec<f64> {
    parallel_map_indexed(decomposition.cells(), |cell, corners| {
        let error: f64 = corners.iter().map(|&s| sample_errors[s as usize]).sum();
        error * decomposition.cell_volume(cell)
    })
}

/// Uniform random point inside the tetrahedron `corners`
pub fn random_point_in_tet<R: Rng + ?Sized>(corners: &[Point3d; 4], rng: &mut R) -> Point3d {
    let mut s: f64 = rng.gen();
    let mut t: f64 = rng.gen();
    let mut u: f64 = rng.gen();

    // Fold the unit cube onto the unit simplex
    if s + t > 1.0 {
        s = 1.0 - s;
        t = 1.0 - t;
    }
    if t + u > 1.0 {
        let tmp = u;
        u = 1.0 - s - t;
        t = 1.0 - tmp;
    } else if s + t + u > 1.0 {
        let tmp = u;
        u = s + t + u - 1.0;
        s = 1.0 - t - tmp;
    }
    let a = 1.0 - s - t - u;

    Point3d::from(
        corners[0].coords * a + corners[1].coords * s + corners[2].coords * t + corners[3].coords * u,
    )
}

/// k-d tree over sample positions. At most 256 samples may share a
/// coordinate on one axis.
type SampleTree = KdTree<f64, u64, 3, 256, u32>;

/// Nearest-sample lookup over the sample positions of a decomposition
pub enum SampleLocator<'a> {
    /// Regular grids snap to the closest lattice point
    Grid(&'a GridLayout),
    Tree(SampleTree),
}

impl<'a> SampleLocator<'a> {
    pub fn new(decomposition: &'a TetDecomposition) -> Self {
        match decomposition.grid() {
            Some(layout) => Self::Grid(layout),
            None => {
                let mut tree = SampleTree::with_capacity(decomposition.sample_count());
                for (sample, p) in decomposition.positions().iter().enumerate() {
                    tree.add(&[p.x, p.y, p.z], sample as u64);
                }
                Self::Tree(tree)
            }
        }
    }

    /// Index of the sample closest to `point`
    pub fn nearest(&self, point: &Point3d) -> usize {
        match self {
            Self::Grid(layout) => layout.nearest_sample(point),
            Self::Tree(tree) => {
                tree.nearest_one::<SquaredEuclidean>(&[point.x, point.y, point.z])
                    .item as usize
            }
        }
    }
}

impl MarchingTets {
    /// Draw `sampling.samples` positions, picking cells by error density
    pub fn sample_error_density<R: Rng + ?Sized>(
        &self,
        field: FieldBuffer<'_>,
        sampling: &SamplingConfig,
        rng: &mut R,
    ) -> Result<Vec<Point3d>> {
        let decomposition = self.decomposition();
        field.check_sample_count(decomposition.sample_count())?;
        if sampling.samples == 0 {
            return Ok(Vec::new());
        }
        if decomposition.cell_count() == 0 {
            return Err(Error::InvalidData(
                "Cannot sample a decomposition without cells".to_string(),
            ));
        }

        let errors = sample_errors(&field, self.config().iso_level, sampling.error_offset);
        let cumulative: Vec<f64> = cell_errors(decomposition, &errors)
            .into_iter()
            .scan(0.0, |total, e| {
                *total += e;
                Some(*total)
            })
            .collect();

        let total = cumulative.last().copied().unwrap_or(0.0);
        if !(total.is_finite() && total > 0.0) {
            return Err(Error::Algorithm(format!(
                "Error density does not normalize (total {})",
                total
            )));
        }

        let last = cumulative.len() - 1;
        let points = (0..sampling.samples)
            .map(|_| {
                let r = rng.gen::<f64>() * total;
                let cell = cumulative.partition_point(|&c| c <= r).min(last);
                random_point_in_tet(&decomposition.cell_positions(cell), rng)
            })
            .collect();

        Ok(points)
    }

    /// Draw `sampling.samples` positions inside `bounds` by rejection.
    ///
    /// Candidates are drawn uniformly in batches of `sampling.batch_size`;
    /// each is kept with probability `error / max_error`, where `error`
    /// belongs to the candidate's nearest sample and `max_error` is the
    /// largest such value in its batch.
    pub fn sample_rejection<R: Rng + ?Sized>(
        &self,
        field: FieldBuffer<'_>,
        bounds: &(Point3d, Point3d),
        sampling: &SamplingConfig,
        rng: &mut R,
    ) -> Result<Vec<Point3d>> {
        let decomposition = self.decomposition();
        field.check_sample_count(decomposition.sample_count())?;
        if sampling.samples == 0 {
            return Ok(Vec::new());
        }
        if decomposition.sample_count() == 0 {
            return Err(Error::InvalidData(
                "Cannot sample a decomposition without samples".to_string(),
            ));
        }
        if sampling.batch_size == 0 {
            return Err(Error::InvalidData(
                "Rejection sampling needs a positive batch size".to_string(),
            ));
        }

        let (min, max) = bounds;
        let finite = min.coords.iter().chain(max.coords.iter()).all(|c| c.is_finite());
        if !finite || (0..3).any(|axis| min[axis] > max[axis]) {
            return Err(Error::InvalidData(format!(
                "Invalid sampling bounds {:?} .. {:?}",
                min, max
            )));
        }

        let errors = sample_errors(&field, self.config().iso_level, sampling.error_offset);
        if let Some(bad) = errors.iter().find(|e| !e.is_finite()) {
            return Err(Error::Algorithm(format!(
                "Sample error {} is not finite; use a positive error offset",
                bad
            )));
        }

        let locator = SampleLocator::new(decomposition);
        let extent = max - min;
        let mut points = Vec::with_capacity(sampling.samples);
        let mut batches = 0usize;

        while points.len() < sampling.samples {
            let candidates: Vec<Point3d> = (0..sampling.batch_size)
                .map(|_| {
                    let u = Vector3d::new(rng.gen(), rng.gen(), rng.gen());
                    min + extent.component_mul(&u)
                })
                .collect();
            let density = parallel_map(&candidates, |p| errors[locator.nearest(p)]);
            let max_density = density.iter().copied().fold(0.0, f64::max);

            // The densest candidate is always kept, so every batch makes progress
            for (p, d) in candidates.into_iter().zip(density) {
                if d > rng.gen::<f64>() * max_density {
                    points.push(p);
                    if points.len() == sampling.samples {
                        break;
                    }
                }
            }
            batches += 1;
        }

        tracing::debug!(
            "Rejection sampling kept {} points from {} batches",
            points.len(),
            batches
        );
        Ok(points)
    }
}
