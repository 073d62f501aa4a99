//! Crossing-cell midpoint refinement
//!
//! Proposes new sample positions where the surface passes: the centroid of
//! the crossing points of every active cell. Inserting these into the
//! decomposition (e.g. by re-running an external Delaunay step) concentrates
//! resolution around the surface.

use crate::classify::classify_cell;
use crate::extraction::MarchingTets;
use crate::interpolation::{interpolate, EdgeKey};
use mcmt_core::{
    centroid, near_box_boundary, tet_volume, Bounded, FieldBuffer, Point3d, Result, TET_EDGES,
    TET_FACES,
};
use serde::{Deserialize, Serialize};

/// Configuration for midpoint refinement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Reject a candidate if any cell face and the candidate span less volume
    pub min_volume: f64,
    /// Ignore cells with a corner on the decomposition's bounding box
    pub skip_boundary: bool,
    /// Distance to the bounding box that counts as touching it
    pub boundary_tolerance: f64,
    /// Only consider cells with at least one corner sample at or after this index
    pub first_new_sample: Option<usize>,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            min_volume: 1e-12,
            skip_boundary: false,
            boundary_tolerance: 1e-6,
            first_new_sample: None,
        }
    }
}

impl RefinementConfig {
    pub fn with_min_volume(mut self, min_volume: f64) -> Self {
        self.min_volume = min_volume;
        self
    }

    pub fn with_skip_boundary(mut self, skip: bool) -> Self {
        self.skip_boundary = skip;
        self
    }

    pub fn with_boundary_tolerance(mut self, tolerance: f64) -> Self {
        self.boundary_tolerance = tolerance;
        self
    }

    /// Restrict refinement to cells touching samples `first..`
    pub fn with_first_new_sample(mut self, first: usize) -> Self {
        self.first_new_sample = Some(first);
        self
    }
}

impl MarchingTets {
    /// Centroids of the crossing points of every active cell, in cell order
    pub fn crossing_midpoints(
        &self,
        field: FieldBuffer<'_>,
        refinement: &RefinementConfig,
    ) -> Result<Vec<Point3d>> {
        let decomposition = self.decomposition();
        field.check_sample_count(decomposition.sample_count())?;

        let bounds = decomposition.bounding_box();
        let config = self.config();

        let chunks = self
            .scheduler()
            .map_chunks(decomposition.cell_count(), |_, cells| -> Result<Vec<Point3d>> {
                let mut midpoints = Vec::new();
                for cell in cells {
                    let corners = decomposition.cell(cell);
                    if let Some(first) = refinement.first_new_sample {
                        if corners.iter().all(|&s| (s as usize) < first) {
                            continue;
                        }
                    }

                    let positions = decomposition.cell_positions(cell);
                    if refinement.skip_boundary
                        && positions
                            .iter()
                            .any(|p| near_box_boundary(&bounds, p, refinement.boundary_tolerance))
                    {
                        continue;
                    }

                    let classified = classify_cell(&field, corners, config.iso_level)?;
                    if classified.entry.is_empty() {
                        continue;
                    }

                    let crossings: Vec<Point3d> = classified
                        .entry
                        .crossed_edges()
                        .iter()
                        .map(|&edge| {
                            let [i, j] = TET_EDGES[edge as usize];
                            let key = EdgeKey::new(corners[i], corners[j], classified.cut);
                            let (lo, hi, v_lo, v_hi) = if key.lo == corners[i] {
                                (i, j, classified.values[i], classified.values[j])
                            } else {
                                (j, i, classified.values[j], classified.values[i])
                            };
                            let t = interpolate(v_lo, v_hi, config.epsilon).t;
                            positions[lo] + (positions[hi] - positions[lo]) * t
                        })
                        .collect();

                    let Some(candidate) = centroid(&crossings) else {
                        continue;
                    };
                    let thin = TET_FACES.iter().any(|&[a, b, c]| {
                        tet_volume(&positions[a], &positions[b], &positions[c], &candidate)
                            < refinement.min_volume
                    });
                    if !thin {
                        midpoints.push(candidate);
                    }
                }
                Ok(midpoints)
            })
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let midpoints: Vec<Point3d> = chunks.into_iter().flatten().collect();
        tracing::debug!("Proposed {} refinement samples", midpoints.len());
        Ok(midpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractionConfig;
    use crate::sampler::{sample_field, sphere_sdf};
    use approx::assert_relative_eq;
    use mcmt_core::TetDecomposition;
    use std::sync::Arc;

    fn unit_tet() -> Arc<TetDecomposition> {
        let positions = vec![
            Point3d::new(0.0, 0.0, 0.0),
            Point3d::new(1.0, 0.0, 0.0),
            Point3d::new(0.0, 1.0, 0.0),
            Point3d::new(0.0, 0.0, 1.0),
        ];
        Arc::new(TetDecomposition::from_tets(positions, &[[0, 1, 2, 3]]).unwrap())
    }

    #[test]
    fn test_single_cell_midpoint() {
        let extractor = MarchingTets::new(unit_tet(), ExtractionConfig::default()).unwrap();
        let values = [-1.0, 1.0, 1.0, -1.0];
        let midpoints = extractor
            .crossing_midpoints(FieldBuffer::scalar(&values), &RefinementConfig::default())
            .unwrap();

        // Mean of the midpoints of edges 0-1, 0-2, 1-3, 2-3
        assert_eq!(midpoints.len(), 1);
        assert_relative_eq!(midpoints[0], Point3d::new(0.25, 0.25, 0.25), epsilon = 1e-12);
    }

    #[test]
    fn test_thin_candidates_rejected() {
        let extractor = MarchingTets::new(unit_tet(), ExtractionConfig::default()).unwrap();
        let values = [-1.0, 1.0, 1.0, -1.0];
        let refinement = RefinementConfig::default().with_min_volume(0.1);
        let midpoints = extractor
            .crossing_midpoints(FieldBuffer::scalar(&values), &refinement)
            .unwrap();
        assert!(midpoints.is_empty());
    }

    #[test]
    fn test_filters() {
        let extractor = MarchingTets::new(unit_tet(), ExtractionConfig::default()).unwrap();
        let values = [-1.0, 1.0, 1.0, -1.0];
        let field = FieldBuffer::scalar(&values);

        let boundary = RefinementConfig::default().with_skip_boundary(true);
        assert!(extractor.crossing_midpoints(field, &boundary).unwrap().is_empty());

        let old_only = RefinementConfig::default().with_first_new_sample(4);
        assert!(extractor.crossing_midpoints(field, &old_only).unwrap().is_empty());

        let touches_new = RefinementConfig::default().with_first_new_sample(3);
        assert_eq!(extractor.crossing_midpoints(field, &touches_new).unwrap().len(), 1);
    }

    #[test]
    fn test_sphere_midpoints_near_surface() {
        let decomposition = Arc::new(
            TetDecomposition::from_grid([10, 10, 10], [0.25; 3], Point3d::new(-1.125, -1.125, -1.125))
                .unwrap(),
        );
        let values = sample_field(&decomposition, sphere_sdf(Point3d::origin(), 0.6));
        let extractor = MarchingTets::new(decomposition, ExtractionConfig::default()).unwrap();
        let midpoints = extractor
            .crossing_midpoints(FieldBuffer::scalar(&values), &RefinementConfig::default().with_skip_boundary(true))
            .unwrap();

        assert!(!midpoints.is_empty());
        for p in midpoints {
            assert!((p.coords.norm() - 0.6).abs() < 0.1);
        }
    }
}
