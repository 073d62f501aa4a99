//! Tetrahedral spatial decompositions
//!
//! A decomposition is the fixed topology the field is sampled on: sample
//! positions plus, for every cell, the four corner sample indices. Cells are
//! always stored positively oriented so that the case table's triangle
//! winding holds for every cell.
//!
//! Two sources are supported:
//! - a regular grid, each cube split into six Kuhn tetrahedra sharing the
//!   cube's main diagonal (neighbouring cubes agree on every shared face
//!   diagonal, so the decomposition is conforming);
//! - an explicit list of tetrahedra, e.g. produced by a Delaunay library.

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};

/// Local corner pairs of the six tetrahedron edges
pub const TET_EDGES: [[usize; 2]; 6] = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];

/// Local corner triples of the four tetrahedron faces
pub const TET_FACES: [[usize; 3]; 4] = [[0, 1, 2], [0, 2, 3], [0, 1, 3], [1, 2, 3]];

/// Corner offsets of the six Kuhn tetrahedra of a unit cube. Each walks from
/// `(0,0,0)` to `(1,1,1)` along one permutation of the axes.
const KUHN_TETS: [[[usize; 3]; 4]; 6] = [
    [[0, 0, 0], [1, 0, 0], [1, 1, 0], [1, 1, 1]],
    [[0, 0, 0], [1, 0, 0], [1, 0, 1], [1, 1, 1]],
    [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 1, 1]],
    [[0, 0, 0], [0, 1, 0], [0, 1, 1], [1, 1, 1]],
    [[0, 0, 0], [0, 0, 1], [1, 0, 1], [1, 1, 1]],
    [[0, 0, 0], [0, 0, 1], [0, 1, 1], [1, 1, 1]],
];

/// Regular grid layout a decomposition was generated from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    /// Samples per axis
    pub dimensions: [usize; 3],
    /// Distance between neighbouring samples per axis
    pub spacing: [f64; 3],
    /// Position of sample `(0, 0, 0)`
    pub origin: Point3d,
}

impl GridLayout {
    /// Flat sample index of grid coordinates `(x, y, z)`
    #[inline]
    pub fn sample_index(&self, x: usize, y: usize, z: usize) -> usize {
        x + self.dimensions[0] * (y + self.dimensions[1] * z)
    }

    /// Convert grid coordinates to world coordinates
    pub fn grid_to_world(&self, x: usize, y: usize, z: usize) -> Point3d {
        Point3d::new(
            self.origin.x + x as f64 * self.spacing[0],
            self.origin.y + y as f64 * self.spacing[1],
            self.origin.z + z as f64 * self.spacing[2],
        )
    }

    pub fn sample_count(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// Flat index of the grid sample closest to `point`. Points outside the
    /// grid snap to the nearest boundary sample.
    pub fn nearest_sample(&self, point: &Point3d) -> usize {
        let [x, y, z] = [0, 1, 2].map(|axis| {
            let steps = ((point[axis] - self.origin[axis]) / self.spacing[axis]).round();
            steps.clamp(0.0, (self.dimensions[axis] - 1) as f64) as usize
        });
        self.sample_index(x, y, z)
    }
}

/// Static tetrahedral decomposition shared by every extraction call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TetDecomposition {
    positions: Vec<Point3d>,
    cells: Vec<[u32; 4]>,
    grid: Option<GridLayout>,
}

impl TetDecomposition {
    /// Build the Kuhn decomposition of a regular grid with `dimensions`
    /// samples per axis.
    pub fn from_grid(dimensions: [usize; 3], spacing: [f64; 3], origin: Point3d) -> Result<Self> {
        if dimensions.iter().any(|&d| d < 2) {
            return Err(Error::InvalidData(format!(
                "Grid needs at least 2 samples per axis, got {:?}",
                dimensions
            )));
        }
        if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
            return Err(Error::InvalidData(format!(
                "Grid spacing must be positive and finite, got {:?}",
                spacing
            )));
        }

        let layout = GridLayout {
            dimensions,
            spacing,
            origin,
        };
        let sample_count = layout.sample_count();
        if sample_count > u32::MAX as usize {
            return Err(Error::InvalidData(format!(
                "Grid has {} samples, more than a u32 index can address",
                sample_count
            )));
        }

        let mut positions = Vec::with_capacity(sample_count);
        for z in 0..dimensions[2] {
            for y in 0..dimensions[1] {
                for x in 0..dimensions[0] {
                    positions.push(layout.grid_to_world(x, y, z));
                }
            }
        }

        let cube_count = (dimensions[0] - 1) * (dimensions[1] - 1) * (dimensions[2] - 1);
        let mut cells = Vec::with_capacity(cube_count * KUHN_TETS.len());
        for z in 0..dimensions[2] - 1 {
            for y in 0..dimensions[1] - 1 {
                for x in 0..dimensions[0] - 1 {
                    for tet in KUHN_TETS {
                        let corners = tet.map(|[dx, dy, dz]| {
                            layout.sample_index(x + dx, y + dy, z + dz) as u32
                        });
                        cells.push(orient_cell(&positions, corners)?);
                    }
                }
            }
        }

        tracing::debug!(
            "Kuhn decomposition of {:?} grid: {} samples, {} cells",
            dimensions,
            positions.len(),
            cells.len()
        );

        Ok(Self {
            positions,
            cells,
            grid: Some(layout),
        })
    }

    /// Build a decomposition from explicit sample positions and tetrahedra.
    ///
    /// Corner indices are validated and every cell is reoriented to positive
    /// volume. Zero-volume cells are rejected.
    pub fn from_tets(positions: Vec<Point3d>, tets: &[[usize; 4]]) -> Result<Self> {
        if positions.len() > u32::MAX as usize {
            return Err(Error::InvalidData(format!(
                "{} samples exceed the u32 index range",
                positions.len()
            )));
        }
        if let Some(p) = positions.iter().find(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(Error::InvalidData(format!(
                "Sample position {:?} is not finite",
                p
            )));
        }

        let mut cells = Vec::with_capacity(tets.len());
        for (cell_index, tet) in tets.iter().enumerate() {
            if let Some(&bad) = tet.iter().find(|&&v| v >= positions.len()) {
                return Err(Error::InvalidData(format!(
                    "Cell {} references sample {} but only {} samples exist",
                    cell_index,
                    bad,
                    positions.len()
                )));
            }
            for i in 0..4 {
                for j in i + 1..4 {
                    if tet[i] == tet[j] {
                        return Err(Error::InvalidData(format!(
                            "Cell {} repeats sample {}",
                            cell_index, tet[i]
                        )));
                    }
                }
            }
            cells.push(orient_cell(&positions, (*tet).map(|v| v as u32))?);
        }

        tracing::debug!(
            "Explicit decomposition: {} samples, {} cells",
            positions.len(),
            cells.len()
        );

        Ok(Self {
            positions,
            cells,
            grid: None,
        })
    }

    /// Number of field samples the decomposition expects
    pub fn sample_count(&self) -> usize {
        self.positions.len()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn positions(&self) -> &[Point3d] {
        &self.positions
    }

    #[inline]
    pub fn position(&self, sample: usize) -> &Point3d {
        &self.positions[sample]
    }

    pub fn cells(&self) -> &[[u32; 4]] {
        &self.cells
    }

    #[inline]
    pub fn cell(&self, cell: usize) -> &[u32; 4] {
        &self.cells[cell]
    }

    /// Corner positions of `cell`
    #[inline]
    pub fn cell_positions(&self, cell: usize) -> [Point3d; 4] {
        self.cells[cell].map(|v| self.positions[v as usize])
    }

    /// Volume of `cell`, always positive
    pub fn cell_volume(&self, cell: usize) -> f64 {
        let [a, b, c, d] = self.cell_positions(cell);
        signed_tet_volume(&a, &b, &c, &d)
    }

    /// Grid layout when built by [`TetDecomposition::from_grid`]
    pub fn grid(&self) -> Option<&GridLayout> {
        self.grid.as_ref()
    }
}

/// Reorder `corners` so the cell has positive volume
fn orient_cell(positions: &[Point3d], mut corners: [u32; 4]) -> Result<[u32; 4]> {
    let [a, b, c, d] = corners.map(|v| positions[v as usize]);
    let volume = signed_tet_volume(&a, &b, &c, &d);
    if volume == 0.0 || !volume.is_finite() {
        return Err(Error::InvalidData(format!(
            "Cell {:?} is degenerate (volume {})",
            corners, volume
        )));
    }
    if volume < 0.0 {
        corners.swap(2, 3);
    }
    Ok(corners)
}
