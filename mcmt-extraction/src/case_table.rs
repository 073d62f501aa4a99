//! Marching tetrahedra case table
//!
//! A tetrahedron has 2^4 = 16 sign patterns. For each pattern the table lists
//! which of the six local edges (see [`TET_EDGES`]) carry a crossing and how
//! the crossing points are triangulated:
//!
//! ```text
//! positive corners | crossed edges | triangles
//!        0 or 4    |       0       |     0
//!        1 or 3    |       3       |     1
//!          2       |       4       |     2   (quad split along one diagonal)
//! ```
//!
//! Unlike cube-based marching cubes there are no ambiguous patterns: every
//! face of a tetrahedron is a triangle, so the segment a face contributes to
//! the surface is fixed by the signs of its three corners alone and two cells
//! sharing a face always agree on it.
//!
//! Winding is chosen so that triangle normals point toward the non-negative
//! side of the field. The table is built once from the canonical positively
//! oriented tetrahedron; an orientation-preserving affine map keeps the
//! normal/gradient agreement, so the winding holds for every positively
//! oriented cell of a [`TetDecomposition`](mcmt_core::TetDecomposition).

use itertools::Itertools;
use mcmt_core::{Error, Point3d, Result, Vector3d, TET_EDGES};
use std::sync::OnceLock;

/// Number of sign patterns of a tetrahedron
pub const CASE_COUNT: usize = 16;

/// Local edge index joining two local corners (diagonal unused)
const CORNER_EDGE: [[u8; 4]; 4] = [
    [u8::MAX, 0, 1, 2],
    [0, u8::MAX, 3, 4],
    [1, 3, u8::MAX, 5],
    [2, 4, 5, u8::MAX],
];

/// Canonical positively oriented tetrahedron used to orient the table
const REFERENCE_CORNERS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];

static CASE_TABLE: OnceLock<CaseTable> = OnceLock::new();

/// Surface topology of one sign pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseEntry {
    mask: u8,
    edges: [u8; 4],
    edge_count: u8,
    triangles: [[u8; 3]; 2],
    triangle_count: u8,
}

impl CaseEntry {
    /// Sign bitmask this entry describes (bit `i` set when corner `i >= 0`)
    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Crossed local edges, ascending
    pub fn crossed_edges(&self) -> &[u8] {
        &self.edges[..self.edge_count as usize]
    }

    /// Triangles as triples of local edge indices
    pub fn triangles(&self) -> &[[u8; 3]] {
        &self.triangles[..self.triangle_count as usize]
    }

    /// True when the cell contains no surface
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }
}

/// Lookup from sign bitmask to [`CaseEntry`]
#[derive(Debug, Clone)]
pub struct CaseTable {
    entries: Vec<CaseEntry>,
}

impl CaseTable {
    /// Process-wide table, built on first use and read-only afterwards
    pub fn global() -> &'static CaseTable {
        CASE_TABLE.get_or_init(CaseTable::build)
    }

    /// Entry for `mask`. A miss means the table and classifier disagree,
    /// which is reported as an internal-consistency failure.
    pub fn lookup(&self, mask: u8) -> Result<&CaseEntry> {
        match self.entries.get(mask as usize) {
            Some(entry) if entry.mask == mask => Ok(entry),
            _ => Err(Error::Inconsistent(format!(
                "sign pattern {:#06b} has no case table entry",
                mask
            ))),
        }
    }

    pub fn entries(&self) -> &[CaseEntry] {
        &self.entries
    }

    fn build() -> Self {
        let entries = (0..CASE_COUNT as u8).map(build_entry).collect();
        Self { entries }
    }
}

fn build_entry(mask: u8) -> CaseEntry {
    let positive = |corner: usize| mask & (1 << corner) != 0;

    let mut edges = [0u8; 4];
    let mut edge_count = 0u8;
    for (edge, (a, b)) in (0..4usize).tuple_combinations().enumerate() {
        if positive(a) != positive(b) {
            edges[edge_count as usize] = edge as u8;
            edge_count += 1;
        }
    }

    let (pos, neg): (Vec<usize>, Vec<usize>) = (0..4).partition(|&c| positive(c));
    let mut triangles = [[0u8; 3]; 2];
    let triangle_count = match (pos.len(), neg.len()) {
        (1, 3) | (3, 1) => {
            let (apex, rest) = if pos.len() == 1 { (pos[0], &neg) } else { (neg[0], &pos) };
            triangles[0] = [
                CORNER_EDGE[apex][rest[0]],
                CORNER_EDGE[apex][rest[1]],
                CORNER_EDGE[apex][rest[2]],
            ];
            1
        }
        (2, 2) => {
            let (p, q, m, n) = (pos[0], pos[1], neg[0], neg[1]);
            // Consecutive quad corners share a tetrahedron face
            let quad = [
                CORNER_EDGE[p][m],
                CORNER_EDGE[p][n],
                CORNER_EDGE[q][n],
                CORNER_EDGE[q][m],
            ];
            triangles[0] = [quad[0], quad[1], quad[2]];
            triangles[1] = [quad[0], quad[2], quad[3]];
            2
        }
        _ => 0,
    };

    for triangle in triangles.iter_mut().take(triangle_count) {
        orient_toward_positive(mask, triangle);
    }

    CaseEntry {
        mask,
        edges,
        edge_count,
        triangles,
        triangle_count: triangle_count as u8,
    }
}

/// Flip `triangle` if its normal on the reference tetrahedron points against
/// the field gradient (field is +1 on positive corners, -1 otherwise).
fn orient_toward_positive(mask: u8, triangle: &mut [u8; 3]) {
    let corners = REFERENCE_CORNERS.map(|[x, y, z]| Point3d::new(x, y, z));
    let values: [f64; 4] =
        std::array::from_fn(|c| if mask & (1 << c) != 0 { 1.0 } else { -1.0 });
    let gradient = Vector3d::new(values[1] - values[0], values[2] - values[0], values[3] - values[0]);

    // Opposite signs on every crossed edge put the crossing at the midpoint
    let midpoint = |edge: u8| {
        let [a, b] = TET_EDGES[edge as usize];
        nalgebra::center(&corners[a], &corners[b])
    };
    let [p0, p1, p2] = triangle.map(midpoint);
    let normal = (p1 - p0).cross(&(p2 - p0));

    if normal.dot(&gradient) < 0.0 {
        triangle.swap(1, 2);
    }
}
