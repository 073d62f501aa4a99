//! Mesh data structures and functionality

use crate::point::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A triangle mesh with vertices and faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3d>,
    pub faces: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh from vertices and faces
    pub fn from_vertices_and_faces(vertices: Vec<Point3d>, faces: Vec<[usize; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of faces
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if the mesh is empty
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Flat `[x0, y0, z0, x1, ...]` view of the vertex positions
    pub fn vertex_buffer(&self) -> &[f64] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Flat `[a0, b0, c0, a1, ...]` view of the triangle indices
    pub fn index_buffer(&self) -> &[usize] {
        bytemuck::cast_slice(&self.faces)
    }

    /// Calculate unit face normals. Degenerate faces yield a zero vector.
    pub fn calculate_face_normals(&self) -> Vec<Vector3d> {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];

                let n = (v1 - v0).cross(&(v2 - v0));
                n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3d::zeros)
            })
            .collect()
    }

    /// Total surface area
    pub fn surface_area(&self) -> f64 {
        self.faces
            .iter()
            .map(|face| {
                let v0 = self.vertices[face[0]];
                let v1 = self.vertices[face[1]];
                let v2 = self.vertices[face[2]];
                0.5 * (v1 - v0).cross(&(v2 - v0)).norm()
            })
            .sum()
    }

    /// True when every edge is shared by exactly two faces that traverse it
    /// in opposite directions (closed, consistently oriented 2-manifold).
    pub fn is_watertight(&self) -> bool {
        if self.faces.is_empty() {
            return false;
        }

        let mut directed: HashMap<(usize, usize), usize> = HashMap::new();
        for face in &self.faces {
            for k in 0..3 {
                *directed.entry((face[k], face[(k + 1) % 3])).or_insert(0) += 1;
            }
        }

        directed
            .iter()
            .all(|(&(a, b), &count)| count == 1 && directed.get(&(b, a)) == Some(&1))
    }
}

impl Default for TriangleMesh {
    fn default() -> Self {
        Self::new()
    }
}
