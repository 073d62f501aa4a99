//! Core traits for mcmt

use crate::{decomposition::TetDecomposition, mesh::TriangleMesh, point::*};

/// Objects with an axis-aligned extent
pub trait Bounded {
    /// Get the bounding box of the object as `(min, max)`
    fn bounding_box(&self) -> (Point3d, Point3d);

    /// Get the center point of the object
    fn center(&self) -> Point3d {
        let (min, max) = self.bounding_box();
        nalgebra::center(&min, &max)
    }

    /// True when `point` lies within `tolerance` of any face of the bounding box
    fn touches_boundary(&self, point: &Point3d, tolerance: f64) -> bool {
        near_box_boundary(&self.bounding_box(), point, tolerance)
    }
}

/// True when `point` lies within `tolerance` of any face of the box `(min, max)`.
/// Use this directly when testing many points against one precomputed box.
pub fn near_box_boundary(bounds: &(Point3d, Point3d), point: &Point3d, tolerance: f64) -> bool {
    let (min, max) = bounds;
    (0..3).any(|axis| point[axis] - min[axis] < tolerance || max[axis] - point[axis] < tolerance)
}

fn points_bounding_box(points: &[Point3d]) -> (Point3d, Point3d) {
    let Some(first) = points.first() else {
        return (Point3d::origin(), Point3d::origin());
    };

    points
        .iter()
        .fold((*first, *first), |(min, max), p| (min.inf(p), max.sup(p)))
}

impl Bounded for TriangleMesh {
    fn bounding_box(&self) -> (Point3d, Point3d) {
        points_bounding_box(&self.vertices)
    }
}

impl Bounded for TetDecomposition {
    fn bounding_box(&self) -> (Point3d, Point3d) {
        points_bounding_box(self.positions())
    }
}
