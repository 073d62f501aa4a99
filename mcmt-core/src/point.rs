//! Point types and small geometric helpers

use nalgebra::{Matrix3, Point3, Vector3};

/// A 3D point with double precision coordinates
pub type Point3d = Point3<f64>;

/// A 3D vector with double precision components
pub type Vector3d = Vector3<f64>;

/// Signed volume of the tetrahedron `(a, b, c, d)`.
///
/// Positive when `d` lies on the side of plane `(a, b, c)` that makes the
/// tetrahedron positively oriented, i.e. `(b - a) · ((c - a) × (d - a)) > 0`.
pub fn signed_tet_volume(a: &Point3d, b: &Point3d, c: &Point3d, d: &Point3d) -> f64 {
    let m = Matrix3::from_columns(&[b - a, c - a, d - a]);
    m.determinant() / 6.0
}

/// Unsigned volume of the tetrahedron `(a, b, c, d)`
pub fn tet_volume(a: &Point3d, b: &Point3d, c: &Point3d, d: &Point3d) -> f64 {
    signed_tet_volume(a, b, c, d).abs()
}

/// Arithmetic mean of a set of points, `None` when empty
pub fn centroid(points: &[Point3d]) -> Option<Point3d> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3d::zeros(), |acc, p| acc + p.coords);
    Some(Point3d::from(sum / points.len() as f64))
}
