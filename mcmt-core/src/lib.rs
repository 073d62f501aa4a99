//! Core data structures and traits for mcmt
//!
//! This crate provides the fundamental types shared by the extraction and
//! differentiation crates: sampled fields, tetrahedral decompositions,
//! triangle meshes, and the common error type.

pub mod point;
pub mod mesh;
pub mod field;
pub mod decomposition;
pub mod traits;
pub mod error;

pub use point::*;
pub use mesh::*;
pub use field::*;
pub use decomposition::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
