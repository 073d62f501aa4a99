//! # mcmt
//!
//! Differentiable marching tetrahedra for Rust.
//!
//! This is the umbrella crate that provides convenient access to all mcmt
//! functionality. Use the individual crates for finer control over
//! dependencies.
//!
//! ## Features
//!
//! - **Core**: Sampled fields, tetrahedral decompositions and triangle meshes
//! - **Extraction**: Parallel marching tetrahedra with deduplicated vertices
//! - **Autodiff**: Backward pass from vertex gradients to field gradients
//!
//! ## Quick Start
//!
//! ```rust
//! use mcmt::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let decomposition = TetDecomposition::from_grid(
//!         [16, 16, 16],
//!         [0.1, 0.1, 0.1],
//!         Point3d::new(-0.75, -0.75, -0.75),
//!     )?;
//!     let field = sample_field(&decomposition, sphere_sdf(Point3d::origin(), 0.5));
//!
//!     let (mesh, context) = extract_mesh(FieldBuffer::scalar(&field), &decomposition)?;
//!     let field_grad = propagate_gradient(&vec![1.0; 3 * mesh.vertex_count()], &context)?;
//!     assert_eq!(field_grad.len(), field.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables extraction and autodiff
//! - `extraction`: Forward pass only
//! - `autodiff`: Backward pass (implies `extraction`)
//! - `all`: Enables all features

// Re-export core functionality
pub use mcmt_core::*;

// Re-export sub-crates
#[cfg(feature = "extraction")]
pub use mcmt_extraction as extraction;

#[cfg(feature = "autodiff")]
pub use mcmt_autodiff as autodiff;

/// Convenient imports for common use cases
pub mod prelude {
    pub use mcmt_core::*;

    #[cfg(feature = "extraction")]
    pub use mcmt_extraction::*;

    #[cfg(feature = "autodiff")]
    pub use mcmt_autodiff::*;
}
