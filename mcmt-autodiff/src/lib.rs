//! # mcmt autodiff
//!
//! Backward pass for marching tetrahedra.
//!
//! The forward pass records, per output vertex, the edge it lies on and the
//! partials of its interpolation parameter. This crate turns those records
//! into a sparse Jacobian ([`GradientContext`]) and exposes the
//! forward/backward pair a tensor framework binds to
//! ([`MarchingTetsFunction`]).

pub mod gradient;
pub mod function;

pub use gradient::*;
pub use function::*;
