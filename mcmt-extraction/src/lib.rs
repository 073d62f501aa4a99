//! # mcmt extraction
//!
//! Marching tetrahedra isosurface extraction over sampled fields.
//!
//! This crate provides the forward pass of differentiable surface
//! extraction: cell classification against a fixed case table, edge crossing
//! interpolation with analytic partials, parallel deduplicating mesh
//! assembly, plus midpoint refinement and error-density sampling for
//! adaptive decompositions.

pub mod case_table;
pub mod classify;
pub mod interpolation;
pub mod assembler;
pub mod parallel;
pub mod sampler;
pub mod extraction;
pub mod refinement;
pub mod sampling;

// Re-export commonly used items
pub use case_table::*;
pub use classify::*;
pub use interpolation::*;
pub use assembler::*;
pub use parallel::{init_thread_pool, ParallelScheduler, ThreadPoolConfig};
pub use sampler::*;
pub use extraction::*;
pub use refinement::*;
pub use sampling::*;
