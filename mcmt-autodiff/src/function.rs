//! Tensor-shaped forward/backward operation
//!
//! [`MarchingTetsFunction`] is the node a tensor framework's autograd would
//! hold: `forward` takes a `(samples, channels)` field and returns vertex and
//! triangle arrays while keeping the [`GradientContext`] alive inside the
//! node; `backward` maps a `(vertices, 3)` gradient to a gradient shaped
//! like the field.

use crate::gradient::GradientContext;
use mcmt_core::{Error, FieldBuffer, Result, TetDecomposition};
use mcmt_extraction::{ExtractionConfig, ExtractionStats, MarchingTets};
use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Differentiable marching tetrahedra operation over a fixed decomposition
#[derive(Debug)]
pub struct MarchingTetsFunction {
    extractor: MarchingTets,
    retain_graph: bool,
    context: Option<GradientContext>,
    last_stats: Option<ExtractionStats>,
}

impl MarchingTetsFunction {
    pub fn new(decomposition: Arc<TetDecomposition>, config: ExtractionConfig) -> Result<Self> {
        Ok(Self {
            extractor: MarchingTets::new(decomposition, config)?,
            retain_graph: false,
            context: None,
            last_stats: None,
        })
    }

    /// Keep the context after `backward` so it can be called again
    pub fn with_retain_graph(mut self, retain_graph: bool) -> Self {
        self.retain_graph = retain_graph;
        self
    }

    pub fn decomposition(&self) -> &Arc<TetDecomposition> {
        self.extractor.decomposition()
    }

    /// Context saved by the last `forward`, if still alive
    pub fn context(&self) -> Option<&GradientContext> {
        self.context.as_ref()
    }

    /// Counters of the last `forward`
    pub fn stats(&self) -> Option<&ExtractionStats> {
        self.last_stats.as_ref()
    }

    /// Drop the saved context; a later `backward` fails until the next `forward`
    pub fn release(&mut self) {
        self.context = None;
    }

    /// Extract the surface of `field` (`samples x channels`).
    ///
    /// Returns vertex positions `(N, 3)` and triangle indices `(M, 3)`. Any
    /// context from a previous call is replaced.
    pub fn forward(&mut self, field: ArrayView2<'_, f64>) -> Result<(Array2<f64>, Array2<i64>)> {
        let (samples, channels) = field.dim();
        let expected = self.decomposition().sample_count();
        if samples != expected {
            return Err(Error::length_mismatch("field rows", expected, samples));
        }

        let contiguous = field.as_standard_layout();
        let values = contiguous.as_slice().ok_or_else(|| {
            Error::Algorithm("field is not contiguous after relayout".to_string())
        })?;
        let buffer = FieldBuffer::with_channels(values, channels)?;

        self.context = None;
        let extraction = self.extractor.extract(buffer)?;
        let context = GradientContext::from_extraction(&extraction)?;

        let mesh = &extraction.mesh;
        let vertices = Array2::from_shape_vec((mesh.vertex_count(), 3), mesh.vertex_buffer().to_vec())
            .map_err(|e| Error::Algorithm(format!("vertex array: {}", e)))?;
        let faces = Array2::from_shape_vec(
            (mesh.face_count(), 3),
            mesh.index_buffer().iter().map(|&i| i as i64).collect(),
        )
        .map_err(|e| Error::Algorithm(format!("face array: {}", e)))?;

        self.context = Some(context);
        self.last_stats = Some(extraction.stats);
        Ok((vertices, faces))
    }

    /// Map a `(vertices, 3)` gradient back to a `(samples, channels)` field gradient.
    ///
    /// Runs on the same scheduler as `forward`. Consumes the saved context
    /// unless `retain_graph` is set.
    pub fn backward(&mut self, vertex_grad: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let context = self.context.as_ref().ok_or_else(|| {
            Error::InvalidState("backward called without a live forward context".to_string())
        })?;

        let (rows, cols) = vertex_grad.dim();
        if cols != 3 {
            return Err(Error::length_mismatch("vertex gradient columns", 3, cols));
        }
        if rows != context.vertex_count() {
            return Err(Error::length_mismatch("vertex gradient rows", context.vertex_count(), rows));
        }

        let contiguous = vertex_grad.as_standard_layout();
        let flat = contiguous.as_slice().ok_or_else(|| {
            Error::Algorithm("vertex gradient is not contiguous after relayout".to_string())
        })?;
        let field_grad = context.propagate_on(flat, self.extractor.scheduler())?;
        let shape = (context.sample_count(), context.channels());

        if !self.retain_graph {
            self.context = None;
        }

        Array2::from_shape_vec(shape, field_grad)
            .map_err(|e| Error::Algorithm(format!("field gradient array: {}", e)))
    }
}
