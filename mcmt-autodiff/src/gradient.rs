//! Sparse Jacobian of vertex positions with respect to field values
//!
//! Each output vertex `p = p_lo + t (p_hi - p_lo)` depends on at most two
//! samples (four field entries for a channel-pair cut). Its Jacobian row is
//! `direction ⊗ [dt/dv_lo, dt/dv_hi]`, so a [`GradientContext`] stores the
//! edge direction per vertex plus the scalar weights, once vertex-major for
//! forward-mode products and once field-major (transposed CSR) so the
//! backward pass is a race-free gather.

use mcmt_core::{Error, FieldBuffer, Result, TetDecomposition, TriangleMesh, Vector3d};
use mcmt_extraction::{
    marching_tets, CrossingRecord, Extraction, ExtractionConfig, ParallelScheduler,
};

/// Linear map from vertex gradients to field gradients, captured at forward time
#[derive(Debug, Clone, PartialEq)]
pub struct GradientContext {
    sample_count: usize,
    channels: usize,
    directions: Vec<Vector3d>,
    /// Vertex-major rows: `(field index, dt * channel sign)`
    row_offsets: Vec<usize>,
    row_entries: Vec<(usize, f64)>,
    /// Field-major columns: `(vertex, weight)`, vertices ascending
    col_offsets: Vec<usize>,
    col_entries: Vec<(usize, f64)>,
}

impl GradientContext {
    /// Build the context of a forward pass
    pub fn from_extraction(extraction: &Extraction) -> Result<Self> {
        Self::from_records(&extraction.records, extraction.sample_count, extraction.channels)
    }

    /// Build the context from vertex-aligned crossing records. Degenerate
    /// crossings get empty rows.
    pub fn from_records(
        records: &[CrossingRecord],
        sample_count: usize,
        channels: usize,
    ) -> Result<Self> {
        let field_len = sample_count * channels;

        let mut directions = Vec::with_capacity(records.len());
        let mut row_offsets = Vec::with_capacity(records.len() + 1);
        let mut row_entries = Vec::with_capacity(records.len() * 2);
        row_offsets.push(0);

        for record in records {
            directions.push(record.direction);
            if !record.degenerate {
                let endpoints = [(record.key.lo, record.dt[0]), (record.key.hi, record.dt[1])];
                for (sample, dt) in endpoints {
                    for (channel, sign) in record.key.cut.channel_weights().into_iter().flatten() {
                        let index = sample as usize * channels + channel;
                        if sample as usize >= sample_count || channel >= channels {
                            return Err(Error::Inconsistent(format!(
                                "crossing {:?} refers to field entry {} of {}",
                                record.key, index, field_len
                            )));
                        }
                        row_entries.push((index, dt * sign));
                    }
                }
            }
            row_offsets.push(row_entries.len());
        }

        // Counting sort into field-major order; vertices stay ascending per column
        let mut col_offsets = vec![0usize; field_len + 1];
        for &(index, _) in &row_entries {
            col_offsets[index + 1] += 1;
        }
        for i in 0..field_len {
            col_offsets[i + 1] += col_offsets[i];
        }
        let mut cursor = col_offsets[..field_len].to_vec();
        let mut col_entries = vec![(0usize, 0.0); row_entries.len()];
        for vertex in 0..records.len() {
            for &(index, weight) in &row_entries[row_offsets[vertex]..row_offsets[vertex + 1]] {
                col_entries[cursor[index]] = (vertex, weight);
                cursor[index] += 1;
            }
        }

        tracing::debug!(
            "Gradient context: {} vertices, {} field entries, {} nonzeros",
            records.len(),
            field_len,
            row_entries.len()
        );

        Ok(Self {
            sample_count,
            channels,
            directions,
            row_offsets,
            row_entries,
            col_offsets,
            col_entries,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.directions.len()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Length of the field gradient, `sample_count * channels`
    pub fn field_len(&self) -> usize {
        self.sample_count * self.channels
    }

    /// Number of stored Jacobian weights
    pub fn nnz(&self) -> usize {
        self.row_entries.len()
    }

    /// Edge direction `p_hi - p_lo` of `vertex`
    pub fn direction(&self, vertex: usize) -> &Vector3d {
        &self.directions[vertex]
    }

    /// `(field index, weight)` pairs `vertex` depends on
    pub fn dependencies(&self, vertex: usize) -> &[(usize, f64)] {
        &self.row_entries[self.row_offsets[vertex]..self.row_offsets[vertex + 1]]
    }

    /// Backward pass: field gradient from a flat `3 * vertex_count` vertex
    /// gradient, on the global pool
    pub fn propagate(&self, vertex_grad: &[f64]) -> Result<Vec<f64>> {
        self.propagate_on(vertex_grad, &ParallelScheduler::global())
    }

    /// Backward pass on `scheduler`
    pub fn propagate_on(
        &self,
        vertex_grad: &[f64],
        scheduler: &ParallelScheduler,
    ) -> Result<Vec<f64>> {
        let expected = 3 * self.vertex_count();
        if vertex_grad.len() != expected {
            return Err(Error::length_mismatch("vertex gradient", expected, vertex_grad.len()));
        }

        let grad_dir: Vec<f64> = scheduler
            .map_chunks(self.vertex_count(), |_, vertices| {
                vertices
                    .map(|v| {
                        let (g, d) = (&vertex_grad[3 * v..3 * v + 3], &self.directions[v]);
                        g[0] * d.x + g[1] * d.y + g[2] * d.z
                    })
                    .collect::<Vec<f64>>()
            })
            .into_iter()
            .flatten()
            .collect();

        Ok(scheduler
            .map_chunks(self.field_len(), |_, entries| {
                entries
                    .map(|index| {
                        self.col_entries[self.col_offsets[index]..self.col_offsets[index + 1]]
                            .iter()
                            .map(|&(vertex, weight)| weight * grad_dir[vertex])
                            .sum::<f64>()
                    })
                    .collect::<Vec<f64>>()
            })
            .into_iter()
            .flatten()
            .collect())
    }

    /// Forward-mode product: vertex displacement (flat, 3 per vertex) caused
    /// by the field perturbation `field_tangent`
    pub fn jvp(&self, field_tangent: &[f64]) -> Result<Vec<f64>> {
        self.jvp_on(field_tangent, &ParallelScheduler::global())
    }

    /// Forward-mode product on `scheduler`
    pub fn jvp_on(&self, field_tangent: &[f64], scheduler: &ParallelScheduler) -> Result<Vec<f64>> {
        if field_tangent.len() != self.field_len() {
            return Err(Error::length_mismatch(
                "field tangent",
                self.field_len(),
                field_tangent.len(),
            ));
        }

        Ok(scheduler
            .map_chunks(self.vertex_count(), |_, vertices| {
                vertices
                    .flat_map(|vertex| {
                        let dt: f64 = self
                            .dependencies(vertex)
                            .iter()
                            .map(|&(index, weight)| weight * field_tangent[index])
                            .sum();
                        let d = self.directions[vertex] * dt;
                        [d.x, d.y, d.z]
                    })
                    .collect::<Vec<f64>>()
            })
            .into_iter()
            .flatten()
            .collect())
    }
}

/// Propagate `vertex_grad` (3 per vertex) back to one value per field entry.
///
/// Contributions are accumulated additively; entries no vertex depends on
/// stay zero.
pub fn propagate_gradient(vertex_grad: &[f64], context: &GradientContext) -> Result<Vec<f64>> {
    context.propagate(vertex_grad)
}

/// Forward pass with default settings, returning the mesh together with the
/// context needed for [`propagate_gradient`]
pub fn extract_mesh(
    field: FieldBuffer<'_>,
    decomposition: &TetDecomposition,
) -> Result<(TriangleMesh, GradientContext)> {
    let extraction = marching_tets(field, decomposition, &ExtractionConfig::default())?;
    let context = GradientContext::from_extraction(&extraction)?;
    Ok((extraction.mesh, context))
}
