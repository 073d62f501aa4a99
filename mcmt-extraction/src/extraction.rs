//! Marching tetrahedra forward pass
//!
//! Classifies every cell of a [`TetDecomposition`], interpolates the crossing
//! on each crossed edge and stitches the per-cell triangles into a single
//! indexed mesh. Each output vertex comes with a [`CrossingRecord`] holding
//! the partials needed to push vertex gradients back to the field.

use crate::assembler::{assemble, ChunkArena, ChunkOutput, CrossingMap, VertexHandle};
use crate::classify::classify_cell;
use crate::interpolation::{CrossingRecord, EdgeKey, DEFAULT_EPSILON};
use crate::parallel::{ParallelScheduler, ThreadPoolConfig};
use mcmt_core::{Error, FieldBuffer, Result, TetDecomposition, TriangleMesh, TET_EDGES};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Configuration for marching tetrahedra extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Flat-edge threshold and clamp margin for the interpolation parameter
    pub epsilon: f64,
    /// Value of the cut function the surface is extracted at
    pub iso_level: f64,
    /// Worker pool settings
    pub parallel: ThreadPoolConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            iso_level: 0.0,
            parallel: ThreadPoolConfig::default(),
        }
    }
}

impl ExtractionConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_iso_level(mut self, iso_level: f64) -> Self {
        self.iso_level = iso_level;
        self
    }

    /// Run on a private pool of `threads` workers
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.parallel = self.parallel.with_threads(threads);
        self
    }

    pub fn with_parallel(mut self, parallel: ThreadPoolConfig) -> Self {
        self.parallel = parallel;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.epsilon > 0.0 && self.epsilon < 0.5) {
            return Err(Error::InvalidData(format!(
                "epsilon must lie in (0, 0.5), got {}",
                self.epsilon
            )));
        }
        if !self.iso_level.is_finite() {
            return Err(Error::InvalidData(format!(
                "iso level must be finite, got {}",
                self.iso_level
            )));
        }
        Ok(())
    }
}

/// Counters describing one extraction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub cells: usize,
    /// Cells whose corners do not all share a sign
    pub active_cells: usize,
    /// Crossings with a flat edge or a clamped parameter
    pub degenerate_crossings: usize,
    pub chunks: usize,
}

/// Result of a forward pass
#[derive(Debug, Clone)]
pub struct Extraction {
    pub mesh: TriangleMesh,
    /// One record per mesh vertex, same order
    pub records: Vec<CrossingRecord>,
    /// Samples of the field the mesh was extracted from
    pub sample_count: usize,
    /// Channels of the field the mesh was extracted from
    pub channels: usize,
    pub stats: ExtractionStats,
}

/// Marching tetrahedra extractor bound to one decomposition
#[derive(Debug, Clone)]
pub struct MarchingTets {
    decomposition: Arc<TetDecomposition>,
    config: ExtractionConfig,
    scheduler: ParallelScheduler,
}

impl MarchingTets {
    pub fn new(decomposition: Arc<TetDecomposition>, config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = ParallelScheduler::new(config.parallel.clone())?;
        Ok(Self {
            decomposition,
            config,
            scheduler,
        })
    }

    pub fn decomposition(&self) -> &Arc<TetDecomposition> {
        &self.decomposition
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &ParallelScheduler {
        &self.scheduler
    }

    /// Extract the surface of `field`
    pub fn extract(&self, field: FieldBuffer<'_>) -> Result<Extraction> {
        run_extraction(&self.decomposition, field, &self.config, &self.scheduler)
    }
}

/// Extract the surface of `field` over `decomposition` in one call
pub fn marching_tets(
    field: FieldBuffer<'_>,
    decomposition: &TetDecomposition,
    config: &ExtractionConfig,
) -> Result<Extraction> {
    config.validate()?;
    let scheduler = ParallelScheduler::new(config.parallel.clone())?;
    run_extraction(decomposition, field, config, &scheduler)
}

fn run_extraction(
    decomposition: &TetDecomposition,
    field: FieldBuffer<'_>,
    config: &ExtractionConfig,
    scheduler: &ParallelScheduler,
) -> Result<Extraction> {
    field.check_sample_count(decomposition.sample_count())?;

    let cell_count = decomposition.cell_count();
    let map = CrossingMap::new();
    let chunks = scheduler
        .map_chunks(cell_count, |chunk, cells| {
            process_chunk(decomposition, &field, config, &map, chunk as u32, cells)
        })
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let chunk_count = chunks.len();
    let active_cells = chunks.iter().map(|c| c.active_cells).sum();
    let (mesh, records) = assemble(chunks, &map)?;

    let stats = ExtractionStats {
        cells: cell_count,
        active_cells,
        degenerate_crossings: records.iter().filter(|r| r.degenerate).count(),
        chunks: chunk_count,
    };

    tracing::debug!(
        "Marching tets: {} of {} cells active in {} chunks",
        stats.active_cells,
        stats.cells,
        stats.chunks
    );
    if stats.degenerate_crossings > 0 {
        tracing::debug!(
            "{} degenerate crossings carry no gradient",
            stats.degenerate_crossings
        );
    }
    tracing::info!(
        "Extracted mesh with {} vertices and {} triangles",
        mesh.vertex_count(),
        mesh.face_count()
    );

    Ok(Extraction {
        mesh,
        records,
        sample_count: field.sample_count(),
        channels: field.channels(),
        stats,
    })
}

fn process_chunk(
    decomposition: &TetDecomposition,
    field: &FieldBuffer<'_>,
    config: &ExtractionConfig,
    map: &CrossingMap,
    chunk: u32,
    cells: Range<usize>,
) -> Result<ChunkOutput> {
    let mut arena = ChunkArena::new(chunk);
    let mut triangles = Vec::new();
    let mut active_cells = 0;

    for cell in cells {
        let corners = decomposition.cell(cell);
        let classified = classify_cell(field, corners, config.iso_level)?;
        if classified.entry.is_empty() {
            continue;
        }
        active_cells += 1;

        let mut handles = [VertexHandle::default(); 6];
        for &edge in classified.entry.crossed_edges() {
            let [i, j] = TET_EDGES[edge as usize];
            let key = EdgeKey::new(corners[i], corners[j], classified.cut);
            let (v_lo, v_hi) = if corners[i] < corners[j] {
                (classified.values[i], classified.values[j])
            } else {
                (classified.values[j], classified.values[i])
            };
            handles[edge as usize] = map.get_or_insert_with(key, &mut arena, || {
                CrossingRecord::new(key, decomposition, v_lo, v_hi, config.epsilon)
            });
        }

        triangles.extend(
            classified
                .entry
                .triangles()
                .iter()
                .map(|triangle| (*triangle).map(|edge| handles[edge as usize])),
        );
    }

    Ok(ChunkOutput {
        arena,
        triangles,
        active_cells,
    })
}
