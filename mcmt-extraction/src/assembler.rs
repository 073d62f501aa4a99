//! Mesh assembly and crossing deduplication
//!
//! Workers share one [`CrossingMap`] from edge key to [`VertexHandle`]. The
//! first worker to see a key builds its [`CrossingRecord`] and pushes it into
//! its own [`ChunkArena`]; everyone else gets the handle back. A handle packs
//! the arena (chunk) index with the local slot, so no worker ever writes to
//! another's storage.
//!
//! Handles depend on scheduling. Once all chunks are collected,
//! [`assemble`] renumbers vertices in ascending key order and rewrites the
//! triangles, which makes the output independent of thread count.

use crate::interpolation::{CrossingRecord, EdgeKey};
use dashmap::DashMap;
use mcmt_core::{Error, Result, TriangleMesh};

/// Packed `(chunk, local)` reference to a crossing record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VertexHandle(u64);

impl VertexHandle {
    #[inline]
    pub fn pack(chunk: u32, local: u32) -> Self {
        Self(((chunk as u64) << 32) | local as u64)
    }

    #[inline]
    pub fn chunk(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn local(self) -> u32 {
        self.0 as u32
    }
}

/// Shared key to handle index
#[derive(Debug, Default)]
pub struct CrossingMap {
    index: DashMap<EdgeKey, VertexHandle>,
}

impl CrossingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: DashMap::with_capacity(capacity),
        }
    }

    /// Handle for `key`, creating the record in `arena` if nobody has yet.
    ///
    /// `make` runs at most once per key across all threads.
    pub fn get_or_insert_with<F>(&self, key: EdgeKey, arena: &mut ChunkArena, make: F) -> VertexHandle
    where
        F: FnOnce() -> CrossingRecord,
    {
        if let Some(handle) = self.index.get(&key) {
            return *handle;
        }
        *self
            .index
            .entry(key)
            .or_insert_with(|| arena.push(make()))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Records created by one chunk of cells
#[derive(Debug)]
pub struct ChunkArena {
    chunk: u32,
    records: Vec<CrossingRecord>,
}

impl ChunkArena {
    pub fn new(chunk: u32) -> Self {
        Self {
            chunk,
            records: Vec::new(),
        }
    }

    fn push(&mut self, record: CrossingRecord) -> VertexHandle {
        let handle = VertexHandle::pack(self.chunk, self.records.len() as u32);
        self.records.push(record);
        handle
    }

    pub fn chunk(&self) -> u32 {
        self.chunk
    }

    pub fn records(&self) -> &[CrossingRecord] {
        &self.records
    }
}

/// Output of one worker: its arena plus triangles over handles, in cell order
#[derive(Debug)]
pub struct ChunkOutput {
    pub arena: ChunkArena,
    pub triangles: Vec<[VertexHandle; 3]>,
    pub active_cells: usize,
}

/// Compact chunk outputs into a mesh and its vertex-aligned crossing records.
///
/// `chunks` must be in chunk-index order, i.e. the order the scheduler
/// produced them, so triangle order follows cell order.
pub fn assemble(chunks: Vec<ChunkOutput>, map: &CrossingMap) -> Result<(TriangleMesh, Vec<CrossingRecord>)> {
    let total: usize = chunks.iter().map(|c| c.arena.records.len()).sum();
    if total != map.len() {
        return Err(Error::Inconsistent(format!(
            "{} crossing records created for {} distinct keys",
            total,
            map.len()
        )));
    }

    let mut slots: Vec<(EdgeKey, u32, u32)> = Vec::with_capacity(total);
    for (position, chunk) in chunks.iter().enumerate() {
        if chunk.arena.chunk as usize != position {
            return Err(Error::Inconsistent(format!(
                "chunk {} collected at position {}",
                chunk.arena.chunk, position
            )));
        }
        slots.extend(
            chunk
                .arena
                .records
                .iter()
                .enumerate()
                .map(|(local, record)| (record.key, chunk.arena.chunk, local as u32)),
        );
    }
    slots.sort_unstable_by_key(|&(key, _, _)| key);

    let mut remap: Vec<Vec<usize>> = chunks
        .iter()
        .map(|c| vec![usize::MAX; c.arena.records.len()])
        .collect();
    let mut records = Vec::with_capacity(total);
    for (vertex, &(_, chunk, local)) in slots.iter().enumerate() {
        remap[chunk as usize][local as usize] = vertex;
        records.push(chunks[chunk as usize].arena.records[local as usize]);
    }

    let resolve = |handle: VertexHandle| -> Result<usize> {
        remap
            .get(handle.chunk() as usize)
            .and_then(|slots| slots.get(handle.local() as usize))
            .copied()
            .filter(|&v| v != usize::MAX)
            .ok_or_else(|| {
                Error::Inconsistent(format!(
                    "vertex handle ({}, {}) does not resolve",
                    handle.chunk(),
                    handle.local()
                ))
            })
    };

    let face_count = chunks.iter().map(|c| c.triangles.len()).sum();
    let mut faces = Vec::with_capacity(face_count);
    for chunk in &chunks {
        for triangle in &chunk.triangles {
            faces.push([resolve(triangle[0])?, resolve(triangle[1])?, resolve(triangle[2])?]);
        }
    }

    let vertices = records.iter().map(|r| r.position).collect();
    Ok((TriangleMesh::from_vertices_and_faces(vertices, faces), records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Cut;
    use mcmt_core::{Point3d, Vector3d};

    fn record(lo: u32, hi: u32) -> CrossingRecord {
        CrossingRecord {
            key: EdgeKey::new(lo, hi, Cut::Scalar),
            t: 0.5,
            dt: [0.0, 0.0],
            direction: Vector3d::x(),
            position: Point3d::new(lo as f64, hi as f64, 0.0),
            degenerate: false,
        }
    }

    #[test]
    fn test_handle_packing() {
        let handle = VertexHandle::pack(7, 123_456);
        assert_eq!(handle.chunk(), 7);
        assert_eq!(handle.local(), 123_456);
        assert_eq!(VertexHandle::pack(u32::MAX, u32::MAX).chunk(), u32::MAX);
    }

    #[test]
    fn test_insert_once() {
        let map = CrossingMap::new();
        let mut arena = ChunkArena::new(0);
        let key = EdgeKey::new(1, 2, Cut::Scalar);

        let first = map.get_or_insert_with(key, &mut arena, || record(1, 2));
        let second = map.get_or_insert_with(key, &mut arena, || panic!("record built twice"));

        assert_eq!(first, second);
        assert_eq!(arena.records().len(), 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_assemble_orders_by_key() {
        let map = CrossingMap::new();
        let mut a0 = ChunkArena::new(0);
        let mut a1 = ChunkArena::new(1);

        // Chunk 0 creates keys out of order, chunk 1 reuses one of them
        let h5 = map.get_or_insert_with(EdgeKey::new(5, 6, Cut::Scalar), &mut a0, || record(5, 6));
        let h1 = map.get_or_insert_with(EdgeKey::new(1, 2, Cut::Scalar), &mut a0, || record(1, 2));
        let h3 = map.get_or_insert_with(EdgeKey::new(3, 4, Cut::Scalar), &mut a1, || record(3, 4));
        let h5b = map.get_or_insert_with(EdgeKey::new(6, 5, Cut::Scalar), &mut a1, || record(5, 6));
        assert_eq!(h5, h5b);

        let chunks = vec![
            ChunkOutput { arena: a0, triangles: vec![[h5, h1, h3]], active_cells: 1 },
            ChunkOutput { arena: a1, triangles: vec![[h3, h5b, h1]], active_cells: 1 },
        ];
        let (mesh, records) = assemble(chunks, &map).unwrap();

        assert_eq!(records.iter().map(|r| r.key.lo).collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(mesh.faces, vec![[2, 0, 1], [1, 2, 0]]);
        assert_eq!(mesh.vertices[2], Point3d::new(5.0, 6.0, 0.0));
    }

    #[test]
    fn test_assemble_rejects_unknown_handle() {
        let map = CrossingMap::new();
        let mut arena = ChunkArena::new(0);
        let h = map.get_or_insert_with(EdgeKey::new(0, 1, Cut::Scalar), &mut arena, || record(0, 1));
        let bogus = VertexHandle::pack(3, 0);

        let chunks = vec![ChunkOutput { arena, triangles: vec![[h, h, bogus]], active_cells: 1 }];
        assert!(matches!(assemble(chunks, &map), Err(Error::Inconsistent(_))));
    }
}
