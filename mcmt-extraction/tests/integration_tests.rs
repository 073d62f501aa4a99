//! Integration tests for mcmt-extraction
//!
//! These tests run full extractions over grid and explicit decompositions
//! and check the global properties of the resulting meshes: closedness,
//! orientation, determinism and deduplication across cells.

use approx::assert_relative_eq;
use mcmt_core::{Bounded, FieldBuffer, Point3d, TetDecomposition, TriangleMesh};
use mcmt_extraction::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

const CENTER: [f64; 3] = [0.013, -0.021, 0.007];

fn center() -> Point3d {
    Point3d::from(CENTER)
}

fn grid(size: usize) -> Arc<TetDecomposition> {
    let spacing = 2.0 / (size - 1) as f64;
    Arc::new(
        TetDecomposition::from_grid([size; 3], [spacing; 3], Point3d::new(-1.0, -1.0, -1.0))
            .unwrap(),
    )
}

/// Signed volume enclosed by a closed mesh (divergence theorem)
fn enclosed_volume(mesh: &TriangleMesh) -> f64 {
    mesh.faces
        .iter()
        .map(|f| {
            let [a, b, c] = (*f).map(|v| mesh.vertices[v].coords);
            a.dot(&b.cross(&c)) / 6.0
        })
        .sum()
}

#[test]
fn test_sphere_is_watertight_and_outward() {
    let decomposition = grid(16);
    let radius = 0.6;
    let values = sample_field(&decomposition, sphere_sdf(center(), radius));
    let extractor = MarchingTets::new(decomposition, ExtractionConfig::default()).unwrap();
    let extraction = extractor.extract(FieldBuffer::scalar(&values)).unwrap();
    let mesh = &extraction.mesh;

    assert!(mesh.is_watertight());

    // Normals point from the negative inside toward the positive outside
    let expected = 4.0 / 3.0 * std::f64::consts::PI * radius.powi(3);
    let volume = enclosed_volume(mesh);
    assert!(volume > 0.0);
    assert_relative_eq!(volume, expected, max_relative = 0.05);

    for (face, normal) in mesh.faces.iter().zip(mesh.calculate_face_normals()) {
        let centroid = mcmt_core::centroid(&(*face).map(|v| mesh.vertices[v])).unwrap();
        assert!(normal.dot(&(centroid - center())) >= 0.0);
    }
}

#[test]
fn test_every_sign_mask_matches_case_table() {
    let corners = [
        Point3d::new(0.0, 0.0, 0.0),
        Point3d::new(1.0, 0.0, 0.0),
        Point3d::new(0.0, 1.0, 0.0),
        Point3d::new(0.0, 0.0, 1.0),
    ];
    let decomposition = TetDecomposition::from_tets(corners.to_vec(), &[[0, 1, 2, 3]]).unwrap();

    for mask in 0..16u8 {
        let values: Vec<f64> = (0..4)
            .map(|i| if mask & (1 << i) != 0 { 1.0 } else { -1.0 })
            .collect();
        let entry = CaseTable::global().lookup(mask).unwrap();
        let extraction =
            marching_tets(FieldBuffer::scalar(&values), &decomposition, &ExtractionConfig::default())
                .unwrap();
        let mesh = &extraction.mesh;

        assert_eq!(mesh.vertex_count(), entry.crossed_edges().len(), "mask {:04b}", mask);
        assert_eq!(mesh.face_count(), entry.triangles().len(), "mask {:04b}", mask);
        assert_eq!(extraction.stats.active_cells, usize::from(!entry.is_empty()));

        // Equal magnitudes put every crossing at its edge midpoint
        for &edge in entry.crossed_edges() {
            let [i, j] = mcmt_core::TET_EDGES[edge as usize];
            let midpoint = Point3d::from((corners[i].coords + corners[j].coords) / 2.0);
            assert!(mesh.vertices.iter().any(|v| (v - midpoint).norm() < 1e-12));
        }

        for (face, normal) in mesh.faces.iter().zip(mesh.calculate_face_normals()) {
            assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-12);
            let on_face = mesh.vertices[face[0]];
            for corner in (0..4).filter(|i| mask & (1 << i) != 0) {
                assert!(normal.dot(&(corners[corner] - on_face)) > 0.0, "mask {:04b}", mask);
            }
        }
    }
}

#[test]
fn test_every_vertex_has_one_record() {
    let decomposition = grid(10);
    let values = sample_field(&decomposition, sphere_sdf(center(), 0.5));
    let extraction =
        marching_tets(FieldBuffer::scalar(&values), &decomposition, &ExtractionConfig::default())
            .unwrap();

    assert_eq!(extraction.records.len(), extraction.mesh.vertex_count());
    for (record, vertex) in extraction.records.iter().zip(&extraction.mesh.vertices) {
        assert_eq!(record.position, *vertex);
        assert!(record.key.lo < record.key.hi);
        assert!(record.t >= 1e-6 && record.t <= 1.0 - 1e-6);
    }

    // Keys are strictly increasing, so every crossing appears once
    for pair in extraction.records.windows(2) {
        assert!(pair[0].key < pair[1].key);
    }

    for face in &extraction.mesh.faces {
        assert!(face.iter().all(|&v| v < extraction.mesh.vertex_count()));
        assert!(face[0] != face[1] && face[1] != face[2] && face[0] != face[2]);
    }
}

#[test]
fn test_repeated_extraction_is_bit_identical() {
    let decomposition = grid(12);
    let mut rng = StdRng::seed_from_u64(3);
    let values: Vec<f64> = (0..decomposition.sample_count())
        .map(|_| rng.gen_range(-1.0..1.0))
        .collect();

    let extractor = MarchingTets::new(decomposition, ExtractionConfig::default()).unwrap();
    let first = extractor.extract(FieldBuffer::scalar(&values)).unwrap();
    let second = extractor.extract(FieldBuffer::scalar(&values)).unwrap();

    assert!(!first.mesh.is_empty());
    assert_eq!(first.mesh, second.mesh);
    assert_eq!(first.records, second.records);
}

#[test]
fn test_thread_count_does_not_change_output() {
    let decomposition = grid(14);
    let values = sample_field(&decomposition, |p: &Point3d| {
        (p.x * 3.0).sin() + (p.y * 2.0).cos() * p.z - 0.2
    });
    let field = FieldBuffer::scalar(&values);

    let single = ThreadPoolConfig::default()
        .with_threads(1)
        .with_chunk_size_range(1 << 20, 1 << 20);
    let many = ThreadPoolConfig::default()
        .with_threads(4)
        .with_chunk_size_range(64, 64);

    let a = marching_tets(field, &decomposition, &ExtractionConfig::default().with_parallel(single)).unwrap();
    let b = marching_tets(field, &decomposition, &ExtractionConfig::default().with_parallel(many)).unwrap();

    assert_eq!(a.stats.chunks, 1);
    assert!(b.stats.chunks > 1);
    assert_eq!(a.mesh, b.mesh);
    assert_eq!(a.records, b.records);
    assert_eq!(a.stats.active_cells, b.stats.active_cells);
}

#[test]
fn test_shared_face_crossings_are_merged() {
    // Two cells glued along face (1, 2, 3), sample 0 and 4 on opposite sides
    let positions = vec![
        Point3d::new(0.0, 0.0, -1.0),
        Point3d::new(1.0, 0.0, 0.0),
        Point3d::new(0.0, 1.0, 0.0),
        Point3d::new(-1.0, -1.0, 0.0),
        Point3d::new(0.0, 0.0, 1.0),
    ];
    let decomposition =
        TetDecomposition::from_tets(positions, &[[0, 1, 2, 3], [4, 1, 2, 3]]).unwrap();
    let values = [-1.0, 1.0, -1.0, 1.0, -1.0];

    let extraction =
        marching_tets(FieldBuffer::scalar(&values), &decomposition, &ExtractionConfig::default())
            .unwrap();

    // Each cell has a 2-2 split: 4 crossings each, 2 of them on the shared face
    assert_eq!(extraction.stats.active_cells, 2);
    assert_eq!(extraction.mesh.face_count(), 4);
    assert_eq!(extraction.mesh.vertex_count(), 6);
}

#[test]
fn test_iso_level() {
    let decomposition = grid(16);
    let values = sample_field(&decomposition, sphere_sdf(center(), 0.3));

    // The 0.25 level set of a distance to a 0.3 sphere is a 0.55 sphere
    let config = ExtractionConfig::default().with_iso_level(0.25);
    let extraction = marching_tets(FieldBuffer::scalar(&values), &decomposition, &config).unwrap();

    assert!(extraction.mesh.is_watertight());
    for v in &extraction.mesh.vertices {
        assert!(((v - center()).norm() - 0.55).abs() < 0.03);
    }
}

#[test]
fn test_multi_channel_dominant_pair() {
    let decomposition = grid(14);
    let values = sample_channels(&decomposition, 3, |p, out| {
        let d = (p - center()).norm() - 0.55;
        out[0] = -d;
        out[1] = d;
        out[2] = -10.0;
    })
    .unwrap();
    let field = FieldBuffer::with_channels(&values, 3).unwrap();

    let extraction = marching_tets(field, &decomposition, &ExtractionConfig::default()).unwrap();
    assert_eq!(extraction.channels, 3);
    assert!(extraction.mesh.is_watertight());
    assert!(extraction
        .records
        .iter()
        .all(|r| r.key.cut == Cut::Channels { a: 0, b: 1 }));

    // f0 - f1 is positive inside, so the surface faces inward
    assert!(enclosed_volume(&extraction.mesh) < 0.0);
}

#[test]
fn test_box_surface() {
    let decomposition = grid(20);
    let values = sample_field(&decomposition, box_sdf(center(), [0.5, 0.4, 0.3]));
    let extraction =
        marching_tets(FieldBuffer::scalar(&values), &decomposition, &ExtractionConfig::default())
            .unwrap();

    assert!(extraction.mesh.is_watertight());
    assert_relative_eq!(enclosed_volume(&extraction.mesh), 8.0 * 0.5 * 0.4 * 0.3, max_relative = 0.1);
}

#[test]
fn test_refinement_then_sampling() {
    let decomposition = grid(10);
    let values = sample_field(&decomposition, sphere_sdf(center(), 0.5));
    let extractor = MarchingTets::new(decomposition, ExtractionConfig::default()).unwrap();
    let field = FieldBuffer::scalar(&values);

    let midpoints = extractor
        .crossing_midpoints(field, &RefinementConfig::default())
        .unwrap();
    let extraction = extractor.extract(field).unwrap();
    assert!(midpoints.len() <= extraction.stats.active_cells);
    assert!(midpoints.len() > extraction.stats.active_cells / 2);

    let mut rng = StdRng::seed_from_u64(11);
    let samples = extractor
        .sample_error_density(field, &SamplingConfig::default().with_samples(500), &mut rng)
        .unwrap();
    let near = samples
        .iter()
        .filter(|p| ((*p - center()).norm() - 0.5).abs() < 0.3)
        .count();
    assert!(near > 300);
}

#[test]
fn test_rejection_sampling_concentrates_near_surface() {
    let decomposition = grid(9);
    let sdf = sphere_sdf(center(), 0.55);
    let values = sample_field(&decomposition, sdf);
    let extractor = MarchingTets::new(decomposition.clone(), ExtractionConfig::default()).unwrap();
    let bounds = decomposition.bounding_box();
    let mut rng = StdRng::seed_from_u64(21);

    let samples = extractor
        .sample_rejection(
            FieldBuffer::scalar(&values),
            &bounds,
            &SamplingConfig::default().with_samples(1000),
            &mut rng,
        )
        .unwrap();
    assert_eq!(samples.len(), 1000);

    let uniform: Vec<Point3d> = (0..1000)
        .map(|_| {
            Point3d::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
        })
        .collect();
    let mean_distance = |points: &[Point3d]| {
        points.iter().map(|p| sdf(p).abs()).sum::<f64>() / points.len() as f64
    };

    assert!(samples.iter().all(|p| p.coords.iter().all(|c| c.abs() <= 1.0)));
    assert!(mean_distance(&samples) < 0.7 * mean_distance(&uniform));
}
