//! Benchmarks for marching tetrahedra extraction at several grid sizes and
//! thread counts

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mcmt_core::{FieldBuffer, Point3d, TetDecomposition};
use mcmt_extraction::{sample_field, sphere_sdf, ExtractionConfig, MarchingTets};
use std::sync::Arc;

fn sphere_grid(size: usize) -> (Arc<TetDecomposition>, Vec<f64>) {
    let spacing = 2.0 / (size - 1) as f64;
    let decomposition = Arc::new(
        TetDecomposition::from_grid([size; 3], [spacing; 3], Point3d::new(-1.0, -1.0, -1.0))
            .unwrap(),
    );
    let values = sample_field(&decomposition, sphere_sdf(Point3d::origin(), 0.75));
    (decomposition, values)
}

fn bench_extraction(c: &mut Criterion) {
    let sizes = [16, 32, 64];
    let threads = [1, 4];

    let mut group = c.benchmark_group("marching_tets");

    for &size in &sizes {
        let (decomposition, values) = sphere_grid(size);
        let cells = decomposition.cell_count();

        for &thread_count in &threads {
            let config = ExtractionConfig::default().with_threads(thread_count);
            let extractor = MarchingTets::new(decomposition.clone(), config).unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("{}t", thread_count), format!("{}c", cells)),
                &values,
                |b, values| {
                    b.iter(|| {
                        let extraction = extractor.extract(FieldBuffer::scalar(black_box(values))).unwrap();
                        black_box(extraction);
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_decomposition(c: &mut Criterion) {
    let mut group = c.benchmark_group("kuhn_decomposition");

    for &size in &[16usize, 32, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let decomposition =
                    TetDecomposition::from_grid([size; 3], [1.0; 3], Point3d::origin()).unwrap();
                black_box(decomposition);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extraction, bench_decomposition);
criterion_main!(benches);
