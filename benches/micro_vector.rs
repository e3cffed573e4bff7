#![forbid(unsafe_code)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera::primitives::concurrency::Deadline;
use tessera::vector::{HnswIndex, HnswParams, VectorMetric};
use tessera::NodeId;

const DIMS: usize = 128;
const POINTS: usize = 5_000;

fn random_vectors(count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..DIMS).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}

fn build(points: &[Vec<f32>], metric: VectorMetric) -> HnswIndex {
    let params = HnswParams {
        dimensions: DIMS,
        m: 16,
        ef_construction: 200,
        metric,
    };
    let mut index = HnswIndex::new(params, 7);
    for (i, v) in points.iter().enumerate() {
        index.insert(NodeId(i as u64 + 1), v).expect("insert");
    }
    index
}

fn micro_vector(c: &mut Criterion) {
    let points = random_vectors(POINTS, 1);
    let queries = random_vectors(64, 2);

    let mut group = c.benchmark_group("micro/vector");
    group.sample_size(10);
    group.throughput(Throughput::Elements(POINTS as u64));
    group.bench_function("build_5k", |b| {
        b.iter(|| build(&points, VectorMetric::Cosine));
    });
    group.finish();

    let mut group = c.benchmark_group("micro/vector");
    for metric in [VectorMetric::Cosine, VectorMetric::Euclidean] {
        let index = build(&points, metric);
        for ef in [50usize, 200] {
            group.throughput(Throughput::Elements(queries.len() as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("search_{}", metric.as_str()), ef),
                &ef,
                |b, &ef| {
                    b.iter(|| {
                        let deadline = Deadline::default();
                        for q in &queries {
                            index.search(q, 10, ef, &deadline).expect("search");
                        }
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, micro_vector);
criterion_main!(benches);
