use criterion::{Criterion, criterion_group, criterion_main};
use docqa::knowledge::VectorIndex;
use std::hint::black_box;

const DIMENSION: usize = 768;
const CHUNKS: usize = 2_000;

fn pseudo_random_vectors(count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            (0..DIMENSION)
                .map(|_| {
                    state = state
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407);
                    (state >> 40) as f32 / (1u64 << 24) as f32
                })
                .collect()
        })
        .collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let vectors = pseudo_random_vectors(CHUNKS, 7);
    let index = VectorIndex::build(&vectors).expect("index builds");
    let query = pseudo_random_vectors(1, 11).remove(0);
    let bytes = index.to_bytes();

    c.bench_function("search_top3", |b| {
        b.iter(|| index.search(black_box(&query), black_box(3)))
    });
    c.bench_function("search_all", |b| {
        b.iter(|| index.search(black_box(&query), black_box(CHUNKS)))
    });
    c.bench_function("load_index", |b| {
        b.iter(|| VectorIndex::from_bytes(black_box(&bytes)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
