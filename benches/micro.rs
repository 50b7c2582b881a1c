// Copyright 2026 Milvus-Bench Authors
//
// Licensed under the Apache License, Version 2.0

//! Microbenchmarks for the harness hot paths: latency recording, percentile
//! aggregation, and recall scoring.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use milvus_bench::harness::recall::recall_at_k;
use milvus_bench::harness::tracker::{LatencyStats, LatencyTracker};

fn samples(n: usize) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    (0..n).map(|_| rng.random_range(0.1..250.0)).collect()
}

fn bench_latency_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("latency_stats");
    for n in [1_000usize, 10_000, 100_000] {
        let data = samples(n);
        group.bench_with_input(BenchmarkId::new("from_samples", n), &data, |b, data| {
            b.iter(|| LatencyStats::from_samples(data))
        });
    }
    group.finish();
}

fn bench_tracker_record(c: &mut Criterion) {
    c.bench_function("tracker_record", |b| {
        let tracker = LatencyTracker::new();
        b.iter(|| {
            tracker.record_ms(1.25);
            // keep the sample buffer bounded
            if tracker.len() >= 1_000_000 {
                tracker.reset();
            }
        });
    });
}

fn bench_recall(c: &mut Criterion) {
    let mut group = c.benchmark_group("recall_at_k");
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for k in [10usize, 100] {
        let result: Vec<i64> = (0..k as i64).collect();
        let truth: Vec<i64> = (0..k).map(|_| rng.random_range(0..k as i64 * 2)).collect();
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| recall_at_k(&result, &truth, k))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_latency_stats,
    bench_tracker_record,
    bench_recall
);
criterion_main!(benches);
