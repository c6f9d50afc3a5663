//! Benchmarks for timing statistics.

use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loadflow::stats::{compute_timings, format_duration};
use loadflow::testing::fixtures;

fn timings_benchmark(c: &mut Criterion) {
    let finalized = fixtures::record_at(6);
    let in_progress = fixtures::record_at(3);
    let now = fixtures::base_time() + Duration::hours(6);

    c.bench_function("compute_timings_finalized", |b| {
        b.iter(|| compute_timings(black_box(&finalized), black_box(now)));
    });
    c.bench_function("compute_timings_in_progress", |b| {
        b.iter(|| compute_timings(black_box(&in_progress), black_box(now)));
    });
    c.bench_function("format_duration", |b| {
        b.iter(|| format_duration(black_box(Duration::minutes(65))));
    });
}

criterion_group!(benches, timings_benchmark);
criterion_main!(benches);
