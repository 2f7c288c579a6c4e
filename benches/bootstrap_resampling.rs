//! Bootstrap resampling throughput benchmark
//!
//! A production comparison resamples tens of runs 33,333 times. This
//! benchmark measures the two hot paths:
//!
//! 1. `hierarchical_bootstrap_mean` - replicates of the mean of drawn runs
//! 2. `ChangePointDetector::compute_difference` - dampen, resample, estimate
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench bootstrap_resampling
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use phoenix::detection::{
    hierarchical_bootstrap_mean, ChangePointDetector, DetectorConfig, ResampleLevel,
    DEFAULT_MEMORY_LIMIT,
};
use phoenix::run_size::RunSizeSpec;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

fn bench_runs(runs: usize, iterations: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..runs)
        .map(|_| {
            (0..iterations)
                .map(|_| 100.0 * (1.0 + rng.gen_range(-0.05..0.05)))
                .collect()
        })
        .collect()
}

fn bench_bootstrap_mean(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchical_bootstrap_mean");
    for &runs in &[10usize, 30, 100] {
        let data = bench_runs(runs, 50, 1);
        group.bench_with_input(BenchmarkId::new("runs", runs), &data, |b, data| {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
            b.iter(|| {
                hierarchical_bootstrap_mean(
                    black_box(data),
                    data.len(),
                    10_000,
                    ResampleLevel::Runs,
                    DEFAULT_MEMORY_LIMIT,
                    &mut rng,
                )
            })
        });
    }
    group.finish();
}

fn bench_two_level(c: &mut Criterion) {
    let data = bench_runs(30, 50, 2);
    c.bench_function("hierarchical_bootstrap_mean_two_level", |b| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        b.iter(|| {
            hierarchical_bootstrap_mean(
                black_box(&data),
                data.len(),
                1_000,
                ResampleLevel::RunsAndIterations,
                DEFAULT_MEMORY_LIMIT,
                &mut rng,
            )
        })
    });
}

fn bench_compute_difference(c: &mut Criterion) {
    let old = bench_runs(30, 50, 3);
    let new = bench_runs(30, 50, 4);
    let detector = ChangePointDetector::new(DetectorConfig::default().with_boots(10_000).with_seed(5))
        .expect("valid benchmark configuration");

    c.bench_function("compute_difference_30_runs", |b| {
        b.iter(|| detector.compute_difference(black_box(&old), black_box(&new), &RunSizeSpec::all()))
    });
}

criterion_group!(
    benches,
    bench_bootstrap_mean,
    bench_two_level,
    bench_compute_difference
);
criterion_main!(benches);
