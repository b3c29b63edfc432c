//! Drift benchmark: PSI and KS over feature-sized columns.

use churn_pipeline::monitoring::{
    kolmogorov_smirnov_statistic, population_stability_index, DEFAULT_BUCKETS, DEFAULT_EPSILON,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn column(seed: u64, n: usize, shift: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen::<f64>() * 100.0 + shift).collect()
}

fn bench_psi(c: &mut Criterion) {
    let expected = column(1, 10_000, 0.0);
    let actual = column(2, 10_000, 5.0);

    c.bench_function("psi_10k", |b| {
        b.iter(|| {
            black_box(population_stability_index(
                black_box(&expected),
                black_box(&actual),
                DEFAULT_BUCKETS,
                DEFAULT_EPSILON,
            ))
        })
    });
}

fn bench_ks(c: &mut Criterion) {
    let expected = column(3, 10_000, 0.0);
    let actual = column(4, 10_000, 5.0);

    c.bench_function("ks_10k", |b| {
        b.iter(|| black_box(kolmogorov_smirnov_statistic(black_box(&expected), black_box(&actual))))
    });
}

criterion_group!(benches, bench_psi, bench_ks);
criterion_main!(benches);
