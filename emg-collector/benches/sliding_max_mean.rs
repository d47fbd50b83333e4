use criterion::{criterion_group, criterion_main, Criterion};
use emg_collector::numeric::sliding_max_mean;

pub fn sliding_max_mean_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("sliding_max_mean");

    let xs: Vec<f64> = (0..200_000usize)
        .map(|i| (i.wrapping_mul(2_654_435_761) % 10_000) as f64)
        .collect();

    group.bench_function("window_1000_over_200k_samples", |b| {
        b.iter(|| sliding_max_mean(&xs, 1000))
    });

    group.finish();
}

criterion_group!(benches, sliding_max_mean_bench);
criterion_main!(benches);
