use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ck_inference::causal::{PipelineConfig, match_nearest, run_pipeline};
use ck_inference::engagement::{EngagementDataConfig, generate_engagement_population};
use std::hint::black_box;

fn scores(n: usize, offset: f64) -> Vec<(u64, f64)> {
    (0..n as u64).map(|i| (i, ((i as f64 * 0.618_033_988_7 + offset) % 1.0).clamp(0.001, 0.999))).collect()
}

fn bench_match_nearest(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_nearest");
    for &n in &[1_000usize, 10_000, 100_000] {
        let treated = scores(n / 4, 0.1);
        let controls = scores(n, 0.3);
        group.bench_with_input(BenchmarkId::new("without_replacement", n), &n, |b, _| {
            b.iter(|| black_box(match_nearest(black_box(&treated), black_box(&controls), 0.01, false)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("with_replacement", n), &n, |b, _| {
            b.iter(|| black_box(match_nearest(black_box(&treated), black_box(&controls), 0.01, true)).unwrap())
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    for &n in &[2_000usize, 20_000] {
        let pop = generate_engagement_population(&EngagementDataConfig { n_units: n, ..Default::default() })
            .unwrap();
        let cfg = PipelineConfig::default();
        group.bench_with_input(BenchmarkId::new("engagement", n), &n, |b, _| {
            b.iter(|| black_box(run_pipeline(black_box(&pop), &cfg)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_match_nearest, bench_pipeline);
criterion_main!(benches);
