//! Test-driver benchmarks: full runs over fixed sample streams.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rlaudit_core::betting::{AdaptiveComparison, AgrapaBet};
use rlaudit_core::estim::ShrinkTruncEstimator;
use rlaudit_core::{
    AlphaMart, BettingMart, BettingStrategy, ErrorRates, Estimator, SampleFromList, TestConfig,
    TraceMode,
};

const N: usize = 10_000;

fn polling_values(n: usize) -> Vec<f64> {
    // Winner, loser, other, winner, winner.
    [1.0, 0.0, 0.5, 1.0, 1.0].iter().copied().cycle().take(n).collect()
}

fn bench_alpha(c: &mut Criterion) {
    let mut group = c.benchmark_group("alpha_mart");
    let values = polling_values(N);

    for &max in &[100usize, 1_000, N] {
        let config = TestConfig::new(0.05, N, true, 1.0).expect("valid");
        let estimator = ShrinkTruncEstimator::new(N, true, 1.0, 1.0e-6, 0.7, 0.1, 100, 0.0)
            .expect("valid");
        let mut mart = AlphaMart::new(Estimator::ShrinkTrunc(estimator), config)
            .expect("valid")
            .with_trace_mode(TraceMode::Off);
        group.bench_with_input(BenchmarkId::new("shrink_trunc", max), &max, |b, &max| {
            b.iter(|| {
                let mut source = SampleFromList::new(values.clone());
                criterion::black_box(mart.test_h0_from(max, false, &mut source))
            });
        });
    }
    group.finish();
}

fn bench_betting(c: &mut Criterion) {
    let mut group = c.benchmark_group("betting_mart");
    let noerror = 1.0 / 1.9;
    let comparison: Vec<f64> = (0..N)
        .map(|i| if i % 250 == 7 { 0.5 * noerror } else { noerror })
        .collect();

    let adaptive = AdaptiveComparison::with_rates(
        N,
        true,
        noerror,
        100,
        ErrorRates::new(1.0e-4, 1.0e-3, 1.0e-3, 1.0e-4).expect("valid"),
    )
    .expect("valid");
    let config = TestConfig::new(0.05, N, true, 2.0 * noerror).expect("valid");
    let mut mart = BettingMart::new(BettingStrategy::AdaptiveComparison(adaptive), config)
        .expect("valid")
        .with_trace_mode(TraceMode::Off);
    group.bench_function("adaptive_comparison_1000", |b| {
        b.iter(|| {
            let mut source = SampleFromList::new(comparison.clone());
            criterion::black_box(mart.test_h0_from(1_000, false, &mut source))
        });
    });

    let agrapa = AgrapaBet::new(N, true, 1.0, 0.0, 0.5, 0.9, 0.0).expect("valid");
    let config = TestConfig::new(0.05, N, true, 1.0).expect("valid");
    let mut mart = BettingMart::new(BettingStrategy::Agrapa(agrapa), config)
        .expect("valid")
        .with_trace_mode(TraceMode::Off);
    let values = polling_values(N);
    group.bench_function("agrapa_1000", |b| {
        b.iter(|| {
            let mut source = SampleFromList::new(values.clone());
            criterion::black_box(mart.test_h0_from(1_000, false, &mut source))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_alpha, bench_betting);
criterion_main!(benches);
