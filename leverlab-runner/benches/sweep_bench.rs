//! Criterion benchmarks for the sweep scheduler.
//!
//! Benchmarks:
//! 1. A full SMA-cross sweep over synthetic candles, by worker count

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use leverlab_core::direction::Side;
use leverlab_core::signals::examples::SmaCross;
use leverlab_runner::{synthetic_candles, BacktestScheduler, GridConfig, SweepConfig};

fn bench_sweep(c: &mut Criterion) {
    let data = synthetic_candles("bench", 5_000, 60_000);
    let config = SweepConfig {
        grid: GridConfig {
            risk_reward: vec![1.5, 2.0, 3.0],
            account_pct_risk_per_trade: vec![0.01, 0.02],
            sl_based_on_lookback: vec![0, 3, 10],
            ..GridConfig::default()
        },
        ..SweepConfig::default()
    };

    let mut group = c.benchmark_group("sweep");
    group.sample_size(10);
    for workers in [1usize, 2, 4, 8] {
        let mut config = config.clone();
        config.scheduler.workers = workers;
        let scheduler = BacktestScheduler::new(
            config,
            Box::new(SmaCross::new(Side::Long, vec![5, 10, 20], vec![30, 50, 100])),
        );
        group.bench_with_input(BenchmarkId::new("sma_cross", workers), &workers, |b, _| {
            b.iter(|| scheduler.run(black_box(&data.candles)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sweep);
criterion_main!(benches);
