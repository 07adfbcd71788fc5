//! Criterion benchmarks for StateLab hot paths.
//!
//! Benchmarks:
//! 1. Indicator compute (single indicators and the snapshot stack)
//! 2. Snapshot + classify for one date
//! 3. Historical walk (quadratic in series length)
//! 4. Aggregation over a walk's records

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use statelab_core::aggregate::{aggregate, AggregateConfig};
use statelab_core::classify::classify;
use statelab_core::context::ExogenousContext;
use statelab_core::domain::Bar;
use statelab_core::indicators::{directional_index, Indicator, Macd, Rsi, Sma};
use statelab_core::snapshot::{compute_snapshot, SnapshotConfig};
use statelab_core::walk::{walk_history, WalkConfig};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0 + i as f64 * 0.02;
            let open = close - 0.3;
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: close + 1.5,
                low: open - 1.5,
                close,
                volume: 1_000_000.0 + (i % 500) as f64 * 1000.0,
            }
        })
        .collect()
}

// ── 1. Indicator Compute ─────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_compute");

    for &bar_count in &[252, 1260, 2520] {
        let bars = make_bars(bar_count);

        let sma = Sma::new(200);
        group.bench_with_input(BenchmarkId::new("sma_200", bar_count), &bars, |b, bars| {
            b.iter(|| sma.compute(black_box(bars)));
        });

        let rsi = Rsi::new(14);
        group.bench_with_input(BenchmarkId::new("rsi_14", bar_count), &bars, |b, bars| {
            b.iter(|| rsi.compute(black_box(bars)));
        });

        let macd = Macd::standard();
        group.bench_with_input(BenchmarkId::new("macd", bar_count), &bars, |b, bars| {
            b.iter(|| macd.lines(black_box(bars)));
        });

        group.bench_with_input(BenchmarkId::new("adx_14", bar_count), &bars, |b, bars| {
            b.iter(|| directional_index(black_box(bars), 14));
        });
    }

    group.finish();
}

// ── 2. Snapshot + Classify ───────────────────────────────────────────

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    let cfg = SnapshotConfig::default();
    let ctx = ExogenousContext::historical_default();

    for &bar_count in &[252, 2520] {
        let bars = make_bars(bar_count);
        group.bench_with_input(
            BenchmarkId::new("snapshot_classify", bar_count),
            &bars,
            |b, bars| {
                b.iter(|| {
                    let snap = compute_snapshot(black_box(bars), &cfg).unwrap();
                    classify(&snap, &ctx)
                });
            },
        );
    }

    group.finish();
}

// ── 3. Historical Walk ───────────────────────────────────────────────

fn bench_walk(c: &mut Criterion) {
    let mut group = c.benchmark_group("walk");
    group.sample_size(10);
    let ctx = ExogenousContext::historical_default();

    for &bar_count in &[504, 1260] {
        let bars = make_bars(bar_count);
        group.bench_with_input(BenchmarkId::new("step_1", bar_count), &bars, |b, bars| {
            b.iter(|| walk_history("BENCH", black_box(bars), &WalkConfig::default(), &ctx).unwrap());
        });
    }

    group.finish();
}

// ── 4. Aggregation ───────────────────────────────────────────────────

fn bench_aggregate(c: &mut Criterion) {
    let bars = make_bars(1260);
    let report = walk_history(
        "BENCH",
        &bars,
        &WalkConfig::default(),
        &ExogenousContext::historical_default(),
    )
    .unwrap();
    let cfg = AggregateConfig::default();

    c.bench_function("aggregate_1000_records", |b| {
        b.iter(|| aggregate("BENCH", black_box(&report.records), &cfg));
    });
}

criterion_group!(
    benches,
    bench_indicators,
    bench_snapshot,
    bench_walk,
    bench_aggregate
);
criterion_main!(benches);
