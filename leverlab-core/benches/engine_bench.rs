//! Criterion benchmarks for LeverLab hot paths.
//!
//! Benchmarks:
//! 1. Frame build (SMA regime, cost alignment, rotation conversion)
//! 2. Routing every preset variant and compounding it
//! 3. Margin account fold over decades of daily data

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use leverlab_core::domain::{DatedValue, PricePoint};
use leverlab_core::engine::{
    route, Compounder, CostModel, CostParameters, DividendSource, FrameBuilder,
    MarginAccountSimulator, MarginInputs, MarketFrame, RegimeClassifier, StrategyVariant,
};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_prices(n: usize) -> Vec<PricePoint> {
    let base = NaiveDate::from_ymd_opt(1950, 1, 3).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.01).sin() * 20.0 + i as f64 * 0.01;
            PricePoint::new(base + chrono::Duration::days(i as i64), close)
        })
        .collect()
}

fn make_monthly(prices: &[PricePoint], value: f64) -> Vec<DatedValue> {
    prices
        .iter()
        .step_by(30)
        .map(|p| DatedValue::new(p.date, value))
        .collect()
}

struct Inputs {
    prices: Vec<PricePoint>,
    rates: Vec<DatedValue>,
    rotation: Vec<DatedValue>,
    cpi: Vec<DatedValue>,
    dividends: DividendSource,
}

fn make_inputs(n: usize) -> Inputs {
    let prices = make_prices(n);
    Inputs {
        rates: make_monthly(&prices, 4.5),
        rotation: make_monthly(&prices, 0.008),
        cpi: make_monthly(&prices, 250.0),
        dividends: DividendSource::Constant {
            annual_yield_pct: 2.0,
        },
        prices,
    }
}

fn build(inputs: &Inputs) -> MarketFrame {
    FrameBuilder::new(
        &inputs.prices,
        RegimeClassifier::default_params(),
        CostModel::new(CostParameters::default()),
    )
    .financing_rate(&inputs.rates)
    .rotation(&inputs.rotation)
    .dividends(&inputs.dividends)
    .build()
    .unwrap()
}

// ── 1. Frame Build ───────────────────────────────────────────────────

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_build");

    for &days in &[2520, 12_600, 25_200] {
        let inputs = make_inputs(days);
        group.bench_with_input(BenchmarkId::new("all_series", days), &days, |b, _| {
            b.iter(|| build(black_box(&inputs)));
        });
    }

    group.finish();
}

// ── 2. Routing + Compounding ─────────────────────────────────────────

fn bench_variants(c: &mut Criterion) {
    let mut group = c.benchmark_group("variants");
    let frame = build(&make_inputs(25_200));
    let compounder = Compounder::default();

    group.bench_function("presets_25200_days", |b| {
        b.iter(|| {
            for variant in StrategyVariant::presets() {
                let records = route(black_box(&frame), &variant).unwrap();
                black_box(compounder.compound(&records));
            }
        });
    });

    group.finish();
}

// ── 3. Margin Fold ───────────────────────────────────────────────────

fn bench_margin(c: &mut Criterion) {
    let mut group = c.benchmark_group("margin_account");

    for &days in &[2520, 25_200] {
        let inputs = make_inputs(days);
        let frame = build(&inputs);
        let margin = MarginInputs::from_frame(&frame, &inputs.rates, &inputs.cpi).unwrap();
        let sim = MarginAccountSimulator::default();
        group.bench_with_input(BenchmarkId::new("run", days), &days, |b, _| {
            b.iter(|| sim.run(black_box(&margin)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame, bench_variants, bench_margin);
criterion_main!(benches);
