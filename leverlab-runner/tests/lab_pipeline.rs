//! End-to-end tests: CSV files on disk → config → loader → lab run → cache
//! and artifacts.

use std::path::Path;
use std::time::Duration;

use chrono::{Datelike, Duration as Days, NaiveDate, Weekday};
use leverlab_core::EngineError;
use leverlab_runner::{
    load_market_data, run_lab, run_lab_cached, run_rebase, save_artifacts, JsonDirCache,
    LabConfig, LoadOptions, MemoryCache, ResultCache, RunError,
};

const CONFIG: &str = r#"
[strategy]
leverage = 3.0
sma_window = 5

[margin]
base_limit = 2000.0

[data]
prices = "spx.csv"
financing_rate = "tbill.csv"
margin_rate = "fedfunds.csv"
cpi = "cpi.csv"
"#;

fn weekdays(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d);
        }
        d += Days::days(1);
    }
    out
}

/// Rising for 40 days, falling for 20, rising again.
fn write_fixture(dir: &Path) {
    let dates = weekdays(NaiveDate::from_ymd_opt(2022, 11, 1).unwrap(), 120);
    let mut close = 100.0_f64;
    let mut prices = String::from("date,close\n");
    for (i, d) in dates.iter().enumerate() {
        close *= match i {
            0..=39 => 1.004,
            40..=59 => 0.99,
            _ => 1.003,
        };
        prices.push_str(&format!("{d},{close:.4}\n"));
    }
    std::fs::write(dir.join("spx.csv"), prices).unwrap();

    let months = [
        "2022-11-01", "2022-12-01", "2023-01-01", "2023-02-01", "2023-03-01", "2023-04-01",
    ];
    let mut tbill = String::from("date,value\n");
    let mut fedfunds = String::from("date,value\n");
    let mut cpi = String::from("date,value\n");
    for (i, m) in months.iter().enumerate() {
        tbill.push_str(&format!("{m},{}\n", 4.0 + 0.1 * i as f64));
        // FRED writes '.' for a missing observation
        if i == 3 {
            fedfunds.push_str(&format!("{m},.\n"));
        } else {
            fedfunds.push_str(&format!("{m},{}\n", 4.5 + 0.1 * i as f64));
        }
        cpi.push_str(&format!("{m},{}\n", 298.0 + i as f64));
    }
    std::fs::write(dir.join("tbill.csv"), tbill).unwrap();
    std::fs::write(dir.join("fedfunds.csv"), fedfunds).unwrap();
    std::fs::write(dir.join("cpi.csv"), cpi).unwrap();
    std::fs::write(dir.join("lab.toml"), CONFIG).unwrap();
}

fn load(dir: &Path) -> (LabConfig, leverlab_runner::MarketData) {
    let config = LabConfig::from_file(&dir.join("lab.toml")).unwrap();
    let data = load_market_data(&config.data, &LoadOptions::default()).unwrap();
    (config, data)
}

#[test]
fn csv_pipeline_runs_and_skips_rotation() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());

    let report = run_lab(&config, &data).unwrap();
    assert!(!report.has_synthetic);
    assert_eq!(report.regime.len(), 120);

    let labels: Vec<&str> = report.variants.iter().map(|v| v.label.as_str()).collect();
    assert_eq!(labels, ["buy_hold", "leveraged_buy_hold", "leveraged_regime"]);

    let skipped: Vec<&str> = report.skipped.iter().map(|s| s.view.as_str()).collect();
    assert!(skipped.contains(&"leveraged_rotation"));
    assert!(skipped.contains(&"leveraged_regime_dividends"));

    let margin = report.margin.as_ref().unwrap();
    assert_eq!(margin.ledger.len(), 120);
    assert!(margin.ledger.iter().any(|d| d.in_market));

    let annual = report.annual.as_ref().unwrap();
    assert_eq!(annual.real.len(), 3);
    assert!(annual.dividend_reinvested.is_empty());
}

#[test]
fn regime_gate_sits_out_the_decline() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());
    let report = run_lab(&config, &data).unwrap();

    let gated = report.variant("leveraged_regime").unwrap();
    let always = report.variant("leveraged_buy_hold").unwrap();
    let trough = 59;
    assert!(gated.growth[trough].value > always.growth[trough].value);
    assert!(gated.metrics.max_drawdown > always.metrics.max_drawdown);
}

#[test]
fn identical_inputs_give_identical_reports() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());
    let a = run_lab(&config, &data).unwrap();
    let b = run_lab(&config, &data).unwrap();
    assert_eq!(a, b);
}

#[test]
fn memory_cache_serves_second_run() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());

    let cache = MemoryCache::new(Duration::from_secs(300));
    let first = run_lab_cached(&config, &data, &cache).unwrap();
    assert_eq!(cache.len(), 1);
    let second = run_lab_cached(&config, &data, &cache).unwrap();
    assert_eq!(first, second);
}

#[test]
fn json_dir_cache_persists_by_run_id() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());

    let cache_dir = dir.path().join("cache");
    let cache = JsonDirCache::new(&cache_dir).unwrap();
    let report = run_lab_cached(&config, &data, &cache).unwrap();
    assert!(cache.contains(&report.run_id));

    let reopened = JsonDirCache::new(&cache_dir).unwrap();
    let hit = reopened.get(&report.run_id).unwrap().unwrap();
    assert_eq!(hit, report);
}

#[test]
fn changed_config_misses_cache() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());

    let cache = MemoryCache::new(Duration::from_secs(300));
    run_lab_cached(&config, &data, &cache).unwrap();
    let mut other = config.clone();
    other.strategy.leverage = 2.0;
    let report = run_lab_cached(&other, &data, &cache).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(report.config.strategy.leverage, 2.0);
}

#[test]
fn rebased_path_is_full_path_rescaled() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());

    let full = run_lab(&config, &data).unwrap();
    let (s, e) = (30, 90);
    let start = full.regime[s].date;
    let end = full.regime[e].date;
    let rebased = run_rebase(&config, &data, start, end).unwrap();

    for v in &rebased.variants {
        let path = &full.variant(&v.label).unwrap().growth;
        assert_eq!(v.growth.len(), e - s + 1);
        for (k, g) in v.growth.iter().enumerate() {
            let expected = 10_000.0 * path[s + k].value / path[s].value;
            assert!((g.value - expected).abs() < 1e-6, "{} day {k}", v.label);
        }
    }
}

#[test]
fn reversed_window_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());
    let start = data.prices[50].date;
    let end = data.prices[10].date;
    let err = run_rebase(&config, &data, start, end).unwrap_err();
    assert!(matches!(
        err,
        RunError::Engine(EngineError::InvalidRange { .. })
    ));
}

#[test]
fn unsorted_prices_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, mut data) = load(dir.path());
    data.prices.swap(3, 4);
    let err = run_lab(&config, &data).unwrap_err();
    assert!(matches!(
        err,
        RunError::Engine(EngineError::MalformedSeries { series: "prices", .. })
    ));
}

#[test]
fn artifacts_land_under_run_id() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let (config, data) = load(dir.path());
    let report = run_lab(&config, &data).unwrap();

    let out = dir.path().join("out");
    let run_dir = save_artifacts(&report, &out).unwrap();
    assert!(run_dir.starts_with(&out));
    let growth = std::fs::read_to_string(run_dir.join("growth.csv")).unwrap();
    assert_eq!(growth.lines().count(), 121);
}
