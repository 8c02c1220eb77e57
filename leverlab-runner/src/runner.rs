//! Lab runner: wires together frame building, routing, margin and metrics.
//!
//! Entry points:
//! - `run_lab()`: every preset variant, the margin ledger and annual views.
//! - `run_lab_cached()`: the same behind an injected `ResultCache`.
//! - `run_rebase()`: value paths re-invested at a sub-window start.
//! - `run_margin()`: the margin ledger alone, optionally windowed.
//! - `run_annual()`: year-level inflation and dividend views.
//!
//! Views that need an optional series the run does not have are skipped and
//! listed in the report; malformed input fails the whole run.

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use leverlab_core::domain::{DailyReturnRecord, DatedValue, GrowthPoint, MarginDay};
use leverlab_core::engine::{
    annual, route, AnnualPoint, DividendSource, Exposure, FrameBuilder, MarginInputs,
    MarginParameters, MarketFrame, RotationIndex, StrategyVariant,
};
use leverlab_core::EngineError;

use crate::cache::ResultCache;
use crate::config::{ConfigError, LabConfig, RunId};
use crate::data_loader::{LoadError, MarketData};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// A view that was not produced, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedView {
    pub view: String,
    pub reason: String,
}

/// Regime state for one day, for charting against the value paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeDay {
    pub date: NaiveDate,
    pub close: f64,
    /// `None` during the moving-average warmup.
    pub sma: Option<f64>,
    /// SMA on the buy-and-hold value scale: `growth * sma / close`.
    pub scaled_sma: Option<f64>,
    pub regime_on: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    pub label: String,
    pub variant: StrategyVariant,
    pub records: Vec<DailyReturnRecord>,
    pub growth: Vec<GrowthPoint>,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginReport {
    pub params: MarginParameters,
    pub ledger: Vec<MarginDay>,
    pub metrics: PerformanceMetrics,
    pub underfunded_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSeries {
    pub label: String,
    pub points: Vec<AnnualPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualReport {
    /// Year-end nominal and CPI-deflated value per variant.
    pub real: Vec<AnnualSeries>,
    /// Annual dividend reinvestment on top of price growth, deflated.
    pub dividend_reinvested: Vec<AnnualSeries>,
    /// CPI CAGR between the first and last full year of the price series.
    pub cpi_cagr: Option<f64>,
    pub rotation_index: Option<RotationIndex>,
    /// Reference margin rate plus spread per observation.
    pub margin_rate: Option<Vec<DatedValue>>,
    pub skipped: Vec<SkippedView>,
}

/// Complete result of a lab run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub config: LabConfig,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub regime: Vec<RegimeDay>,
    /// Variants in preset order.
    pub variants: Vec<VariantReport>,
    pub margin: Option<MarginReport>,
    pub annual: Option<AnnualReport>,
    pub skipped: Vec<SkippedView>,
}

impl LabReport {
    pub fn variant(&self, label: &str) -> Option<&VariantReport> {
        self.variants.iter().find(|v| v.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebasedVariant {
    pub label: String,
    pub growth: Vec<GrowthPoint>,
    pub metrics: PerformanceMetrics,
}

/// Value paths re-invested at `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebaseReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub variants: Vec<RebasedVariant>,
    pub margin: Option<MarginReport>,
    pub skipped: Vec<SkippedView>,
}

// ─── Building blocks ────────────────────────────────────────────────

fn dividend_source(config: &LabConfig, data: &MarketData) -> Option<DividendSource> {
    match (&data.dividend_yield, config.dividends.annual_yield_pct) {
        (Some(series), _) => Some(DividendSource::Series(series.clone())),
        (None, Some(annual_yield_pct)) => Some(DividendSource::Constant { annual_yield_pct }),
        (None, None) => None,
    }
}

/// Align every input of the run onto the price calendar.
pub fn build_frame(config: &LabConfig, data: &MarketData) -> Result<MarketFrame, RunError> {
    let dividends = dividend_source(config, data);
    let mut builder = FrameBuilder::new(&data.prices, config.classifier(), config.cost_model());
    if let Some(rates) = &data.financing_rate {
        builder = builder.financing_rate(rates);
    } else {
        warn!("no financing-rate series, leveraged variants carry expense only");
    }
    if let Some(rotation) = &data.rotation {
        builder = builder.rotation(rotation);
    }
    if let Some(source) = &dividends {
        builder = builder.dividends(source);
    }
    Ok(builder.build()?)
}

/// Margin inputs for the frame, or `MissingSeries` without rate or CPI.
pub fn margin_inputs(frame: &MarketFrame, data: &MarketData) -> Result<MarginInputs, EngineError> {
    let rate = data
        .margin_rate
        .as_deref()
        .ok_or(EngineError::MissingSeries {
            series: "margin_rate",
        })?;
    let cpi = data
        .cpi
        .as_deref()
        .ok_or(EngineError::MissingSeries { series: "cpi" })?;
    MarginInputs::from_frame(frame, rate, cpi)
}

/// Keep the value, skip the view on a recoverable error, fail otherwise.
fn skip_recoverable<T>(
    view: &str,
    result: Result<T, EngineError>,
    skipped: &mut Vec<SkippedView>,
) -> Result<Option<T>, RunError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_recoverable() => {
            warn!(view, error = %e, "skipping view");
            skipped.push(SkippedView {
                view: view.to_string(),
                reason: e.to_string(),
            });
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

type Routed = (StrategyVariant, Result<Vec<DailyReturnRecord>, EngineError>);

fn route_presets(frame: &MarketFrame) -> Vec<Routed> {
    // collect() on an indexed parallel iterator keeps preset order
    StrategyVariant::presets()
        .into_par_iter()
        .map(|variant| {
            let records = route(frame, &variant);
            (variant, records)
        })
        .collect()
}

fn regime_days(frame: &MarketFrame, buy_hold: Option<&[GrowthPoint]>) -> Vec<RegimeDay> {
    (0..frame.len())
        .map(|i| {
            let sma = Some(frame.sma[i]).filter(|s| s.is_finite());
            let close = frame.closes[i];
            let scaled_sma = match (sma, buy_hold) {
                (Some(s), Some(path)) if close > 0.0 => Some(path[i].value * s / close),
                _ => None,
            };
            RegimeDay {
                date: frame.dates[i],
                close,
                sma,
                scaled_sma,
                regime_on: frame.regime[i],
            }
        })
        .collect()
}

fn margin_report(params: MarginParameters, ledger: Vec<MarginDay>) -> MarginReport {
    let underfunded_entries = ledger.iter().filter(|d| d.underfunded_entry).count();
    if underfunded_entries > 0 {
        warn!(underfunded_entries, "margin ledger has underfunded entries");
    }
    MarginReport {
        params,
        metrics: PerformanceMetrics::from_margin(&ledger),
        ledger,
        underfunded_entries,
    }
}

// ─── Entry points ───────────────────────────────────────────────────

/// Run every preset variant, the margin ledger and the annual views.
pub fn run_lab(config: &LabConfig, data: &MarketData) -> Result<LabReport, RunError> {
    config.validate()?;
    let run_id = config.run_id(&data.dataset_hash)?;
    let frame = build_frame(config, data)?;
    info!(days = frame.len(), run_id = %&run_id[..12], "frame built");

    let compounder = config.compounder();
    let mut skipped = Vec::new();
    let mut variants = Vec::new();

    for (variant, result) in route_presets(&frame) {
        let label = variant.label();
        if let Some(records) = skip_recoverable(&label, result, &mut skipped)? {
            let growth = compounder.compound(&records);
            let metrics = PerformanceMetrics::from_variant(&growth, &records);
            variants.push(VariantReport {
                label,
                variant,
                records,
                growth,
                metrics,
            });
        }
    }

    let margin = skip_recoverable("margin", margin_inputs(&frame, data), &mut skipped)?.map(
        |inputs| margin_report(config.margin, config.margin_simulator().run(&inputs)),
    );

    let annual = skip_recoverable("annual", annual_views(config, data, &variants), &mut skipped)?;

    let buy_hold = variants
        .iter()
        .find(|v| v.variant == StrategyVariant::buy_hold())
        .map(|v| v.growth.as_slice());
    let regime = regime_days(&frame, buy_hold);

    info!(
        variants = variants.len(),
        skipped = skipped.len(),
        margin = margin.is_some(),
        "lab run complete"
    );

    Ok(LabReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.has_synthetic,
        config: config.clone(),
        start_date: frame.dates.first().copied(),
        end_date: frame.dates.last().copied(),
        regime,
        variants,
        margin,
        annual,
        skipped,
    })
}

/// `run_lab` behind a cache. Cache failures are logged and the run proceeds.
pub fn run_lab_cached(
    config: &LabConfig,
    data: &MarketData,
    cache: &dyn ResultCache,
) -> Result<LabReport, RunError> {
    let run_id = config.run_id(&data.dataset_hash)?;
    match cache.get(&run_id) {
        Ok(Some(report)) => {
            info!(run_id = %&run_id[..12], "cache hit");
            return Ok(report);
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "cache read failed, recomputing"),
    }

    let report = run_lab(config, data)?;
    if let Err(e) = cache.set(&run_id, &report) {
        warn!(error = %e, "cache write failed");
    }
    Ok(report)
}

/// Re-invest the initial capital at `start` for every variant and restart
/// the margin account there.
pub fn run_rebase(
    config: &LabConfig,
    data: &MarketData,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RebaseReport, RunError> {
    config.validate()?;
    let frame = build_frame(config, data)?;
    // reject a bad window before any routing work
    let range = frame.window_range(start, end)?;

    let compounder = config.compounder();
    let mut skipped = Vec::new();
    let mut variants = Vec::new();

    for (variant, result) in route_presets(&frame) {
        let label = variant.label();
        if let Some(records) = skip_recoverable(&label, result, &mut skipped)? {
            let growth = compounder.rebase(&records, start, end)?;
            let metrics = PerformanceMetrics::from_variant(&growth, &records[range.clone()]);
            variants.push(RebasedVariant {
                label,
                growth,
                metrics,
            });
        }
    }

    let margin = match skip_recoverable("margin", margin_inputs(&frame, data), &mut skipped)? {
        Some(inputs) => {
            let ledger = config.margin_simulator().rebase(&inputs, start, end)?;
            Some(margin_report(config.margin, ledger))
        }
        None => None,
    };

    Ok(RebaseReport {
        start,
        end,
        variants,
        margin,
        skipped,
    })
}

/// The margin ledger alone, over the full history or `[start, end]`.
pub fn run_margin(
    config: &LabConfig,
    data: &MarketData,
    window: Option<(NaiveDate, NaiveDate)>,
) -> Result<MarginReport, RunError> {
    config.validate()?;
    let frame = build_frame(config, data)?;
    let inputs = margin_inputs(&frame, data)?;
    let sim = config.margin_simulator();
    let ledger = match window {
        Some((start, end)) => sim.rebase(&inputs, start, end)?,
        None => sim.run(&inputs),
    };
    Ok(margin_report(config.margin, ledger))
}

/// Year-level views for the unlevered and always-on leveraged paths.
pub fn run_annual(config: &LabConfig, data: &MarketData) -> Result<AnnualReport, RunError> {
    config.validate()?;
    let frame = build_frame(config, data)?;
    let compounder = config.compounder();
    let mut variants = Vec::new();
    for variant in [StrategyVariant::buy_hold(), StrategyVariant::leveraged_buy_hold()] {
        let records = route(&frame, &variant)?;
        let growth = compounder.compound(&records);
        variants.push(VariantReport {
            label: variant.label(),
            variant,
            metrics: PerformanceMetrics::from_variant(&growth, &records),
            records,
            growth,
        });
    }
    Ok(annual_views(config, data, &variants)?)
}

/// Dividend observations for the annual view: the series, or the constant
/// yield once per calendar year of the price series.
fn annual_dividend_yields(config: &LabConfig, data: &MarketData) -> Option<Vec<DatedValue>> {
    if let Some(series) = &data.dividend_yield {
        return Some(series.clone());
    }
    let y = config.dividends.annual_yield_pct?;
    let mut out: Vec<DatedValue> = Vec::new();
    for p in &data.prices {
        let new_year = out.last().map_or(true, |last| last.date.year() != p.date.year());
        if new_year {
            out.push(DatedValue::new(p.date, y));
        }
    }
    Some(out)
}

fn annual_views(
    config: &LabConfig,
    data: &MarketData,
    variants: &[VariantReport],
) -> Result<AnnualReport, EngineError> {
    let cpi = data
        .cpi
        .as_deref()
        .ok_or(EngineError::MissingSeries { series: "cpi" })?;

    let mut real = Vec::with_capacity(variants.len());
    for v in variants {
        real.push(AnnualSeries {
            label: v.label.clone(),
            points: annual::inflation_adjusted(&v.growth, cpi)?,
        });
    }

    let mut skipped = Vec::new();
    let mut dividend_reinvested = Vec::new();
    match annual_dividend_yields(config, data) {
        Some(yields) => {
            for v in variants.iter().filter(|v| !v.variant.needs_rotation() && !v.variant.dividends) {
                let multiple = match v.variant.exposure {
                    Exposure::Unlevered => 1.0,
                    Exposure::Leveraged => config.dividends.annual_multiple,
                };
                dividend_reinvested.push(AnnualSeries {
                    label: v.label.clone(),
                    points: annual::dividend_reinvested(
                        &v.growth,
                        &yields,
                        cpi,
                        multiple,
                        config.strategy.initial_capital,
                    )?,
                });
            }
        }
        None => skipped.push(SkippedView {
            view: "annual.dividend_reinvested".into(),
            reason: "no dividend yield configured".into(),
        }),
    }

    let cpi_cagr = match (data.prices.first(), data.prices.last()) {
        (Some(first), Some(last)) => annual::cpi_cagr(cpi, first.date.year(), last.date.year()),
        _ => None,
    };

    Ok(AnnualReport {
        real,
        dividend_reinvested,
        cpi_cagr,
        rotation_index: data.rotation.as_deref().map(annual::rotation_index),
        margin_rate: data
            .margin_rate
            .as_deref()
            .map(|r| annual::margin_rate_view(r, config.margin.spread_pct)),
        skipped,
    })
}
