//! Performance metrics: pure functions over a value path.
//!
//! Every metric is a pure function: value path in, scalar out. No
//! dependencies on the runner, the loaders or the cache.

use serde::{Deserialize, Serialize};

use leverlab_core::domain::{DailyReturnRecord, GrowthPoint, MarginDay};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics for one variant's value path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub final_value: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    /// Days on which the regime gate had the position on.
    pub days_in_market: usize,
    pub trading_days: usize,
}

impl PerformanceMetrics {
    /// Metrics for a routed variant.
    pub fn from_variant(path: &[GrowthPoint], records: &[DailyReturnRecord]) -> Self {
        let values: Vec<f64> = path.iter().map(|p| p.value).collect();
        let days_in_market = records.iter().filter(|r| r.regime_on).count();
        Self::compute(&values, days_in_market)
    }

    /// Metrics for the margin ledger, measured on equity.
    ///
    /// Equity starts at zero, so return ratios are undefined and reported as
    /// 0; drawdown and final value still carry information.
    pub fn from_margin(ledger: &[MarginDay]) -> Self {
        let equity: Vec<f64> = ledger.iter().map(|d| d.equity()).collect();
        let days_in_market = ledger.iter().filter(|d| d.in_market).count();
        Self::compute(&equity, days_in_market)
    }

    pub fn compute(values: &[f64], days_in_market: usize) -> Self {
        let trading_days = values.len();
        Self {
            final_value: values.last().copied().unwrap_or(0.0),
            total_return: total_return(values),
            cagr: cagr(values, trading_days),
            sharpe: sharpe_ratio(values, 0.0),
            sortino: sortino_ratio(values, 0.0),
            calmar: calmar_ratio(values, trading_days),
            max_drawdown: max_drawdown(values),
            days_in_market,
            trading_days,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

fn endpoints(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    Some((*values.first()?, *values.last()?))
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(values: &[f64]) -> f64 {
    match endpoints(values) {
        Some((initial, last)) if initial > 0.0 => (last - initial) / initial,
        _ => 0.0,
    }
}

/// Compound Annual Growth Rate over a 252-day year.
///
/// Returns 0.0 for a single point or a non-positive endpoint.
pub fn cagr(values: &[f64], trading_days: usize) -> f64 {
    let Some((initial, last)) = endpoints(values) else {
        return 0.0;
    };
    if trading_days < 2 || initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / TRADING_DAYS_PER_YEAR;
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(values: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(values);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
pub fn sortino_ratio(values: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(values);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let downside: f64 = excess.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    if downside == 0.0 {
        return 0.0;
    }
    let downside_std = (downside / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean_f64(&excess) / downside_std) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Calmar ratio: CAGR / |max_drawdown|.
pub fn calmar_ratio(values: &[f64], trading_days: usize) -> f64 {
    let c = cagr(values, trading_days);
    let dd = max_drawdown(values);
    if dd >= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            max_dd = max_dd.min((v - peak) / peak);
        }
    }
    max_dd
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Day-over-day returns of a value path; 0 after a non-positive value.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_return_basic() {
        assert!((total_return(&[100.0, 150.0]) - 0.5).abs() < 1e-12);
        assert_eq!(total_return(&[100.0]), 0.0);
    }

    #[test]
    fn cagr_one_year_doubling() {
        let mut values = vec![100.0; 252];
        values[251] = 200.0;
        assert!((cagr(&values, 252) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cagr_zero_on_wipeout() {
        assert_eq!(cagr(&[100.0, 0.0], 2), 0.0);
    }

    #[test]
    fn max_drawdown_from_peak() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 130.0]);
        assert!((dd + 0.25).abs() < 1e-12);
    }

    #[test]
    fn drawdown_ignores_non_positive_prefix() {
        // margin equity starts at zero
        let dd = max_drawdown(&[0.0, -10.0, 50.0, 25.0]);
        assert!((dd + 0.5).abs() < 1e-12);
    }

    #[test]
    fn sharpe_zero_for_flat_path() {
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0], 0.0), 0.0);
    }

    #[test]
    fn sharpe_positive_for_noisy_uptrend() {
        let values = [100.0, 101.0, 102.5, 102.0, 104.0, 105.0];
        assert!(sharpe_ratio(&values, 0.0) > 0.0);
    }

    #[test]
    fn sortino_zero_without_downside() {
        assert_eq!(sortino_ratio(&[100.0, 101.0, 102.0], 0.0), 0.0);
    }

    #[test]
    fn compute_counts_days() {
        let m = PerformanceMetrics::compute(&[100.0, 110.0, 121.0], 2);
        assert_eq!(m.trading_days, 3);
        assert_eq!(m.days_in_market, 2);
        assert_eq!(m.final_value, 121.0);
    }
}
