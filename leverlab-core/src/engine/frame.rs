//! MarketFrame: every per-day input the variants read, aligned once.
//!
//! Built before any routing or compounding so that no component looks up a
//! rate, a rotation return or a yield mid-loop. All arrays have the length of
//! the price calendar. Slicing a frame to a sub-window keeps the values that
//! were computed over the full history (SMA, month day-counts), so a window
//! that starts at day 0 reproduces the full run exactly.

use std::ops::Range;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{align_filled, month_key, monthly_lookup, trading_days_per_month};
use crate::domain::{validate_observations, validate_prices, DatedValue, PricePoint};
use crate::engine::cost_model::{CostModel, CostSeries, TRADING_DAYS_PER_YEAR};
use crate::engine::regime::RegimeClassifier;
use crate::engine::returns::{price_returns, ReturnModel};
use crate::error::EngineError;

/// Day count assumed for a month with no observed trading days.
pub const DEFAULT_TRADING_DAYS_PER_MONTH: usize = 21;

/// Where the dividend yield comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DividendSource {
    /// One annual yield (percent) for the whole history.
    Constant { annual_yield_pct: f64 },
    /// Dated annual yields (percent), forward-filled onto the calendar.
    Series(Vec<DatedValue>),
}

impl DividendSource {
    /// Daily yield fraction per trading day: `yield / 100 / 252`.
    pub fn daily_yields(&self, calendar: &[NaiveDate]) -> Result<Vec<f64>, EngineError> {
        match self {
            DividendSource::Constant { annual_yield_pct } => {
                let daily = annual_yield_pct / 100.0 / TRADING_DAYS_PER_YEAR;
                Ok(vec![daily; calendar.len()])
            }
            DividendSource::Series(values) => {
                validate_observations("dividend_yield", values)?;
                let aligned = align_filled("dividend_yield", calendar, values)?;
                Ok(aligned
                    .into_iter()
                    .map(|y| y / 100.0 / TRADING_DAYS_PER_YEAR)
                    .collect())
            }
        }
    }
}

/// Convert a monthly return to its daily geometric equivalent.
///
/// A day count of zero falls back to [`DEFAULT_TRADING_DAYS_PER_MONTH`].
pub fn monthly_to_daily(monthly_return: f64, trading_days: usize) -> f64 {
    let days = if trading_days == 0 {
        DEFAULT_TRADING_DAYS_PER_MONTH
    } else {
        trading_days
    };
    (1.0 + monthly_return).powf(1.0 / days as f64) - 1.0
}

/// Daily rotation-asset returns on the price calendar.
///
/// Each trading day receives its month's return spread geometrically over
/// the trading days the price calendar shows for that month. Months absent
/// from the rotation series contribute 0.
pub fn rotation_daily_returns(
    calendar: &[NaiveDate],
    monthly: &[DatedValue],
) -> Result<Vec<f64>, EngineError> {
    if monthly.is_empty() {
        return Err(EngineError::EmptySeries { series: "rotation" });
    }
    validate_observations("rotation", monthly)?;
    let day_counts = trading_days_per_month(calendar);
    let lookup = monthly_lookup(monthly);

    Ok(calendar
        .iter()
        .map(|date| {
            let key = month_key(*date);
            match lookup.get(&key) {
                Some(m) => monthly_to_daily(*m, day_counts.get(&key).copied().unwrap_or(0)),
                None => 0.0,
            }
        })
        .collect())
}

/// Aligned per-day inputs for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFrame {
    pub leverage: f64,
    pub dates: Vec<NaiveDate>,
    pub closes: Vec<f64>,
    pub sma: Vec<f64>,
    pub price_returns: Vec<f64>,
    /// Regime decision applied to each day's return.
    pub regime: Vec<bool>,
    pub costs: CostSeries,
    pub rotation_daily: Option<Vec<f64>>,
    pub dividend_daily: Option<Vec<f64>>,
}

/// Builder for [`MarketFrame`].
pub struct FrameBuilder<'a> {
    prices: &'a [PricePoint],
    classifier: RegimeClassifier,
    cost_model: CostModel,
    financing_rate: Option<&'a [DatedValue]>,
    rotation: Option<&'a [DatedValue]>,
    dividends: Option<&'a DividendSource>,
}

impl<'a> FrameBuilder<'a> {
    pub fn new(
        prices: &'a [PricePoint],
        classifier: RegimeClassifier,
        cost_model: CostModel,
    ) -> Self {
        Self {
            prices,
            classifier,
            cost_model,
            financing_rate: None,
            rotation: None,
            dividends: None,
        }
    }

    /// Reference rate for leveraged financing. Without it no financing
    /// cost is charged, only the expense ratio.
    pub fn financing_rate(mut self, rates: &'a [DatedValue]) -> Self {
        self.financing_rate = Some(rates);
        self
    }

    pub fn rotation(mut self, monthly: &'a [DatedValue]) -> Self {
        self.rotation = Some(monthly);
        self
    }

    pub fn dividends(mut self, source: &'a DividendSource) -> Self {
        self.dividends = Some(source);
        self
    }

    /// Align everything onto the price calendar.
    ///
    /// Price, regime and financing errors are fatal. Rotation and dividend
    /// failures that are recoverable leave the optional column empty, so
    /// variants needing it report `MissingSeries` instead of the whole frame
    /// failing.
    pub fn build(self) -> Result<MarketFrame, EngineError> {
        validate_prices(self.prices)?;
        let regime = self.classifier.classify(self.prices)?;
        let dates = regime.dates.clone();

        let costs = match self.financing_rate {
            Some(rates) => {
                validate_observations("financing_rate", rates)?;
                self.cost_model.cost_series(&dates, rates)?
            }
            None => {
                let mut costs = CostSeries::zero(dates.len());
                costs.expense_daily = self.cost_model.expense_daily();
                costs
            }
        };

        let rotation_daily = optional_column(
            self.rotation
                .map(|monthly| rotation_daily_returns(&dates, monthly)),
        )?;
        let dividend_daily =
            optional_column(self.dividends.map(|source| source.daily_yields(&dates)))?;

        Ok(MarketFrame {
            leverage: self.cost_model.params().leverage,
            closes: self.prices.iter().map(|p| p.close).collect(),
            sma: regime.sma,
            price_returns: price_returns(self.prices),
            regime: regime.applied,
            dates,
            costs,
            rotation_daily,
            dividend_daily,
        })
    }
}

fn optional_column(
    column: Option<Result<Vec<f64>, EngineError>>,
) -> Result<Option<Vec<f64>>, EngineError> {
    match column {
        None => Ok(None),
        Some(Ok(values)) => Ok(Some(values)),
        Some(Err(e)) if e.is_recoverable() => {
            tracing::warn!(error = %e, "optional series unusable, dependent variants will be skipped");
            Ok(None)
        }
        Some(Err(e)) => Err(e),
    }
}

impl MarketFrame {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn return_model(&self) -> ReturnModel {
        ReturnModel::new(self.leverage)
    }

    /// Always-on leveraged return with costs for every day.
    pub fn leveraged_returns(&self) -> Vec<f64> {
        self.return_model()
            .leveraged_series(&self.price_returns, &self.costs)
    }

    /// Index range of the inclusive date window `[start, end]`.
    ///
    /// Fails with `InvalidRange` when `end < start` or fewer than two
    /// trading days fall inside the window.
    pub fn window_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Range<usize>, EngineError> {
        window_range(&self.dates, start, end)
    }
}

/// Index range of the dates inside `[start, end]`, requiring at least two.
pub fn window_range(
    dates: &[NaiveDate],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Range<usize>, EngineError> {
    if end < start {
        return Err(EngineError::InvalidRange {
            start,
            end,
            reason: "end precedes start".into(),
        });
    }
    let lo = dates.partition_point(|d| *d < start);
    let hi = dates.partition_point(|d| *d <= end);
    let count = hi.saturating_sub(lo);
    if count < 2 {
        return Err(EngineError::InvalidRange {
            start,
            end,
            reason: format!("{count} observation(s) in window, need at least 2"),
        });
    }
    Ok(lo..hi)
}
