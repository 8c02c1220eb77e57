//! Cost model: daily financing and expense drag of a leveraged position.
//!
//! A leveraged fund borrows `L - 1` times its capital at roughly the
//! short-term reference rate and charges an annual expense ratio. Both are
//! spread evenly over 252 trading days:
//!
//! - `financing_daily(t) = (L - 1) * (R(t) / 100) / 252`
//! - `expense_daily      = E / 252`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::align_with_fallback;
use crate::domain::DatedValue;
use crate::error::EngineError;

/// Trading days per year used to spread annual costs.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annual reference rate (percent) assumed before the rate series begins.
pub const DEFAULT_FALLBACK_RATE_PCT: f64 = 1.0;

/// Immutable cost configuration for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    /// Exposure multiple of the leveraged instrument (e.g., 3.0).
    pub leverage: f64,
    /// Annual expense ratio as a fraction (0.01 = 1%).
    pub annual_expense_ratio: f64,
    /// Annual rate in percent substituted where the rate series has no data yet.
    pub fallback_rate_pct: f64,
}

impl CostParameters {
    /// Fraction of capital that is borrowed: `leverage - 1`.
    pub fn financed_fraction(&self) -> f64 {
        (self.leverage - 1.0).max(0.0)
    }

    /// The same exposure with no financing or expense drag.
    pub fn frictionless(leverage: f64) -> Self {
        Self {
            leverage,
            annual_expense_ratio: 0.0,
            fallback_rate_pct: 0.0,
        }
    }
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            leverage: 3.0,
            annual_expense_ratio: 0.01,
            fallback_rate_pct: DEFAULT_FALLBACK_RATE_PCT,
        }
    }
}

/// Per-day cost terms aligned to the trading calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostSeries {
    /// Reference rate in annual percent after alignment and fallback.
    pub rate_pct: Vec<f64>,
    pub financing_daily: Vec<f64>,
    pub expense_daily: f64,
}

impl CostSeries {
    /// No financing and no expense on any of `len` days.
    pub fn zero(len: usize) -> Self {
        Self {
            rate_pct: vec![0.0; len],
            financing_daily: vec![0.0; len],
            expense_daily: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.financing_daily.len()
    }

    pub fn is_empty(&self) -> bool {
        self.financing_daily.is_empty()
    }

    /// Total daily drag on day `i`.
    pub fn total(&self, i: usize) -> f64 {
        self.financing_daily[i] + self.expense_daily
    }
}

/// Financing and expense cost model.
#[derive(Debug, Clone)]
pub struct CostModel {
    params: CostParameters,
}

impl CostModel {
    pub fn new(params: CostParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CostParameters {
        &self.params
    }

    pub fn financing_daily(&self, rate_pct: f64) -> f64 {
        self.params.financed_fraction() * (rate_pct / 100.0) / TRADING_DAYS_PER_YEAR
    }

    pub fn expense_daily(&self) -> f64 {
        self.params.annual_expense_ratio / TRADING_DAYS_PER_YEAR
    }

    /// Align the reference-rate series onto the calendar and derive daily costs.
    ///
    /// The rate is forward-filled; days before its first observation use the
    /// fallback rate. A series with no rows at all is rejected.
    pub fn cost_series(
        &self,
        calendar: &[NaiveDate],
        rates: &[DatedValue],
    ) -> Result<CostSeries, EngineError> {
        if rates.is_empty() {
            return Err(EngineError::EmptySeries {
                series: "financing_rate",
            });
        }
        let rate_pct = align_with_fallback(calendar, rates, self.params.fallback_rate_pct);
        Ok(self.from_rates(rate_pct))
    }

    /// Daily costs from an already-aligned rate array.
    pub fn from_rates(&self, rate_pct: Vec<f64>) -> CostSeries {
        let financing_daily = rate_pct.iter().map(|r| self.financing_daily(*r)).collect();
        CostSeries {
            rate_pct,
            financing_daily,
            expense_daily: self.expense_daily(),
        }
    }
}
