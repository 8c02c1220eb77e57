//! Engine outputs: per-day return records, value paths and margin ledger rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lower bound for any single-day strategy return (a total loss).
pub const RETURN_FLOOR: f64 = -1.0;

/// One trading day of one strategy variant.
///
/// A pure function of the inputs: the same prices, rates and configuration
/// always produce the same record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturnRecord {
    pub date: NaiveDate,
    /// Regime decision applied to this day (yesterday's comparison).
    pub regime_on: bool,
    pub price_return: f64,
    pub financing_cost_daily: f64,
    pub expense_cost_daily: f64,
    /// Final return of the variant for the day, never below [`RETURN_FLOOR`].
    pub strategy_return: f64,
}

/// A point on a cumulative portfolio-value path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// End-of-day state of the margin account.
///
/// Equity is derived from the components and never stored on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginDay {
    pub date: NaiveDate,
    pub regime_on: bool,
    pub in_market: bool,
    pub cash: f64,
    pub debt: f64,
    pub invested: f64,
    pub margin_limit: f64,
    pub accrued_interest: f64,
    /// Reference rate (annual percent) used for the day's interest accrual.
    pub reference_rate_pct: f64,
    /// True when the day attempted an entry with cash + margin below zero.
    pub underfunded_entry: bool,
}

impl MarginDay {
    /// Net liquidation value: `cash + invested - debt`.
    pub fn equity(&self) -> f64 {
        self.cash + self.invested - self.debt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn margin_equity_is_derived() {
        let day = MarginDay {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            regime_on: true,
            in_market: true,
            cash: 0.0,
            debt: 2000.0,
            invested: 2500.0,
            margin_limit: 2000.0,
            accrued_interest: 12.0,
            reference_rate_pct: 4.0,
            underfunded_entry: false,
        };
        assert_eq!(day.equity(), 500.0);
    }
}
