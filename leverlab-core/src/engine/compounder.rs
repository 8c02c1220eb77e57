//! Compounder: cumulative value path from daily returns.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DailyReturnRecord, GrowthPoint};
use crate::engine::frame::window_range;
use crate::error::EngineError;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compounder {
    pub initial_capital: f64,
}

impl Default for Compounder {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
        }
    }
}

impl Compounder {
    pub fn new(initial_capital: f64) -> Self {
        Self { initial_capital }
    }

    /// Grow the initial capital through `returns`.
    ///
    /// The first day is the investment day: its value is the initial capital
    /// and its return is not applied.
    pub fn compound_returns(&self, dates: &[NaiveDate], returns: &[f64]) -> Vec<GrowthPoint> {
        let mut path = Vec::with_capacity(dates.len());
        let mut value = self.initial_capital;
        for (i, (&date, &r)) in dates.iter().zip(returns).enumerate() {
            if i > 0 {
                value *= 1.0 + r;
            }
            path.push(GrowthPoint { date, value });
        }
        path
    }

    pub fn compound(&self, records: &[DailyReturnRecord]) -> Vec<GrowthPoint> {
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        let returns: Vec<f64> = records.iter().map(|r| r.strategy_return).collect();
        self.compound_returns(&dates, &returns)
    }

    /// Re-invest the initial capital at `start` and compound through `end`.
    ///
    /// History before `start` is ignored. The window must hold at least two
    /// records and `start <= end`, otherwise `InvalidRange`.
    pub fn rebase(
        &self,
        records: &[DailyReturnRecord],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<GrowthPoint>, EngineError> {
        let dates: Vec<NaiveDate> = records.iter().map(|r| r.date).collect();
        let range = window_range(&dates, start, end)?;
        Ok(self.compound(&records[range]))
    }
}
