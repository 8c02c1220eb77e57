//! Input observations: the daily price series and dated auxiliary values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Daily close for the primary index on one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// A single dated observation of an auxiliary series.
///
/// Used for reference rates (annual percent), CPI index levels, monthly
/// rotation-asset returns (fraction) and dividend yields (annual percent).
/// Observations may arrive at any frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Check that a price series is usable by the engine.
///
/// Dates must be strictly increasing and closes finite. A zero close is
/// tolerated (the return model defaults the next day's return to 0), a
/// negative one is not.
pub fn validate_prices(prices: &[PricePoint]) -> Result<(), EngineError> {
    if prices.is_empty() {
        return Err(EngineError::EmptySeries { series: "prices" });
    }
    for (i, p) in prices.iter().enumerate() {
        if !p.close.is_finite() || p.close < 0.0 {
            return Err(EngineError::MalformedSeries {
                series: "prices",
                reason: format!("invalid close {} on {}", p.close, p.date),
            });
        }
        if i > 0 && prices[i - 1].date >= p.date {
            return Err(EngineError::MalformedSeries {
                series: "prices",
                reason: format!(
                    "dates not strictly increasing at {} (previous {})",
                    p.date,
                    prices[i - 1].date
                ),
            });
        }
    }
    Ok(())
}

/// Check that an auxiliary series is sorted ascending by date.
///
/// Duplicate dates are allowed; the later observation wins when aligned.
pub fn validate_observations(
    series: &'static str,
    values: &[DatedValue],
) -> Result<(), EngineError> {
    if let Some(w) = values.windows(2).find(|w| w[1].date < w[0].date) {
        return Err(EngineError::MalformedSeries {
            series,
            reason: format!("dates out of order at {} (previous {})", w[1].date, w[0].date),
        });
    }
    Ok(())
}
