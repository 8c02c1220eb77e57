//! Return model: price returns and the leveraged daily return under costs.
//!
//! Every strategy variant is derived from the same two arrays: the price
//! return and the `CostSeries`. Nothing here is variant-specific; the
//! router decides which leg applies on which day.

use crate::domain::{PricePoint, RETURN_FLOOR};
use crate::engine::cost_model::CostSeries;

/// Simple close-to-close returns.
///
/// Day 0 has no previous close and returns 0. A non-positive or non-finite
/// previous close also returns 0 instead of dividing by it.
pub fn price_returns(prices: &[PricePoint]) -> Vec<f64> {
    let mut out = Vec::with_capacity(prices.len());
    for (i, p) in prices.iter().enumerate() {
        if i == 0 {
            out.push(0.0);
            continue;
        }
        let prev = prices[i - 1].close;
        if prev > 0.0 && prev.is_finite() {
            out.push(p.close / prev - 1.0);
        } else {
            out.push(0.0);
        }
    }
    out
}

/// Clamp a daily return so a single day cannot lose more than everything.
pub fn floor_return(r: f64) -> f64 {
    r.max(RETURN_FLOOR)
}

/// Leverage-aware daily return model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnModel {
    leverage: f64,
}

impl ReturnModel {
    pub fn new(leverage: f64) -> Self {
        Self { leverage }
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    /// `L * price_return - financing - expense`, floored at -100%.
    pub fn leveraged(&self, price_return: f64, financing: f64, expense: f64) -> f64 {
        floor_return(self.leverage * price_return - financing - expense)
    }

    /// Leveraged return on day `i` using the aligned cost terms.
    pub fn leveraged_at(&self, price_returns: &[f64], costs: &CostSeries, i: usize) -> f64 {
        self.leveraged(price_returns[i], costs.financing_daily[i], costs.expense_daily)
    }

    /// The always-on leveraged return for every day.
    pub fn leveraged_series(&self, price_returns: &[f64], costs: &CostSeries) -> Vec<f64> {
        (0..price_returns.len())
            .map(|i| self.leveraged_at(price_returns, costs, i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn prices(closes: &[f64]) -> Vec<PricePoint> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(base + chrono::Duration::days(i as i64), c))
            .collect()
    }

    #[test]
    fn first_day_return_is_zero() {
        let r = price_returns(&prices(&[100.0, 101.0, 99.0]));
        assert_eq!(r[0], 0.0);
        assert!((r[1] - 0.01).abs() < 1e-12);
        assert!((r[2] - (99.0 / 101.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn zero_previous_close_defaults_to_zero_return() {
        let r = price_returns(&prices(&[0.0, 50.0]));
        assert_eq!(r[1], 0.0);
    }

    #[test]
    fn leveraged_subtracts_costs() {
        let model = ReturnModel::new(3.0);
        let r = model.leveraged(0.01, 0.0004, 0.00004);
        assert!((r - (0.03 - 0.0004 - 0.00004)).abs() < 1e-15);
    }

    #[test]
    fn leveraged_loss_is_floored() {
        let model = ReturnModel::new(3.0);
        assert_eq!(model.leveraged(-0.40, 0.0, 0.0), -1.0);
    }

    #[test]
    fn leveraged_series_matches_pointwise() {
        let model = ReturnModel::new(2.0);
        let pr = vec![0.0, 0.02, -0.01];
        let costs = CostSeries {
            rate_pct: vec![5.0; 3],
            financing_daily: vec![0.0002; 3],
            expense_daily: 0.00001,
        };
        let series = model.leveraged_series(&pr, &costs);
        for (i, r) in series.iter().enumerate() {
            assert_eq!(*r, model.leveraged(pr[i], 0.0002, 0.00001));
        }
    }
}
