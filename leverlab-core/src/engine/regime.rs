//! Regime classifier: binary trend signal from close vs. a simple moving average.
//!
//! The raw comparison for day t uses close(t) and SMA(t), which are only known
//! at t's close. Any return earned *on* day t must therefore be decided by the
//! comparison made at t-1. `RegimeSeries::applied` holds that shifted view and
//! is the only one downstream components read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::PricePoint;
use crate::error::EngineError;
use crate::indicators::{Indicator, Sma};

/// Default trend window in trading days.
pub const DEFAULT_SMA_WINDOW: usize = 200;

/// Regime output for a full price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSeries {
    pub window: usize,
    pub dates: Vec<NaiveDate>,
    pub sma: Vec<f64>,
    /// Comparison computed at each day's close; `None` while the window fills.
    pub raw: Vec<Option<bool>>,
    /// Decision used for each day's return: `raw[t-1]`, undefined as off.
    pub applied: Vec<bool>,
}

impl RegimeSeries {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Moving-average regime classifier.
#[derive(Debug, Clone)]
pub struct RegimeClassifier {
    sma: Sma,
}

impl RegimeClassifier {
    pub fn new(window: usize) -> Self {
        Self {
            sma: Sma::new(window),
        }
    }

    pub fn default_params() -> Self {
        Self::new(DEFAULT_SMA_WINDOW)
    }

    pub fn window(&self) -> usize {
        self.sma.period()
    }

    /// Classify every day of the series.
    ///
    /// Fails with `InsufficientHistory` when the series is shorter than the
    /// window, since the regime would be undefined everywhere.
    pub fn classify(&self, prices: &[PricePoint]) -> Result<RegimeSeries, EngineError> {
        let window = self.window();
        if prices.len() < window {
            return Err(EngineError::InsufficientHistory {
                points: prices.len(),
                window,
            });
        }

        let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
        let sma = self.sma.compute(&closes);

        let raw: Vec<Option<bool>> = closes
            .iter()
            .zip(&sma)
            .map(|(&close, &avg)| {
                if avg.is_nan() {
                    None
                } else {
                    Some(close > avg)
                }
            })
            .collect();

        let applied = shift_applied(&raw);

        Ok(RegimeSeries {
            window,
            dates: prices.iter().map(|p| p.date).collect(),
            sma,
            raw,
            applied,
        })
    }
}

/// Shift raw comparisons one day forward; undefined and day 0 become off.
fn shift_applied(raw: &[Option<bool>]) -> Vec<bool> {
    let mut applied = Vec::with_capacity(raw.len());
    if !raw.is_empty() {
        applied.push(false);
    }
    applied.extend(raw.iter().take(raw.len().saturating_sub(1)).map(|r| r.unwrap_or(false)));
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(closes: &[f64]) -> Vec<PricePoint> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(base + chrono::Duration::days(i as i64), c))
            .collect()
    }

    #[test]
    fn undefined_during_warmup() {
        let series = RegimeClassifier::new(3)
            .classify(&prices(&[10.0, 11.0, 12.0, 13.0]))
            .unwrap();
        assert_eq!(series.raw[0], None);
        assert_eq!(series.raw[1], None);
        assert_eq!(series.raw[2], Some(true));
        assert_eq!(series.raw[3], Some(true));
    }

    #[test]
    fn applied_is_previous_day_comparison() {
        // sma_2: [nan, 10.5, 10.5, 9.5, 10.5]
        let series = RegimeClassifier::new(2)
            .classify(&prices(&[10.0, 11.0, 10.0, 9.0, 12.0]))
            .unwrap();
        assert_eq!(
            series.raw,
            vec![None, Some(true), Some(false), Some(false), Some(true)]
        );
        assert_eq!(series.applied, vec![false, false, true, false, false]);
    }

    #[test]
    fn close_equal_to_average_is_off() {
        let series = RegimeClassifier::new(2)
            .classify(&prices(&[10.0, 10.0, 10.0]))
            .unwrap();
        assert_eq!(series.raw[1], Some(false));
    }

    #[test]
    fn too_short_series_is_insufficient_history() {
        let err = RegimeClassifier::new(5)
            .classify(&prices(&[1.0, 2.0, 3.0]))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InsufficientHistory {
                points: 3,
                window: 5
            }
        );
    }

    #[test]
    fn exactly_window_points_is_accepted() {
        let series = RegimeClassifier::new(3)
            .classify(&prices(&[1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.applied.iter().all(|on| !on));
    }

    #[test]
    fn default_window_is_200() {
        assert_eq!(RegimeClassifier::default_params().window(), 200);
    }
}
