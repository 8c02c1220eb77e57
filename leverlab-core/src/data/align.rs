//! Calendar alignment of auxiliary series onto the trading-day calendar.
//!
//! Rates, CPI and dividend yields arrive monthly or at irregular dates. The
//! engine needs one value per trading day, so every auxiliary series is
//! turned into a step function over the price calendar before any per-day
//! loop starts: forward-fill from the latest observation at or before each
//! day, then fill the leading gap by a series-specific rule.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use crate::domain::DatedValue;
use crate::error::EngineError;

/// Calendar month key: (year, month).
pub type MonthKey = (i32, u32);

pub fn month_key(date: NaiveDate) -> MonthKey {
    (date.year(), date.month())
}

/// Forward-fill observations onto the calendar.
///
/// Day i receives the last finite observation dated on or before it, or
/// `None` when no such observation exists yet. Non-finite observations are
/// skipped so they never overwrite a defined value.
pub fn forward_fill(calendar: &[NaiveDate], observations: &[DatedValue]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(calendar.len());
    let mut cursor = 0;
    let mut current: Option<f64> = None;

    for date in calendar {
        while cursor < observations.len() && observations[cursor].date <= *date {
            let v = observations[cursor].value;
            if v.is_finite() {
                current = Some(v);
            }
            cursor += 1;
        }
        result.push(current);
    }

    result
}

/// Forward-fill, then fill the leading gap with a fixed fallback value.
///
/// Used for the financing rate, where early history predates the reference
/// series and a documented constant stands in.
pub fn align_with_fallback(
    calendar: &[NaiveDate],
    observations: &[DatedValue],
    fallback: f64,
) -> Vec<f64> {
    forward_fill(calendar, observations)
        .into_iter()
        .map(|v| v.unwrap_or(fallback))
        .collect()
}

/// Forward-fill, then back-fill the leading gap from the earliest defined
/// observation.
///
/// Errors with `EmptySeries` when there are no rows at all and with
/// `UndefinedRate` when no row carries a finite value.
pub fn align_filled(
    series: &'static str,
    calendar: &[NaiveDate],
    observations: &[DatedValue],
) -> Result<Vec<f64>, EngineError> {
    if observations.is_empty() {
        return Err(EngineError::EmptySeries { series });
    }
    let first_defined = observations
        .iter()
        .map(|o| o.value)
        .find(|v| v.is_finite())
        .ok_or(EngineError::UndefinedRate { series })?;

    Ok(forward_fill(calendar, observations)
        .into_iter()
        .map(|v| v.unwrap_or(first_defined))
        .collect())
}

/// Number of trading days observed per calendar month of the price calendar.
pub fn trading_days_per_month(calendar: &[NaiveDate]) -> BTreeMap<MonthKey, usize> {
    let mut counts = BTreeMap::new();
    for date in calendar {
        *counts.entry(month_key(*date)).or_insert(0) += 1;
    }
    counts
}

/// Index monthly observations by calendar month. A later row for the same
/// month replaces an earlier one; non-finite values are dropped.
pub fn monthly_lookup(observations: &[DatedValue]) -> HashMap<MonthKey, f64> {
    observations
        .iter()
        .filter(|o| o.value.is_finite())
        .map(|o| (month_key(o.date), o.value))
        .collect()
}
