//! Year-level views derived from the daily paths.
//!
//! These sit downstream of the compounder: they resample value paths to
//! year ends and relate them to CPI and dividend yields. Years are matched by
//! calendar year; a year missing from either side drops out of the view.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{DatedValue, GrowthPoint};
use crate::error::EngineError;

/// Base level of the rotation-asset index.
pub const ROTATION_INDEX_BASE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualPoint {
    pub year: i32,
    pub nominal: f64,
    /// Nominal deflated to the first year's CPI level.
    pub real: f64,
    /// CPI relative to the first year: `CPI_year / CPI_first`.
    pub cpi_factor: f64,
}

/// Last value of each calendar year. Input must be date-sorted.
pub fn year_end<I>(points: I) -> BTreeMap<i32, f64>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    points
        .into_iter()
        .map(|(date, value)| (date.year(), value))
        .collect()
}

fn growth_year_end(path: &[GrowthPoint]) -> BTreeMap<i32, f64> {
    year_end(path.iter().map(|p| (p.date, p.value)))
}

fn cpi_year_end(cpi: &[DatedValue]) -> Result<BTreeMap<i32, f64>, EngineError> {
    if cpi.is_empty() {
        return Err(EngineError::EmptySeries { series: "cpi" });
    }
    Ok(year_end(
        cpi.iter()
            .filter(|o| o.value.is_finite())
            .map(|o| (o.date, o.value)),
    ))
}

fn deflate(rows: Vec<(i32, f64, f64)>) -> Vec<AnnualPoint> {
    let base = match rows.first() {
        Some((_, _, cpi)) => *cpi,
        None => return Vec::new(),
    };
    rows.into_iter()
        .map(|(year, nominal, cpi)| {
            let cpi_factor = if base > 0.0 { cpi / base } else { 1.0 };
            AnnualPoint {
                year,
                nominal,
                real: nominal / cpi_factor,
                cpi_factor,
            }
        })
        .collect()
}

/// Year-end nominal value of `path` next to its inflation-adjusted value.
pub fn inflation_adjusted(
    path: &[GrowthPoint],
    cpi: &[DatedValue],
) -> Result<Vec<AnnualPoint>, EngineError> {
    let cpi = cpi_year_end(cpi)?;
    let rows = growth_year_end(path)
        .into_iter()
        .filter_map(|(year, value)| cpi.get(&year).map(|c| (year, value, *c)))
        .collect();
    Ok(deflate(rows))
}

/// Mean dividend yield per calendar year, as a fraction.
///
/// Observations are annual yields in percent.
pub fn mean_annual_yield(yields: &[DatedValue]) -> BTreeMap<i32, f64> {
    let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for o in yields.iter().filter(|o| o.value.is_finite()) {
        let e = sums.entry(o.date.year()).or_insert((0.0, 0));
        e.0 += o.value / 100.0;
        e.1 += 1;
    }
    sums.into_iter()
        .map(|(year, (sum, n))| (year, sum / n as f64))
        .collect()
}

/// Reinvest a year's mean dividend yield once per year on top of the
/// path's price growth, then deflate by CPI.
///
/// `value_y = value_{y-1} * (1 + growth_y + multiple * yield_y)`, where
/// `growth_y` is the year-over-year change of the path's year-end value (0
/// for its first year). The first kept year compounds from
/// `initial_capital`.
pub fn dividend_reinvested(
    path: &[GrowthPoint],
    yields: &[DatedValue],
    cpi: &[DatedValue],
    dividend_multiple: f64,
    initial_capital: f64,
) -> Result<Vec<AnnualPoint>, EngineError> {
    if yields.is_empty() {
        return Err(EngineError::EmptySeries {
            series: "dividend_yield",
        });
    }
    let cpi = cpi_year_end(cpi)?;
    let mean_yield = mean_annual_yield(yields);

    let mut prev_end: Option<f64> = None;
    let mut growth = BTreeMap::new();
    for (year, end) in growth_year_end(path) {
        let change = match prev_end {
            Some(p) if p != 0.0 => end / p - 1.0,
            _ => 0.0,
        };
        growth.insert(year, change);
        prev_end = Some(end);
    }

    let mut value = initial_capital;
    let mut rows = Vec::new();
    for (year, change) in growth {
        let (Some(y), Some(c)) = (mean_yield.get(&year), cpi.get(&year)) else {
            continue;
        };
        value *= 1.0 + change + dividend_multiple * y;
        rows.push((year, value, *c));
    }
    Ok(deflate(rows))
}

/// Compound annual CPI growth between two calendar years, as a fraction.
///
/// `None` when either year has no CPI observation; 0 when `end_year` does
/// not come after `start_year`.
pub fn cpi_cagr(cpi: &[DatedValue], start_year: i32, end_year: i32) -> Option<f64> {
    let annual = year_end(
        cpi.iter()
            .filter(|o| o.value.is_finite())
            .map(|o| (o.date, o.value)),
    );
    let start = *annual.get(&start_year)?;
    let end = *annual.get(&end_year)?;
    let years = end_year - start_year;
    if years <= 0 {
        return Some(0.0);
    }
    if start <= 0.0 {
        return None;
    }
    Some((end / start).powf(1.0 / years as f64) - 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationIndex {
    pub points: Vec<GrowthPoint>,
    /// `(end / 100)^(12 / months) - 1`; `None` without observations.
    pub cagr: Option<f64>,
}

/// Base-100 growth index of monthly rotation-asset returns.
pub fn rotation_index(monthly: &[DatedValue]) -> RotationIndex {
    let mut level = ROTATION_INDEX_BASE;
    let points: Vec<GrowthPoint> = monthly
        .iter()
        .map(|o| {
            if o.value.is_finite() {
                level *= 1.0 + o.value;
            }
            GrowthPoint {
                date: o.date,
                value: level,
            }
        })
        .collect();
    let cagr = points.last().map(|last| {
        (last.value / ROTATION_INDEX_BASE).powf(12.0 / points.len() as f64) - 1.0
    });
    RotationIndex { points, cagr }
}

/// Margin borrowing rate per observation: reference rate plus spread.
pub fn margin_rate_view(rates: &[DatedValue], spread_pct: f64) -> Vec<DatedValue> {
    rates
        .iter()
        .map(|o| DatedValue::new(o.date, o.value + spread_pct))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn gp(date: NaiveDate, value: f64) -> GrowthPoint {
        GrowthPoint { date, value }
    }

    #[test]
    fn year_end_keeps_last_observation() {
        let ends = year_end(vec![(d(2020, 6, 1), 1.0), (d(2020, 12, 31), 2.0), (d(2021, 3, 1), 3.0)]);
        assert_eq!(ends[&2020], 2.0);
        assert_eq!(ends[&2021], 3.0);
    }

    #[test]
    fn real_value_deflates_by_cumulative_cpi() {
        let path = vec![gp(d(2020, 12, 31), 10_000.0), gp(d(2021, 12, 31), 12_000.0)];
        let cpi = vec![
            DatedValue::new(d(2020, 12, 1), 100.0),
            DatedValue::new(d(2021, 12, 1), 120.0),
        ];
        let view = inflation_adjusted(&path, &cpi).unwrap();
        assert_eq!(view[0].real, 10_000.0);
        assert!((view[1].cpi_factor - 1.2).abs() < 1e-12);
        assert!((view[1].real - 10_000.0).abs() < 1e-9);
    }

    #[test]
    fn empty_cpi_is_empty_series() {
        let path = vec![gp(d(2020, 12, 31), 1.0)];
        assert_eq!(
            inflation_adjusted(&path, &[]),
            Err(EngineError::EmptySeries { series: "cpi" })
        );
    }

    #[test]
    fn dividends_reinvested_once_a_year() {
        let path = vec![gp(d(2020, 12, 31), 100.0), gp(d(2021, 12, 31), 110.0)];
        let yields = vec![
            DatedValue::new(d(2020, 6, 1), 2.0),
            DatedValue::new(d(2021, 3, 1), 3.0),
            DatedValue::new(d(2021, 9, 1), 5.0),
        ];
        let cpi = vec![
            DatedValue::new(d(2020, 12, 1), 100.0),
            DatedValue::new(d(2021, 12, 1), 100.0),
        ];
        let view = dividend_reinvested(&path, &yields, &cpi, 1.0, 1000.0).unwrap();
        assert!((view[0].nominal - 1020.0).abs() < 1e-9);
        assert!((view[1].nominal - 1020.0 * (1.0 + 0.10 + 0.04)).abs() < 1e-9);
    }

    #[test]
    fn cpi_cagr_between_years() {
        let cpi = vec![
            DatedValue::new(d(2000, 12, 1), 100.0),
            DatedValue::new(d(2002, 12, 1), 121.0),
        ];
        let cagr = cpi_cagr(&cpi, 2000, 2002).unwrap();
        assert!((cagr - 0.10).abs() < 1e-12);
        assert_eq!(cpi_cagr(&cpi, 2002, 2000), Some(0.0));
        assert_eq!(cpi_cagr(&cpi, 1999, 2002), None);
    }

    #[test]
    fn rotation_index_and_cagr() {
        let monthly: Vec<DatedValue> = (1..=12)
            .map(|m| DatedValue::new(d(2020, m, 1), 0.01))
            .collect();
        let idx = rotation_index(&monthly);
        let end = 100.0 * 1.01_f64.powi(12);
        assert!((idx.points[11].value - end).abs() < 1e-9);
        assert!((idx.cagr.unwrap() - (end / 100.0 - 1.0)).abs() < 1e-12);
        assert_eq!(rotation_index(&[]).cagr, None);
    }

    #[test]
    fn margin_rate_adds_spread() {
        let view = margin_rate_view(&[DatedValue::new(d(2020, 1, 1), 4.0)], 1.5);
        assert_eq!(view[0].value, 5.5);
    }
}
