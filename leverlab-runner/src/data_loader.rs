//! Series loading for the runner.
//!
//! Reads already-downloaded series from CSV files named in the config:
//! 1. Prices are required (`date,close` or `date,value`)
//! 2. Every auxiliary series is optional (`date,value`)
//! 3. With `synthetic` set, every series is generated instead (tagged)
//!
//! Missing values (empty cells, `.` as written by FRED exports) load as NaN
//! and are skipped when the engine aligns the series.
//!
//! Synthetic data is a developer-only debug mode. Reports produced on
//! synthetic data carry `has_synthetic = true`.

use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use leverlab_core::domain::{DatedValue, PricePoint};

use crate::config::DataPaths;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no price series configured (set data.prices or use --synthetic)")]
    NoPrices,

    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{path}' line {line}: {reason}")]
    BadRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },
}

/// Options controlling how series are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Generate every series instead of reading files.
    pub synthetic: bool,
    pub seed: u64,
    /// Synthetic date range.
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            synthetic: false,
            seed: 42,
            start: NaiveDate::from_ymd_opt(1990, 1, 2).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
        }
    }
}

/// Every input series of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketData {
    pub prices: Vec<PricePoint>,
    pub financing_rate: Option<Vec<DatedValue>>,
    pub margin_rate: Option<Vec<DatedValue>>,
    pub cpi: Option<Vec<DatedValue>>,
    pub rotation: Option<Vec<DatedValue>>,
    pub dividend_yield: Option<Vec<DatedValue>>,
    /// BLAKE3 over every loaded value.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    date: String,
    #[serde(alias = "close")]
    value: String,
}

/// Read a `date,value` CSV file.
pub fn read_series(path: &Path) -> Result<Vec<DatedValue>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut values = Vec::new();
    for (i, row) in reader.deserialize::<SeriesRow>().enumerate() {
        let row = row.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        // header is line 1
        let line = i as u64 + 2;
        let date = parse_date(&row.date).ok_or_else(|| LoadError::BadRow {
            path: path.to_path_buf(),
            line,
            reason: format!("unparseable date '{}'", row.date),
        })?;
        let value = parse_value(&row.value).ok_or_else(|| LoadError::BadRow {
            path: path.to_path_buf(),
            line,
            reason: format!("unparseable value '{}'", row.value),
        })?;
        values.push(DatedValue::new(date, value));
    }

    debug!(path = %path.display(), rows = values.len(), "loaded series");
    Ok(values)
}

/// Read a `date,close` CSV file.
pub fn read_prices(path: &Path) -> Result<Vec<PricePoint>, LoadError> {
    Ok(read_series(path)?
        .into_iter()
        .map(|v| PricePoint::new(v.date, v.value))
        .collect())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

fn parse_value(s: &str) -> Option<f64> {
    match s {
        "" | "." | "NA" | "NaN" => Some(f64::NAN),
        _ => s.parse().ok(),
    }
}

fn read_optional(path: Option<&PathBuf>) -> Result<Option<Vec<DatedValue>>, LoadError> {
    path.map(|p| read_series(p)).transpose()
}

/// Load every configured series, or generate them all when synthetic.
pub fn load_market_data(paths: &DataPaths, opts: &LoadOptions) -> Result<MarketData, LoadError> {
    let mut data = if opts.synthetic {
        info!(seed = opts.seed, start = %opts.start, end = %opts.end, "generating synthetic series");
        generate_synthetic(opts.start, opts.end, opts.seed)
    } else {
        let prices_path = paths.prices.as_ref().ok_or(LoadError::NoPrices)?;
        MarketData {
            prices: read_prices(prices_path)?,
            financing_rate: read_optional(paths.financing_rate.as_ref())?,
            margin_rate: read_optional(paths.margin_rate.as_ref())?,
            cpi: read_optional(paths.cpi.as_ref())?,
            rotation: read_optional(paths.rotation.as_ref())?,
            dividend_yield: read_optional(paths.dividend_yield.as_ref())?,
            ..MarketData::default()
        }
    };
    data.dataset_hash = compute_dataset_hash(&data);
    info!(
        prices = data.prices.len(),
        synthetic = data.has_synthetic,
        hash = %&data.dataset_hash[..12],
        "market data ready"
    );
    Ok(data)
}

/// Deterministic hash over every loaded series, in fixed series order.
fn compute_dataset_hash(data: &MarketData) -> String {
    let mut hasher = blake3::Hasher::new();

    hasher.update(b"prices");
    for p in &data.prices {
        hasher.update(p.date.to_string().as_bytes());
        hasher.update(&p.close.to_le_bytes());
    }

    let optional = [
        ("financing_rate", &data.financing_rate),
        ("margin_rate", &data.margin_rate),
        ("cpi", &data.cpi),
        ("rotation", &data.rotation),
        ("dividend_yield", &data.dividend_yield),
    ];
    for (name, series) in optional {
        hasher.update(name.as_bytes());
        match series {
            Some(values) => {
                for v in values {
                    hasher.update(v.date.to_string().as_bytes());
                    hasher.update(&v.value.to_le_bytes());
                }
            }
            None => {
                hasher.update(b"none");
            }
        }
    }

    hasher.update(&[data.has_synthetic as u8]);
    hasher.finalize().to_hex().to_string()
}

/// Generate a full synthetic input set for testing/development.
///
/// Prices are a weekday random walk from 100.0; rates, CPI, rotation
/// returns and dividend yields are monthly. Same seed, same series.
pub fn generate_synthetic(start: NaiveDate, end: NaiveDate, seed: u64) -> MarketData {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);

    let mut prices = Vec::new();
    let mut financing_rate = Vec::new();
    let mut margin_rate = Vec::new();
    let mut cpi = Vec::new();
    let mut rotation = Vec::new();
    let mut dividend_yield = Vec::new();

    let mut price = 100.0_f64;
    let mut short_rate = 3.0_f64;
    let mut cpi_level = 100.0_f64;
    let mut month = None;
    let mut current = start;

    while current <= end {
        let key = (current.year(), current.month());
        if month != Some(key) {
            month = Some(key);
            let first = NaiveDate::from_ymd_opt(key.0, key.1, 1).unwrap_or(current);
            short_rate = (short_rate + rng.gen_range(-0.25..0.25)).clamp(0.0, 12.0);
            cpi_level *= 1.0 + rng.gen_range(-0.002..0.006);
            financing_rate.push(DatedValue::new(first, short_rate));
            margin_rate.push(DatedValue::new(first, short_rate + 1.0));
            cpi.push(DatedValue::new(first, cpi_level));
            rotation.push(DatedValue::new(first, rng.gen_range(-0.06..0.07)));
            dividend_yield.push(DatedValue::new(first, rng.gen_range(1.2..4.5)));
        }

        // Skip weekends (simple heuristic)
        let weekday = current.weekday();
        if weekday != chrono::Weekday::Sat && weekday != chrono::Weekday::Sun {
            let daily_return: f64 = rng.gen_range(-0.02..0.0215);
            price *= 1.0 + daily_return;
            prices.push(PricePoint::new(current, price));
        }

        current += chrono::Duration::days(1);
    }

    MarketData {
        prices,
        financing_rate: Some(financing_rate),
        margin_rate: Some(margin_rate),
        cpi: Some(cpi),
        rotation: Some(rotation),
        dividend_yield: Some(dividend_yield),
        dataset_hash: String::new(),
        has_synthetic: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_price_csv_with_close_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "spx.csv", "date,close\n2024-01-02,4742.83\n2024-01-03,4704.81\n");
        let prices = read_prices(&path).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].close, 4704.81);
    }

    #[test]
    fn fred_missing_marker_is_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "rate.csv", "date,value\n2024-01-01,5.33\n2024-02-01,.\n");
        let values = read_series(&path).unwrap();
        assert!(values[1].value.is_nan());
    }

    #[test]
    fn bad_date_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "cpi.csv", "date,value\n2024-01-01,300\nJan 2024,301\n");
        match read_series(&path).unwrap_err() {
            LoadError::BadRow { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_series(Path::new("/nonexistent/leverlab/series.csv")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn no_prices_configured() {
        let err = load_market_data(&DataPaths::default(), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::NoPrices));
    }

    #[test]
    fn optional_series_stay_none() {
        let dir = tempfile::tempdir().unwrap();
        let prices = write_csv(dir.path(), "spx.csv", "date,close\n2024-01-02,1.0\n");
        let paths = DataPaths {
            prices: Some(prices),
            ..DataPaths::default()
        };
        let data = load_market_data(&paths, &LoadOptions::default()).unwrap();
        assert!(data.cpi.is_none());
        assert!(!data.has_synthetic);
        assert_eq!(data.dataset_hash.len(), 64);
    }

    #[test]
    fn synthetic_is_deterministic_and_tagged() {
        let opts = LoadOptions {
            synthetic: true,
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
            ..LoadOptions::default()
        };
        let a = load_market_data(&DataPaths::default(), &opts).unwrap();
        let b = load_market_data(&DataPaths::default(), &opts).unwrap();
        assert_eq!(a, b);
        assert!(a.has_synthetic);
        assert_eq!(a.cpi.as_ref().map(|c| c.len()), Some(12));
        assert!(a.prices.iter().all(|p| p.close > 0.0));
        assert!(a.prices.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn different_seed_different_hash() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2020, 3, 31).unwrap();
        let mut a = generate_synthetic(start, end, 1);
        let mut b = generate_synthetic(start, end, 2);
        a.dataset_hash = compute_dataset_hash(&a);
        b.dataset_hash = compute_dataset_hash(&b);
        assert_ne!(a.dataset_hash, b.dataset_hash);
    }
}
