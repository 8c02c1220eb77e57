//! Serializable run configuration, loaded from TOML.
//!
//! ```toml
//! [strategy]
//! leverage = 3.0
//! expense_ratio = 0.01
//! sma_window = 200
//!
//! [margin]
//! base_limit = 2000.0
//! spread_pct = 1.5
//! entry_policy = "clamp"
//!
//! [data]
//! prices = "data/spx.csv"
//! ```
//!
//! Every section and field has a default, so a config only names what it
//! changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use leverlab_core::engine::{
    Compounder, CostModel, CostParameters, MarginAccountSimulator, MarginParameters,
    RegimeClassifier, DEFAULT_INITIAL_CAPITAL, DEFAULT_SMA_WINDOW,
};

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Leverage, costs, regime window and starting capital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    pub leverage: f64,
    /// Annual expense ratio as a fraction (0.01 = 1%).
    pub expense_ratio: f64,
    pub sma_window: usize,
    /// Annual percent used before the financing-rate series starts.
    pub fallback_rate_pct: f64,
    pub initial_capital: f64,
}

impl Default for StrategySection {
    fn default() -> Self {
        let costs = CostParameters::default();
        Self {
            leverage: costs.leverage,
            expense_ratio: costs.annual_expense_ratio,
            sma_window: DEFAULT_SMA_WINDOW,
            fallback_rate_pct: costs.fallback_rate_pct,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
        }
    }
}

/// Dividend overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DividendSection {
    /// Constant annual yield in percent. Ignored when `data.dividend_yield`
    /// points at a series.
    pub annual_yield_pct: Option<f64>,
    /// Multiple of the yield reinvested in the annual view of the leveraged path.
    pub annual_multiple: f64,
}

impl Default for DividendSection {
    fn default() -> Self {
        Self {
            annual_yield_pct: None,
            annual_multiple: 1.0,
        }
    }
}

/// CSV locations of the input series. Relative paths resolve against the
/// config file's directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub prices: Option<PathBuf>,
    pub financing_rate: Option<PathBuf>,
    pub margin_rate: Option<PathBuf>,
    pub cpi: Option<PathBuf>,
    pub rotation: Option<PathBuf>,
    pub dividend_yield: Option<PathBuf>,
}

impl DataPaths {
    fn resolve_against(&mut self, base: &Path) {
        for p in [
            &mut self.prices,
            &mut self.financing_rate,
            &mut self.margin_rate,
            &mut self.cpi,
            &mut self.rotation,
            &mut self.dividend_yield,
        ]
        .into_iter()
        .flatten()
        {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
}

/// Complete configuration of one lab run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub strategy: StrategySection,
    pub margin: MarginParameters,
    pub dividends: DividendSection,
    pub data: DataPaths,
}

impl LabConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: LabConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(dir) = path.parent() {
            config.data.resolve_against(dir);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy;
        if !s.leverage.is_finite() || s.leverage <= 0.0 {
            return Err(invalid("strategy.leverage", format!("must be > 0, got {}", s.leverage)));
        }
        if !(0.0..1.0).contains(&s.expense_ratio) {
            return Err(invalid(
                "strategy.expense_ratio",
                format!("must be a fraction in [0, 1), got {}", s.expense_ratio),
            ));
        }
        if s.sma_window == 0 {
            return Err(invalid("strategy.sma_window", "must be at least 1".into()));
        }
        if !s.fallback_rate_pct.is_finite() {
            return Err(invalid("strategy.fallback_rate_pct", "must be finite".into()));
        }
        if !s.initial_capital.is_finite() || s.initial_capital <= 0.0 {
            return Err(invalid(
                "strategy.initial_capital",
                format!("must be > 0, got {}", s.initial_capital),
            ));
        }
        if !self.margin.base_limit.is_finite() || self.margin.base_limit < 0.0 {
            return Err(invalid(
                "margin.base_limit",
                format!("must be >= 0, got {}", self.margin.base_limit),
            ));
        }
        if !self.margin.spread_pct.is_finite() {
            return Err(invalid("margin.spread_pct", "must be finite".into()));
        }
        if let Some(y) = self.dividends.annual_yield_pct {
            if !y.is_finite() || y < 0.0 {
                return Err(invalid("dividends.annual_yield_pct", format!("must be >= 0, got {y}")));
            }
        }
        Ok(())
    }

    /// Deterministic hash of this configuration and the dataset it runs on.
    ///
    /// Two runs with identical configs over identical data share a RunId
    /// and can share cached results.
    pub fn run_id(&self, dataset_hash: &str) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(json.as_bytes());
        hasher.update(dataset_hash.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }

    pub fn cost_parameters(&self) -> CostParameters {
        CostParameters {
            leverage: self.strategy.leverage,
            annual_expense_ratio: self.strategy.expense_ratio,
            fallback_rate_pct: self.strategy.fallback_rate_pct,
        }
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.cost_parameters())
    }

    pub fn classifier(&self) -> RegimeClassifier {
        RegimeClassifier::new(self.strategy.sma_window)
    }

    pub fn compounder(&self) -> Compounder {
        Compounder::new(self.strategy.initial_capital)
    }

    pub fn margin_simulator(&self) -> MarginAccountSimulator {
        MarginAccountSimulator::new(self.margin)
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
