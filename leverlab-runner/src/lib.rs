//! LeverLab Runner: lab orchestration, metrics, caching and export.
//!
//! This crate builds on `leverlab-core` to provide:
//! - TOML configuration and content-addressed run ids
//! - CSV loading of prices, rates, CPI, rotation and dividend series,
//!   with a seeded synthetic fallback
//! - The lab runner: every strategy variant in parallel, the margin
//!   ledger and the annual views, with optional-view skipping
//! - Performance metrics per value path
//! - Result caches keyed by run id
//! - JSON and CSV artifact export

pub mod cache;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;

pub use cache::{JsonDirCache, MemoryCache, NoCache, ResultCache};
pub use config::{ConfigError, DataPaths, DividendSection, LabConfig, RunId, StrategySection};
pub use data_loader::{generate_synthetic, load_market_data, LoadError, LoadOptions, MarketData};
pub use export::{export_json, import_json, save_artifacts};
pub use metrics::PerformanceMetrics;
pub use runner::{
    build_frame, run_annual, run_lab, run_lab_cached, run_margin, run_rebase, AnnualReport,
    AnnualSeries, LabReport, MarginReport, RebaseReport, RebasedVariant, RegimeDay, RunError,
    SkippedView, VariantReport, SCHEMA_VERSION,
};
