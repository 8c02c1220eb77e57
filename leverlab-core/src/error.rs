//! Engine error types.
//!
//! Numeric edge cases (zero previous close, a month with no observed trading
//! days, a leading gap in the financing-rate series) are resolved by fixed
//! fallback rules inside the engine and never surface here.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by the simulation engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("insufficient history: {points} price points < moving-average window {window}")]
    InsufficientHistory { points: usize, window: usize },

    #[error("required series '{series}' has no rows")]
    EmptySeries { series: &'static str },

    #[error("optional series '{series}' was not supplied")]
    MissingSeries { series: &'static str },

    #[error("invalid range {start}..={end}: {reason}")]
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
        reason: String,
    },

    #[error("series '{series}' has no defined value to fill the calendar from")]
    UndefinedRate { series: &'static str },

    #[error("malformed series '{series}': {reason}")]
    MalformedSeries { series: &'static str, reason: String },
}

impl EngineError {
    /// True when the error only means an optional enrichment view cannot be
    /// produced. The caller should skip that view and keep the rest of the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::MissingSeries { .. } | EngineError::EmptySeries { .. }
        )
    }
}
