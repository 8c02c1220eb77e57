//! LeverLab Core: regime-switching leveraged-return engine and margin ledger.
//!
//! This crate contains the simulation itself:
//! - Domain types (price points, dated observations, daily records, ledger rows)
//! - Calendar alignment of rate, CPI, rotation and dividend series
//! - Moving-average regime signal, shifted one day against lookahead
//! - Cost, return and routing models for every strategy variant
//! - Compounding with sub-window re-basing
//! - The margin-account state machine
//! - Year-level inflation and dividend views

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;

pub use error::EngineError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine inputs and outputs are Send + Sync so the
    /// runner can share them across worker threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PricePoint>();
        require_sync::<domain::PricePoint>();
        require_send::<domain::DatedValue>();
        require_sync::<domain::DatedValue>();
        require_send::<domain::DailyReturnRecord>();
        require_sync::<domain::DailyReturnRecord>();
        require_send::<domain::MarginDay>();
        require_sync::<domain::MarginDay>();

        require_send::<engine::MarketFrame>();
        require_sync::<engine::MarketFrame>();
        require_send::<engine::MarginInputs>();
        require_sync::<engine::MarginInputs>();
        require_send::<engine::StrategyVariant>();
        require_sync::<engine::StrategyVariant>();
        require_send::<engine::MarginAccountSimulator>();
        require_sync::<engine::MarginAccountSimulator>();
        require_send::<EngineError>();
        require_sync::<EngineError>();
    }

    /// Compile-time check: routing takes the frame by shared reference only.
    #[allow(dead_code)]
    fn route_borrows_frame(
        frame: &engine::MarketFrame,
        v: &engine::StrategyVariant,
    ) -> Result<Vec<domain::DailyReturnRecord>, EngineError> {
        engine::route(frame, v)
    }
}
