//! Simulation engine: regime, costs, routing, compounding and the margin account.
//!
//! A run is built in two steps:
//!
//! 1. `FrameBuilder` aligns prices and every auxiliary series onto the
//!    trading calendar and classifies the regime (`MarketFrame`).
//! 2. Variants read the frame: `route` yields daily records, `Compounder`
//!    turns them into value paths, `MarginAccountSimulator` folds the
//!    margin ledger over `MarginInputs`.

pub mod annual;
pub mod compounder;
pub mod cost_model;
pub mod frame;
pub mod margin;
pub mod regime;
pub mod returns;
pub mod router;

pub use annual::{
    cpi_cagr, dividend_reinvested, inflation_adjusted, margin_rate_view, rotation_index,
    AnnualPoint, RotationIndex,
};
pub use compounder::{Compounder, DEFAULT_INITIAL_CAPITAL};
pub use cost_model::{CostModel, CostParameters, CostSeries};
pub use frame::{
    monthly_to_daily, rotation_daily_returns, DividendSource, FrameBuilder, MarketFrame,
};
pub use margin::{EntryPolicy, MarginAccountSimulator, MarginInputs, MarginParameters};
pub use regime::{RegimeClassifier, RegimeSeries, DEFAULT_SMA_WINDOW};
pub use returns::{price_returns, ReturnModel};
pub use router::{route, Exposure, Gate, RiskOffAsset, StrategyVariant};
