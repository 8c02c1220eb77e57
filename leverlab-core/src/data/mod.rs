//! Input alignment onto the trading-day calendar

pub mod align;

pub use align::{
    align_filled, align_with_fallback, forward_fill, month_key, monthly_lookup,
    trading_days_per_month, MonthKey,
};
