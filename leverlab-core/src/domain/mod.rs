//! Domain types for LeverLab

pub mod point;
pub mod record;

pub use point::{validate_observations, validate_prices, DatedValue, PricePoint};
pub use record::{DailyReturnRecord, GrowthPoint, MarginDay, RETURN_FLOOR};
