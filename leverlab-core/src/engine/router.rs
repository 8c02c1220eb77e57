//! AllocationRouter: picks the return source for each day of a variant.
//!
//! Every variant is one `StrategyVariant` value: an exposure, a gate that
//! decides when the position is held, and an optional dividend overlay.
//! Routing reads the frame and never mutates it.

use serde::{Deserialize, Serialize};

use crate::domain::DailyReturnRecord;
use crate::engine::frame::MarketFrame;
use crate::engine::returns::floor_return;
use crate::error::EngineError;

/// Exposure of the held position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exposure {
    /// The index at 1x, no costs.
    Unlevered,
    /// The index at the frame's leverage multiple, net of financing and expense.
    Leveraged,
}

/// What the account holds while the regime is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskOffAsset {
    Cash,
    Rotation,
}

/// When the position is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "risk_off", rename_all = "snake_case")]
pub enum Gate {
    AlwaysOn,
    Regime(RiskOffAsset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyVariant {
    pub exposure: Exposure,
    pub gate: Gate,
    /// Add the 1x dividend yield to whatever base return applies.
    pub dividends: bool,
}

impl StrategyVariant {
    pub const fn buy_hold() -> Self {
        Self {
            exposure: Exposure::Unlevered,
            gate: Gate::AlwaysOn,
            dividends: false,
        }
    }

    pub const fn leveraged_buy_hold() -> Self {
        Self {
            exposure: Exposure::Leveraged,
            gate: Gate::AlwaysOn,
            dividends: false,
        }
    }

    pub const fn leveraged_regime() -> Self {
        Self {
            exposure: Exposure::Leveraged,
            gate: Gate::Regime(RiskOffAsset::Cash),
            dividends: false,
        }
    }

    pub const fn leveraged_rotation() -> Self {
        Self {
            exposure: Exposure::Leveraged,
            gate: Gate::Regime(RiskOffAsset::Rotation),
            dividends: false,
        }
    }

    pub const fn leveraged_regime_dividends() -> Self {
        Self {
            dividends: true,
            ..Self::leveraged_regime()
        }
    }

    pub const fn leveraged_rotation_dividends() -> Self {
        Self {
            dividends: true,
            ..Self::leveraged_rotation()
        }
    }

    /// The standard report set, in report order.
    pub fn presets() -> Vec<StrategyVariant> {
        vec![
            Self::buy_hold(),
            Self::leveraged_buy_hold(),
            Self::leveraged_regime(),
            Self::leveraged_rotation(),
            Self::leveraged_regime_dividends(),
            Self::leveraged_rotation_dividends(),
        ]
    }

    /// Stable snake_case name used as a report and cache key.
    pub fn label(&self) -> String {
        let mut label = String::from(match self.exposure {
            Exposure::Unlevered => "",
            Exposure::Leveraged => "leveraged_",
        });
        label.push_str(match self.gate {
            Gate::AlwaysOn => "buy_hold",
            Gate::Regime(RiskOffAsset::Cash) => "regime",
            Gate::Regime(RiskOffAsset::Rotation) => "rotation",
        });
        if self.dividends {
            label.push_str("_dividends");
        }
        label
    }

    pub fn needs_rotation(&self) -> bool {
        self.gate == Gate::Regime(RiskOffAsset::Rotation)
    }
}

/// Route one variant over the whole frame.
///
/// Fails with `MissingSeries` when the variant needs a rotation or dividend
/// column the frame does not carry.
pub fn route(
    frame: &MarketFrame,
    variant: &StrategyVariant,
) -> Result<Vec<DailyReturnRecord>, EngineError> {
    let rotation = if variant.needs_rotation() {
        Some(
            frame
                .rotation_daily
                .as_deref()
                .ok_or(EngineError::MissingSeries { series: "rotation" })?,
        )
    } else {
        None
    };
    let dividends = if variant.dividends {
        Some(
            frame
                .dividend_daily
                .as_deref()
                .ok_or(EngineError::MissingSeries {
                    series: "dividend_yield",
                })?,
        )
    } else {
        None
    };

    let model = frame.return_model();
    let mut records = Vec::with_capacity(frame.len());

    for i in 0..frame.len() {
        let price_return = frame.price_returns[i];
        let held = match variant.gate {
            Gate::AlwaysOn => true,
            Gate::Regime(_) => frame.regime[i],
        };

        let (base, financing, expense) = if held {
            match variant.exposure {
                Exposure::Unlevered => (price_return, 0.0, 0.0),
                Exposure::Leveraged => (
                    model.leveraged_at(&frame.price_returns, &frame.costs, i),
                    frame.costs.financing_daily[i],
                    frame.costs.expense_daily,
                ),
            }
        } else {
            let off = match rotation {
                Some(r) => r[i],
                None => 0.0,
            };
            (off, 0.0, 0.0)
        };

        let strategy_return = match dividends {
            Some(d) => floor_return(base + d[i]),
            None => base,
        };

        records.push(DailyReturnRecord {
            date: frame.dates[i],
            regime_on: frame.regime[i],
            price_return,
            financing_cost_daily: financing,
            expense_cost_daily: expense,
            strategy_return,
        });
    }

    Ok(records)
}
