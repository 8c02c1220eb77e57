//! Margin account simulator: a day-by-day fold over cash, debt and position.
//!
//! The account starts flat with no cash. Whenever the regime turns on it
//! borrows the full margin limit and invests it together with any cash; when
//! the regime turns off it sells and repays as much debt as the proceeds
//! cover. Interest accrues daily on outstanding debt and is paid out of cash
//! once a year, when the margin limit is also indexed to the past year's CPI
//! change.
//!
//! Per-day order is fixed and matters numerically:
//!
//! 1. year-boundary settlement (limit indexation, interest deduction)
//! 2. interest accrual on the current debt
//! 3. regime transition (enter, hold, exit, stay out)
//! 4. record
//!
//! All rate and CPI lookups are aligned arrays built before the loop.

use std::ops::Range;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::data::align_filled;
use crate::domain::{validate_observations, DatedValue, MarginDay};
use crate::engine::frame::{window_range, MarketFrame};
use crate::error::EngineError;

pub const DEFAULT_BASE_LIMIT: f64 = 2000.0;
pub const DEFAULT_SPREAD_PCT: f64 = 1.5;

/// Calendar days per year used for interest accrual.
pub const INTEREST_DAYS_PER_YEAR: f64 = 365.0;

/// What happens when cash is so negative that cash + new margin < 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPolicy {
    /// Take the margin anyway: nothing is invested, the draw offsets the
    /// cash shortfall and the account is marked in market.
    #[default]
    Clamp,
    /// Refuse the entry and stay out of market.
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginParameters {
    /// Margin limit in the first simulated year.
    pub base_limit: f64,
    /// Added to the reference rate, in annual percent.
    pub spread_pct: f64,
    pub entry_policy: EntryPolicy,
}

impl Default for MarginParameters {
    fn default() -> Self {
        Self {
            base_limit: DEFAULT_BASE_LIMIT,
            spread_pct: DEFAULT_SPREAD_PCT,
            entry_policy: EntryPolicy::Clamp,
        }
    }
}

/// Per-day inputs of the simulator, all of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginInputs {
    pub dates: Vec<NaiveDate>,
    pub regime: Vec<bool>,
    /// Return applied to the invested position while held.
    pub position_returns: Vec<f64>,
    /// Reference rate in annual percent, without the spread.
    pub rate_pct: Vec<f64>,
    pub cpi: Vec<f64>,
}

impl MarginInputs {
    /// Take dates, regime and leveraged returns from the frame and align the
    /// margin reference rate and CPI onto its calendar.
    pub fn from_frame(
        frame: &MarketFrame,
        margin_rate: &[DatedValue],
        cpi: &[DatedValue],
    ) -> Result<Self, EngineError> {
        validate_observations("margin_rate", margin_rate)?;
        validate_observations("cpi", cpi)?;
        let rate_pct = align_filled("margin_rate", &frame.dates, margin_rate)?;
        let cpi = align_filled("cpi", &frame.dates, cpi)?;
        Ok(Self {
            dates: frame.dates.clone(),
            regime: frame.regime.clone(),
            position_returns: frame.leveraged_returns(),
            rate_pct,
            cpi,
        })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn slice(&self, r: Range<usize>) -> Self {
        Self {
            dates: self.dates[r.clone()].to_vec(),
            regime: self.regime[r.clone()].to_vec(),
            position_returns: self.position_returns[r.clone()].to_vec(),
            rate_pct: self.rate_pct[r.clone()].to_vec(),
            cpi: self.cpi[r].to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
struct MarginState {
    cash: f64,
    debt: f64,
    invested: f64,
    margin_limit: f64,
    accrued_interest: f64,
    in_market: bool,
    current_year: i32,
    year_start_cpi: f64,
}

impl MarginState {
    fn new(limit: f64, first_date: NaiveDate, first_cpi: f64) -> Self {
        Self {
            cash: 0.0,
            debt: 0.0,
            invested: 0.0,
            margin_limit: limit,
            accrued_interest: 0.0,
            in_market: false,
            current_year: first_date.year(),
            year_start_cpi: first_cpi,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarginAccountSimulator {
    params: MarginParameters,
}

impl MarginAccountSimulator {
    pub fn new(params: MarginParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MarginParameters {
        &self.params
    }

    /// Run the account over every day of `inputs`.
    pub fn run(&self, inputs: &MarginInputs) -> Vec<MarginDay> {
        let n = inputs.len();
        let mut ledger = Vec::with_capacity(n);
        if n == 0 {
            return ledger;
        }
        let mut s = MarginState::new(self.params.base_limit, inputs.dates[0], inputs.cpi[0]);

        for i in 0..n {
            let date = inputs.dates[i];

            if date.year() != s.current_year {
                self.settle_year(&mut s, inputs.cpi[i - 1], date);
            }

            let annual = (inputs.rate_pct[i] + self.params.spread_pct) / 100.0;
            s.accrued_interest += s.debt * (annual / INTEREST_DAYS_PER_YEAR);

            let on = inputs.regime[i];
            let mut underfunded = false;
            match (on, s.in_market) {
                (true, false) => underfunded = self.enter(&mut s, date),
                (true, true) => s.invested *= 1.0 + inputs.position_returns[i],
                (false, true) => exit(&mut s, date),
                (false, false) => {}
            }

            ledger.push(MarginDay {
                date,
                regime_on: on,
                in_market: s.in_market,
                cash: s.cash,
                debt: s.debt,
                invested: s.invested,
                margin_limit: s.margin_limit,
                accrued_interest: s.accrued_interest,
                reference_rate_pct: inputs.rate_pct[i],
                underfunded_entry: underfunded,
            });
        }

        ledger
    }

    /// Run the account from its initial state over `[start, end]` only.
    pub fn rebase(
        &self,
        inputs: &MarginInputs,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarginDay>, EngineError> {
        let r = window_range(&inputs.dates, start, end)?;
        Ok(self.run(&inputs.slice(r)))
    }

    fn settle_year(&self, s: &mut MarginState, year_end_cpi: f64, date: NaiveDate) {
        let inflation = if s.year_start_cpi > 0.0 {
            year_end_cpi / s.year_start_cpi - 1.0
        } else {
            0.0
        };
        s.margin_limit *= 1.0 + inflation;
        s.cash -= s.accrued_interest;
        debug!(
            year = s.current_year,
            inflation,
            interest = s.accrued_interest,
            margin_limit = s.margin_limit,
            "settled margin year"
        );
        s.accrued_interest = 0.0;
        s.current_year = date.year();
        s.year_start_cpi = year_end_cpi;
    }

    /// Returns true when the entry was underfunded.
    fn enter(&self, s: &mut MarginState, date: NaiveDate) -> bool {
        let available = s.cash + s.margin_limit;
        if available >= 0.0 {
            s.debt = s.margin_limit;
            s.invested = available;
            s.cash = 0.0;
            s.in_market = true;
            debug!(%date, debt = s.debt, invested = s.invested, "entered market");
            return false;
        }

        match self.params.entry_policy {
            EntryPolicy::Clamp => {
                warn!(%date, cash = s.cash, margin_limit = s.margin_limit, "underfunded entry, nothing invested");
                s.debt = s.margin_limit;
                s.invested = 0.0;
                s.cash = available;
                s.in_market = true;
            }
            EntryPolicy::Block => {
                warn!(%date, cash = s.cash, margin_limit = s.margin_limit, "underfunded entry refused");
            }
        }
        true
    }
}

fn exit(s: &mut MarginState, date: NaiveDate) {
    let proceeds = s.invested;
    s.invested = 0.0;
    if proceeds >= s.debt {
        s.cash = proceeds - s.debt;
        s.debt = 0.0;
    } else {
        s.debt -= proceeds;
        s.cash = 0.0;
    }
    s.in_market = false;
    debug!(%date, proceeds, debt = s.debt, cash = s.cash, "exited market");
}
