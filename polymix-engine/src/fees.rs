//! Platform fee and slippage schedules.
//!
//! Uses rust_decimal for exact precision in financial calculations. Prices
//! are on a 0-100 scale (cents per contract paying out 100 cents).

use crate::market::Platform;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default slippage allowance applied to every leg (0.5%).
pub const DEFAULT_SLIPPAGE_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Trading fee and slippage allowance for one platform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeeSchedule {
    /// Trading fee as a fraction of the price (e.g. 0.02 = 2%)
    pub fee_rate: Decimal,
    /// Slippage allowance as a fraction of the price
    pub slippage_rate: Decimal,
}

impl FeeSchedule {
    pub fn new(fee_rate: Decimal, slippage_rate: Decimal) -> Self {
        Self {
            fee_rate,
            slippage_rate,
        }
    }

    /// A schedule with neither fees nor slippage.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    /// Price multiplier: `1 + fee_rate + slippage_rate`.
    pub fn multiplier(&self) -> Decimal {
        Decimal::ONE + self.fee_rate + self.slippage_rate
    }

    /// All-in cost of buying one contract at `price`.
    ///
    /// Formula: price * (1 + fee_rate + slippage_rate)
    pub fn effective_price(&self, price: Decimal) -> Decimal {
        price * self.multiplier()
    }

    /// Fees plus slippage in dollars for `quantity` contracts at `price`.
    ///
    /// Formula: (effective - price) * quantity / 100
    pub fn fee_usd(&self, price: Decimal, quantity: Decimal) -> Decimal {
        (self.effective_price(price) - price) * quantity / Decimal::ONE_HUNDRED
    }

    /// Slippage share of the fee, in dollars.
    ///
    /// Formula: price * slippage_rate * quantity / 100
    pub fn slippage_usd(&self, price: Decimal, quantity: Decimal) -> Decimal {
        price * self.slippage_rate * quantity / Decimal::ONE_HUNDRED
    }
}

/// Fee schedules keyed by platform. Loaded once at startup and treated as
/// immutable for the rest of the run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FeeTable {
    schedules: IndexMap<Platform, FeeSchedule>,
}

impl FeeTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            schedules: IndexMap::new(),
        }
    }

    /// Add or replace the schedule for a platform.
    pub fn with(mut self, platform: impl Into<Platform>, schedule: FeeSchedule) -> Self {
        self.schedules.insert(platform.into(), schedule);
        self
    }

    pub fn get(&self, platform: &Platform) -> Option<&FeeSchedule> {
        self.schedules.get(platform)
    }

    pub fn contains(&self, platform: &Platform) -> bool {
        self.schedules.contains_key(platform)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Platform, &FeeSchedule)> {
        self.schedules.iter()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }
}

impl Default for FeeTable {
    /// Polymarket 2%, Kalshi 7%, Manifold 0%, each with 0.5% slippage.
    fn default() -> Self {
        Self::new()
            .with(
                Platform::polymarket(),
                FeeSchedule::new(Decimal::new(2, 2), DEFAULT_SLIPPAGE_RATE),
            )
            .with(
                Platform::kalshi(),
                FeeSchedule::new(Decimal::new(7, 2), DEFAULT_SLIPPAGE_RATE),
            )
            .with(
                Platform::manifold(),
                FeeSchedule::new(Decimal::ZERO, DEFAULT_SLIPPAGE_RATE),
            )
    }
}
