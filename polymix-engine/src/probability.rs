//! Conversion of raw per-side prices into whole-number implied probabilities.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Implied probabilities of a binary market, in whole percent.
///
/// Produced by [`normalize`]; `away + home == 100` unless both raw prices
/// were zero, in which case both are zero.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ImpliedProbabilities {
    pub away: u8,
    pub home: u8,
}

impl ImpliedProbabilities {
    pub fn new(away: u8, home: u8) -> Self {
        Self { away, home }
    }

    /// True if the two sides account for the whole market.
    pub fn is_complete(&self) -> bool {
        u16::from(self.away) + u16::from(self.home) == 100
    }
}

/// Normalize two complementary raw prices (0-100 scale) into integer
/// percentages that sum to exactly 100.
///
/// Each side is floored; the one-point remainder goes to the side with the
/// smaller raw price (away wins ties). Negative inputs count as zero.
pub fn normalize(away_raw: Decimal, home_raw: Decimal) -> ImpliedProbabilities {
    let away = away_raw.max(Decimal::ZERO);
    let home = home_raw.max(Decimal::ZERO);
    let total = away + home;

    if total <= Decimal::ZERO {
        return ImpliedProbabilities::default();
    }

    let away_floor = floor_percent(away, total);
    let home_floor = floor_percent(home, total);
    let remainder = 100u16.saturating_sub(away_floor + home_floor);

    let (away_pct, home_pct) = if away <= home {
        (away_floor + remainder, home_floor)
    } else {
        (away_floor, home_floor + remainder)
    };

    ImpliedProbabilities {
        away: away_pct.min(100) as u8,
        home: home_pct.min(100) as u8,
    }
}

fn floor_percent(part: Decimal, total: Decimal) -> u16 {
    (part * Decimal::ONE_HUNDRED / total)
        .floor()
        .to_u16()
        .unwrap_or(0)
        .min(100)
}
