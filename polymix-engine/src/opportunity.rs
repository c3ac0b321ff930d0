//! Cross-platform arbitrage detection and representation.
//!
//! A binary game market pays 100 to whichever outcome wins. Buying the away
//! outcome on one platform and the home outcome on the other guarantees a
//! payout of 100 per contract pair, so the hedge is risk-free whenever the
//! fee- and slippage-adjusted cost of both legs is below 100.

use crate::{
    fees::{FeeSchedule, FeeTable},
    market::{EventKey, MarketRecord, MarketSide, Outcome, Platform},
    matcher::MatchedEvent,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places kept on every reported metric.
pub const METRIC_DP: u32 = 4;

/// Why a matched event does not yield an arbitrage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoArbitrage {
    #[error("missing odds: {platform} {outcome}")]
    MissingOdds { platform: Platform, outcome: Outcome },

    #[error("zero price: {platform} {outcome}")]
    ZeroPrice { platform: Platform, outcome: Outcome },

    #[error("no fee schedule for platform {0}")]
    UnknownPlatform(Platform),

    #[error("invalid arbitrage: same platform on both legs ({0})")]
    SamePlatform(Platform),

    #[error("non-positive total cost: {0}")]
    NonPositiveCost(Decimal),

    #[error("not profitable after fees: ROI {roi_percent}%")]
    NotProfitable { roi_percent: Decimal },
}

/// Which of the two cross-platform hedges was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Buy away on the primary platform, home on the secondary.
    PrimaryAwaySecondaryHome,
    /// Buy away on the secondary platform, home on the primary.
    SecondaryAwayPrimaryHome,
}

impl Strategy {
    /// 1 or 2, as shown in reports.
    pub fn number(&self) -> u8 {
        match self {
            Strategy::PrimaryAwaySecondaryHome => 1,
            Strategy::SecondaryAwayPrimaryHome => 2,
        }
    }
}

/// Effective cost of both candidate strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct StrategyCosts {
    pub strategy_1: Decimal,
    pub strategy_2: Decimal,
}

/// One leg of a hedge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OpportunityLeg {
    pub platform: Platform,
    pub outcome: Outcome,
    /// Quoted price on a 0-100 scale
    pub raw_price: Decimal,
    /// Price including fee and slippage
    pub effective_price: Decimal,
}

/// Both legs of the cheaper strategy before any profitability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HedgeQuote {
    pub strategy: Strategy,
    pub away_leg: OpportunityLeg,
    pub home_leg: OpportunityLeg,
    pub costs: StrategyCosts,
    pub fees: FeeTable,
}

impl HedgeQuote {
    /// Sum of the raw leg prices.
    pub fn gross_cost(&self) -> Decimal {
        self.away_leg.raw_price + self.home_leg.raw_price
    }

    /// Sum of the effective leg prices.
    pub fn total_cost(&self) -> Decimal {
        self.away_leg.effective_price + self.home_leg.effective_price
    }

    /// Return on cost in percent, unrounded.
    ///
    /// Formula: (100 - total_cost) / total_cost * 100
    pub fn roi_percent(&self) -> Option<Decimal> {
        let total_cost = self.total_cost();
        (total_cost > Decimal::ZERO).then(|| {
            (Decimal::ONE_HUNDRED - total_cost) / total_cost * Decimal::ONE_HUNDRED
        })
    }
}

/// A profitable cross-platform hedge on one event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArbitrageOpportunity {
    pub event_key: EventKey,
    pub away_leg: OpportunityLeg,
    pub home_leg: OpportunityLeg,
    /// Raw cost of both legs
    pub gross_cost: Decimal,
    /// 100 - gross_cost
    pub gross_edge: Decimal,
    /// Effective cost of both legs
    pub total_cost: Decimal,
    /// 100 - total_cost
    pub net_edge: Decimal,
    pub roi_percent: Decimal,
    /// Schedules applied to each leg's platform
    pub fees: FeeTable,
    pub strategy: Strategy,
    /// Costs of both strategies, when they were computed here
    pub strategy_costs: Option<StrategyCosts>,
}

impl ArbitrageOpportunity {
    /// Build a rounded opportunity from a quote that passed every check.
    fn from_quote(event_key: EventKey, quote: HedgeQuote, roi_percent: Decimal) -> Self {
        let gross_cost = quote.gross_cost();
        let total_cost = quote.total_cost();

        Self {
            event_key,
            away_leg: round_leg(quote.away_leg),
            home_leg: round_leg(quote.home_leg),
            gross_cost: round(gross_cost),
            gross_edge: round(Decimal::ONE_HUNDRED - gross_cost),
            total_cost: round(total_cost),
            net_edge: round(Decimal::ONE_HUNDRED - total_cost),
            roi_percent: round(roi_percent),
            fees: quote.fees,
            strategy: quote.strategy,
            strategy_costs: Some(StrategyCosts {
                strategy_1: round(quote.costs.strategy_1),
                strategy_2: round(quote.costs.strategy_2),
            }),
        }
    }

    /// Leg for the given outcome.
    pub fn leg(&self, outcome: Outcome) -> &OpportunityLeg {
        match outcome {
            Outcome::Away => &self.away_leg,
            Outcome::Home => &self.home_leg,
        }
    }

    /// True when the hedge costs strictly less than the payout.
    pub fn is_perfect(&self) -> bool {
        self.total_cost < Decimal::ONE_HUNDRED
    }
}

fn round(value: Decimal) -> Decimal {
    value.round_dp(METRIC_DP)
}

fn round_leg(leg: OpportunityLeg) -> OpportunityLeg {
    OpportunityLeg {
        raw_price: round(leg.raw_price),
        effective_price: round(leg.effective_price),
        ..leg
    }
}

/// Evaluates matched events against a fixed fee table.
#[derive(Debug, Clone, Default)]
pub struct ArbitrageCalculator {
    fees: FeeTable,
}

impl ArbitrageCalculator {
    pub fn new(fees: FeeTable) -> Self {
        Self { fees }
    }

    pub fn fees(&self) -> &FeeTable {
        &self.fees
    }

    /// Schedule for `platform`, or [`NoArbitrage::UnknownPlatform`].
    pub fn schedule(&self, platform: &Platform) -> Result<&FeeSchedule, NoArbitrage> {
        self.fees
            .get(platform)
            .ok_or_else(|| NoArbitrage::UnknownPlatform(platform.clone()))
    }

    /// Price both cross-platform strategies and keep the cheaper one.
    ///
    /// Strategy 1 wins ties.
    pub fn quote(&self, event: &MatchedEvent) -> Result<HedgeQuote, NoArbitrage> {
        let primary = &event.primary;
        let secondary = &event.secondary;

        // Validate all four prices before touching the fee table
        for record in [primary, secondary] {
            for outcome in [Outcome::Away, Outcome::Home] {
                checked_price(record, outcome)?;
            }
        }

        if event.is_same_platform() {
            return Err(NoArbitrage::SamePlatform(primary.platform.clone()));
        }

        let primary_fees = *self.schedule(&primary.platform)?;
        let secondary_fees = *self.schedule(&secondary.platform)?;

        let primary_away = priced_leg(primary, Outcome::Away, &primary_fees)?;
        let primary_home = priced_leg(primary, Outcome::Home, &primary_fees)?;
        let secondary_away = priced_leg(secondary, Outcome::Away, &secondary_fees)?;
        let secondary_home = priced_leg(secondary, Outcome::Home, &secondary_fees)?;

        let costs = StrategyCosts {
            strategy_1: primary_away.effective_price + secondary_home.effective_price,
            strategy_2: secondary_away.effective_price + primary_home.effective_price,
        };

        let (strategy, away_leg, home_leg) = if costs.strategy_1 <= costs.strategy_2 {
            (Strategy::PrimaryAwaySecondaryHome, primary_away, secondary_home)
        } else {
            (Strategy::SecondaryAwayPrimaryHome, secondary_away, primary_home)
        };

        let fees = FeeTable::new()
            .with(primary.platform.clone(), primary_fees)
            .with(secondary.platform.clone(), secondary_fees);

        Ok(HedgeQuote {
            strategy,
            away_leg,
            home_leg,
            costs,
            fees,
        })
    }

    /// Evaluate a matched event, returning the opportunity only when it is
    /// profitable after fees and slippage.
    pub fn evaluate(&self, event: &MatchedEvent) -> Result<ArbitrageOpportunity, NoArbitrage> {
        let quote = self.quote(event)?;
        Self::finalize(event.event_key.clone(), quote)
    }

    /// Evaluate an explicit pair of legs, away side treated as primary.
    pub fn evaluate_legs(
        &self,
        event_key: EventKey,
        away: &MarketSide,
        home: &MarketSide,
    ) -> Result<ArbitrageOpportunity, NoArbitrage> {
        let away_fees = *self.schedule(&away.platform)?;
        let home_fees = *self.schedule(&home.platform)?;
        let away_leg = side_leg(away, Outcome::Away, &away_fees)?;
        let home_leg = side_leg(home, Outcome::Home, &home_fees)?;

        let total = away_leg.effective_price + home_leg.effective_price;
        let quote = HedgeQuote {
            strategy: Strategy::PrimaryAwaySecondaryHome,
            away_leg,
            home_leg,
            costs: StrategyCosts {
                strategy_1: total,
                strategy_2: total,
            },
            fees: FeeTable::new()
                .with(away.platform.clone(), away_fees)
                .with(home.platform.clone(), home_fees),
        };

        Self::finalize(event_key, quote)
    }

    fn finalize(event_key: EventKey, quote: HedgeQuote) -> Result<ArbitrageOpportunity, NoArbitrage> {
        if quote.away_leg.platform == quote.home_leg.platform {
            return Err(NoArbitrage::SamePlatform(quote.away_leg.platform.clone()));
        }

        let roi_percent = quote
            .roi_percent()
            .ok_or_else(|| NoArbitrage::NonPositiveCost(quote.total_cost()))?;

        if roi_percent <= Decimal::ZERO {
            return Err(NoArbitrage::NotProfitable {
                roi_percent: round(roi_percent),
            });
        }

        Ok(ArbitrageOpportunity::from_quote(event_key, quote, roi_percent))
    }
}

fn checked_price(record: &MarketRecord, outcome: Outcome) -> Result<Decimal, NoArbitrage> {
    let price = record
        .raw_price(outcome)
        .ok_or_else(|| NoArbitrage::MissingOdds {
            platform: record.platform.clone(),
            outcome,
        })?;

    if price <= Decimal::ZERO {
        return Err(NoArbitrage::ZeroPrice {
            platform: record.platform.clone(),
            outcome,
        });
    }

    Ok(price)
}

fn priced_leg(
    record: &MarketRecord,
    outcome: Outcome,
    schedule: &FeeSchedule,
) -> Result<OpportunityLeg, NoArbitrage> {
    let raw_price = checked_price(record, outcome)?;
    Ok(OpportunityLeg {
        platform: record.platform.clone(),
        outcome,
        raw_price,
        effective_price: schedule.effective_price(raw_price),
    })
}

fn side_leg(
    side: &MarketSide,
    outcome: Outcome,
    schedule: &FeeSchedule,
) -> Result<OpportunityLeg, NoArbitrage> {
    if !side.is_tradable() {
        return Err(NoArbitrage::ZeroPrice {
            platform: side.platform.clone(),
            outcome,
        });
    }

    Ok(OpportunityLeg {
        platform: side.platform.clone(),
        outcome,
        raw_price: side.raw_price,
        effective_price: schedule.effective_price(side.raw_price),
    })
}

/// Arbitrage details computed upstream and attached to a trade request.
///
/// Every field is optional because upstream producers may send partial
/// details. A record missing any required field is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecomputedArb {
    pub best_away_from: Option<Platform>,
    pub best_home_from: Option<Platform>,
    pub best_away_price: Option<Decimal>,
    pub best_home_price: Option<Decimal>,
    pub best_away_effective: Option<Decimal>,
    pub best_home_effective: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    /// Net edge per 100 units
    pub edge: Option<Decimal>,
    pub gross_cost: Option<Decimal>,
    pub gross_edge: Option<Decimal>,
    pub roi_percent: Option<Decimal>,
}

impl PrecomputedArb {
    /// True when every field needed to trade is present.
    pub fn is_complete(&self) -> bool {
        self.best_away_from.is_some()
            && self.best_home_from.is_some()
            && self.best_away_price.is_some()
            && self.best_home_price.is_some()
            && self.best_away_effective.is_some()
            && self.best_home_effective.is_some()
            && self.total_cost.is_some()
            && self.edge.is_some()
    }

    /// Convert into an opportunity for `event`, or `None` if incomplete.
    ///
    /// Missing gross figures are derived from the raw prices, and a missing
    /// ROI from the net edge and total cost.
    pub fn to_opportunity(&self, event: &MatchedEvent) -> Option<ArbitrageOpportunity> {
        let away_platform = self.best_away_from.clone()?;
        let home_platform = self.best_home_from.clone()?;
        let away_price = self.best_away_price?;
        let home_price = self.best_home_price?;
        let total_cost = self.total_cost?;
        let net_edge = self.edge?;

        let gross_cost = self.gross_cost.unwrap_or(away_price + home_price);
        let gross_edge = self.gross_edge.unwrap_or(Decimal::ONE_HUNDRED - gross_cost);
        let roi_percent = match self.roi_percent {
            Some(roi) => roi,
            None if total_cost > Decimal::ZERO => round(net_edge / total_cost * Decimal::ONE_HUNDRED),
            None => Decimal::ZERO,
        };

        let strategy = if away_platform == event.primary.platform {
            Strategy::PrimaryAwaySecondaryHome
        } else {
            Strategy::SecondaryAwayPrimaryHome
        };

        Some(ArbitrageOpportunity {
            event_key: event.event_key.clone(),
            away_leg: OpportunityLeg {
                platform: away_platform,
                outcome: Outcome::Away,
                raw_price: away_price,
                effective_price: self.best_away_effective?,
            },
            home_leg: OpportunityLeg {
                platform: home_platform,
                outcome: Outcome::Home,
                raw_price: home_price,
                effective_price: self.best_home_effective?,
            },
            gross_cost,
            gross_edge,
            total_cost,
            net_edge,
            roi_percent,
            fees: FeeTable::new(),
            strategy,
            strategy_costs: None,
        })
    }
}
