//! Paper-trading ledger: a virtual balance and the hedged bets placed
//! against it.
//!
//! Every bet moves through `Pending -> Settled` exactly once. Rejected
//! trade attempts never create a bet.

use crate::{
    config::PaperTradingConfig,
    market::{EventKey, MarketRecord, Outcome, Platform},
    matcher::MatchedEvent,
    opportunity::{
        ArbitrageCalculator, ArbitrageOpportunity, NoArbitrage, OpportunityLeg, PrecomputedArb,
        Strategy, StrategyCosts,
    },
    settlement::{SettlementStatusLookup, recover_market_ref},
    store::LedgerStore,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Pending,
    Settled,
}

/// How the opportunity behind a bet was sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbType {
    /// Precomputed upstream with total cost below 100
    Perfect,
    /// Precomputed upstream with total cost at or above 100
    Near,
    /// Computed by the ledger from the matched records
    BinaryCrossMarket,
}

/// One hedged leg of a bet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BetLeg {
    pub platform: Platform,
    pub outcome: Outcome,
    pub price: Decimal,
    pub effective_price: Decimal,
    pub outcome_code: SmolStr,
    pub outcome_label: String,
    /// Market queried at settlement time
    pub external_market_ref: Option<SmolStr>,
    pub url: String,
    pub fee_rate: Decimal,
    pub cost_usd: Decimal,
    pub fee_usd: Decimal,
    pub slippage_usd: Decimal,
    /// Payout if this leg wins
    pub payout_usd: Decimal,
}

/// A paper-traded hedge on one event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Bet {
    /// Canonical event key; at most one pending bet per key.
    pub id: EventKey,
    /// Position of the bet in execution order, unique within a ledger.
    #[serde(default)]
    pub sequence: u64,
    pub description: String,
    pub sport: SmolStr,
    pub game_time: Option<String>,
    pub legs: [BetLeg; 2],
    pub quantity: Decimal,
    pub cost: Decimal,
    pub expected_payout: Decimal,
    pub expected_profit: Decimal,
    pub roi_percent: Decimal,
    pub status: BetStatus,
    pub settled_amount: Decimal,
    pub realized_profit: Decimal,
    pub fees_total_usd: Decimal,
    pub slippage_total_usd: Decimal,
    pub total_cost_per_unit: Decimal,
    pub arb_type: ArbType,
    pub strategy: Strategy,
    pub strategy_costs: Option<StrategyCosts>,
    pub timestamp: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Bet {
    pub fn is_pending(&self) -> bool {
        self.status == BetStatus::Pending
    }
}

/// Persisted ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerSnapshot {
    pub balance: Decimal,
    pub initial_balance: Decimal,
    pub bets: Vec<Bet>,
}

impl LedgerSnapshot {
    /// Fresh ledger holding `initial_balance` and no bets.
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            balance: initial_balance,
            initial_balance,
            bets: Vec::new(),
        }
    }

    /// Sequence number for the next executed bet.
    pub fn next_sequence(&self) -> u64 {
        self.bets.iter().map(|bet| bet.sequence + 1).max().unwrap_or(0)
    }

    /// Pending bet for `key`, if one is open.
    pub fn pending_bet(&self, key: &EventKey) -> Option<&Bet> {
        self.bets.iter().find(|bet| &bet.id == key && bet.is_pending())
    }
}

/// Reasons a trade attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeRejection {
    #[error("no risk-free arbitrage: {0}")]
    NoOpportunity(#[from] NoArbitrage),

    #[error("invalid odds: zero price in precomputed arbitrage")]
    ZeroPrice,

    #[error("ROI ({roi_percent}%) below threshold ({min_roi}%)")]
    RoiBelowThreshold { roi_percent: Decimal, min_roi: Decimal },

    #[error("insufficient balance: cost {cost} exceeds balance {balance}")]
    InsufficientBalance { cost: Decimal, balance: Decimal },

    #[error("market already traded: {0} has a pending position")]
    DuplicatePosition(EventKey),

    #[error("invalid arbitrage: both legs on the same platform ({0})")]
    SamePlatform(Platform),

    #[error("invalid arbitrage: unknown platform {0}")]
    UnknownPlatform(Platform),
}

/// A matched event offered for execution, optionally carrying an
/// opportunity computed upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeCandidate {
    pub event: MatchedEvent,
    pub precomputed: Option<PrecomputedArb>,
}

impl TradeCandidate {
    pub fn new(event: MatchedEvent) -> Self {
        Self {
            event,
            precomputed: None,
        }
    }

    pub fn with_precomputed(mut self, precomputed: PrecomputedArb) -> Self {
        self.precomputed = Some(precomputed);
        self
    }
}

/// Outcome of one settlement pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettlementSummary {
    /// Pending bets examined
    pub checked: usize,
    /// Bets settled in this pass
    pub settled: Vec<EventKey>,
    /// Sum of payouts credited in this pass
    pub total_payout: Decimal,
}

impl SettlementSummary {
    pub fn still_pending(&self) -> usize {
        self.checked - self.settled.len()
    }
}

/// Account overview for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LedgerSummary {
    pub balance: Decimal,
    pub initial_balance: Decimal,
    /// Realized profit over settled bets
    pub total_profit: Decimal,
    /// Expected profit over pending bets
    pub estimated_profit: Decimal,
    pub total_trades: usize,
    pub pending_trades: usize,
    pub settled_trades: usize,
    /// All bets, newest first
    pub bets: Vec<Bet>,
}

/// Paper-trading account.
///
/// Balance and bets sit behind one ledger-wide lock. Every mutation is
/// persisted through the [`LedgerStore`]; a failed save is logged and the
/// in-memory state remains authoritative.
pub struct PaperLedger {
    state: Mutex<LedgerSnapshot>,
    config: PaperTradingConfig,
    calculator: ArbitrageCalculator,
    store: Box<dyn LedgerStore>,
}

impl std::fmt::Debug for PaperLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperLedger")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PaperLedger {
    /// Open the ledger, resuming from the store when it holds a snapshot.
    ///
    /// A missing or unreadable snapshot starts a fresh ledger.
    pub fn open(
        config: PaperTradingConfig,
        calculator: ArbitrageCalculator,
        store: impl LedgerStore + 'static,
    ) -> Self {
        let snapshot = match store.load() {
            Ok(Some(snapshot)) => {
                info!(
                    balance = %snapshot.balance,
                    bets = snapshot.bets.len(),
                    "Resumed paper trading ledger"
                );
                snapshot
            }
            Ok(None) => LedgerSnapshot::new(config.initial_balance),
            Err(error) => {
                error!(%error, "Failed to load ledger snapshot, starting fresh");
                LedgerSnapshot::new(config.initial_balance)
            }
        };

        Self {
            state: Mutex::new(snapshot),
            config,
            calculator,
            store: Box::new(store),
        }
    }

    pub fn config(&self) -> &PaperTradingConfig {
        &self.config
    }

    pub fn balance(&self) -> Decimal {
        self.state.lock().balance
    }

    /// Copy of the full ledger state.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.lock().clone()
    }

    pub fn has_pending(&self, key: &EventKey) -> bool {
        self.state.lock().pending_bet(key).is_some()
    }

    /// Attempt to paper trade the candidate's arbitrage.
    ///
    /// Uses the candidate's precomputed opportunity when it is complete and
    /// shows a positive edge, otherwise recomputes from the matched records.
    pub fn execute_arbitrage(&self, candidate: &TradeCandidate) -> Result<Bet, TradeRejection> {
        let event = &candidate.event;
        let (opportunity, arb_type) = self.select_opportunity(candidate)?;

        let quantity = self.config.bet_amount;
        let cost = opportunity.total_cost / Decimal::ONE_HUNDRED * quantity;
        let expected_profit = opportunity.net_edge / Decimal::ONE_HUNDRED * quantity;

        if opportunity.roi_percent <= self.config.min_roi {
            return Err(TradeRejection::RoiBelowThreshold {
                roi_percent: opportunity.roi_percent,
                min_roi: self.config.min_roi,
            });
        }

        let mut state = self.state.lock();

        if cost > state.balance {
            return Err(TradeRejection::InsufficientBalance {
                cost,
                balance: state.balance,
            });
        }

        if state.pending_bet(&opportunity.event_key).is_some() {
            return Err(TradeRejection::DuplicatePosition(opportunity.event_key));
        }

        if opportunity.away_leg.platform == opportunity.home_leg.platform {
            return Err(TradeRejection::SamePlatform(opportunity.away_leg.platform));
        }

        let away = self.build_leg(event, &opportunity.away_leg, quantity)?;
        let home = self.build_leg(event, &opportunity.home_leg, quantity)?;

        let bet = Bet {
            id: opportunity.event_key.clone(),
            sequence: state.next_sequence(),
            description: event.primary.description(),
            sport: event.primary.sport.clone(),
            game_time: event.primary.game_time.clone(),
            fees_total_usd: away.fee_usd + home.fee_usd,
            slippage_total_usd: away.slippage_usd + home.slippage_usd,
            legs: [away, home],
            quantity,
            cost,
            expected_payout: quantity,
            expected_profit,
            roi_percent: opportunity.roi_percent,
            status: BetStatus::Pending,
            settled_amount: Decimal::ZERO,
            realized_profit: Decimal::ZERO,
            total_cost_per_unit: opportunity.total_cost,
            arb_type,
            strategy: opportunity.strategy,
            strategy_costs: opportunity.strategy_costs,
            timestamp: Utc::now(),
            settled_at: None,
        };

        state.balance -= cost;
        assert!(
            state.balance >= Decimal::ZERO,
            "ledger balance went negative executing {}",
            bet.id
        );
        state.bets.push(bet.clone());
        self.persist(&state);

        info!(
            id = %bet.id,
            cost = %bet.cost,
            expected_profit = %bet.expected_profit,
            roi_percent = %bet.roi_percent,
            balance = %state.balance,
            "Executed paper arbitrage"
        );

        Ok(bet)
    }

    fn select_opportunity(
        &self,
        candidate: &TradeCandidate,
    ) -> Result<(ArbitrageOpportunity, ArbType), TradeRejection> {
        let precomputed = candidate
            .precomputed
            .as_ref()
            .and_then(|precomputed| precomputed.to_opportunity(&candidate.event));

        if let Some(opportunity) = precomputed {
            if opportunity.away_leg.raw_price <= Decimal::ZERO
                || opportunity.home_leg.raw_price <= Decimal::ZERO
            {
                return Err(TradeRejection::ZeroPrice);
            }

            if opportunity.net_edge > Decimal::ZERO {
                let arb_type = if opportunity.is_perfect() {
                    ArbType::Perfect
                } else {
                    ArbType::Near
                };
                return Ok((opportunity, arb_type));
            }

            debug!(id = %opportunity.event_key, "Precomputed arbitrage has no edge, recomputing");
        }

        let opportunity = self.calculator.evaluate(&candidate.event)?;
        Ok((opportunity, ArbType::BinaryCrossMarket))
    }

    fn build_leg(
        &self,
        event: &MatchedEvent,
        leg: &OpportunityLeg,
        quantity: Decimal,
    ) -> Result<BetLeg, TradeRejection> {
        let schedule = self
            .calculator
            .schedule(&leg.platform)
            .map_err(|_| TradeRejection::UnknownPlatform(leg.platform.clone()))?;

        let record: &MarketRecord = event
            .record_for(&leg.platform)
            .ok_or_else(|| TradeRejection::UnknownPlatform(leg.platform.clone()))?;

        // Codes and labels come from the primary record so settlement
        // compares winners against one canonical naming.
        let canonical = &event.primary;

        let cost_usd = leg.effective_price * quantity / Decimal::ONE_HUNDRED;

        Ok(BetLeg {
            platform: leg.platform.clone(),
            outcome: leg.outcome,
            price: leg.raw_price,
            effective_price: leg.effective_price,
            outcome_code: SmolStr::new(canonical.code(leg.outcome)),
            outcome_label: canonical.team(leg.outcome).to_string(),
            external_market_ref: record.external_ref(leg.outcome).cloned(),
            url: record.url.clone(),
            fee_rate: schedule.fee_rate,
            cost_usd,
            fee_usd: schedule.fee_usd(leg.raw_price, quantity),
            slippage_usd: schedule.slippage_usd(leg.raw_price, quantity),
            payout_usd: quantity,
        })
    }

    /// Settle every pending bet whose legs have all resolved.
    ///
    /// Lookups run without holding the ledger lock. A leg with no market
    /// reference, or whose lookup fails, leaves its bet pending.
    pub fn settle(&self, lookup: &impl SettlementStatusLookup) -> SettlementSummary {
        let pending: Vec<(EventKey, u64, [BetLeg; 2], Decimal)> = self
            .state
            .lock()
            .bets
            .iter()
            .filter(|bet| bet.is_pending())
            .map(|bet| (bet.id.clone(), bet.sequence, bet.legs.clone(), bet.quantity))
            .collect();

        let mut summary = SettlementSummary {
            checked: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            return summary;
        }

        let resolutions: Vec<BetResolution> = pending
            .into_iter()
            .map(|(id, sequence, legs, quantity)| resolve_bet(lookup, id, sequence, &legs, quantity))
            .collect();

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut changed = false;

        for resolution in resolutions {
            let Some(bet) = state
                .bets
                .iter_mut()
                .find(|bet| {
                    bet.id == resolution.id && bet.sequence == resolution.sequence && bet.is_pending()
                })
            else {
                continue;
            };

            for (leg, recovered) in bet.legs.iter_mut().zip(resolution.recovered_refs) {
                if let Some(market_ref) = recovered {
                    leg.external_market_ref = Some(market_ref);
                    changed = true;
                }
            }

            let Some(payout) = resolution.payout else {
                continue;
            };

            assert!(bet.is_pending(), "bet {} settled twice", bet.id);
            bet.status = BetStatus::Settled;
            bet.settled_amount = payout;
            bet.realized_profit = payout - bet.cost;
            bet.settled_at = Some(Utc::now());

            info!(
                id = %bet.id,
                payout = %payout,
                realized_profit = %bet.realized_profit,
                "Settled paper bet"
            );

            summary.settled.push(bet.id.clone());
            summary.total_payout += payout;
            state.balance += payout;
            changed = true;
        }

        assert!(
            state.balance >= Decimal::ZERO,
            "ledger balance went negative during settlement"
        );

        if changed {
            self.persist(state);
        }

        summary
    }

    /// Account overview with bets sorted newest first.
    pub fn summary(&self) -> LedgerSummary {
        let state = self.state.lock();

        let mut summary = LedgerSummary {
            balance: state.balance,
            initial_balance: state.initial_balance,
            total_profit: Decimal::ZERO,
            estimated_profit: Decimal::ZERO,
            total_trades: state.bets.len(),
            pending_trades: 0,
            settled_trades: 0,
            bets: state.bets.iter().rev().cloned().collect(),
        };

        for bet in &state.bets {
            match bet.status {
                BetStatus::Pending => {
                    summary.pending_trades += 1;
                    summary.estimated_profit += bet.expected_profit;
                }
                BetStatus::Settled => {
                    summary.settled_trades += 1;
                    summary.total_profit += bet.realized_profit;
                }
            }
        }

        summary.bets.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        summary
    }

    /// Restore the configured initial balance and drop all bets.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = LedgerSnapshot::new(self.config.initial_balance);
        self.persist(&state);
        info!(balance = %state.balance, "Reset paper trading ledger");
    }

    fn persist(&self, snapshot: &LedgerSnapshot) {
        if let Err(error) = self.store.save(snapshot) {
            error!(%error, "Failed to persist ledger snapshot");
        }
    }
}

/// Result of querying every leg of one pending bet.
struct BetResolution {
    id: EventKey,
    sequence: u64,
    /// Payout when every leg resolved
    payout: Option<Decimal>,
    /// Market references recovered from leg URLs, by leg index
    recovered_refs: [Option<SmolStr>; 2],
}

fn resolve_bet(
    lookup: &impl SettlementStatusLookup,
    id: EventKey,
    sequence: u64,
    legs: &[BetLeg; 2],
    quantity: Decimal,
) -> BetResolution {
    let mut recovered_refs: [Option<SmolStr>; 2] = [None, None];
    let mut payout = Some(Decimal::ZERO);

    for (index, leg) in legs.iter().enumerate() {
        let market_ref = match &leg.external_market_ref {
            Some(market_ref) => Some(market_ref.clone()),
            None => {
                let recovered = recover_market_ref(&leg.url);
                recovered_refs[index] = recovered.clone();
                recovered
            }
        };

        let Some(market_ref) = market_ref else {
            debug!(%id, platform = %leg.platform, "Leg has no market reference, leaving pending");
            payout = None;
            continue;
        };

        // Lookups stop once the bet cannot settle; URL recovery above still runs
        if payout.is_none() {
            continue;
        }

        let status = match lookup.status(&leg.platform, &market_ref) {
            Ok(status) => status,
            Err(error) => {
                warn!(%id, platform = %leg.platform, %market_ref, %error, "Settlement lookup failed");
                payout = None;
                continue;
            }
        };

        if !status.resolved {
            payout = None;
            continue;
        }

        if status.is_won_by(&leg.outcome_code, &leg.outcome_label) {
            payout = payout.map(|total| total + quantity);
        }
    }

    BetResolution {
        id,
        sequence,
        payout,
        recovered_refs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fees::FeeTable,
        matcher::MatchKind,
        settlement::{SettlementStatus, StatusLookupError},
        store::MemoryStore,
    };
    use rust_decimal_macros::dec;
    use std::{cell::Cell, sync::Arc};

    fn event(poly: (Decimal, Decimal), kalshi: (Decimal, Decimal)) -> MatchedEvent {
        MatchedEvent::new(
            MarketRecord::new(Platform::polymarket(), "BOS", "NYK", "Celtics", "Knicks")
                .with_prices(poly.0, poly.1)
                .with_market_ref("0xpoly")
                .with_sport("NBA"),
            MarketRecord::new(Platform::kalshi(), "BOS", "NYK", "Boston", "New York")
                .with_prices(kalshi.0, kalshi.1)
                .with_refs("KX-BOS", "KX-NYK")
                .with_url("https://kalshi.com/markets/KX-BOSNYK"),
            MatchKind::Exact,
        )
    }

    /// Strategy 1 at 99.55, ROI 0.4520%.
    fn profitable() -> TradeCandidate {
        TradeCandidate::new(event((dec!(30), dec!(68)), (dec!(34), dec!(64))))
    }

    fn ledger_with(config: PaperTradingConfig) -> (PaperLedger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = PaperLedger::open(config, ArbitrageCalculator::default(), Arc::clone(&store));
        (ledger, store)
    }

    fn ledger() -> (PaperLedger, Arc<MemoryStore>) {
        ledger_with(PaperTradingConfig::default())
    }

    type Lookup = Result<SettlementStatus, StatusLookupError>;

    fn winner(code: &'static str) -> impl Fn(&Platform, &str) -> Lookup {
        move |_: &Platform, _: &str| Ok(SettlementStatus::won_by(code))
    }

    #[test]
    fn test_execute_materializes_bet() {
        let (ledger, store) = ledger();
        let bet = ledger.execute_arbitrage(&profitable()).unwrap();

        assert_eq!(bet.id.as_str(), "bos@nyk");
        assert_eq!(bet.status, BetStatus::Pending);
        assert_eq!(bet.arb_type, ArbType::BinaryCrossMarket);
        assert_eq!(bet.quantity, dec!(100));
        // 99.55 / 100 * 100
        assert_eq!(bet.cost, dec!(99.55));
        assert_eq!(bet.expected_payout, dec!(100));
        assert_eq!(bet.expected_profit, dec!(0.45));
        assert_eq!(bet.roi_percent, dec!(0.4520));
        assert_eq!(bet.description, "Celtics vs Knicks");
        assert_eq!(bet.sport.as_str(), "NBA");

        let [away, home] = &bet.legs;
        assert_eq!(away.platform, Platform::polymarket());
        assert_eq!(away.outcome_code.as_str(), "BOS");
        assert_eq!(away.external_market_ref.as_deref(), Some("0xpoly"));
        assert_eq!(away.cost_usd, dec!(30.75));
        assert_eq!(away.fee_usd, dec!(0.75));
        assert_eq!(away.slippage_usd, dec!(0.15));
        assert_eq!(home.platform, Platform::kalshi());
        assert_eq!(home.outcome_label, "Knicks");
        assert_eq!(home.external_market_ref.as_deref(), Some("KX-NYK"));
        assert_eq!(home.fee_usd, dec!(4.80));
        assert_eq!(home.slippage_usd, dec!(0.32));
        assert_eq!(bet.fees_total_usd, dec!(5.55));

        assert_eq!(ledger.balance(), dec!(9900.45));
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.saved().unwrap().bets.len(), 1);
    }

    #[test]
    fn test_unprofitable_is_rejected() {
        let (ledger, store) = ledger();
        let candidate = TradeCandidate::new(event((dec!(40), dec!(60)), (dec!(38), dec!(62))));

        assert!(matches!(
            ledger.execute_arbitrage(&candidate),
            Err(TradeRejection::NoOpportunity(NoArbitrage::NotProfitable { .. }))
        ));
        assert_eq!(ledger.balance(), dec!(10000));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_roi_threshold() {
        let (ledger, _) = ledger_with(PaperTradingConfig {
            min_roi: dec!(0.4520),
            ..Default::default()
        });

        assert_eq!(
            ledger.execute_arbitrage(&profitable()),
            Err(TradeRejection::RoiBelowThreshold {
                roi_percent: dec!(0.4520),
                min_roi: dec!(0.4520),
            })
        );
    }

    #[test]
    fn test_insufficient_balance() {
        let (ledger, _) = ledger_with(PaperTradingConfig {
            initial_balance: dec!(50),
            ..Default::default()
        });

        assert_eq!(
            ledger.execute_arbitrage(&profitable()),
            Err(TradeRejection::InsufficientBalance {
                cost: dec!(99.55),
                balance: dec!(50),
            })
        );
        assert!(ledger.snapshot().bets.is_empty());
    }

    #[test]
    fn test_duplicate_position_rejected() {
        let (ledger, _) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        assert_eq!(
            ledger.execute_arbitrage(&profitable()),
            Err(TradeRejection::DuplicatePosition(EventKey::from_codes("BOS", "NYK")))
        );
        assert_eq!(ledger.snapshot().bets.len(), 1);
    }

    #[test]
    fn test_precomputed_opportunity_used() {
        let (ledger, _) = ledger();
        let candidate = profitable().with_precomputed(PrecomputedArb {
            best_away_from: Some(Platform::kalshi()),
            best_home_from: Some(Platform::polymarket()),
            best_away_price: Some(dec!(34)),
            best_home_price: Some(dec!(60)),
            best_away_effective: Some(dec!(36.55)),
            best_home_effective: Some(dec!(61.5)),
            total_cost: Some(dec!(98.05)),
            edge: Some(dec!(1.95)),
            roi_percent: Some(dec!(1.9888)),
            ..Default::default()
        });

        let bet = ledger.execute_arbitrage(&candidate).unwrap();
        assert_eq!(bet.arb_type, ArbType::Perfect);
        assert_eq!(bet.strategy, Strategy::SecondaryAwayPrimaryHome);
        assert_eq!(bet.cost, dec!(98.05));
        assert_eq!(bet.legs[0].platform, Platform::kalshi());
        assert_eq!(bet.legs[0].external_market_ref.as_deref(), Some("KX-BOS"));
        assert_eq!(bet.legs[1].external_market_ref.as_deref(), Some("0xpoly"));
    }

    #[test]
    fn test_partial_precomputed_falls_back() {
        let (ledger, _) = ledger();
        let candidate = profitable().with_precomputed(PrecomputedArb {
            best_away_price: Some(dec!(1)),
            ..Default::default()
        });

        let bet = ledger.execute_arbitrage(&candidate).unwrap();
        assert_eq!(bet.arb_type, ArbType::BinaryCrossMarket);
        assert_eq!(bet.cost, dec!(99.55));
    }

    #[test]
    fn test_precomputed_zero_price_rejected() {
        let (ledger, _) = ledger();
        let candidate = profitable().with_precomputed(PrecomputedArb {
            best_away_from: Some(Platform::polymarket()),
            best_home_from: Some(Platform::kalshi()),
            best_away_price: Some(dec!(0)),
            best_home_price: Some(dec!(60)),
            best_away_effective: Some(dec!(0)),
            best_home_effective: Some(dec!(64.5)),
            total_cost: Some(dec!(64.5)),
            edge: Some(dec!(35.5)),
            ..Default::default()
        });

        assert_eq!(ledger.execute_arbitrage(&candidate), Err(TradeRejection::ZeroPrice));
    }

    #[test]
    fn test_precomputed_same_and_unknown_platform() {
        let (ledger, _) = ledger();
        let base = PrecomputedArb {
            best_away_from: Some(Platform::polymarket()),
            best_home_from: Some(Platform::polymarket()),
            best_away_price: Some(dec!(30)),
            best_home_price: Some(dec!(60)),
            best_away_effective: Some(dec!(30.75)),
            best_home_effective: Some(dec!(61.5)),
            total_cost: Some(dec!(92.25)),
            edge: Some(dec!(7.75)),
            ..Default::default()
        };

        assert_eq!(
            ledger.execute_arbitrage(&profitable().with_precomputed(base.clone())),
            Err(TradeRejection::SamePlatform(Platform::polymarket()))
        );

        let unknown = PrecomputedArb {
            best_home_from: Some(Platform::new("Betfair")),
            ..base
        };
        assert_eq!(
            ledger.execute_arbitrage(&profitable().with_precomputed(unknown)),
            Err(TradeRejection::UnknownPlatform(Platform::new("Betfair")))
        );
        assert!(ledger.snapshot().bets.is_empty());
    }

    #[test]
    fn test_settle_winning_leg() {
        let (ledger, store) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        let summary = ledger.settle(&winner("BOS"));
        assert_eq!(summary.checked, 1);
        assert_eq!(summary.settled.len(), 1);
        assert_eq!(summary.total_payout, dec!(100));

        let bet = &ledger.snapshot().bets[0];
        assert_eq!(bet.status, BetStatus::Settled);
        assert_eq!(bet.settled_amount, dec!(100));
        assert_eq!(bet.realized_profit, dec!(0.45));
        assert!(bet.settled_at.is_some());
        // 9900.45 + 100
        assert_eq!(ledger.balance(), dec!(10000.45));
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_settle_by_label() {
        let (ledger, _) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        let summary = ledger.settle(&winner("Knicks"));
        assert_eq!(summary.total_payout, dec!(100));
    }

    #[test]
    fn test_settle_void_loses_stake() {
        let (ledger, _) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        let void = |_: &Platform, _: &str| -> Lookup { Ok(SettlementStatus::void()) };
        let summary = ledger.settle(&void);
        assert_eq!(summary.total_payout, Decimal::ZERO);

        let bet = &ledger.snapshot().bets[0];
        assert_eq!(bet.status, BetStatus::Settled);
        assert_eq!(bet.realized_profit, dec!(-99.55));
        assert_eq!(ledger.balance(), dec!(9900.45));
    }

    #[test]
    fn test_unresolved_leg_keeps_bet_pending() {
        let (ledger, store) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        let half = |platform: &Platform, _: &str| -> Lookup {
            if platform == &Platform::kalshi() {
                Ok(SettlementStatus::pending())
            } else {
                Ok(SettlementStatus::won_by("BOS"))
            }
        };
        let summary = ledger.settle(&half);
        assert_eq!(summary.still_pending(), 1);
        assert!(ledger.snapshot().bets[0].is_pending());
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_lookup_error_keeps_bet_pending() {
        let (ledger, _) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        let failing = |platform: &Platform, market_ref: &str| -> Lookup {
            Err(StatusLookupError::Request {
                platform: platform.clone(),
                market_ref: SmolStr::new(market_ref),
                message: "timeout".into(),
            })
        };
        let summary = ledger.settle(&failing);
        assert!(summary.settled.is_empty());
        assert!(ledger.has_pending(&EventKey::from_codes("BOS", "NYK")));
    }

    #[test]
    fn test_settle_is_idempotent() {
        let (ledger, store) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();
        ledger.settle(&winner("BOS"));

        let balance = ledger.balance();
        let calls = Cell::new(0);
        let counting = |_: &Platform, _: &str| -> Lookup {
            calls.set(calls.get() + 1);
            Ok(SettlementStatus::won_by("BOS"))
        };

        let summary = ledger.settle(&counting);
        assert_eq!(summary.checked, 0);
        assert_eq!(calls.get(), 0);
        assert_eq!(ledger.balance(), balance);
        assert_eq!(ledger.snapshot().bets[0].realized_profit, dec!(0.45));
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_new_position_after_settlement() {
        let (ledger, _) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();
        ledger.settle(&winner("BOS"));

        assert!(ledger.execute_arbitrage(&profitable()).is_ok());
        assert_eq!(ledger.snapshot().bets.len(), 2);
    }

    #[test]
    fn test_stale_resolution_skips_reopened_position() {
        let (ledger, _) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        // While the outer pass is looking up the first bet, another pass
        // settles it and a new position opens on the same event.
        let interleaved = Cell::new(false);
        let outer = |_: &Platform, _: &str| -> Lookup {
            if !interleaved.replace(true) {
                assert_eq!(ledger.settle(&winner("BOS")).settled.len(), 1);
                ledger.execute_arbitrage(&profitable()).unwrap();
            }
            Ok(SettlementStatus::won_by("NYK"))
        };
        let summary = ledger.settle(&outer);

        assert!(summary.settled.is_empty());
        let bets = ledger.snapshot().bets;
        assert_eq!(bets.len(), 2);
        assert_eq!(bets[0].sequence, 0);
        assert_eq!(bets[0].status, BetStatus::Settled);
        assert_eq!(bets[1].sequence, 1);
        assert!(bets[1].is_pending());
        // 10000 - 99.55 + 100 - 99.55
        assert_eq!(ledger.balance(), dec!(9900.90));
    }

    #[test]
    fn test_market_ref_recovered_from_url() {
        let (ledger, _) = ledger();
        let mut candidate = profitable();
        candidate.event.secondary.away_ref = None;
        candidate.event.secondary.home_ref = None;
        ledger.execute_arbitrage(&candidate).unwrap();
        assert!(ledger.snapshot().bets[0].legs[1].external_market_ref.is_none());

        let seen = std::cell::RefCell::new(Vec::new());
        let recording = |_: &Platform, market_ref: &str| -> Lookup {
            seen.borrow_mut().push(market_ref.to_string());
            Ok(SettlementStatus::won_by("BOS"))
        };
        let summary = ledger.settle(&recording);

        assert_eq!(*seen.borrow(), vec!["0xpoly".to_string(), "KX-BOSNYK".to_string()]);
        assert_eq!(summary.settled.len(), 1);
        assert_eq!(
            ledger.snapshot().bets[0].legs[1].external_market_ref.as_deref(),
            Some("KX-BOSNYK")
        );
    }

    #[test]
    fn test_missing_ref_leaves_bet_pending() {
        let (ledger, _) = ledger();
        let mut candidate = profitable();
        candidate.event.secondary.away_ref = None;
        candidate.event.secondary.home_ref = None;
        candidate.event.secondary.url = String::new();
        ledger.execute_arbitrage(&candidate).unwrap();

        let summary = ledger.settle(&winner("BOS"));
        assert_eq!(summary.still_pending(), 1);
    }

    #[test]
    fn test_summary_and_reset() {
        let (ledger, _) = ledger();
        ledger.execute_arbitrage(&profitable()).unwrap();

        let summary = ledger.summary();
        assert_eq!(summary.total_trades, 1);
        assert_eq!(summary.pending_trades, 1);
        assert_eq!(summary.estimated_profit, dec!(0.45));
        assert_eq!(summary.total_profit, Decimal::ZERO);

        ledger.settle(&winner("NYK"));
        let summary = ledger.summary();
        assert_eq!(summary.settled_trades, 1);
        assert_eq!(summary.total_profit, dec!(0.45));
        assert_eq!(summary.estimated_profit, Decimal::ZERO);

        ledger.reset();
        let snapshot = ledger.snapshot();
        assert!(snapshot.bets.is_empty());
        assert_eq!(snapshot.balance, dec!(10000));
    }

    #[test]
    fn test_open_resumes_from_store() {
        let mut snapshot = LedgerSnapshot::new(dec!(500));
        snapshot.balance = dec!(321.5);
        let store = MemoryStore::with_snapshot(snapshot.clone());

        let ledger = PaperLedger::open(
            PaperTradingConfig::default(),
            ArbitrageCalculator::new(FeeTable::default()),
            store,
        );
        assert_eq!(ledger.snapshot(), snapshot);
    }

    #[test]
    fn test_rejection_display() {
        let rejection = TradeRejection::RoiBelowThreshold {
            roi_percent: dec!(0.45),
            min_roi: dec!(1),
        };
        assert_eq!(rejection.to_string(), "ROI (0.45%) below threshold (1%)");
    }
}
