//! One-cycle orchestration: match, evaluate, track and paper trade.

use crate::{
    config::{ConfigError, EngineConfig},
    ledger::{Bet, PaperLedger, SettlementSummary, TradeCandidate, TradeRejection},
    market::{EventKey, MarketRecord},
    matcher::{MarketMatcher, MatchedEvent},
    opportunity::ArbitrageCalculator,
    report::{ArbitrageFeed, ComparisonEntry, ComparisonReport, MatchStats, PlatformQuote},
    settlement::SettlementStatusLookup,
    store::LedgerStore,
    trend::{Observation, TrendTracker},
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A trade the ledger refused during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTrade {
    pub event_key: EventKey,
    pub reason: TradeRejection,
}

/// Everything produced by one matching cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub report: Arc<ComparisonReport>,
    pub arbitrage_feed: ArbitrageFeed,
    pub executed: Vec<Bet>,
    pub rejections: Vec<RejectedTrade>,
}

impl CycleReport {
    pub fn stats(&self) -> &MatchStats {
        &self.report.stats
    }
}

/// Owns every piece of engine state for the lifetime of the service.
#[derive(Debug)]
pub struct ArbitrageEngine {
    config: EngineConfig,
    matcher: MarketMatcher,
    calculator: ArbitrageCalculator,
    trends: TrendTracker,
    ledger: PaperLedger,
    latest: RwLock<Option<Arc<ComparisonReport>>>,
}

impl ArbitrageEngine {
    /// Build the engine, opening the ledger from `store`.
    pub fn new(config: EngineConfig, store: impl LedgerStore + 'static) -> Result<Self, ConfigError> {
        config.validate()?;

        let calculator = ArbitrageCalculator::new(config.fees.clone());
        let ledger = PaperLedger::open(config.paper_trading.clone(), calculator.clone(), store);

        Ok(Self {
            matcher: MarketMatcher::new(config.matcher.fuzzy_threshold),
            calculator,
            trends: TrendTracker::new(),
            ledger,
            latest: RwLock::new(None),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PaperLedger {
        &self.ledger
    }

    pub fn trends(&self) -> &TrendTracker {
        &self.trends
    }

    /// Last successfully built comparison report, if any.
    pub fn latest_report(&self) -> Option<Arc<ComparisonReport>> {
        self.latest.read().clone()
    }

    /// Run one cycle over fresh batches from the primary and secondary feeds.
    pub fn run_cycle(&self, primary: &[MarketRecord], secondary: &[MarketRecord]) -> CycleReport {
        self.run_cycle_at(primary, secondary, Utc::now())
    }

    /// [`ArbitrageEngine::run_cycle`] with an explicit observation time.
    pub fn run_cycle_at(
        &self,
        primary: &[MarketRecord],
        secondary: &[MarketRecord],
        now: DateTime<Utc>,
    ) -> CycleReport {
        let primary = intake(primary);
        let secondary = intake(secondary);

        let matches = self.matcher.match_markets(&primary, &secondary);
        let stats = MatchStats::from(&matches);

        let mut entries = Vec::with_capacity(matches.matched.len());
        let mut executed = Vec::new();
        let mut rejections = Vec::new();

        for event in matches.matched {
            let Some(entry) = self.compare(&event, now) else {
                continue;
            };

            if entry.arbitrage.is_some() && self.is_tradable(&event) {
                let candidate = TradeCandidate::new(event);
                match self.ledger.execute_arbitrage(&candidate) {
                    Ok(bet) => executed.push(bet),
                    Err(reason) => {
                        debug!(id = %entry.event_key, %reason, "Paper trade rejected");
                        rejections.push(RejectedTrade {
                            event_key: entry.event_key.clone(),
                            reason,
                        });
                    }
                }
            }

            entries.push(entry);
        }

        let report = Arc::new(ComparisonReport::new(now, entries, stats));
        let arbitrage_feed = report.arbitrage_feed();
        *self.latest.write() = Some(Arc::clone(&report));

        info!(
            matched = report.stats.matched,
            compared = report.len(),
            opportunities = arbitrage_feed.len(),
            executed = executed.len(),
            rejected = rejections.len(),
            "Completed scan cycle"
        );

        CycleReport {
            report,
            arbitrage_feed,
            executed,
            rejections,
        }
    }

    /// Build the comparison entry for a matched event. Events missing a price
    /// on either platform are skipped.
    fn compare(&self, event: &MatchedEvent, now: DateTime<Utc>) -> Option<ComparisonEntry> {
        let (Some(primary_probs), Some(secondary_probs)) = (
            event.primary.implied_probabilities(),
            event.secondary.implied_probabilities(),
        ) else {
            debug!(id = %event.event_key, "Skipping comparison without prices on both platforms");
            return None;
        };

        let trend = self.trends.observe(Observation {
            event_key: event.event_key.clone(),
            primary: primary_probs,
            secondary: secondary_probs,
            timestamp: now,
        });

        let (arbitrage, no_arbitrage_reason) = match self.calculator.evaluate(event) {
            Ok(opportunity) => (Some(opportunity), None),
            Err(reason) => (None, Some(reason.to_string())),
        };

        let primary = &event.primary;
        Some(ComparisonEntry {
            event_key: event.event_key.clone(),
            away_team: primary.away_team.clone(),
            home_team: primary.home_team.clone(),
            away_code: primary.away_code.clone(),
            home_code: primary.home_code.clone(),
            sport: primary.sport.clone(),
            game_time: primary.game_time.clone(),
            primary: PlatformQuote::from_record(primary, primary_probs),
            secondary: PlatformQuote::from_record(&event.secondary, secondary_probs),
            match_kind: event.kind,
            trend,
            arbitrage,
            no_arbitrage_reason,
        })
    }

    fn is_tradable(&self, event: &MatchedEvent) -> bool {
        let paper = &self.config.paper_trading;
        paper.enabled && paper.is_eligible_sport(&event.primary.sport)
    }

    /// Settle pending paper bets against `lookup`.
    pub fn settle(&self, lookup: &impl SettlementStatusLookup) -> SettlementSummary {
        self.ledger.settle(lookup)
    }
}

/// Drop invalid records and records repeating an earlier record's event key,
/// keeping the first.
fn intake(records: &[MarketRecord]) -> Vec<MarketRecord> {
    records
        .iter()
        .filter(|record| match record.validate() {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, record = %record.description(), "Dropping invalid market record");
                false
            }
        })
        .unique_by(|record| record.event_key())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PaperTradingConfig,
        market::Platform,
        matcher::MatchKind,
        probability::ImpliedProbabilities,
        settlement::{SettlementStatus, StatusLookupError},
        store::MemoryStore,
    };
    use rust_decimal_macros::dec;

    fn engine(enabled: bool) -> ArbitrageEngine {
        let config = EngineConfig {
            paper_trading: PaperTradingConfig {
                enabled,
                ..Default::default()
            },
            ..Default::default()
        };
        ArbitrageEngine::new(config, MemoryStore::new()).unwrap()
    }

    fn poly(away: &str, home: &str, prices: (rust_decimal::Decimal, rust_decimal::Decimal)) -> MarketRecord {
        MarketRecord::new(Platform::polymarket(), away, home, away, home)
            .with_prices(prices.0, prices.1)
            .with_market_ref(format!("0x{away}{home}"))
            .with_sport("NBA")
    }

    fn kalshi(away: &str, home: &str, prices: (rust_decimal::Decimal, rust_decimal::Decimal)) -> MarketRecord {
        MarketRecord::new(Platform::kalshi(), away, home, away, home)
            .with_prices(prices.0, prices.1)
            .with_refs(format!("KX-{away}"), format!("KX-{home}"))
            .with_sport("NBA")
    }

    #[test]
    fn test_cycle_builds_report_and_trades() {
        let engine = engine(true);
        let cycle = engine.run_cycle(
            &[
                poly("BOS", "NYK", (dec!(30), dec!(68))),
                poly("DEN", "PHX", (dec!(40), dec!(60))),
            ],
            &[
                kalshi("BOS", "NYK", (dec!(34), dec!(64))),
                kalshi("DEN", "PHX", (dec!(41), dec!(59))),
            ],
        );

        assert_eq!(cycle.report.len(), 2);
        assert_eq!(cycle.stats().matched, 2);
        assert_eq!(cycle.arbitrage_feed.len(), 1);
        assert_eq!(cycle.executed.len(), 1);
        assert_eq!(cycle.executed[0].id, EventKey::from_codes("BOS", "NYK"));

        let unprofitable = cycle
            .report
            .entries
            .iter()
            .find(|entry| entry.away_code == "DEN")
            .unwrap();
        assert!(unprofitable.arbitrage.is_none());
        assert!(unprofitable.no_arbitrage_reason.is_some());

        assert!(engine.latest_report().is_some());
        assert_eq!(engine.trends().len(), 2);
    }

    #[test]
    fn test_swapped_listing_trades_opposite_teams() {
        let engine = engine(true);
        let cycle = engine.run_cycle(
            &[poly("BOS", "NYK", (dec!(30), dec!(68)))],
            &[kalshi("NYK", "BOS", (dec!(70), dec!(28)))],
        );

        let entry = &cycle.report.entries[0];
        assert!(matches!(entry.match_kind, MatchKind::Fuzzy { swapped: true, .. }));
        assert_eq!(entry.secondary.probabilities, ImpliedProbabilities::new(29, 71));
        assert_eq!(entry.max_diff(), 2);

        // Kalshi BOS 28 * 1.075 + Polymarket NYK 68 * 1.025 = 30.1 + 69.7
        let bet = &cycle.executed[0];
        assert_eq!(bet.cost, dec!(99.8));
        let [away, home] = &bet.legs;
        assert_eq!(away.platform, Platform::kalshi());
        assert_eq!(away.outcome_code.as_str(), "BOS");
        assert_eq!(away.external_market_ref.as_deref(), Some("KX-BOS"));
        assert_eq!(home.platform, Platform::polymarket());
        assert_eq!(home.outcome_code.as_str(), "NYK");
        assert_ne!(away.outcome_label, home.outcome_label);
    }

    #[test]
    fn test_disabled_paper_trading_never_trades() {
        let engine = engine(false);
        let cycle = engine.run_cycle(
            &[poly("BOS", "NYK", (dec!(30), dec!(68)))],
            &[kalshi("BOS", "NYK", (dec!(34), dec!(64)))],
        );

        assert_eq!(cycle.arbitrage_feed.len(), 1);
        assert!(cycle.executed.is_empty());
        assert!(engine.ledger().snapshot().bets.is_empty());
    }

    #[test]
    fn test_ineligible_sport_is_not_traded() {
        let config = EngineConfig {
            paper_trading: PaperTradingConfig {
                enabled: true,
                eligible_sports: vec!["NFL".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let engine = ArbitrageEngine::new(config, MemoryStore::new()).unwrap();
        let cycle = engine.run_cycle(
            &[poly("BOS", "NYK", (dec!(30), dec!(68)))],
            &[kalshi("BOS", "NYK", (dec!(34), dec!(64)))],
        );

        assert_eq!(cycle.arbitrage_feed.len(), 1);
        assert!(cycle.executed.is_empty());
    }

    #[test]
    fn test_repeat_cycle_rejects_duplicate() {
        let engine = engine(true);
        let primary = [poly("BOS", "NYK", (dec!(30), dec!(68)))];
        let secondary = [kalshi("BOS", "NYK", (dec!(34), dec!(64)))];

        engine.run_cycle(&primary, &secondary);
        let cycle = engine.run_cycle(&primary, &secondary);

        assert!(cycle.executed.is_empty());
        assert_eq!(
            cycle.rejections,
            vec![RejectedTrade {
                event_key: EventKey::from_codes("BOS", "NYK"),
                reason: TradeRejection::DuplicatePosition(EventKey::from_codes("BOS", "NYK")),
            }]
        );
        let history = engine.trends().history(&EventKey::from_codes("BOS", "NYK")).unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_duplicate_records_are_deduplicated() {
        let engine = engine(false);
        let cycle = engine.run_cycle(
            &[
                poly("BOS", "NYK", (dec!(30), dec!(68))),
                poly("NYK", "BOS", (dec!(68), dec!(30))),
            ],
            &[kalshi("BOS", "NYK", (dec!(34), dec!(64)))],
        );

        assert_eq!(cycle.stats().total_primary, 1);
        assert_eq!(cycle.report.len(), 1);
    }

    #[test]
    fn test_invalid_records_are_dropped() {
        let engine = engine(true);
        let cycle = engine.run_cycle(
            &[poly("BOS", "NYK", (dec!(30), dec!(68)))],
            &[kalshi("BOS", "NYK", (dec!(34), dec!(164)))],
        );

        assert_eq!(cycle.stats().total_secondary, 0);
        assert!(cycle.report.is_empty());
    }

    #[test]
    fn test_missing_prices_skip_comparison() {
        let engine = engine(true);
        let mut unpriced = kalshi("BOS", "NYK", (dec!(34), dec!(64)));
        unpriced.home_raw_price = None;

        let cycle = engine.run_cycle(&[poly("BOS", "NYK", (dec!(30), dec!(68)))], &[unpriced]);
        assert_eq!(cycle.stats().matched, 1);
        assert!(cycle.report.is_empty());
        assert!(cycle.executed.is_empty());
    }

    #[test]
    fn test_settle_through_engine() {
        let engine = engine(true);
        engine.run_cycle(
            &[poly("BOS", "NYK", (dec!(30), dec!(68)))],
            &[kalshi("BOS", "NYK", (dec!(34), dec!(64)))],
        );

        let lookup = |_: &Platform, _: &str| -> Result<SettlementStatus, StatusLookupError> {
            Ok(SettlementStatus::won_by("NYK"))
        };
        let summary = engine.settle(&lookup);
        assert_eq!(summary.settled.len(), 1);
        assert_eq!(engine.ledger().balance(), dec!(10000.45));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.matcher.fuzzy_threshold = -0.1;
        assert!(ArbitrageEngine::new(config, MemoryStore::new()).is_err());
    }
}
