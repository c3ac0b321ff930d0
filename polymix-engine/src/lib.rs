//! Cross-Market Prediction Market Arbitrage Engine
//!
//! This crate matches the same sporting event listed on two prediction market
//! platforms, compares their prices, tracks how the gap between them evolves,
//! detects fee-adjusted arbitrage and paper trades qualifying opportunities
//! against a persistent simulated ledger that settles once events resolve.
//!
//! # Key Components
//!
//! - [`MarketMatcher`]: Pairs records across platforms, exactly by outcome
//!   codes or fuzzily by team-name similarity
//! - [`ArbitrageCalculator`]: Evaluates both hedge strategies after fees and slippage
//! - [`TrendTracker`]: Rolling probability-difference history per event
//! - [`PaperLedger`]: Simulated balance, bet execution and settlement
//! - [`ArbitrageEngine`]: One matching cycle end to end
//! - [`driver::run`]: Async loop driving scans and settlement passes
//!
//! # Example
//!
//! ```rust,ignore
//! use polymix_engine::{
//!     ArbitrageEngine, EngineConfig, MarketRecord, Platform, store::JsonFileStore,
//! };
//! use rust_decimal_macros::dec;
//!
//! let config = EngineConfig::from_env()?;
//! let store = JsonFileStore::new(config.paper_trading.data_file.clone());
//! let engine = ArbitrageEngine::new(config, store)?;
//!
//! let polymarket = vec![
//!     MarketRecord::new(Platform::polymarket(), "BOS", "NYK", "Celtics", "Knicks")
//!         .with_prices(dec!(30), dec!(68)),
//! ];
//! let kalshi = vec![
//!     MarketRecord::new(Platform::kalshi(), "BOS", "NYK", "Celtics", "Knicks")
//!         .with_prices(dec!(34), dec!(64)),
//! ];
//!
//! let cycle = engine.run_cycle(&polymarket, &kalshi);
//! for opportunity in cycle.arbitrage_feed.iter() {
//!     println!("{} ROI {}%", opportunity.event_key, opportunity.roi_percent);
//! }
//! ```
//!
//! # Fee Model
//!
//! Each leg is bought at an effective price of `raw * (1 + fee_rate + slippage_rate)`:
//!
//! - **Polymarket**: 2% fee
//! - **Kalshi**: 7% fee
//! - **Manifold**: no fee
//!
//! All platforms carry 0.5% slippage by default.
//!
//! # Hedge Model
//!
//! ```text
//! Buy Away on Platform A + Buy Home on Platform B = guaranteed 100 payout
//! Net edge = 100 - (away_effective + home_effective)
//! ```
//!
//! Two strategies per event:
//! - Primary Away + Secondary Home
//! - Secondary Away + Primary Home
//!
//! The cheaper strategy wins, ties going to the first.

pub mod config;
pub mod driver;
pub mod engine;
pub mod fees;
pub mod ledger;
pub mod market;
pub mod matcher;
pub mod opportunity;
pub mod probability;
pub mod report;
pub mod settlement;
pub mod similarity;
pub mod store;
pub mod trend;

// Re-exports for convenience
pub use config::{ConfigError, EngineConfig, MatcherConfig, PaperTradingConfig};
pub use driver::{FeedError, MarketFeed, StaticFeed};
pub use engine::{ArbitrageEngine, CycleReport, RejectedTrade};
pub use fees::{FeeSchedule, FeeTable};
pub use ledger::{Bet, LedgerSnapshot, LedgerSummary, PaperLedger, TradeCandidate, TradeRejection};
pub use market::{EventKey, MarketRecord, MarketSide, Outcome, Platform, RecordError};
pub use matcher::{MarketMatcher, MatchKind, MatchReport, MatchedEvent};
pub use opportunity::{ArbitrageCalculator, ArbitrageOpportunity, NoArbitrage, PrecomputedArb, Strategy};
pub use probability::ImpliedProbabilities;
pub use report::{ArbitrageFeed, ComparisonEntry, ComparisonReport};
pub use settlement::{SettlementStatus, SettlementStatusLookup};
pub use trend::{TrendDirection, TrendSnapshot, TrendTracker};
