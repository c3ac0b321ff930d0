//! Async driver: pulls market batches from two feeds on a fixed cadence and
//! runs settlement passes until shutdown.

use crate::{
    engine::{ArbitrageEngine, CycleReport},
    market::{MarketRecord, Platform},
    settlement::SettlementStatusLookup,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::{future::Future, sync::Arc};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Failure to fetch a batch of market records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("{platform} feed unavailable: {message}")]
    Unavailable { platform: Platform, message: String },

    #[error("{platform} feed returned malformed data: {message}")]
    Malformed { platform: Platform, message: String },
}

/// Source of normalized market records for a single platform.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    fn platform(&self) -> Platform;

    async fn fetch(&self) -> Result<Vec<MarketRecord>, FeedError>;
}

/// Feed serving a fixed, replaceable batch of records.
#[derive(Debug)]
pub struct StaticFeed {
    platform: Platform,
    records: RwLock<Vec<MarketRecord>>,
}

impl StaticFeed {
    pub fn new(platform: Platform, records: Vec<MarketRecord>) -> Self {
        Self {
            platform,
            records: RwLock::new(records),
        }
    }

    /// Swap in the batch served by subsequent fetches.
    pub fn replace(&self, records: Vec<MarketRecord>) {
        *self.records.write() = records;
    }
}

#[async_trait]
impl MarketFeed for StaticFeed {
    fn platform(&self) -> Platform {
        self.platform.clone()
    }

    async fn fetch(&self) -> Result<Vec<MarketRecord>, FeedError> {
        Ok(self.records.read().clone())
    }
}

/// Fetch both feeds concurrently and run one engine cycle.
///
/// If either fetch fails no cycle runs, so the previous report stays current.
pub async fn scan_once(
    engine: &ArbitrageEngine,
    primary: &dyn MarketFeed,
    secondary: &dyn MarketFeed,
) -> Result<CycleReport, FeedError> {
    let (primary, secondary) = futures::try_join!(primary.fetch(), secondary.fetch())?;
    Ok(engine.run_cycle(&primary, &secondary))
}

/// Counters returned once [`run`] shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub settlement_passes: usize,
}

/// Run scan and settlement passes on the configured intervals until
/// `shutdown` resolves.
///
/// `lookup` is called inline on the driver task and should not block.
pub async fn run<L>(
    engine: Arc<ArbitrageEngine>,
    primary: Arc<dyn MarketFeed>,
    secondary: Arc<dyn MarketFeed>,
    lookup: L,
    shutdown: impl Future<Output = ()>,
) -> RunSummary
where
    L: SettlementStatusLookup,
{
    let mut scan = tokio::time::interval(engine.config().scan_interval());
    scan.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut settle = tokio::time::interval(engine.config().settlement_interval());
    settle.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        primary = %primary.platform(),
        secondary = %secondary.platform(),
        scan_interval = ?engine.config().scan_interval(),
        settlement_interval = ?engine.config().settlement_interval(),
        "Starting arbitrage driver"
    );

    let mut summary = RunSummary::default();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!(?summary, "Shutting down arbitrage driver");
                break;
            }
            _ = scan.tick() => {
                match scan_once(&engine, primary.as_ref(), secondary.as_ref()).await {
                    Ok(_) => summary.cycles += 1,
                    Err(error) => {
                        summary.failed_cycles += 1;
                        warn!(%error, "Feed fetch failed, keeping previous report");
                    }
                }
            }
            _ = settle.tick() => {
                let outcome = engine.settle(&lookup);
                summary.settlement_passes += 1;
                if !outcome.settled.is_empty() {
                    info!(
                        settled = outcome.settled.len(),
                        payout = %outcome.total_payout,
                        "Settled paper bets"
                    );
                }
            }
        }
    }

    summary
}
