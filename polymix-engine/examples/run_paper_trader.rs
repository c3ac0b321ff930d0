//! Paper-trading runner over static market batches.
//!
//! Wires together:
//! - Two static feeds standing in for Polymarket and Kalshi
//! - The arbitrage engine with a JSON-file ledger
//! - A settlement lookup that reports every market as unresolved
//!
//! Usage:
//!   # Optional environment variables
//!   PAPER_TRADING_ENABLED=true
//!   PAPER_TRADING_DATA_FILE=./paper_trading_data.json
//!   SCAN_INTERVAL_SECS=5
//!   RUST_LOG=polymix_engine=debug
//!
//!   cargo run -p polymix-engine --example run_paper_trader

use polymix_engine::{
    ArbitrageEngine, EngineConfig, MarketRecord, Platform, SettlementStatus, StaticFeed,
    driver, settlement::StatusLookupError, store::JsonFileStore,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_logging();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!(%error, "Invalid configuration");
            return;
        }
    };

    let store = JsonFileStore::new(config.paper_trading.data_file.clone());
    let engine = match ArbitrageEngine::new(config, store) {
        Ok(engine) => Arc::new(engine),
        Err(error) => {
            error!(%error, "Failed to build engine");
            return;
        }
    };

    let polymarket = Arc::new(StaticFeed::new(
        Platform::polymarket(),
        vec![
            MarketRecord::new(Platform::polymarket(), "BOS", "NYK", "Boston Celtics", "New York Knicks")
                .with_prices(dec!(30), dec!(68))
                .with_market_ref("0xbosnyk")
                .with_sport("NBA"),
            MarketRecord::new(Platform::polymarket(), "DEN", "PHX", "Denver Nuggets", "Phoenix Suns")
                .with_prices(dec!(55), dec!(45))
                .with_market_ref("0xdenphx")
                .with_sport("NBA"),
        ],
    ));
    let kalshi = Arc::new(StaticFeed::new(
        Platform::kalshi(),
        vec![
            MarketRecord::new(Platform::kalshi(), "BOS", "NYK", "Boston", "New York")
                .with_prices(dec!(34), dec!(64))
                .with_url("https://kalshi.com/markets/KXNBAGAME-BOSNYK")
                .with_sport("NBA"),
            MarketRecord::new(Platform::kalshi(), "DEN", "PHX", "Denver", "Phoenix")
                .with_prices(dec!(52), dec!(48))
                .with_url("https://kalshi.com/markets/KXNBAGAME-DENPHX")
                .with_sport("NBA"),
        ],
    ));

    let lookup = |_: &Platform, _: &str| -> Result<SettlementStatus, StatusLookupError> {
        Ok(SettlementStatus::pending())
    };

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "Failed to listen for shutdown signal");
        }
    };

    let summary = driver::run(Arc::clone(&engine), polymarket, kalshi, lookup, shutdown).await;
    info!(?summary, "Driver stopped");

    let ledger = engine.ledger().summary();
    info!(
        balance = %ledger.balance,
        pending = ledger.pending_trades,
        settled = ledger.settled_trades,
        total_profit = %ledger.total_profit,
        "Final ledger"
    );
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(cfg!(debug_assertions))
        .init()
}
