//! Configuration types for the matching and paper-trading engine.

use crate::{fees::FeeTable, matcher::DEFAULT_FUZZY_THRESHOLD};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::warn;

/// Invalid configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("fuzzy match threshold must be within [0, 1], got {0}")]
    FuzzyThreshold(f64),

    #[error("initial balance must not be negative, got {0}")]
    InitialBalance(Decimal),

    #[error("bet amount must be positive, got {0}")]
    BetAmount(Decimal),

    #[error("{0} interval must be at least one second")]
    Interval(&'static str),
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub paper_trading: PaperTradingConfig,
    pub matcher: MatcherConfig,
    /// Fee schedules, fixed for the lifetime of the engine
    pub fees: FeeTable,
    /// Seconds between matching passes
    pub scan_interval_secs: u64,
    /// Seconds between settlement passes
    pub settlement_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            paper_trading: PaperTradingConfig::default(),
            matcher: MatcherConfig::default(),
            fees: FeeTable::default(),
            scan_interval_secs: 30,
            settlement_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// Reads:
    /// - `PAPER_TRADING_ENABLED` ("true" enables, case-insensitive)
    /// - `PAPER_TRADING_INITIAL_BALANCE`
    /// - `PAPER_TRADING_BET_AMOUNT`
    /// - `PAPER_TRADING_MIN_ROI`
    /// - `PAPER_TRADING_DATA_FILE`
    /// - `PAPER_TRADING_SPORTS` (comma separated, empty = all)
    /// - `SCAN_INTERVAL_SECS`
    /// - `SETTLEMENT_INTERVAL_SECS`
    /// - `FUZZY_MATCH_THRESHOLD`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an explicit variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let paper = defaults.paper_trading;

        let config = Self {
            paper_trading: PaperTradingConfig {
                enabled: var("PAPER_TRADING_ENABLED")
                    .map(|value| value.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(paper.enabled),
                initial_balance: parse_or(&var, "PAPER_TRADING_INITIAL_BALANCE", paper.initial_balance),
                bet_amount: parse_or(&var, "PAPER_TRADING_BET_AMOUNT", paper.bet_amount),
                min_roi: parse_or(&var, "PAPER_TRADING_MIN_ROI", paper.min_roi),
                data_file: var("PAPER_TRADING_DATA_FILE")
                    .filter(|value| !value.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(paper.data_file),
                eligible_sports: var("PAPER_TRADING_SPORTS")
                    .map(|value| parse_sports(&value))
                    .unwrap_or(paper.eligible_sports),
            },
            matcher: MatcherConfig {
                fuzzy_threshold: parse_or(
                    &var,
                    "FUZZY_MATCH_THRESHOLD",
                    defaults.matcher.fuzzy_threshold,
                ),
            },
            fees: defaults.fees,
            scan_interval_secs: parse_or(&var, "SCAN_INTERVAL_SECS", defaults.scan_interval_secs),
            settlement_interval_secs: parse_or(
                &var,
                "SETTLEMENT_INTERVAL_SECS",
                defaults.settlement_interval_secs,
            ),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.matcher.fuzzy_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::FuzzyThreshold(threshold));
        }
        if self.paper_trading.initial_balance < Decimal::ZERO {
            return Err(ConfigError::InitialBalance(self.paper_trading.initial_balance));
        }
        if self.paper_trading.bet_amount <= Decimal::ZERO {
            return Err(ConfigError::BetAmount(self.paper_trading.bet_amount));
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::Interval("scan"));
        }
        if self.settlement_interval_secs == 0 {
            return Err(ConfigError::Interval("settlement"));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn settlement_interval(&self) -> Duration {
        Duration::from_secs(self.settlement_interval_secs)
    }
}

/// Paper-trading account settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaperTradingConfig {
    /// Execute qualifying opportunities against the ledger
    pub enabled: bool,
    /// Starting (and reset) balance in dollars
    pub initial_balance: Decimal,
    /// Contracts bought per leg; also the payout of a winning leg in dollars
    pub bet_amount: Decimal,
    /// Minimum ROI in percent; opportunities at or below it are rejected
    pub min_roi: Decimal,
    /// Ledger snapshot location
    pub data_file: PathBuf,
    /// Sports eligible for paper trading (case-insensitive, empty = all)
    pub eligible_sports: Vec<SmolStr>,
}

impl Default for PaperTradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            initial_balance: Decimal::new(10000, 0), // $10,000
            bet_amount: Decimal::ONE_HUNDRED,
            min_roi: Decimal::ZERO,
            data_file: PathBuf::from("paper_trading_data.json"),
            eligible_sports: Vec::new(),
        }
    }
}

impl PaperTradingConfig {
    /// True if `sport` may be paper traded.
    pub fn is_eligible_sport(&self, sport: &str) -> bool {
        self.eligible_sports.is_empty()
            || self
                .eligible_sports
                .iter()
                .any(|eligible| eligible.eq_ignore_ascii_case(sport.trim()))
    }
}

/// Market matcher settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum per-team similarity for a fuzzy match
    pub fuzzy_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = var(name) else {
        return default;
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(%name, value = %raw, %default, "Unparsable config value, using default");
            default
        }
    }
}

fn parse_sports(value: &str) -> Vec<SmolStr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|sport| !sport.is_empty())
        .map(SmolStr::new)
        .collect()
}
