//! Reports produced for a presentation layer: ranked cross-platform
//! comparisons and the feed of qualifying arbitrage opportunities.

use crate::{
    market::{EventKey, MarketRecord, Platform},
    matcher::{MatchKind, MatchReport},
    opportunity::ArbitrageOpportunity,
    probability::ImpliedProbabilities,
    trend::TrendSnapshot,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// One platform's view of a compared event.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlatformQuote {
    pub platform: Platform,
    pub probabilities: ImpliedProbabilities,
    pub away_raw_price: Option<Decimal>,
    pub home_raw_price: Option<Decimal>,
    pub url: String,
}

impl PlatformQuote {
    pub fn from_record(record: &MarketRecord, probabilities: ImpliedProbabilities) -> Self {
        Self {
            platform: record.platform.clone(),
            probabilities,
            away_raw_price: record.away_raw_price,
            home_raw_price: record.home_raw_price,
            url: record.url.clone(),
        }
    }
}

/// A matched event with both platforms' prices, its trend and any arbitrage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComparisonEntry {
    pub event_key: EventKey,
    pub away_team: String,
    pub home_team: String,
    pub away_code: SmolStr,
    pub home_code: SmolStr,
    pub sport: SmolStr,
    pub game_time: Option<String>,
    pub primary: PlatformQuote,
    pub secondary: PlatformQuote,
    pub match_kind: MatchKind,
    pub trend: TrendSnapshot,
    pub arbitrage: Option<ArbitrageOpportunity>,
    /// Why no arbitrage was found, if none was
    pub no_arbitrage_reason: Option<String>,
}

impl ComparisonEntry {
    pub fn opportunity_score(&self) -> u8 {
        self.trend.opportunity_score
    }

    pub fn max_diff(&self) -> u8 {
        self.trend.max_diff
    }
}

/// Summary of one matching pass.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatchStats {
    pub total_primary: usize,
    pub total_secondary: usize,
    pub matched: usize,
    pub exact: usize,
    pub fuzzy: usize,
    /// Percentage of the smaller batch that matched
    pub match_rate: f64,
    /// Descriptions of unmatched primary records (capped)
    pub unmatched_primary: Vec<String>,
    /// Descriptions of unmatched secondary records (capped)
    pub unmatched_secondary: Vec<String>,
}

impl From<&MatchReport> for MatchStats {
    fn from(report: &MatchReport) -> Self {
        Self {
            total_primary: report.total_primary,
            total_secondary: report.total_secondary,
            matched: report.matched_count(),
            exact: report.exact_count(),
            fuzzy: report.fuzzy_count(),
            match_rate: report.match_rate(),
            unmatched_primary: report.unmatched_primary.iter().map(MarketRecord::description).collect(),
            unmatched_secondary: report
                .unmatched_secondary
                .iter()
                .map(MarketRecord::description)
                .collect(),
        }
    }
}

/// Comparisons ranked by opportunity score, then max diff, both descending.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComparisonReport {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<ComparisonEntry>,
    pub stats: MatchStats,
}

impl ComparisonReport {
    pub fn new(generated_at: DateTime<Utc>, mut entries: Vec<ComparisonEntry>, stats: MatchStats) -> Self {
        entries.sort_by(|a, b| {
            b.opportunity_score()
                .cmp(&a.opportunity_score())
                .then_with(|| b.max_diff().cmp(&a.max_diff()))
        });

        Self {
            generated_at,
            entries,
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Qualifying opportunities in this report.
    pub fn arbitrage_feed(&self) -> ArbitrageFeed {
        ArbitrageFeed::new(
            self.entries
                .iter()
                .filter_map(|entry| entry.arbitrage.clone())
                .collect(),
        )
    }
}

/// Qualifying arbitrage opportunities, highest ROI first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArbitrageFeed {
    pub opportunities: Vec<ArbitrageOpportunity>,
}

impl ArbitrageFeed {
    pub fn new(mut opportunities: Vec<ArbitrageOpportunity>) -> Self {
        opportunities.sort_by(|a, b| b.roi_percent.cmp(&a.roi_percent));
        Self { opportunities }
    }

    pub fn len(&self) -> usize {
        self.opportunities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArbitrageOpportunity> {
        self.opportunities.iter()
    }
}
