//! Cross-platform market matching.
//!
//! Pairs each record from the primary platform with the record on the
//! secondary platform describing the same game: first by exact
//! `away@home` code key, then by fuzzy team-name similarity.

use crate::{
    market::{EventKey, MarketRecord, Platform},
    similarity::{normalize_label, similarity},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Default minimum per-team similarity for a fuzzy match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;

/// Maximum number of unmatched records kept per side for reporting.
pub const UNMATCHED_REPORT_CAP: usize = 50;

/// How a matched pair was found.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchKind {
    /// Outcome codes agree exactly (case-insensitive).
    Exact,
    /// Team names cleared the similarity threshold; `score` is the average of
    /// the two team similarities. `swapped` is set when the secondary
    /// platform listed the teams in the opposite order.
    Fuzzy { score: f64, swapped: bool },
}

/// Two records from different platforms describing the same binary event.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MatchedEvent {
    pub event_key: EventKey,
    /// Record from the primary platform; its codes and names are canonical.
    pub primary: MarketRecord,
    /// Record from the secondary platform, oriented so its away side is the
    /// primary's away team.
    pub secondary: MarketRecord,
    pub kind: MatchKind,
}

impl MatchedEvent {
    pub fn new(primary: MarketRecord, secondary: MarketRecord, kind: MatchKind) -> Self {
        Self {
            event_key: primary.event_key(),
            primary,
            secondary,
            kind,
        }
    }

    /// The record quoted by `platform`, primary first.
    pub fn record_for(&self, platform: &Platform) -> Option<&MarketRecord> {
        if &self.primary.platform == platform {
            Some(&self.primary)
        } else if &self.secondary.platform == platform {
            Some(&self.secondary)
        } else {
            None
        }
    }

    /// True if both records come from the same platform.
    pub fn is_same_platform(&self) -> bool {
        self.primary.platform == self.secondary.platform
    }
}

/// Result of matching one batch of records.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MatchReport {
    pub matched: Vec<MatchedEvent>,
    /// First [`UNMATCHED_REPORT_CAP`] primary records without a partner.
    pub unmatched_primary: Vec<MarketRecord>,
    /// First [`UNMATCHED_REPORT_CAP`] secondary records without a partner.
    pub unmatched_secondary: Vec<MarketRecord>,
    pub total_primary: usize,
    pub total_secondary: usize,
}

impl MatchReport {
    pub fn matched_count(&self) -> usize {
        self.matched.len()
    }

    pub fn exact_count(&self) -> usize {
        self.matched
            .iter()
            .filter(|m| matches!(m.kind, MatchKind::Exact))
            .count()
    }

    pub fn fuzzy_count(&self) -> usize {
        self.matched_count() - self.exact_count()
    }

    /// Matched pairs as a percentage of the smaller input batch.
    pub fn match_rate(&self) -> f64 {
        let smaller = self.total_primary.min(self.total_secondary);
        if smaller == 0 {
            0.0
        } else {
            self.matched_count() as f64 / smaller as f64 * 100.0
        }
    }
}

/// Pairs records across two platforms.
#[derive(Debug, Clone, Copy)]
pub struct MarketMatcher {
    threshold: f64,
}

impl Default for MarketMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_THRESHOLD)
    }
}

impl MarketMatcher {
    /// Create a matcher with the given per-team similarity threshold.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Match every primary record against the secondary batch.
    ///
    /// Each secondary record is consumed by at most one match. Records
    /// missing a code or team name are reported unmatched.
    pub fn match_markets(
        &self,
        primary: &[MarketRecord],
        secondary: &[MarketRecord],
    ) -> MatchReport {
        let mut by_key: HashMap<String, usize> = HashMap::with_capacity(secondary.len());
        for (index, record) in secondary.iter().enumerate() {
            if record.has_codes() {
                by_key.entry(record.lookup_key()).or_insert(index);
            }
        }

        let folded: Vec<Option<(String, String)>> = secondary
            .iter()
            .map(|record| {
                record.has_identity().then(|| {
                    (
                        normalize_label(&record.away_team),
                        normalize_label(&record.home_team),
                    )
                })
            })
            .collect();

        let mut consumed: HashSet<usize> = HashSet::new();
        let mut matched = Vec::new();
        let mut unmatched_primary = Vec::new();

        for record in primary {
            if !record.has_identity() {
                debug!(platform = %record.platform, ?record.away_code, ?record.home_code, "Skipping record without identity");
                unmatched_primary.push(record.clone());
                continue;
            }

            let exact = by_key
                .get(&record.lookup_key())
                .copied()
                .filter(|index| !consumed.contains(index));

            let found = match exact {
                Some(index) => Some((index, MatchKind::Exact)),
                None => self
                    .best_fuzzy(record, &folded, &consumed)
                    .map(|(index, score, swapped)| (index, MatchKind::Fuzzy { score, swapped })),
            };

            match found {
                Some((index, kind)) => {
                    consumed.insert(index);
                    let candidate = secondary[index].clone();
                    let candidate = match kind {
                        MatchKind::Fuzzy { swapped: true, .. } => candidate.swap_sides(),
                        _ => candidate,
                    };
                    matched.push(MatchedEvent::new(record.clone(), candidate, kind));
                }
                None => unmatched_primary.push(record.clone()),
            }
        }

        unmatched_primary.truncate(UNMATCHED_REPORT_CAP);
        let unmatched_secondary = secondary
            .iter()
            .enumerate()
            .filter(|(index, _)| !consumed.contains(index))
            .map(|(_, record)| record.clone())
            .take(UNMATCHED_REPORT_CAP)
            .collect();

        let report = MatchReport {
            matched,
            unmatched_primary,
            unmatched_secondary,
            total_primary: primary.len(),
            total_secondary: secondary.len(),
        };

        debug!(
            matched = report.matched_count(),
            exact = report.exact_count(),
            fuzzy = report.fuzzy_count(),
            total_primary = report.total_primary,
            total_secondary = report.total_secondary,
            "Matched markets"
        );

        report
    }

    /// Best fuzzy candidate for `record` among unconsumed secondary records,
    /// with its score and whether its listing order is swapped.
    ///
    /// A candidate qualifies when both teams reach the threshold in listing
    /// order, or both reach it with away/home swapped, and the average
    /// similarity exceeds the threshold. Ties keep the earliest candidate.
    fn best_fuzzy(
        &self,
        record: &MarketRecord,
        folded: &[Option<(String, String)>],
        consumed: &HashSet<usize>,
    ) -> Option<(usize, f64, bool)> {
        let away = normalize_label(&record.away_team);
        let home = normalize_label(&record.home_team);

        let mut best: Option<(usize, f64, bool)> = None;
        for (index, names) in folded.iter().enumerate() {
            let Some((other_away, other_home)) = names else {
                continue;
            };
            if consumed.contains(&index) {
                continue;
            }

            let Some((score, swapped)) = self.pair_score(&away, &home, other_away, other_home) else {
                continue;
            };

            if best.is_none_or(|(_, best_score, _)| score > best_score) {
                best = Some((index, score, swapped));
            }
        }

        best
    }

    /// Score of the qualifying orientation, straight listing order winning
    /// ties.
    fn pair_score(
        &self,
        away: &str,
        home: &str,
        other_away: &str,
        other_home: &str,
    ) -> Option<(f64, bool)> {
        let straight = self
            .orientation_score(similarity(away, other_away), similarity(home, other_home))
            .map(|score| (score, false));
        let swapped = self
            .orientation_score(similarity(away, other_home), similarity(home, other_away))
            .map(|score| (score, true));

        match (straight, swapped) {
            (Some(straight), Some(swapped)) if swapped.0 > straight.0 => Some(swapped),
            (Some(straight), _) => Some(straight),
            (None, swapped) => swapped,
        }
    }

    fn orientation_score(&self, away: f64, home: f64) -> Option<f64> {
        let average = (away + home) / 2.0;
        (away >= self.threshold && home >= self.threshold && average > self.threshold)
            .then_some(average)
    }
}
