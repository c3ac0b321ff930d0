//! Bounded per-event probability history, trend detection and the advisory
//! opportunity score used to rank comparisons.

use crate::{market::EventKey, probability::ImpliedProbabilities};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

/// Samples kept per event; the oldest is evicted on overflow.
pub const HISTORY_CAPACITY: usize = 60;

/// Samples required before a trend is reported.
pub const TREND_MIN_SAMPLES: usize = 10;

/// Samples in each of the two averaged trend spans.
pub const TREND_SPAN: usize = 5;

/// Samples looked back when computing price change.
pub const PRICE_CHANGE_LOOKBACK: usize = 10;

/// Mean diff movement needed to call a trend.
pub const TREND_THRESHOLD: f64 = 0.5;

/// Direction of the cross-platform probability gap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// One sample offered to the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Observation {
    pub event_key: EventKey,
    pub primary: ImpliedProbabilities,
    pub secondary: ImpliedProbabilities,
    pub timestamp: DateTime<Utc>,
}

/// Change in one platform's implied probabilities over the lookback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PriceChange {
    pub away: i16,
    pub home: i16,
}

impl PriceChange {
    fn between(current: ImpliedProbabilities, past: ImpliedProbabilities) -> Self {
        Self {
            away: i16::from(current.away) - i16::from(past.away),
            home: i16::from(current.home) - i16::from(past.home),
        }
    }
}

/// Bounded history of one event, stored as parallel queues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryWindow {
    pub diffs: VecDeque<u8>,
    pub primary: VecDeque<ImpliedProbabilities>,
    pub secondary: VecDeque<ImpliedProbabilities>,
    pub timestamps: VecDeque<DateTime<Utc>>,
}

impl HistoryWindow {
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Append a sample, evicting the oldest once over capacity.
    pub fn push(
        &mut self,
        diff: u8,
        primary: ImpliedProbabilities,
        secondary: ImpliedProbabilities,
        timestamp: DateTime<Utc>,
    ) {
        self.diffs.push_back(diff);
        self.primary.push_back(primary);
        self.secondary.push_back(secondary);
        self.timestamps.push_back(timestamp);

        while self.diffs.len() > HISTORY_CAPACITY {
            self.diffs.pop_front();
            self.primary.pop_front();
            self.secondary.pop_front();
            self.timestamps.pop_front();
        }
    }

    /// Mean of the last [`TREND_SPAN`] diffs minus the mean of the span
    /// before it. Zero until [`TREND_MIN_SAMPLES`] exist.
    pub fn trend(&self) -> (TrendDirection, f64) {
        let len = self.len();
        if len < TREND_MIN_SAMPLES {
            return (TrendDirection::Stable, 0.0);
        }

        let recent = mean(self.diffs.range(len - TREND_SPAN..));
        let older = mean(self.diffs.range(len - 2 * TREND_SPAN..len - TREND_SPAN));
        let value = recent - older;

        let direction = if value > TREND_THRESHOLD {
            TrendDirection::Increasing
        } else if value < -TREND_THRESHOLD {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        };

        (direction, value)
    }

    /// Max minus min of the last [`TREND_SPAN`] diffs, if that many exist.
    pub fn volatility(&self) -> Option<u8> {
        let len = self.len();
        if len < TREND_SPAN {
            return None;
        }

        let recent = self.diffs.range(len - TREND_SPAN..);
        let max = recent.clone().max()?;
        let min = recent.min()?;
        Some(max - min)
    }

    /// Latest sample minus the [`PRICE_CHANGE_LOOKBACK`]-th most recent, for
    /// both platforms. Zero until enough samples exist.
    pub fn price_change(&self) -> (PriceChange, PriceChange) {
        let len = self.len();
        if len < PRICE_CHANGE_LOOKBACK {
            return (PriceChange::default(), PriceChange::default());
        }

        let past = len - PRICE_CHANGE_LOOKBACK;
        let last = len - 1;
        (
            PriceChange::between(self.primary[last], self.primary[past]),
            PriceChange::between(self.secondary[last], self.secondary[past]),
        )
    }
}

fn mean<'a>(values: impl Iterator<Item = &'a u8>) -> f64 {
    let (sum, count) = values.fold((0u32, 0u32), |(sum, count), value| {
        (sum + u32::from(*value), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        f64::from(sum) / f64::from(count)
    }
}

/// Diff series exposed to reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistorySeries {
    pub diffs: Vec<u8>,
    pub timestamps: Vec<DateTime<Utc>>,
}

/// Derived view of an event's history after the latest observation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrendSnapshot {
    pub direction: TrendDirection,
    /// Trend value rounded to one decimal place
    pub trend_value: f64,
    pub primary_change: PriceChange,
    pub secondary_change: PriceChange,
    /// Advisory ranking score in `[0, 100]`
    pub opportunity_score: u8,
    pub away_diff: u8,
    pub home_diff: u8,
    pub max_diff: u8,
    pub history: HistorySeries,
}

/// Opportunity score heuristic.
///
/// Formula:
///   min(max_diff * 5, 50)
/// + (increasing ? min(|trend| * 10, 20) : 0)
/// + min(volatility * 3, 15)
/// + (max_diff >= 8 ? 15 : max_diff >= 5 ? 10 : 0)
///
/// rounded half-to-even and clamped to `[0, 100]`.
pub fn opportunity_score(
    max_diff: u8,
    direction: TrendDirection,
    trend_value: f64,
    volatility: Option<u8>,
) -> u8 {
    let diff = f64::from(max_diff);
    let mut score = (diff * 5.0).min(50.0);

    if direction == TrendDirection::Increasing {
        score += (trend_value.abs() * 10.0).min(20.0);
    }

    if let Some(volatility) = volatility {
        score += (f64::from(volatility) * 3.0).min(15.0);
    }

    score += match max_diff {
        8.. => 15.0,
        5..=7 => 10.0,
        _ => 0.0,
    };

    score.round_ties_even().clamp(0.0, 100.0) as u8
}

/// Owns the history windows of every observed event.
///
/// Windows are created lazily and live until [`TrendTracker::reset`]. Each
/// window has its own lock so observations of different events do not
/// contend.
#[derive(Debug, Default)]
pub struct TrendTracker {
    windows: RwLock<HashMap<EventKey, Arc<Mutex<HistoryWindow>>>>,
}

impl TrendTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and derive the event's trend snapshot.
    pub fn observe(&self, observation: Observation) -> TrendSnapshot {
        let window = self.window(&observation.event_key);
        let mut window = window.lock();

        let away_diff = observation.primary.away.abs_diff(observation.secondary.away);
        let home_diff = observation.primary.home.abs_diff(observation.secondary.home);
        let max_diff = away_diff.max(home_diff);

        window.push(
            max_diff,
            observation.primary,
            observation.secondary,
            observation.timestamp,
        );

        let (direction, trend_value) = window.trend();
        let (primary_change, secondary_change) = window.price_change();
        let opportunity_score =
            opportunity_score(max_diff, direction, trend_value, window.volatility());

        TrendSnapshot {
            direction,
            trend_value: (trend_value * 10.0).round_ties_even() / 10.0,
            primary_change,
            secondary_change,
            opportunity_score,
            away_diff,
            home_diff,
            max_diff,
            history: HistorySeries {
                diffs: window.diffs.iter().copied().collect(),
                timestamps: window.timestamps.iter().copied().collect(),
            },
        }
    }

    fn window(&self, key: &EventKey) -> Arc<Mutex<HistoryWindow>> {
        if let Some(window) = self.windows.read().get(key) {
            return Arc::clone(window);
        }

        Arc::clone(self.windows.write().entry(key.clone()).or_default())
    }

    /// Copy of the history for one event.
    pub fn history(&self, key: &EventKey) -> Option<HistoryWindow> {
        self.windows
            .read()
            .get(key)
            .map(|window| window.lock().clone())
    }

    /// Number of tracked events.
    pub fn len(&self) -> usize {
        self.windows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.read().is_empty()
    }

    /// Drop all history.
    pub fn reset(&self) {
        self.windows.write().clear();
    }
}
