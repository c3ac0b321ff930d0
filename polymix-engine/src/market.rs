//! Normalized market records shared by every stage of the engine.
//!
//! Platform adapters (HTTP clients, team-name dictionaries) live outside this
//! crate. They hand the engine [`MarketRecord`]s: one binary "away vs home"
//! market per record, priced on a 0-100 scale.

use crate::probability::{ImpliedProbabilities, normalize};
use derive_more::{Display, From};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Name of a prediction market platform (e.g. "Polymarket", "Kalshi").
#[derive(
    Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Display, From, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Platform(SmolStr);

impl Platform {
    pub const POLYMARKET: &'static str = "Polymarket";
    pub const KALSHI: &'static str = "Kalshi";
    pub const MANIFOLD: &'static str = "Manifold";

    /// Create a platform from its display name.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    pub fn polymarket() -> Self {
        Self::new(Self::POLYMARKET)
    }

    pub fn kalshi() -> Self {
        Self::new(Self::KALSHI)
    }

    pub fn manifold() -> Self {
        Self::new(Self::MANIFOLD)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Platform {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Which outcome of a binary game market a price or leg refers to.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Away,
    Home,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Away => write!(f, "away"),
            Outcome::Home => write!(f, "home"),
        }
    }
}

/// Canonical, order-independent identifier of a real-world event.
///
/// Built from the two outcome codes: each code is lower-cased with spaces and
/// hyphens removed, the pair is sorted and joined with `@`. "BOS@NYK" and
/// "NYK@BOS" therefore produce the same key.
#[derive(
    Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Display, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct EventKey(SmolStr);

impl EventKey {
    /// Build the canonical key for a pair of outcome codes.
    pub fn from_codes(away: &str, home: &str) -> Self {
        let mut codes = [canonical_code(away), canonical_code(home)];
        codes.sort();
        Self(SmolStr::new(format!("{}@{}", codes[0], codes[1])))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

fn canonical_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// One priced outcome on one platform.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MarketSide {
    pub platform: Platform,
    pub label: String,
    pub code: SmolStr,
    /// Price on a 0-100 scale.
    pub raw_price: Decimal,
    pub fee_rate: Decimal,
}

impl MarketSide {
    /// A side priced at or below zero can never be bought.
    pub fn is_tradable(&self) -> bool {
        self.raw_price > Decimal::ZERO
    }
}

/// Reasons a feed record is rejected before entering the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record has no platform")]
    MissingPlatform,

    #[error("{platform} record is missing the {outcome} team name")]
    MissingTeam { platform: Platform, outcome: Outcome },

    #[error("{platform} {outcome} price {price} is outside 0-100")]
    PriceOutOfRange {
        platform: Platform,
        outcome: Outcome,
        price: Decimal,
    },
}

/// A normalized binary game market as delivered by a platform feed.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct MarketRecord {
    pub platform: Platform,
    pub away_code: SmolStr,
    pub home_code: SmolStr,
    pub away_team: String,
    pub home_team: String,
    /// Away price on a 0-100 scale, if the platform quoted one.
    #[serde(default)]
    pub away_raw_price: Option<Decimal>,
    #[serde(default)]
    pub home_raw_price: Option<Decimal>,
    /// Platform market identifier for the away outcome (e.g. Kalshi ticker).
    #[serde(default)]
    pub away_ref: Option<SmolStr>,
    #[serde(default)]
    pub home_ref: Option<SmolStr>,
    /// Market identifier shared by both outcomes (e.g. Polymarket market id).
    #[serde(default)]
    pub market_ref: Option<SmolStr>,
    #[serde(default)]
    pub sport: SmolStr,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub game_time: Option<String>,
}

impl MarketRecord {
    /// Create a record with identity fields only; prices and references are
    /// attached with the `with_*` builders.
    pub fn new(
        platform: impl Into<Platform>,
        away_code: impl Into<SmolStr>,
        home_code: impl Into<SmolStr>,
        away_team: impl Into<String>,
        home_team: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            away_code: away_code.into(),
            home_code: home_code.into(),
            away_team: away_team.into(),
            home_team: home_team.into(),
            away_raw_price: None,
            home_raw_price: None,
            away_ref: None,
            home_ref: None,
            market_ref: None,
            sport: SmolStr::default(),
            url: String::new(),
            game_time: None,
        }
    }

    pub fn with_prices(mut self, away: Decimal, home: Decimal) -> Self {
        self.away_raw_price = Some(away);
        self.home_raw_price = Some(home);
        self
    }

    pub fn with_refs(mut self, away: impl Into<SmolStr>, home: impl Into<SmolStr>) -> Self {
        self.away_ref = Some(away.into());
        self.home_ref = Some(home.into());
        self
    }

    pub fn with_market_ref(mut self, market_ref: impl Into<SmolStr>) -> Self {
        self.market_ref = Some(market_ref.into());
        self
    }

    pub fn with_sport(mut self, sport: impl Into<SmolStr>) -> Self {
        self.sport = sport.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_game_time(mut self, game_time: impl Into<String>) -> Self {
        self.game_time = Some(game_time.into());
        self
    }

    /// Check the fields every stage relies on: a platform, both team names
    /// and prices, when quoted, on the 0-100 scale.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.platform.as_str().trim().is_empty() {
            return Err(RecordError::MissingPlatform);
        }

        for outcome in [Outcome::Away, Outcome::Home] {
            if self.team(outcome).trim().is_empty() {
                return Err(RecordError::MissingTeam {
                    platform: self.platform.clone(),
                    outcome,
                });
            }

            match self.raw_price(outcome) {
                Some(price) if !(Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&price) => {
                    return Err(RecordError::PriceOutOfRange {
                        platform: self.platform.clone(),
                        outcome,
                        price,
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// The same market with the away and home sides exchanged. The shared
    /// market reference and URL are kept.
    pub fn swap_sides(self) -> Self {
        Self {
            away_code: self.home_code,
            home_code: self.away_code,
            away_team: self.home_team,
            home_team: self.away_team,
            away_raw_price: self.home_raw_price,
            home_raw_price: self.away_raw_price,
            away_ref: self.home_ref,
            home_ref: self.away_ref,
            ..self
        }
    }

    /// True when both outcome codes are present.
    pub fn has_codes(&self) -> bool {
        !self.away_code.trim().is_empty() && !self.home_code.trim().is_empty()
    }

    /// True when both codes and both team names are present.
    pub fn has_identity(&self) -> bool {
        self.has_codes() && !self.away_team.trim().is_empty() && !self.home_team.trim().is_empty()
    }

    /// Key used for exact cross-platform lookups: `lower(away)@lower(home)`.
    pub fn lookup_key(&self) -> String {
        format!(
            "{}@{}",
            self.away_code.to_lowercase(),
            self.home_code.to_lowercase()
        )
    }

    /// Canonical event key, falling back to team names when a code is missing.
    pub fn event_key(&self) -> EventKey {
        let away = non_empty(&self.away_code).unwrap_or(self.away_team.as_str());
        let home = non_empty(&self.home_code).unwrap_or(self.home_team.as_str());
        EventKey::from_codes(away, home)
    }

    pub fn raw_price(&self, outcome: Outcome) -> Option<Decimal> {
        match outcome {
            Outcome::Away => self.away_raw_price,
            Outcome::Home => self.home_raw_price,
        }
    }

    pub fn code(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Away => self.away_code.as_str(),
            Outcome::Home => self.home_code.as_str(),
        }
    }

    pub fn team(&self, outcome: Outcome) -> &str {
        match outcome {
            Outcome::Away => self.away_team.as_str(),
            Outcome::Home => self.home_team.as_str(),
        }
    }

    /// Market identifier to query at settlement time for one outcome.
    pub fn external_ref(&self, outcome: Outcome) -> Option<&SmolStr> {
        let side_ref = match outcome {
            Outcome::Away => self.away_ref.as_ref(),
            Outcome::Home => self.home_ref.as_ref(),
        };
        side_ref.or(self.market_ref.as_ref())
    }

    /// Build the priced [`MarketSide`] for one outcome, if it has a price.
    pub fn side(&self, outcome: Outcome, fee_rate: Decimal) -> Option<MarketSide> {
        Some(MarketSide {
            platform: self.platform.clone(),
            label: self.team(outcome).to_string(),
            code: SmolStr::new(self.code(outcome)),
            raw_price: self.raw_price(outcome)?,
            fee_rate,
        })
    }

    /// Integer implied probabilities, or `None` if either price is missing.
    pub fn implied_probabilities(&self) -> Option<ImpliedProbabilities> {
        Some(normalize(self.away_raw_price?, self.home_raw_price?))
    }

    /// Human-readable "Away vs Home" description.
    pub fn description(&self) -> String {
        format!("{} vs {}", self.away_team, self.home_team)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
