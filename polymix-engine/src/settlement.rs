//! Settlement status lookups supplied by platform collaborators.

use crate::market::Platform;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Resolution state of one platform market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettlementStatus {
    pub resolved: bool,
    /// Winning outcome code or label; `None` for an unresolved or void market.
    pub winner: Option<String>,
}

impl SettlementStatus {
    /// Market still open.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Market resolved in favour of `winner`.
    pub fn won_by(winner: impl Into<String>) -> Self {
        Self {
            resolved: true,
            winner: Some(winner.into()),
        }
    }

    /// Market resolved with no winning outcome (push, cancellation).
    pub fn void() -> Self {
        Self {
            resolved: true,
            winner: None,
        }
    }

    /// True if the market resolved in favour of `code` or `label`.
    pub fn is_won_by(&self, code: &str, label: &str) -> bool {
        self.resolved
            && self
                .winner
                .as_deref()
                .is_some_and(|winner| winner == code || winner == label)
    }
}

/// Failure reported by a status lookup. The affected bet stays pending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusLookupError {
    #[error("status request failed for {platform} market {market_ref}: {message}")]
    Request {
        platform: Platform,
        market_ref: SmolStr,
        message: String,
    },

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(Platform),
}

/// Resolves a platform market reference to its settlement status.
pub trait SettlementStatusLookup {
    fn status(&self, platform: &Platform, market_ref: &str)
    -> Result<SettlementStatus, StatusLookupError>;
}

impl<F> SettlementStatusLookup for F
where
    F: Fn(&Platform, &str) -> Result<SettlementStatus, StatusLookupError>,
{
    fn status(
        &self,
        platform: &Platform,
        market_ref: &str,
    ) -> Result<SettlementStatus, StatusLookupError> {
        self(platform, market_ref)
    }
}

/// Recover a market ticker from a `.../markets/<ticker>` URL.
///
/// Query strings and fragments are stripped.
pub fn recover_market_ref(url: &str) -> Option<SmolStr> {
    let (_, tail) = url.split_once("/markets/")?;
    let ticker = tail
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');

    (!ticker.is_empty()).then(|| SmolStr::new(ticker))
}
