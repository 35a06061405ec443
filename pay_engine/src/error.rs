//! Pricing errors and audit warnings.
//!
//! Errors are values: the engine returns them per event instead of
//! aborting a batch, and they serialise so that each failed event can
//! be listed for manual review.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::resolver::SpecificityTier;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all_fields = "camelCase")]
pub enum PricingError {
    /// Nothing matched, not even a default card.  The event needs
    /// manual pricing; it is never paid as zero.
    #[error("no applicable rate card for an event on {occurred_on}")]
    NoApplicableRate { occurred_on: NaiveDate },
    #[error("rate card {card_id} has an unusable rate method: {reason}")]
    InvalidRateMethod { card_id: i64, reason: String },
    #[error("accessorial configuration on rate card {card_id} is invalid: {reason}")]
    InvalidAccessorialConfiguration {
        card_id: i64,
        accessorial_id: Option<i64>,
        reason: String,
    },
    #[error("rate card {card_id} needs {field} but the event does not carry it")]
    MissingQuantity { card_id: i64, field: String },
    #[error("an amount priced with rate card {card_id} is outside the representable range")]
    AmountOutOfRange { card_id: i64 },
}

impl PricingError {
    /// Configuration errors point at bad administrative data rather
    /// than at a pricing gap.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PricingError::InvalidRateMethod { .. }
                | PricingError::InvalidAccessorialConfiguration { .. }
        )
    }
}

/// A tie that survived every tie-break.  Pricing proceeds with the
/// lowest id; the warning is carried for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguousRate {
    pub tier: SpecificityTier,
    pub chosen: i64,
    pub tied_with: Vec<i64>,
}

impl fmt::Display for AmbiguousRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let others = self
            .tied_with
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "ambiguous rate: card {} chosen over equally ranked {} card(s) [{}]",
            self.chosen, self.tier, others
        )
    }
}

/// The catalog snapshot is older than the configured freshness bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleSnapshot {
    pub loaded_at: DateTime<Utc>,
    pub evaluated_at: DateTime<Utc>,
    pub max_age_secs: u64,
}

impl fmt::Display for StaleSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let age = (self.evaluated_at - self.loaded_at).num_seconds();
        write!(
            f,
            "rate catalog snapshot loaded at {} is {}s old (bound {}s)",
            self.loaded_at, age, self.max_age_secs
        )
    }
}
