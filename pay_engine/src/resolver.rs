//! Specificity resolution.
//!
//! Candidates are ranked by a fixed tier order first; the
//! administrative `priority` flag, recency and id only break ties
//! inside a tier.  A driver or carrier card therefore always beats a
//! lane, profile or default card, whatever flags those carry.

use crate::error::{AmbiguousRate, PricingError};
use crate::models::{RateCard, RateType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use tracing::warn;

/// Precedence tiers, least specific first so that `Ord` reads
/// naturally (`Entity > OdPair > Linehaul > Default`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecificityTier {
    Default,
    Linehaul,
    OdPair,
    Entity,
}

impl From<RateType> for SpecificityTier {
    fn from(rate_type: RateType) -> Self {
        match rate_type {
            RateType::Driver | RateType::Carrier => SpecificityTier::Entity,
            RateType::OdPair => SpecificityTier::OdPair,
            RateType::Linehaul => SpecificityTier::Linehaul,
            RateType::Default => SpecificityTier::Default,
        }
    }
}

impl fmt::Display for SpecificityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SpecificityTier::Entity => "entity-specific",
            SpecificityTier::OdPair => "lane-specific",
            SpecificityTier::Linehaul => "profile-specific",
            SpecificityTier::Default => "default",
        };
        f.write_str(label)
    }
}

/// The card chosen to price an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'a> {
    pub card: &'a RateCard,
    pub tier: SpecificityTier,
    pub warning: Option<AmbiguousRate>,
}

/// Ranking key; the greatest key wins.
fn rank(card: &RateCard) -> (SpecificityTier, bool, NaiveDate, Reverse<i64>) {
    (
        SpecificityTier::from(card.rate_type()),
        card.priority,
        card.effective_date,
        Reverse(card.id),
    )
}

/// Picks exactly one card out of `candidates`.
///
/// `occurred_on` is only used to describe a [`PricingError::NoApplicableRate`].
pub fn resolve<'a>(
    candidates: &[&'a RateCard],
    occurred_on: NaiveDate,
) -> Result<Resolution<'a>, PricingError> {
    let card = *candidates
        .iter()
        .max_by_key(|card| rank(card))
        .ok_or(PricingError::NoApplicableRate { occurred_on })?;

    let (tier, priority, effective_date, _) = rank(card);
    let mut tied_with: Vec<i64> = candidates
        .iter()
        .filter(|other| !std::ptr::eq(**other, card))
        .filter(|other| {
            let (other_tier, other_priority, other_date, _) = rank(other);
            (other_tier, other_priority, other_date) == (tier, priority, effective_date)
        })
        .map(|other| other.id)
        .collect();
    tied_with.sort_unstable();

    let warning = if tied_with.is_empty() {
        None
    } else {
        let warning = AmbiguousRate {
            tier,
            chosen: card.id,
            tied_with,
        };
        warn!(card_id = card.id, tied_with = ?warning.tied_with, "ambiguous rate resolution");
        Some(warning)
    };

    Ok(Resolution {
        card,
        tier,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CardComponents, FlatRates, RateMethod, RateScope};
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn card(id: i64, scope: RateScope) -> RateCard {
        RateCard {
            id,
            scope,
            method: RateMethod::FlatRate(FlatRates::default()),
            rate_amount: Decimal::from(100),
            minimum_amount: None,
            maximum_amount: None,
            effective_date: date(2026, 1, 1),
            expiration_date: None,
            priority: false,
            active: true,
            components: CardComponents::default(),
        }
    }

    #[test]
    fn entity_tier_beats_flagged_default() {
        let driver = card(5, RateScope::Driver { entity_id: 42 });
        let lane = card(
            2,
            RateScope::OdPair {
                origin_terminal_id: 1,
                destination_terminal_id: 2,
            },
        );
        let mut default = card(1, RateScope::Default);
        default.priority = true;
        default.effective_date = date(2026, 3, 1);

        let resolution = resolve(&[&default, &lane, &driver], date(2026, 4, 1)).unwrap();
        assert_eq!(resolution.card.id, 5);
        assert_eq!(resolution.tier, SpecificityTier::Entity);
        assert!(resolution.warning.is_none());
    }

    #[test]
    fn lane_beats_profile() {
        let profile = card(
            1,
            RateScope::Linehaul {
                linehaul_profile_id: 3,
            },
        );
        let lane = card(
            2,
            RateScope::OdPair {
                origin_terminal_id: 1,
                destination_terminal_id: 2,
            },
        );
        let resolution = resolve(&[&profile, &lane], date(2026, 4, 1)).unwrap();
        assert_eq!(resolution.card.id, 2);
    }

    #[test]
    fn priority_then_recency_break_ties_within_tier() {
        let mut flagged = card(1, RateScope::Default);
        flagged.priority = true;
        let mut recent = card(2, RateScope::Default);
        recent.effective_date = date(2026, 3, 1);

        let resolution = resolve(&[&recent, &flagged], date(2026, 4, 1)).unwrap();
        assert_eq!(resolution.card.id, 1, "priority outranks recency");

        let older = card(3, RateScope::Default);
        let resolution = resolve(&[&older, &recent], date(2026, 4, 1)).unwrap();
        assert_eq!(resolution.card.id, 2);
        assert!(resolution.warning.is_none());
    }

    #[test]
    fn full_tie_takes_lowest_id_and_warns() {
        let a = card(9, RateScope::Default);
        let b = card(4, RateScope::Default);
        let c = card(6, RateScope::Default);

        let resolution = resolve(&[&a, &b, &c], date(2026, 4, 1)).unwrap();
        assert_eq!(resolution.card.id, 4);
        let warning = resolution.warning.expect("tie is flagged");
        assert_eq!(warning.chosen, 4);
        assert_eq!(warning.tied_with, vec![6, 9]);
        assert_eq!(warning.tier, SpecificityTier::Default);
    }

    #[test]
    fn same_id_cards_still_count_as_a_tie() {
        let a = card(7, RateScope::Default);
        let b = card(7, RateScope::Default);
        let resolution = resolve(&[&a, &b], date(2026, 4, 1)).unwrap();
        let warning = resolution.warning.expect("tie is flagged");
        assert_eq!(warning.tied_with, vec![7]);
    }

    #[test]
    fn driver_and_carrier_share_a_tier() {
        let driver = card(8, RateScope::Driver { entity_id: 42 });
        let carrier = card(3, RateScope::Carrier { entity_id: 11 });
        let resolution = resolve(&[&driver, &carrier], date(2026, 4, 1)).unwrap();
        assert_eq!(resolution.card.id, 3);
        assert!(resolution.warning.is_some());
    }

    #[test]
    fn no_candidates_is_an_error() {
        let err = resolve(&[], date(2026, 4, 1)).unwrap_err();
        assert_eq!(
            err,
            PricingError::NoApplicableRate {
                occurred_on: date(2026, 4, 1)
            }
        );
    }
}
