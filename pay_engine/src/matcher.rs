//! Scope matching: which cards could price an event at all.

use crate::catalog::RateCatalog;
use crate::models::{RateCard, RateScope, ScopeQuery};
use chrono::NaiveDate;

impl RateScope {
    /// Returns true if a card with this scope applies to `query`.
    /// Scope ids the query does not carry never match.
    pub fn applies_to(&self, query: &ScopeQuery) -> bool {
        match self {
            RateScope::Driver { entity_id } => query.driver_id == Some(*entity_id),
            RateScope::Carrier { entity_id } => query.carrier_id == Some(*entity_id),
            RateScope::Linehaul {
                linehaul_profile_id,
            } => query.linehaul_profile_id == Some(*linehaul_profile_id),
            RateScope::OdPair {
                origin_terminal_id,
                destination_terminal_id,
            } => {
                query.origin_terminal_id == Some(*origin_terminal_id)
                    && query.destination_terminal_id == Some(*destination_terminal_id)
            }
            RateScope::Default => true,
        }
    }
}

/// Every active card whose scope applies to `query` and whose validity
/// window contains `on`.  The result is unordered and may be empty.
pub fn match_candidates<'a>(
    query: &ScopeQuery,
    on: NaiveDate,
    catalog: &'a RateCatalog,
) -> Vec<&'a RateCard> {
    catalog
        .cards()
        .iter()
        .filter(|card| card.active)
        .filter(|card| card.scope.applies_to(query))
        .filter(|card| card.is_valid_on(on))
        .collect()
}
