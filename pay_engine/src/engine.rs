//! Pay computation engine.
//!
//! The `engine` module runs the pricing pipeline (match, resolve, base,
//! accessorials, assemble) for a single [`PayEvent`] and fans a batch of
//! events out across CPU cores with [`rayon`].  Every call reads one
//! immutable [`RateCatalog`] snapshot and keeps no state of its own, so
//! evaluating the same event against the same snapshot always yields
//! the same result.

use crate::accessorial::compute_accessorials;
use crate::base::compute_base;
use crate::breakdown::assemble;
use crate::catalog::{RateCatalog, SnapshotPolicy};
use crate::error::PricingError;
use crate::matcher::match_candidates;
use crate::models::{EventOutcome, PayBreakdown, PayEvent, PayRunInput, PayRunResult, ScopeQuery};
use crate::resolver::{resolve, Resolution};
use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Resolves the single rate card that applies to `query` on `as_of`.
pub fn resolve_rate_card<'a>(
    catalog: &'a RateCatalog,
    query: &ScopeQuery,
    as_of: NaiveDate,
) -> Result<Resolution<'a>, PricingError> {
    let candidates = match_candidates(query, as_of, catalog);
    debug!(candidates = candidates.len(), %as_of, "matched rate card candidates");
    resolve(&candidates, as_of)
}

/// Prices one event against the cards in force on `event.occurred_on`.
/// Use [`compute_pay_as_of`] to price against another date.
pub fn compute_pay(catalog: &RateCatalog, event: &PayEvent) -> Result<PayBreakdown, PricingError> {
    compute_pay_as_of(catalog, event, event.occurred_on)
}

/// Prices one event against the cards in force on `as_of`, for
/// retroactive re-pricing after a rate change.
///
/// A card flagged as defective by the catalog that wins resolution
/// fails the event with [`PricingError::InvalidRateMethod`]; it is
/// never skipped in favour of a less specific card.
pub fn compute_pay_as_of(
    catalog: &RateCatalog,
    event: &PayEvent,
    as_of: NaiveDate,
) -> Result<PayBreakdown, PricingError> {
    let resolution = resolve_rate_card(catalog, &ScopeQuery::from(event), as_of)?;
    let card = resolution.card;
    debug!(
        event_id = ?event.event_id,
        card_id = card.id,
        tier = %resolution.tier,
        %as_of,
        "resolved rate card"
    );
    if let Some(issue) = catalog.defect(card.id) {
        return Err(PricingError::InvalidRateMethod {
            card_id: card.id,
            reason: issue.to_string(),
        });
    }

    let base = compute_base(card, event)?;
    let accessorials =
        compute_accessorials(card, event, catalog.accessorials_for(card.id), base.amount)?;
    debug!(
        event_id = ?event.event_id,
        base = %base.amount,
        lines = accessorials.lines.len(),
        "priced event"
    );

    assemble(event, base, accessorials, &resolution)
}

fn outcome_for(catalog: &RateCatalog, event: &PayEvent) -> EventOutcome {
    let event_id = event.event_id.clone();
    match compute_pay(catalog, event) {
        Ok(breakdown) => EventOutcome::Priced {
            event_id,
            breakdown,
        },
        Err(error) => {
            warn!(event_id = ?event_id, %error, "event could not be priced");
            EventOutcome::Failed {
                event_id,
                message: error.to_string(),
                error,
            }
        }
    }
}

/// Prices a payroll batch in parallel.
///
/// Failures are reported per event; one bad event never stops the
/// others.  Outcome order is not guaranteed to follow input order.
pub fn run_batch(
    input: PayRunInput,
    catalog: &RateCatalog,
    policy: &SnapshotPolicy,
    evaluated_at: DateTime<Utc>,
) -> PayRunResult {
    run_batch_with_cancel(input, catalog, policy, evaluated_at, &AtomicBool::new(false))
}

/// Like [`run_batch`], abandoning events that have not started once
/// `cancel` is raised.  Outcomes produced before that stay valid.
pub fn run_batch_with_cancel(
    input: PayRunInput,
    catalog: &RateCatalog,
    policy: &SnapshotPolicy,
    evaluated_at: DateTime<Utc>,
    cancel: &AtomicBool,
) -> PayRunResult {
    let stale_snapshot = catalog.staleness(policy, evaluated_at);
    if let Some(stale) = &stale_snapshot {
        warn!(%stale, "pricing against a stale rate catalog snapshot");
    }

    let submitted = input.events.len();
    let outcomes: Vec<EventOutcome> = input
        .events
        .into_par_iter()
        .filter_map(|event| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            Some(outcome_for(catalog, &event))
        })
        .collect();

    let priced = outcomes.iter().filter(|o| o.is_priced()).count();
    let failed = outcomes.len() - priced;
    let cancelled = outcomes.len() < submitted;
    info!(submitted, priced, failed, cancelled, "pay batch finished");

    PayRunResult {
        snapshot_loaded_at: catalog.loaded_at(),
        evaluated_at,
        stale_snapshot,
        priced,
        failed,
        outcomes,
        cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CardComponents, FlatRates, HourlyRates, MileageRates, RateCard, RateMethod, RateScope,
        TrailerConfiguration,
    };
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::time::Duration;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn catalog() -> RateCatalog {
        let driver = RateCard {
            id: 1,
            scope: RateScope::Driver { entity_id: 42 },
            method: RateMethod::PerMile(MileageRates {
                per_single_mile: Some(dec("0.55")),
                ..MileageRates::default()
            }),
            rate_amount: Decimal::ZERO,
            minimum_amount: None,
            maximum_amount: None,
            effective_date: date(2026, 1, 1),
            expiration_date: None,
            priority: false,
            active: true,
            components: CardComponents::default(),
        };
        let broken = RateCard {
            id: 2,
            scope: RateScope::Driver { entity_id: 99 },
            method: RateMethod::PerMile(MileageRates::default()),
            ..driver.clone()
        };
        let default = RateCard {
            id: 3,
            scope: RateScope::Default,
            method: RateMethod::FlatRate(FlatRates::default()),
            rate_amount: dec("120"),
            effective_date: date(2026, 2, 1),
            ..driver.clone()
        };
        let hourly = RateCard {
            id: 4,
            scope: RateScope::Driver { entity_id: 77 },
            method: RateMethod::Hourly(HourlyRates {
                per_work_hour: Some(dec("25")),
                per_stop_hour: None,
            }),
            ..driver.clone()
        };
        RateCatalog::new(Utc::now(), vec![driver, broken, default, hourly], Vec::new())
    }

    fn event(id: &str, driver_id: Option<i64>, on: NaiveDate) -> PayEvent {
        let mut event = PayEvent::new(on, TrailerConfiguration::Single, dec("450"));
        event.event_id = Some(id.to_string());
        event.driver_id = driver_id;
        event
    }

    #[test]
    fn compute_pay_runs_the_pipeline() {
        let breakdown = compute_pay(&catalog(), &event("a", Some(42), date(2026, 4, 1))).unwrap();
        assert_eq!(breakdown.base_rate_card_id, 1);
        assert_eq!(breakdown.total, dec("247.50"));
    }

    #[test]
    fn resolution_is_repeatable() {
        let catalog = catalog();
        let query = ScopeQuery {
            driver_id: Some(7),
            ..ScopeQuery::default()
        };
        let first = resolve_rate_card(&catalog, &query, date(2026, 4, 1)).unwrap();
        let second = resolve_rate_card(&catalog, &query, date(2026, 4, 1)).unwrap();
        assert_eq!(first.card.id, 3);
        assert_eq!(first.card.id, second.card.id);
    }

    #[test]
    fn batch_reports_failures_without_aborting() {
        let catalog = catalog();
        let input = PayRunInput {
            events: vec![
                event("priced", Some(42), date(2026, 4, 1)),
                event("config", Some(99), date(2026, 4, 1)),
                event("unpriced", None, date(2026, 1, 15)),
            ],
        };
        let result = run_batch(input, &catalog, &SnapshotPolicy::default(), Utc::now());

        assert_eq!(result.priced, 1);
        assert_eq!(result.failed, 2);
        assert!(!result.cancelled);
        let unpriced = result
            .outcomes
            .iter()
            .find(|o| o.event_id() == Some("unpriced"))
            .unwrap();
        assert!(matches!(
            unpriced,
            EventOutcome::Failed {
                error: PricingError::NoApplicableRate { .. },
                ..
            }
        ));
        let config = result
            .outcomes
            .iter()
            .find(|o| o.event_id() == Some("config"))
            .unwrap();
        assert!(matches!(
            config,
            EventOutcome::Failed { error, .. } if error.is_configuration_error()
        ));
    }

    #[test]
    fn overflowing_event_fails_alone() {
        let catalog = catalog();
        let mut runaway = event("runaway", Some(77), date(2026, 4, 1));
        runaway.work_hours = Some(Decimal::MAX);
        let input = PayRunInput {
            events: vec![event("priced", Some(42), date(2026, 4, 1)), runaway],
        };
        let result = run_batch(input, &catalog, &SnapshotPolicy::default(), Utc::now());

        assert_eq!(result.priced, 1);
        assert_eq!(result.failed, 1);
        let runaway = result
            .outcomes
            .iter()
            .find(|o| o.event_id() == Some("runaway"))
            .unwrap();
        assert!(matches!(
            runaway,
            EventOutcome::Failed {
                error: PricingError::AmountOutOfRange { card_id: 4 },
                ..
            }
        ));
    }

    #[test]
    fn as_of_date_selects_cards_in_force_then() {
        let catalog = catalog();
        // Before the default card took effect on 2026-02-01.
        let early = event("early", None, date(2026, 1, 15));
        assert!(matches!(
            compute_pay(&catalog, &early),
            Err(PricingError::NoApplicableRate { .. })
        ));

        let repriced = compute_pay_as_of(&catalog, &early, date(2026, 3, 1)).unwrap();
        assert_eq!(repriced.base_rate_card_id, 3);
        assert_eq!(repriced.total, dec("120"));
    }

    #[test]
    fn defective_card_fails_instead_of_falling_through() {
        let mut inverted = catalog().card(1).unwrap().clone();
        inverted.minimum_amount = Some(dec("500"));
        inverted.maximum_amount = Some(dec("100"));
        let fallback = catalog().card(3).unwrap().clone();
        let catalog = RateCatalog::new(Utc::now(), vec![inverted, fallback], Vec::new());

        let err = compute_pay(&catalog, &event("a", Some(42), date(2026, 4, 1))).unwrap_err();
        assert!(matches!(err, PricingError::InvalidRateMethod { card_id: 1, .. }));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn cancelled_batch_abandons_remaining_events() {
        let catalog = catalog();
        let input = PayRunInput {
            events: (0..20)
                .map(|i| event(&format!("e{i}"), Some(42), date(2026, 4, 1)))
                .collect(),
        };
        let cancel = AtomicBool::new(true);
        let result = run_batch_with_cancel(
            input,
            &catalog,
            &SnapshotPolicy::default(),
            Utc::now(),
            &cancel,
        );
        assert!(result.cancelled);
        assert!(result.outcomes.is_empty());
    }

    #[test]
    fn stale_snapshot_is_a_batch_warning() {
        let catalog = catalog();
        let policy = SnapshotPolicy {
            max_age: Some(Duration::from_secs(60)),
        };
        let later = catalog.loaded_at() + chrono::Duration::minutes(5);
        let result = run_batch(
            PayRunInput {
                events: vec![event("a", Some(42), date(2026, 4, 1))],
            },
            &catalog,
            &policy,
            later,
        );
        assert!(result.stale_snapshot.is_some());
        assert_eq!(result.priced, 1);
    }
}
