//! Accessorial charges layered on top of the base amount.
//!
//! Each accessorial type is triggered by a field on the pay event and
//! priced by the matching accessorial row on the resolved card, falling
//! back to the card's own components where the card carries one.  Fuel
//! surcharge is priced last and only ever against the base amount.

use crate::error::PricingError;
use crate::models::{
    AccessorialLine, AccessorialMethod, AccessorialRate, AccessorialType, PayEvent, RateCard,
    TrailerConfiguration,
};
use crate::money::{checked_mul, clamp_flagged, minutes_to_hours, percent_of, round_cents};
use rust_decimal::Decimal;

/// What a trigger's quantity measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Count,
    Hours,
    Miles,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Trigger {
    accessorial_type: AccessorialType,
    quantity: Decimal,
    unit: Unit,
}

impl Trigger {
    fn count(accessorial_type: AccessorialType, count: u32) -> Self {
        Self {
            accessorial_type,
            quantity: Decimal::from(count),
            unit: Unit::Count,
        }
    }

    fn minutes(accessorial_type: AccessorialType, minutes: u32) -> Self {
        Self {
            accessorial_type,
            quantity: minutes_to_hours(minutes),
            unit: Unit::Hours,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessorialOutcome {
    pub lines: Vec<AccessorialLine>,
    pub warnings: Vec<String>,
}

impl AccessorialOutcome {
    /// Sum of every line; `None` if it overflows.
    pub fn total(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.amount))
    }
}

fn positive(value: Option<u32>) -> Option<u32> {
    value.filter(|v| *v > 0)
}

/// Accessorial types the event's fields call for, fuel excluded.
fn triggers(event: &PayEvent) -> Vec<Trigger> {
    use AccessorialType::*;

    let mut triggers = Vec::new();
    let configuration = event.trailer_configuration;

    if let Some(count) = positive(event.drop_hook_count) {
        let accessorial_type = match configuration {
            TrailerConfiguration::Single => DropHookSingle,
            TrailerConfiguration::Double | TrailerConfiguration::Triple => DropHookDoubleTriple,
        };
        triggers.push(Trigger::count(accessorial_type, count));
    }
    if let Some(cycles) = positive(event.chain_up_cycles) {
        triggers.push(Trigger::count(ChainUp, cycles));
    }
    if let Some(minutes) = positive(event.wait_time_minutes) {
        triggers.push(Trigger::minutes(WaitTime, minutes));
    }
    match configuration {
        TrailerConfiguration::Single => {}
        TrailerConfiguration::Double => {
            triggers.push(Trigger::count(DoubleTrailer, event.trip_count))
        }
        TrailerConfiguration::Triple => {
            triggers.push(Trigger::count(TripleTrailer, event.trip_count))
        }
    }
    if let Some(miles) = event.cut_miles_actual.filter(|m| *m > Decimal::ZERO) {
        let accessorial_type = match configuration {
            TrailerConfiguration::Single => CutPaySingleMiles,
            TrailerConfiguration::Double => CutPayDoubleMiles,
            TrailerConfiguration::Triple => CutPayTripleMiles,
        };
        triggers.push(Trigger {
            accessorial_type,
            quantity: miles,
            unit: Unit::Miles,
        });
    }
    if let Some(count) = positive(event.layover_count) {
        triggers.push(Trigger::count(Layover, count));
    }
    if let Some(minutes) = positive(event.detention_minutes) {
        triggers.push(Trigger::minutes(Detention, minutes));
    }
    if let Some(minutes) = positive(event.breakdown_minutes) {
        triggers.push(Trigger::minutes(Breakdown, minutes));
    }
    if let Some(count) = positive(event.stop_count) {
        triggers.push(Trigger::count(StopCharge, count));
    }
    for (flag, accessorial_type) in [
        (event.helper, Helper),
        (event.trainer, Trainer),
        (event.hazmat, Hazmat),
        (event.team_driver, TeamDriver),
    ] {
        if flag {
            triggers.push(Trigger::count(accessorial_type, 1));
        }
    }
    for &accessorial_type in &event.additional_accessorials {
        let already = triggers
            .iter()
            .any(|t| t.accessorial_type == accessorial_type);
        if accessorial_type != FuelSurcharge && !already {
            triggers.push(Trigger::count(accessorial_type, 1));
        }
    }

    // Zero trip counts can slip in through trailer surcharges.
    triggers.retain(|t| !t.quantity.is_zero());
    triggers
}

/// The row of `accessorial_type` on the card; the lowest id wins when
/// administrators left duplicates, with a warning.
fn row_for<'a>(
    rates: &'a [AccessorialRate],
    accessorial_type: AccessorialType,
    warnings: &mut Vec<String>,
) -> Option<&'a AccessorialRate> {
    let first = rates
        .iter()
        .filter(|rate| rate.accessorial_type == accessorial_type)
        .min_by_key(|rate| rate.id)?;
    let duplicates: Vec<i64> = rates
        .iter()
        .filter(|rate| rate.accessorial_type == accessorial_type && rate.id != first.id)
        .map(|rate| rate.id)
        .collect();
    if !duplicates.is_empty() {
        warnings.push(format!(
            "duplicate {:?} accessorial rates {:?}; using {}",
            accessorial_type, duplicates, first.id
        ));
    }
    Some(first)
}

/// Rate supplied by the card itself for types that have a card component.
fn card_component(
    card: &RateCard,
    trigger: &Trigger,
    configuration: TrailerConfiguration,
) -> Option<Decimal> {
    match trigger.accessorial_type {
        AccessorialType::DropHookSingle | AccessorialType::DropHookDoubleTriple => {
            card.components.drop_hook_rate(configuration)
        }
        AccessorialType::ChainUp => card.components.per_chain_up,
        _ => None,
    }
}

fn price_row(
    card: &RateCard,
    row: &AccessorialRate,
    quantity: Decimal,
    unit: Unit,
    base_amount: Decimal,
) -> Result<Decimal, PricingError> {
    let rate = row.rate_amount;
    let raw = match (row.rate_method, unit) {
        (AccessorialMethod::FlatRate, Unit::Hours) => rate,
        (AccessorialMethod::FlatRate, Unit::Count | Unit::Miles) => {
            checked_mul(card.id, rate, quantity)?
        }
        (AccessorialMethod::Hourly, Unit::Hours) => checked_mul(card.id, rate, quantity)?,
        (AccessorialMethod::Hourly, _) => {
            return Err(PricingError::InvalidAccessorialConfiguration {
                card_id: card.id,
                accessorial_id: Some(row.id),
                reason: format!(
                    "{:?} is not a timed accessorial and cannot be priced hourly",
                    row.accessorial_type
                ),
            })
        }
        (AccessorialMethod::Percentage, _) => percent_of(card.id, rate, base_amount)?,
    };
    Ok(round_cents(raw))
}

/// Computes every accessorial line for an event priced by `card`.
///
/// `rates` are the accessorial rows attached to `card`; `base_amount`
/// is the clamped base, used by percentage lines and fuel surcharge.
pub fn compute_accessorials(
    card: &RateCard,
    event: &PayEvent,
    rates: &[AccessorialRate],
    base_amount: Decimal,
) -> Result<AccessorialOutcome, PricingError> {
    let mut outcome = AccessorialOutcome::default();

    for trigger in triggers(event) {
        let row = row_for(rates, trigger.accessorial_type, &mut outcome.warnings);
        let component = card_component(card, &trigger, event.trailer_configuration);

        let line = match (row, component) {
            (Some(row), component) => {
                check_bounds(card, row)?;
                // Chain-up is always paid at the card's per-cycle rate when
                // the card has one; the row then only bounds it.
                let raw = match (trigger.accessorial_type, component) {
                    (AccessorialType::ChainUp, Some(per_chain_up)) => {
                        round_cents(checked_mul(card.id, per_chain_up, trigger.quantity)?)
                    }
                    _ => price_row(card, row, trigger.quantity, trigger.unit, base_amount)?,
                };
                let (amount, clamped) = clamp_flagged(raw, row.minimum_charge, row.maximum_charge);
                AccessorialLine {
                    accessorial_type: trigger.accessorial_type,
                    amount,
                    quantity: trigger.quantity,
                    source_rate_id: Some(row.id),
                    clamped,
                }
            }
            (None, Some(rate)) => AccessorialLine {
                accessorial_type: trigger.accessorial_type,
                amount: round_cents(checked_mul(card.id, rate, trigger.quantity)?),
                quantity: trigger.quantity,
                source_rate_id: None,
                clamped: false,
            },
            (None, None) => continue,
        };
        outcome.lines.push(line);
    }

    if let Some(line) = fuel_surcharge(card, rates, base_amount, &mut outcome.warnings)? {
        outcome.lines.push(line);
    }

    Ok(outcome)
}

fn fuel_surcharge(
    card: &RateCard,
    rates: &[AccessorialRate],
    base_amount: Decimal,
    warnings: &mut Vec<String>,
) -> Result<Option<AccessorialLine>, PricingError> {
    if let Some(row) = row_for(rates, AccessorialType::FuelSurcharge, warnings) {
        check_bounds(card, row)?;
        let raw = match row.rate_method {
            AccessorialMethod::Percentage => percent_of(card.id, row.rate_amount, base_amount)?,
            AccessorialMethod::FlatRate => row.rate_amount,
            AccessorialMethod::Hourly => {
                return Err(PricingError::InvalidAccessorialConfiguration {
                    card_id: card.id,
                    accessorial_id: Some(row.id),
                    reason: "fuel surcharge cannot be priced hourly".to_string(),
                })
            }
        };
        let (amount, clamped) =
            clamp_flagged(round_cents(raw), row.minimum_charge, row.maximum_charge);
        return Ok(Some(AccessorialLine {
            accessorial_type: AccessorialType::FuelSurcharge,
            amount,
            quantity: base_amount,
            source_rate_id: Some(row.id),
            clamped,
        }));
    }

    card.components
        .fuel_surcharge
        .map(|percent| {
            Ok(AccessorialLine {
                accessorial_type: AccessorialType::FuelSurcharge,
                amount: round_cents(percent_of(card.id, percent, base_amount)?),
                quantity: base_amount,
                source_rate_id: None,
                clamped: false,
            })
        })
        .transpose()
}

/// A row whose charge bounds are inverted cannot price anything.
fn check_bounds(card: &RateCard, row: &AccessorialRate) -> Result<(), PricingError> {
    match (row.minimum_charge, row.maximum_charge) {
        (Some(minimum), Some(maximum)) if minimum > maximum => {
            Err(PricingError::InvalidAccessorialConfiguration {
                card_id: card.id,
                accessorial_id: Some(row.id),
                reason: format!("minimum charge {minimum} exceeds maximum charge {maximum}"),
            })
        }
        _ => Ok(()),
    }
}
