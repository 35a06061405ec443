//! Decimal helpers shared by the calculators.

use crate::error::PricingError;
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to whole cents, halves away from zero.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamps `amount` into `[minimum, maximum]`; a missing bound is open.
///
/// Bounds are validated when the catalog is built, so `minimum` never
/// exceeds `maximum` here.
pub fn clamp(amount: Decimal, minimum: Option<Decimal>, maximum: Option<Decimal>) -> Decimal {
    let capped = match maximum {
        Some(max) if amount > max => max,
        _ => amount,
    };
    match minimum {
        Some(min) if capped < min => min,
        _ => capped,
    }
}

/// Like [`clamp`], also reporting whether a bound moved the amount.
pub fn clamp_flagged(
    amount: Decimal,
    minimum: Option<Decimal>,
    maximum: Option<Decimal>,
) -> (Decimal, bool) {
    let clamped = clamp(amount, minimum, maximum);
    (clamped, clamped != amount)
}

/// `a * b`, failing with [`PricingError::AmountOutOfRange`] against
/// `card_id` when the product leaves `Decimal` range.
pub fn checked_mul(card_id: i64, a: Decimal, b: Decimal) -> Result<Decimal, PricingError> {
    a.checked_mul(b)
        .ok_or(PricingError::AmountOutOfRange { card_id })
}

pub fn checked_add(card_id: i64, a: Decimal, b: Decimal) -> Result<Decimal, PricingError> {
    a.checked_add(b)
        .ok_or(PricingError::AmountOutOfRange { card_id })
}

/// `percent` percent of `amount`.
pub fn percent_of(card_id: i64, percent: Decimal, amount: Decimal) -> Result<Decimal, PricingError> {
    checked_mul(card_id, percent / Decimal::ONE_HUNDRED, amount)
}

/// Converts a minute count to decimal hours.
pub fn minutes_to_hours(minutes: u32) -> Decimal {
    Decimal::from(minutes) / Decimal::from(60)
}
