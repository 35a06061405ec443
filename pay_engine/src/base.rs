//! Base pay computation.
//!
//! The base amount depends only on the resolved card's rate method and
//! the event's measured quantities.  Card-level minimum and maximum
//! clamps apply here and nowhere else.

use crate::error::PricingError;
use crate::models::{BaseBasis, PayEvent, RateCard, RateMethod};
use crate::money::{checked_add, checked_mul, clamp_flagged, percent_of, round_cents};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct BaseAmount {
    pub amount: Decimal,
    /// The rounded amount before clamping.
    pub raw_amount: Decimal,
    pub clamped: bool,
    pub basis: BaseBasis,
}

/// Computes the clamped base amount of `event` under `card`.
///
/// Fails with [`PricingError::InvalidRateMethod`] when the card's method
/// is unusable and with [`PricingError::AmountOutOfRange`] when the
/// arithmetic overflows.
pub fn compute_base(card: &RateCard, event: &PayEvent) -> Result<BaseAmount, PricingError> {
    let trips = event.trip_count;
    let mul = |a: Decimal, b: Decimal| checked_mul(card.id, a, b);
    let (raw, basis) = match &card.method {
        RateMethod::PerMile(mileage) => {
            let cut_pay = match (mileage.cut_miles, mileage.per_cut_trip) {
                (Some(cut_miles), Some(per_cut_trip)) => Some((cut_miles, per_cut_trip)),
                (Some(_), None) => {
                    return Err(PricingError::InvalidRateMethod {
                        card_id: card.id,
                        reason: "cutMiles is set without perCutTrip".to_string(),
                    })
                }
                (None, _) => None,
            };

            match cut_pay {
                // The threshold is exclusive: a trip of exactly `cut_miles`
                // is paid mileage.
                Some((cut_miles, per_cut_trip)) if event.miles < cut_miles => (
                    mul(per_cut_trip, Decimal::from(trips))?,
                    BaseBasis::CutPay {
                        per_cut_trip,
                        trips,
                        cut_miles,
                        cut_miles_type: mileage.cut_miles_type.clone(),
                    },
                ),
                _ => {
                    let rate = mileage
                        .for_configuration(event.trailer_configuration)
                        .or_else(|| (!card.rate_amount.is_zero()).then_some(card.rate_amount))
                        .ok_or_else(|| PricingError::InvalidRateMethod {
                            card_id: card.id,
                            reason: format!(
                                "no per-mile rate for {:?} trailers",
                                event.trailer_configuration
                            ),
                        })?;
                    (
                        mul(rate, event.miles)?,
                        BaseBasis::Mileage {
                            rate,
                            miles: event.miles,
                            trailer_configuration: event.trailer_configuration,
                        },
                    )
                }
            }
        }
        RateMethod::FlatRate(flat) => {
            let per_trip = flat.per_trip.unwrap_or(card.rate_amount);
            (
                mul(per_trip, Decimal::from(trips))?,
                BaseBasis::Flat { per_trip, trips },
            )
        }
        RateMethod::Hourly(hourly) => {
            let per_work_hour = hourly.per_work_hour.unwrap_or(card.rate_amount);
            let per_stop_hour = hourly.per_stop_hour.unwrap_or(Decimal::ZERO);
            let work_hours = event.work_hours.unwrap_or(Decimal::ZERO);
            let stop_hours = event.stop_hours.unwrap_or(Decimal::ZERO);
            (
                checked_add(
                    card.id,
                    mul(per_work_hour, work_hours)?,
                    mul(per_stop_hour, stop_hours)?,
                )?,
                BaseBasis::Hourly {
                    per_work_hour,
                    work_hours,
                    per_stop_hour,
                    stop_hours,
                },
            )
        }
        RateMethod::Percentage => {
            let reference_revenue =
                event
                    .reference_revenue
                    .ok_or_else(|| PricingError::MissingQuantity {
                        card_id: card.id,
                        field: "referenceRevenue".to_string(),
                    })?;
            (
                percent_of(card.id, card.rate_amount, reference_revenue)?,
                BaseBasis::Percentage {
                    percent: card.rate_amount,
                    reference_revenue,
                },
            )
        }
        RateMethod::Unrecognized { label } => {
            return Err(PricingError::InvalidRateMethod {
                card_id: card.id,
                reason: format!("unrecognised rate method {label}"),
            })
        }
    };

    let raw_amount = round_cents(raw);
    let (amount, clamped) = clamp_flagged(raw_amount, card.minimum_amount, card.maximum_amount);
    Ok(BaseAmount {
        amount,
        raw_amount,
        clamped,
        basis,
    })
}
