//! Assembles the final pay breakdown.  Pure aggregation: components
//! arrive already priced and clamped.

use crate::accessorial::AccessorialOutcome;
use crate::base::BaseAmount;
use crate::error::PricingError;
use crate::models::{PayBreakdown, PayEvent};
use crate::resolver::Resolution;

pub fn assemble(
    event: &PayEvent,
    base: BaseAmount,
    accessorials: AccessorialOutcome,
    resolution: &Resolution<'_>,
) -> Result<PayBreakdown, PricingError> {
    let card_id = resolution.card.id;
    let total = accessorials
        .total()
        .and_then(|lines| lines.checked_add(base.amount))
        .ok_or(PricingError::AmountOutOfRange { card_id })?;

    let mut warnings = Vec::new();
    if let Some(warning) = &resolution.warning {
        warnings.push(warning.to_string());
    }
    warnings.extend(accessorials.warnings);

    Ok(PayBreakdown {
        event_id: event.event_id.clone(),
        base_amount: base.amount,
        base_rate_card_id: card_id,
        resolved_scope: resolution.card.rate_type(),
        base_basis: base.basis,
        clamped_from_base: base.clamped.then_some(base.raw_amount),
        accessorial_lines: accessorials.lines,
        total,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AmbiguousRate;
    use crate::models::{
        AccessorialLine, AccessorialType, BaseBasis, CardComponents, FlatRates, RateCard,
        RateMethod, RateScope, RateType, TrailerConfiguration,
    };
    use crate::resolver::SpecificityTier;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    #[test]
    fn sums_components_and_carries_audit_fields() {
        let card = RateCard {
            id: 12,
            scope: RateScope::Default,
            method: RateMethod::FlatRate(FlatRates::default()),
            rate_amount: Decimal::from(100),
            minimum_amount: Some(Decimal::from(150)),
            maximum_amount: None,
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            expiration_date: None,
            priority: false,
            active: true,
            components: CardComponents::default(),
        };
        let resolution = Resolution {
            card: &card,
            tier: SpecificityTier::Default,
            warning: Some(AmbiguousRate {
                tier: SpecificityTier::Default,
                chosen: 12,
                tied_with: vec![15],
            }),
        };
        let base = BaseAmount {
            amount: Decimal::from(150),
            raw_amount: Decimal::from(100),
            clamped: true,
            basis: BaseBasis::Flat {
                per_trip: Decimal::from(100),
                trips: 1,
            },
        };
        let accessorials = AccessorialOutcome {
            lines: vec![AccessorialLine {
                accessorial_type: AccessorialType::Layover,
                amount: Decimal::from(80),
                quantity: Decimal::ONE,
                source_rate_id: Some(3),
                clamped: false,
            }],
            warnings: vec!["duplicate rows".to_string()],
        };
        let mut event = PayEvent::new(
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            TrailerConfiguration::Single,
            Decimal::ZERO,
        );
        event.event_id = Some("leg-7".to_string());

        let breakdown = assemble(&event, base, accessorials, &resolution).unwrap();

        assert_eq!(breakdown.total, Decimal::from(230));
        assert_eq!(breakdown.base_rate_card_id, 12);
        assert_eq!(breakdown.resolved_scope, RateType::Default);
        assert_eq!(breakdown.clamped_from_base, Some(Decimal::from(100)));
        assert_eq!(breakdown.event_id.as_deref(), Some("leg-7"));
        assert_eq!(breakdown.warnings.len(), 2);
        assert!(breakdown.warnings[0].contains("ambiguous"));
    }
}
