//! Data models for the Pay Engine.
//!
//! The `models` module defines the serialisable records the engine
//! reads (rate cards, accessorial rates, pay events) and the records
//! it produces (pay breakdowns and batch results).  The JSON shape is
//! flat and camelCased, matching what the rate-card administration
//! service emits, while the Rust shape groups the scope and the rate
//! method into sum types so that only the fields a card actually uses
//! are ever present.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, StaleSnapshot};

/// A priced rule with a scope and a validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateCard {
    pub id: i64,
    /// Who or what the card applies to.  Serialised as `rateType`
    /// plus the scope fields of that type.
    #[serde(flatten)]
    pub scope: RateScope,
    /// How the base amount is computed.  Serialised as `rateMethod`
    /// plus the components of that method.
    #[serde(flatten)]
    pub method: RateMethod,
    #[serde(default)]
    pub rate_amount: Decimal,
    /// Lower clamp on the base amount.
    #[serde(default)]
    pub minimum_amount: Option<Decimal>,
    /// Upper clamp on the base amount.
    #[serde(default)]
    pub maximum_amount: Option<Decimal>,
    pub effective_date: NaiveDate,
    /// Exclusive end of validity; `None` means open-ended.
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(flatten)]
    pub components: CardComponents,
}

fn default_true() -> bool {
    true
}

impl RateCard {
    /// Returns true if `on` falls inside `[effective_date, expiration_date)`.
    pub fn is_valid_on(&self, on: NaiveDate) -> bool {
        self.effective_date <= on && self.expiration_date.map_or(true, |end| on < end)
    }

    pub fn rate_type(&self) -> RateType {
        self.scope.rate_type()
    }
}

/// The scope of a rate card, tagged by `rateType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rateType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateScope {
    #[serde(rename_all = "camelCase")]
    Driver { entity_id: i64 },
    #[serde(rename_all = "camelCase")]
    Carrier { entity_id: i64 },
    #[serde(rename_all = "camelCase")]
    Linehaul { linehaul_profile_id: i64 },
    #[serde(rename_all = "camelCase")]
    OdPair {
        origin_terminal_id: i64,
        destination_terminal_id: i64,
    },
    Default,
}

impl RateScope {
    pub fn rate_type(&self) -> RateType {
        match self {
            RateScope::Driver { .. } => RateType::Driver,
            RateScope::Carrier { .. } => RateType::Carrier,
            RateScope::Linehaul { .. } => RateType::Linehaul,
            RateScope::OdPair { .. } => RateType::OdPair,
            RateScope::Default => RateType::Default,
        }
    }
}

/// The bare scope label, used in audit output where the scope ids are
/// not needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateType {
    Driver,
    Carrier,
    Linehaul,
    OdPair,
    Default,
}

/// How a card computes its base amount, tagged by `rateMethod`.
///
/// `LINEHAUL_PROFILE` and `ORIGIN_DESTINATION` are labels the
/// administration screens use for mileage cards; they are read as
/// `PER_MILE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rateMethod", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateMethod {
    #[serde(alias = "LINEHAUL_PROFILE", alias = "ORIGIN_DESTINATION")]
    PerMile(MileageRates),
    FlatRate(FlatRates),
    Hourly(HourlyRates),
    Percentage,
    /// A label the calculator does not know.  Only the catalog loader
    /// builds this; a card carrying it can win resolution but never
    /// prices anything.
    #[serde(skip_deserializing)]
    Unrecognized { label: String },
}

impl RateMethod {
    /// Labels accepted in the `rateMethod` column.
    pub const LABELS: [&'static str; 6] = [
        "PER_MILE",
        "LINEHAUL_PROFILE",
        "ORIGIN_DESTINATION",
        "FLAT_RATE",
        "HOURLY",
        "PERCENTAGE",
    ];

    pub fn is_known_label(label: &str) -> bool {
        Self::LABELS.contains(&label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MileageRates {
    #[serde(default)]
    pub per_single_mile: Option<Decimal>,
    #[serde(default)]
    pub per_double_mile: Option<Decimal>,
    #[serde(default)]
    pub per_triple_mile: Option<Decimal>,
    /// Short-haul threshold; trips strictly shorter than this are paid
    /// `per_cut_trip` instead of mileage.
    #[serde(default)]
    pub cut_miles: Option<Decimal>,
    #[serde(default)]
    pub per_cut_trip: Option<Decimal>,
    #[serde(default)]
    pub cut_miles_type: Option<String>,
}

impl MileageRates {
    pub fn for_configuration(&self, configuration: TrailerConfiguration) -> Option<Decimal> {
        match configuration {
            TrailerConfiguration::Single => self.per_single_mile,
            TrailerConfiguration::Double => self.per_double_mile,
            TrailerConfiguration::Triple => self.per_triple_mile,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRates {
    /// Overrides the card's `rate_amount` when present.
    #[serde(default)]
    pub per_trip: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyRates {
    #[serde(default)]
    pub per_work_hour: Option<Decimal>,
    #[serde(default)]
    pub per_stop_hour: Option<Decimal>,
}

/// Card-level components that feed the accessorial calculator
/// regardless of the card's rate method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardComponents {
    #[serde(default, rename = "perSingleDH")]
    pub per_single_dh: Option<Decimal>,
    #[serde(default, rename = "perDoubleDH")]
    pub per_double_dh: Option<Decimal>,
    #[serde(default, rename = "perTripleDH")]
    pub per_triple_dh: Option<Decimal>,
    #[serde(default)]
    pub per_chain_up: Option<Decimal>,
    /// Fuel surcharge in percent of the base amount.
    #[serde(default)]
    pub fuel_surcharge: Option<Decimal>,
    #[serde(default)]
    pub auto_arrive: bool,
}

impl CardComponents {
    pub fn drop_hook_rate(&self, configuration: TrailerConfiguration) -> Option<Decimal> {
        match configuration {
            TrailerConfiguration::Single => self.per_single_dh,
            TrailerConfiguration::Double => self.per_double_dh,
            TrailerConfiguration::Triple => self.per_triple_dh,
        }
    }
}

/// A named add-on charge attached to a rate card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorialRate {
    pub id: i64,
    pub rate_card_id: i64,
    pub accessorial_type: AccessorialType,
    pub rate_amount: Decimal,
    pub rate_method: AccessorialMethod,
    #[serde(default)]
    pub minimum_charge: Option<Decimal>,
    #[serde(default)]
    pub maximum_charge: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessorialType {
    DropHookSingle,
    DropHookDoubleTriple,
    ChainUp,
    WaitTime,
    DoubleTrailer,
    TripleTrailer,
    CutPaySingleMiles,
    CutPayDoubleMiles,
    CutPayTripleMiles,
    FuelSurcharge,
    Layover,
    Detention,
    Breakdown,
    Helper,
    Trainer,
    Hazmat,
    TeamDriver,
    StopCharge,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessorialMethod {
    FlatRate,
    Hourly,
    Percentage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrailerConfiguration {
    #[default]
    Single,
    Double,
    Triple,
}

/// One finalized trip leg or accessorial occurrence, as handed over by
/// dispatch once the leg is final enough to price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayEvent {
    /// Correlation key echoed into batch output.
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub carrier_id: Option<i64>,
    #[serde(default)]
    pub linehaul_profile_id: Option<i64>,
    #[serde(default)]
    pub origin_terminal_id: Option<i64>,
    #[serde(default)]
    pub destination_terminal_id: Option<i64>,
    pub occurred_on: NaiveDate,
    #[serde(default)]
    pub trailer_configuration: TrailerConfiguration,
    #[serde(default)]
    pub miles: Decimal,
    #[serde(default)]
    pub work_hours: Option<Decimal>,
    #[serde(default)]
    pub stop_hours: Option<Decimal>,
    #[serde(default)]
    pub drop_hook_count: Option<u32>,
    #[serde(default)]
    pub chain_up_cycles: Option<u32>,
    #[serde(default)]
    pub wait_time_minutes: Option<u32>,
    #[serde(default = "default_trip_count")]
    pub trip_count: u32,
    #[serde(default)]
    pub cut_miles_actual: Option<Decimal>,
    /// Revenue a PERCENTAGE card is applied to.
    #[serde(default)]
    pub reference_revenue: Option<Decimal>,
    #[serde(default)]
    pub layover_count: Option<u32>,
    #[serde(default)]
    pub detention_minutes: Option<u32>,
    #[serde(default)]
    pub breakdown_minutes: Option<u32>,
    #[serde(default)]
    pub stop_count: Option<u32>,
    #[serde(default)]
    pub hazmat: bool,
    #[serde(default)]
    pub team_driver: bool,
    #[serde(default)]
    pub helper: bool,
    #[serde(default)]
    pub trainer: bool,
    /// One-off accessorials claimed explicitly by dispatch.
    #[serde(default)]
    pub additional_accessorials: Vec<AccessorialType>,
}

fn default_trip_count() -> u32 {
    1
}

impl PayEvent {
    /// A single-trip event with no scope ids and no accessorial triggers.
    pub fn new(
        occurred_on: NaiveDate,
        trailer_configuration: TrailerConfiguration,
        miles: Decimal,
    ) -> Self {
        Self {
            event_id: None,
            driver_id: None,
            carrier_id: None,
            linehaul_profile_id: None,
            origin_terminal_id: None,
            destination_terminal_id: None,
            occurred_on,
            trailer_configuration,
            miles,
            work_hours: None,
            stop_hours: None,
            drop_hook_count: None,
            chain_up_cycles: None,
            wait_time_minutes: None,
            trip_count: 1,
            cut_miles_actual: None,
            reference_revenue: None,
            layover_count: None,
            detention_minutes: None,
            breakdown_minutes: None,
            stop_count: None,
            hazmat: false,
            team_driver: false,
            helper: false,
            trainer: false,
            additional_accessorials: Vec::new(),
        }
    }
}

/// The identifying attributes a rate card is matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub carrier_id: Option<i64>,
    #[serde(default)]
    pub linehaul_profile_id: Option<i64>,
    #[serde(default)]
    pub origin_terminal_id: Option<i64>,
    #[serde(default)]
    pub destination_terminal_id: Option<i64>,
}

impl From<&PayEvent> for ScopeQuery {
    fn from(event: &PayEvent) -> Self {
        Self {
            driver_id: event.driver_id,
            carrier_id: event.carrier_id,
            linehaul_profile_id: event.linehaul_profile_id,
            origin_terminal_id: event.origin_terminal_id,
            destination_terminal_id: event.destination_terminal_id,
        }
    }
}

/// Which arithmetic produced a base amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all_fields = "camelCase")]
pub enum BaseBasis {
    Mileage {
        rate: Decimal,
        miles: Decimal,
        trailer_configuration: TrailerConfiguration,
    },
    CutPay {
        per_cut_trip: Decimal,
        trips: u32,
        cut_miles: Decimal,
        cut_miles_type: Option<String>,
    },
    Flat {
        per_trip: Decimal,
        trips: u32,
    },
    Hourly {
        per_work_hour: Decimal,
        work_hours: Decimal,
        per_stop_hour: Decimal,
        stop_hours: Decimal,
    },
    Percentage {
        percent: Decimal,
        reference_revenue: Decimal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessorialLine {
    #[serde(rename = "type")]
    pub accessorial_type: AccessorialType,
    pub amount: Decimal,
    pub quantity: Decimal,
    /// The accessorial row that priced this line, or `None` when the
    /// rate came from the card's own components.
    pub source_rate_id: Option<i64>,
    #[serde(default)]
    pub clamped: bool,
}

/// The auditable result of pricing one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayBreakdown {
    #[serde(default)]
    pub event_id: Option<String>,
    pub base_amount: Decimal,
    pub base_rate_card_id: i64,
    pub resolved_scope: RateType,
    pub base_basis: BaseBasis,
    /// The raw base amount when a card clamp moved it.
    #[serde(default)]
    pub clamped_from_base: Option<Decimal>,
    pub accessorial_lines: Vec<AccessorialLine>,
    pub total: Decimal,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Input to a payroll batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRunInput {
    pub events: Vec<PayEvent>,
}

/// Per-event outcome of a batch.  A failed event never aborts the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all_fields = "camelCase")]
pub enum EventOutcome {
    Priced {
        event_id: Option<String>,
        breakdown: PayBreakdown,
    },
    Failed {
        event_id: Option<String>,
        error: PricingError,
        message: String,
    },
}

impl EventOutcome {
    pub fn event_id(&self) -> Option<&str> {
        match self {
            EventOutcome::Priced { event_id, .. } | EventOutcome::Failed { event_id, .. } => {
                event_id.as_deref()
            }
        }
    }

    pub fn is_priced(&self) -> bool {
        matches!(self, EventOutcome::Priced { .. })
    }
}

/// The aggregate result of a payroll batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRunResult {
    pub snapshot_loaded_at: DateTime<Utc>,
    pub evaluated_at: DateTime<Utc>,
    #[serde(default)]
    pub stale_snapshot: Option<StaleSnapshot>,
    pub priced: usize,
    pub failed: usize,
    /// Outcomes in no guaranteed order.
    pub outcomes: Vec<EventOutcome>,
    /// True if the run was cancelled before every event started.
    #[serde(default)]
    pub cancelled: bool,
}
