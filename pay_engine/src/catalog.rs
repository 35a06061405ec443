//! The Rate Catalog snapshot.
//!
//! A [`RateCatalog`] is an immutable, validated view of every rate card
//! and accessorial rate as of the moment it was loaded.  The engine only
//! ever reads it; a newer snapshot is built and swapped in wholesale by
//! the caller.  Catalog files are JSON documents stored in a directory,
//! each holding any number of rate-card and accessorial-rate rows.
//!
//! Cards with bad pricing data stay in the snapshot, flagged as
//! defective, so that an event they would have priced fails loudly
//! instead of falling through to a less specific card.

use crate::error::StaleSnapshot;
use crate::models::{AccessorialRate, RateCard, RateMethod, RateScope};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Something wrong with a catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogIssue {
    #[error("{source_name}: unreadable rate card row: {detail}")]
    MalformedRateCard { source_name: String, detail: String },
    #[error("{source_name}: unreadable accessorial rate row: {detail}")]
    MalformedAccessorial { source_name: String, detail: String },
    #[error("rate card {card_id}: unrecognised rate method {label}")]
    UnknownRateMethod { card_id: i64, label: String },
    #[error("rate card {card_id}: minimum {minimum} exceeds maximum {maximum}")]
    InvertedBounds {
        card_id: i64,
        minimum: Decimal,
        maximum: Decimal,
    },
    #[error("rate card {card_id}: expiration date does not follow effective date")]
    EmptyValidityWindow { card_id: i64 },
    #[error("rate card {card_id}: negative {field}")]
    NegativeRate { card_id: i64, field: String },
    #[error("rate card {card_id}: id already used by an earlier card")]
    DuplicateRateCard { card_id: i64 },
    #[error("accessorial rate {accessorial_id}: minimum {minimum} exceeds maximum {maximum}")]
    InvertedAccessorialBounds {
        accessorial_id: i64,
        minimum: Decimal,
        maximum: Decimal,
    },
    #[error("accessorial rate {accessorial_id}: id already used by an earlier row")]
    DuplicateAccessorial { accessorial_id: i64 },
    #[error("accessorial rate {accessorial_id}: rate card {card_id} is not in the catalog")]
    OrphanedAccessorial { accessorial_id: i64, card_id: i64 },
}

/// Freshness bound for a snapshot.  `None` disables the check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotPolicy {
    pub max_age: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RateCatalog {
    loaded_at: DateTime<Utc>,
    cards: Vec<RateCard>,
    accessorials: HashMap<i64, Vec<AccessorialRate>>,
    defects: HashMap<i64, CatalogIssue>,
    issues: Vec<CatalogIssue>,
}

impl RateCatalog {
    /// Validates and indexes the given rows.
    ///
    /// Cards with unusable pricing data are kept as candidates and
    /// flagged (see [`RateCatalog::defect`]).  Cards and accessorial
    /// rows reusing an earlier id, and accessorial rows pointing at no
    /// card, are dropped.  Every finding is listed in
    /// [`RateCatalog::issues`].
    pub fn new(
        loaded_at: DateTime<Utc>,
        cards: Vec<RateCard>,
        accessorial_rates: Vec<AccessorialRate>,
    ) -> Self {
        let cards = cards.into_iter().map(|card| (card, None)).collect();
        Self::build(loaded_at, cards, accessorial_rates)
    }

    /// Cards paired with a defect the loader already found, in input
    /// order; the first card with a given id wins.
    fn build(
        loaded_at: DateTime<Utc>,
        cards: Vec<(RateCard, Option<CatalogIssue>)>,
        accessorial_rates: Vec<AccessorialRate>,
    ) -> Self {
        let mut issues = Vec::new();
        let mut defects = HashMap::new();
        let mut seen = HashSet::new();

        let mut kept_cards = Vec::with_capacity(cards.len());
        for (card, found) in cards {
            if !seen.insert(card.id) {
                let issue = CatalogIssue::DuplicateRateCard { card_id: card.id };
                warn!(card_id = card.id, %issue, "rate card dropped");
                issues.push(issue);
                continue;
            }
            if let Some(issue) = found.or_else(|| validate_card(&card)) {
                warn!(card_id = card.id, %issue, "rate card flagged as defective");
                defects.insert(card.id, issue.clone());
                issues.push(issue);
            }
            kept_cards.push(card);
        }
        kept_cards.sort_by_key(|card| card.id);

        let mut accessorials: HashMap<i64, Vec<AccessorialRate>> = HashMap::new();
        let mut seen_rates = HashSet::new();
        for rate in accessorial_rates {
            if !seen_rates.insert(rate.id) {
                let issue = CatalogIssue::DuplicateAccessorial {
                    accessorial_id: rate.id,
                };
                warn!(accessorial_id = rate.id, %issue, "accessorial rate dropped");
                issues.push(issue);
                continue;
            }
            if !seen.contains(&rate.rate_card_id) {
                let issue = CatalogIssue::OrphanedAccessorial {
                    accessorial_id: rate.id,
                    card_id: rate.rate_card_id,
                };
                warn!(accessorial_id = rate.id, %issue, "accessorial rate dropped");
                issues.push(issue);
                continue;
            }
            // Kept: pricing with an inverted row fails the event itself.
            if let Some(issue) = validate_accessorial(&rate) {
                warn!(accessorial_id = rate.id, %issue, "accessorial rate flagged as defective");
                issues.push(issue);
            }
            accessorials.entry(rate.rate_card_id).or_default().push(rate);
        }
        for rates in accessorials.values_mut() {
            rates.sort_by_key(|rate| rate.id);
        }

        Self {
            loaded_at,
            cards: kept_cards,
            accessorials,
            defects,
            issues,
        }
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// All candidate cards, active or not, defective or not, ordered by id.
    pub fn cards(&self) -> &[RateCard] {
        &self.cards
    }

    pub fn card(&self, id: i64) -> Option<&RateCard> {
        self.cards.iter().find(|card| card.id == id)
    }

    /// Why card `id` cannot price events, if it cannot.
    pub fn defect(&self, id: i64) -> Option<&CatalogIssue> {
        self.defects.get(&id)
    }

    /// Accessorial rates attached to `card_id`, ordered by id.
    pub fn accessorials_for(&self, card_id: i64) -> &[AccessorialRate] {
        self.accessorials
            .get(&card_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every row the catalog flagged or dropped.
    pub fn issues(&self) -> &[CatalogIssue] {
        &self.issues
    }

    /// Returns a [`StaleSnapshot`] warning if the snapshot is older than
    /// the policy allows at `evaluated_at`.
    pub fn staleness(
        &self,
        policy: &SnapshotPolicy,
        evaluated_at: DateTime<Utc>,
    ) -> Option<StaleSnapshot> {
        let max_age = policy.max_age?;
        let age = (evaluated_at - self.loaded_at).to_std().ok()?;
        (age > max_age).then(|| StaleSnapshot {
            loaded_at: self.loaded_at,
            evaluated_at,
            max_age_secs: max_age.as_secs(),
        })
    }
}

fn validate_card(card: &RateCard) -> Option<CatalogIssue> {
    if let RateMethod::Unrecognized { label } = &card.method {
        return Some(CatalogIssue::UnknownRateMethod {
            card_id: card.id,
            label: label.clone(),
        });
    }
    if let (Some(minimum), Some(maximum)) = (card.minimum_amount, card.maximum_amount) {
        if minimum > maximum {
            return Some(CatalogIssue::InvertedBounds {
                card_id: card.id,
                minimum,
                maximum,
            });
        }
    }
    if card
        .expiration_date
        .is_some_and(|end| end <= card.effective_date)
    {
        return Some(CatalogIssue::EmptyValidityWindow { card_id: card.id });
    }

    let mut rates = vec![("rateAmount", Some(card.rate_amount))];
    match &card.method {
        RateMethod::PerMile(mileage) => rates.extend([
            ("perSingleMile", mileage.per_single_mile),
            ("perDoubleMile", mileage.per_double_mile),
            ("perTripleMile", mileage.per_triple_mile),
            ("perCutTrip", mileage.per_cut_trip),
            ("cutMiles", mileage.cut_miles),
        ]),
        RateMethod::FlatRate(flat) => rates.push(("perTrip", flat.per_trip)),
        RateMethod::Hourly(hourly) => rates.extend([
            ("perWorkHour", hourly.per_work_hour),
            ("perStopHour", hourly.per_stop_hour),
        ]),
        RateMethod::Percentage | RateMethod::Unrecognized { .. } => {}
    }
    let components = &card.components;
    rates.extend([
        ("perSingleDH", components.per_single_dh),
        ("perDoubleDH", components.per_double_dh),
        ("perTripleDH", components.per_triple_dh),
        ("perChainUp", components.per_chain_up),
        ("fuelSurcharge", components.fuel_surcharge),
    ]);
    rates
        .into_iter()
        .find(|(_, value)| value.is_some_and(|v| v.is_sign_negative() && !v.is_zero()))
        .map(|(field, _)| CatalogIssue::NegativeRate {
            card_id: card.id,
            field: field.to_string(),
        })
}

fn validate_accessorial(rate: &AccessorialRate) -> Option<CatalogIssue> {
    match (rate.minimum_charge, rate.maximum_charge) {
        (Some(minimum), Some(maximum)) if minimum > maximum => {
            Some(CatalogIssue::InvertedAccessorialBounds {
                accessorial_id: rate.id,
                minimum,
                maximum,
            })
        }
        _ => None,
    }
}

/// One catalog file.  Rows stay as raw JSON until they are parsed one
/// by one, so a single bad row does not discard its neighbours.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    #[serde(default)]
    rate_cards: Vec<Value>,
    #[serde(default)]
    accessorial_rates: Vec<Value>,
}

/// The columns that place a card in resolution, read when the full row
/// does not parse.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CardPlacement {
    id: i64,
    #[serde(flatten)]
    scope: RateScope,
    rate_method: String,
    effective_date: NaiveDate,
    #[serde(default)]
    expiration_date: Option<NaiveDate>,
    #[serde(default)]
    priority: bool,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl CardPlacement {
    /// A candidate that fails every event it wins, with the reason.
    fn into_flagged(self, source_name: &str, detail: String) -> (RateCard, CatalogIssue) {
        let issue = if RateMethod::is_known_label(&self.rate_method) {
            CatalogIssue::MalformedRateCard {
                source_name: source_name.to_string(),
                detail,
            }
        } else {
            CatalogIssue::UnknownRateMethod {
                card_id: self.id,
                label: self.rate_method.clone(),
            }
        };
        let card = RateCard {
            id: self.id,
            scope: self.scope,
            method: RateMethod::Unrecognized {
                label: self.rate_method,
            },
            rate_amount: Decimal::ZERO,
            minimum_amount: None,
            maximum_amount: None,
            effective_date: self.effective_date,
            expiration_date: self.expiration_date,
            priority: self.priority,
            active: self.active,
            components: Default::default(),
        };
        (card, issue)
    }
}

/// Load a catalog snapshot from every `.json` file in a directory.
///
/// Files that are not valid catalog documents are logged and skipped.
/// A card row that does not parse but whose id, scope and validity
/// window do is kept as a defective candidate (for instance one with an
/// unknown `rateMethod`); any other unreadable row is dropped.  Both are
/// listed in [`RateCatalog::issues`].  A missing directory yields an
/// empty catalog.
pub fn load_catalog_from_dir(path: &Path) -> Result<RateCatalog> {
    let mut cards = Vec::new();
    let mut accessorial_rates = Vec::new();
    let mut malformed = Vec::new();

    if path.is_dir() {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && entry.path().extension().is_some_and(|ext| ext == "json")
            {
                files.push(entry.path());
            }
        }
        files.sort();

        for file in files {
            let source_name = file.display().to_string();
            let data = std::fs::read_to_string(&file)?;
            let document = match serde_json::from_str::<CatalogDocument>(&data) {
                Ok(document) => document,
                Err(err) => {
                    warn!(file = %source_name, error = %err, "skipping unreadable catalog file");
                    continue;
                }
            };
            for row in document.rate_cards {
                let err = match serde_json::from_value::<RateCard>(row.clone()) {
                    Ok(card) => {
                        cards.push((card, None));
                        continue;
                    }
                    Err(err) => err,
                };
                match serde_json::from_value::<CardPlacement>(row) {
                    Ok(placement) => {
                        let (card, issue) = placement.into_flagged(&source_name, err.to_string());
                        cards.push((card, Some(issue)));
                    }
                    Err(_) => malformed.push(CatalogIssue::MalformedRateCard {
                        source_name: source_name.clone(),
                        detail: err.to_string(),
                    }),
                }
            }
            for row in document.accessorial_rates {
                match serde_json::from_value::<AccessorialRate>(row) {
                    Ok(rate) => accessorial_rates.push(rate),
                    Err(err) => malformed.push(CatalogIssue::MalformedAccessorial {
                        source_name: source_name.clone(),
                        detail: err.to_string(),
                    }),
                }
            }
        }
    } else {
        warn!(dir = %path.display(), "catalog directory not found; starting with an empty catalog");
    }

    for issue in &malformed {
        warn!(%issue, "catalog row dropped");
    }

    let mut catalog = RateCatalog::build(Utc::now(), cards, accessorial_rates);
    malformed.append(&mut catalog.issues);
    catalog.issues = malformed;

    info!(
        dir = %path.display(),
        cards = catalog.cards.len(),
        defective = catalog.defects.len(),
        accessorial_rates = catalog.accessorials.values().map(Vec::len).sum::<usize>(),
        issues = catalog.issues.len(),
        "rate catalog loaded"
    );
    Ok(catalog)
}
