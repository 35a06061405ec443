//! HTTP API for the Pay Engine.
//!
//! This module exposes a minimal REST API around the pricing engine
//! using the [`axum`](https://crates.io/crates/axum) framework.  Clients
//! can price a single pay event, submit a payroll batch, ask which rate
//! card applies to a scope, and reload the rate catalog.  Every request
//! takes its own handle on the current catalog snapshot, so a reload
//! never changes the answer of a request that is already running.

use crate::catalog::{load_catalog_from_dir, RateCatalog, SnapshotPolicy};
use crate::engine::{compute_pay, resolve_rate_card, run_batch};
use crate::error::{AmbiguousRate, PricingError};
use crate::models::{PayEvent, PayRunInput, RateCard, ScopeQuery};
use crate::resolver::SpecificityTier;
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Application state shared across requests.
pub struct AppState {
    pub catalog: RwLock<Arc<RateCatalog>>,
    pub catalog_dir: PathBuf,
    pub policy: SnapshotPolicy,
}

impl AppState {
    pub fn new(catalog: RateCatalog, catalog_dir: PathBuf, policy: SnapshotPolicy) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            catalog_dir,
            policy,
        }
    }

    async fn snapshot(&self) -> Arc<RateCatalog> {
        self.catalog.read().await.clone()
    }
}

/// Build the API router around an already loaded catalog.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/pay/compute", post(compute_handler))
        .route("/api/pay/batch", post(batch_handler))
        .route("/api/rate-cards/resolve", post(resolve_handler))
        .route("/api/catalog/reload", post(reload_handler))
        .with_state(state)
}

/// Build the API router and load the catalog from the given directory.
/// Returns the router and a handle to the state.
pub fn build_router(
    catalog_dir: PathBuf,
    policy: SnapshotPolicy,
) -> Result<(Router, Arc<AppState>)> {
    let catalog = load_catalog_from_dir(&catalog_dir)?;
    let state = Arc::new(AppState::new(catalog, catalog_dir, policy));
    Ok((router(state.clone()), state))
}

struct ApiError(PricingError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PricingError::NoApplicableRate { .. } | PricingError::AmountOutOfRange { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PricingError::InvalidRateMethod { .. }
            | PricingError::InvalidAccessorialConfiguration { .. } => StatusCode::CONFLICT,
            PricingError::MissingQuantity { .. } => StatusCode::BAD_REQUEST,
        };
        let body = Json(json!({ "error": self.0.to_string(), "detail": self.0 }));
        (status, body).into_response()
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Handler for POST /api/pay/compute
async fn compute_handler(
    State(app_state): State<Arc<AppState>>,
    Json(event): Json<PayEvent>,
) -> Response {
    let catalog = app_state.snapshot().await;
    match compute_pay(&catalog, &event) {
        Ok(breakdown) => (StatusCode::OK, Json(breakdown)).into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

/// Handler for POST /api/pay/batch.  Pricing runs on rayon, off the
/// async workers.
async fn batch_handler(
    State(app_state): State<Arc<AppState>>,
    Json(input): Json<PayRunInput>,
) -> Response {
    let catalog = app_state.snapshot().await;
    let policy = app_state.policy;
    let joined =
        tokio::task::spawn_blocking(move || run_batch(input, &catalog, &policy, Utc::now())).await;
    match joined {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => {
            error!(error = %err, "pay batch task failed");
            let body = Json(json!({ "error": err.to_string() }));
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveRequest {
    #[serde(flatten)]
    query: ScopeQuery,
    as_of: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolveResponse {
    card: RateCard,
    tier: SpecificityTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<AmbiguousRate>,
}

/// Handler for POST /api/rate-cards/resolve
async fn resolve_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ResolveRequest>,
) -> Response {
    let catalog = app_state.snapshot().await;
    match resolve_rate_card(&catalog, &request.query, request.as_of) {
        Ok(resolution) => {
            let body = ResolveResponse {
                card: resolution.card.clone(),
                tier: resolution.tier,
                warning: resolution.warning,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => ApiError(err).into_response(),
    }
}

/// Handler for POST /api/catalog/reload.  Builds a fresh snapshot and
/// swaps it in; requests holding the old one finish against it.
async fn reload_handler(State(app_state): State<Arc<AppState>>) -> Response {
    let dir = app_state.catalog_dir.clone();
    let loaded = tokio::task::spawn_blocking(move || load_catalog_from_dir(&dir)).await;
    match loaded {
        Ok(Ok(catalog)) => {
            let summary = json!({
                "loadedAt": catalog.loaded_at(),
                "rateCards": catalog.cards().len(),
                "issues": catalog.issues(),
            });
            *app_state.catalog.write().await = Arc::new(catalog);
            (StatusCode::OK, Json(summary)).into_response()
        }
        Ok(Err(err)) => {
            error!(error = %err, "catalog reload failed");
            let body = Json(json!({ "error": err.to_string() }));
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
        Err(err) => {
            let body = Json(json!({ "error": err.to_string() }));
            (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
        }
    }
}

/// Launch the API server.  This function loads the catalog from the
/// given directory and binds to the supplied address.  It blocks until
/// the server terminates (e.g. when interrupted).
pub async fn serve(addr: SocketAddr, catalog_dir: PathBuf, policy: SnapshotPolicy) -> Result<()> {
    let (router, _state) = build_router(catalog_dir, policy)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "pay engine listening");
    axum::serve(listener, router).await?;
    Ok(())
}
