//! Provider and system health endpoints (spec.md §6), grounded in the
//! teacher's `api::routes::health` router shape but calling this crate's
//! `HealthChecker::check_all(summarizer, pool)` rather than the teacher's
//! no-argument `check_all()`, since here the checker probes components it
//! is handed rather than components it owns.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::error::ApiResult;
use crate::api::models::{ProviderHealthData, ProviderHealthResponse, SelfRepairResponse, SystemHealthResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(provider_health))
        .route("/system", get(system_health))
        .route("/self-repair", post(self_repair))
}

/// spec.md §6: `200` when the provider is reachable, `503` otherwise — both
/// with the same body shape.
async fn provider_health(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<ProviderHealthResponse>)> {
    let health = state.health_checker.check_provider(&state.summarizer).await;
    let healthy = health.status == crate::metrics::HealthStatus::Healthy;
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    let body = ProviderHealthResponse {
        success: true,
        data: ProviderHealthData { provider: state.summarizer.name().to_string(), healthy },
    };
    Ok((status, Json(body)))
}

async fn system_health(State(state): State<AppState>) -> ApiResult<Json<SystemHealthResponse>> {
    let data = state.health_checker.check_all(Some(&state.summarizer), state.db_pool.as_ref()).await;
    Ok(Json(SystemHealthResponse { success: true, data }))
}

#[derive(Debug, Deserialize)]
struct SelfRepairQuery {
    #[serde(default)]
    older_than_secs: Option<u64>,
}

/// Clear stale terminal batches from the in-memory registry (spec.md §6:
/// a lightweight operational recovery action, distinct from per-batch
/// cancellation recovery).
async fn self_repair(
    State(state): State<AppState>,
    Query(query): Query<SelfRepairQuery>,
) -> ApiResult<Json<SelfRepairResponse>> {
    let older_than = Duration::from_secs(query.older_than_secs.unwrap_or(0));
    let batches_cleaned = state.scheduler.cleanup(older_than).await;
    Ok(Json(SelfRepairResponse {
        success: true,
        message: format!("self-repair cleared {batches_cleaned} stale terminal batch(es)"),
        batches_cleaned,
    }))
}
