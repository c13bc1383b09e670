//! Cancellation, recovery, and reset endpoints (spec.md §4.5, §6).

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::post;
use axum::{Json, Router};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{
    CancelRequestBody, LegacyCancelResponse, RecoveryQuery, RecoveryResponse, ResetQuery,
    ResetResponse, ResetType,
};
use crate::api::server::AppState;
use crate::cancellation::CancellationResult;
use crate::domain::Stage;

/// Identity used when a request carries no authenticated caller. The spec
/// deliberately leaves authentication out of scope; every request is
/// attributed to this placeholder until an auth layer is added upstream.
const ANONYMOUS_USER: &str = "anonymous";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cancel/{batch_id}", post(cancel))
        .route("/batch/{batch_id}/cancel", post(legacy_cancel))
        .route("/recovery/{batch_id}", post(recover))
        .route("/recovery/{batch_id}/status", axum::routing::get(recovery_status))
        .route("/reset", post(reset))
}

#[utoipa::path(
    post,
    path = "/api/summarize/cancel/{batch_id}",
    tag = "batch",
    params(("batch_id" = String, Path, description = "Batch ID")),
    request_body = CancelRequestBody,
    responses(
        (status = 200, description = "Cancellation result", body = CancellationResult),
        (status = 404, description = "Batch not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub(crate) async fn cancel(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    body: Option<Json<CancelRequestBody>>,
) -> ApiResult<Json<CancellationResult>> {
    let body = body.map(|Json(b)| b).unwrap_or(CancelRequestBody {
        reason: None,
        save_partial: false,
        force: false,
    });
    let request = body.into_request(batch_id, ANONYMOUS_USER);
    let result = state.scheduler.cancel(request).await?;
    Ok(Json(result))
}

/// Legacy cancel endpoint (spec.md §9 Open Question, resolved in
/// DESIGN.md): always `force=false, save_partial=false`, regardless of any
/// body a legacy client might still send.
#[utoipa::path(
    post,
    path = "/api/summarize/batch/{batch_id}/cancel",
    tag = "batch",
    params(("batch_id" = String, Path, description = "Batch ID")),
    responses((status = 200, description = "Cancellation result", body = LegacyCancelResponse))
)]
pub(crate) async fn legacy_cancel(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<LegacyCancelResponse>> {
    let request = CancelRequestBody { reason: None, save_partial: false, force: false }
        .into_request(batch_id, ANONYMOUS_USER);
    let result = state.scheduler.cancel(request).await?;
    Ok(Json(result.into()))
}

#[utoipa::path(
    post,
    path = "/api/summarize/recovery/{batch_id}",
    tag = "batch",
    params(
        ("batch_id" = String, Path, description = "Batch ID"),
        RecoveryQuery
    ),
    responses(
        (status = 200, description = "Recovery outcome", body = RecoveryResponse),
        (status = 404, description = "Batch not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub(crate) async fn recover(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
    Query(query): Query<RecoveryQuery>,
) -> ApiResult<Json<RecoveryResponse>> {
    if let Some(reason) = &query.reason {
        tracing::info!(batch_id = %batch_id, reason, "recovery requested");
    }
    recovery_state(&state, &batch_id).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/api/summarize/recovery/{batch_id}/status",
    tag = "batch",
    params(("batch_id" = String, Path, description = "Batch ID")),
    responses(
        (status = 200, description = "Recovery status", body = RecoveryResponse),
        (status = 404, description = "Batch not found", body = crate::api::error::ApiErrorResponse)
    )
)]
pub(crate) async fn recovery_status(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<RecoveryResponse>> {
    recovery_state(&state, &batch_id).await.map(Json)
}

/// Shared logic behind both recovery endpoints: report whether a captured
/// partial result exists for the batch, without mutating anything (spec.md
/// §4.5 says capture happens at cancellation time; recovery only surfaces
/// what was captured, it cannot resume a torn-down batch).
async fn recovery_state(state: &AppState, batch_id: &str) -> ApiResult<RecoveryResponse> {
    let view = state
        .scheduler
        .view(batch_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("batch '{batch_id}' not found")))?;

    let (status, message) = match (view.stage, view.partial_result) {
        (Stage::Cancelled, Some(partial)) => (
            "recovered",
            format!(
                "partial result available: {} of {} segments completed",
                partial.completed_tasks.len(),
                view.total
            ),
        ),
        (Stage::Cancelled, None) => ("unavailable", "batch was cancelled without saving a partial result".into()),
        (Stage::Completed, _) => ("not_applicable", "batch completed normally; no recovery needed".into()),
        (Stage::Failed, _) => ("unavailable", "batch failed and produced no usable partial result".into()),
        (stage, _) => ("in_progress", format!("batch is still in stage {stage:?}")),
    };

    Ok(RecoveryResponse {
        success: true,
        batch_id: batch_id.to_string(),
        status: status.to_string(),
        message,
    })
}

async fn reset(State(state): State<AppState>, Query(query): Query<ResetQuery>) -> ApiResult<Json<ResetResponse>> {
    let message = match query.reset_type {
        ResetType::Ui => "ui state reset is a client-side no-op; acknowledged".to_string(),
        ResetType::Batch => {
            let batch_id = query
                .batch_id
                .ok_or_else(|| ApiError::bad_request("resetType=batch requires a batchId query parameter"))?;
            if state.scheduler.remove_batch(&batch_id) {
                format!("batch '{batch_id}' removed")
            } else {
                return Err(ApiError::not_found(format!("batch '{batch_id}' not found")));
            }
        }
        ResetType::Resources => {
            let removed = state.scheduler.cleanup(Duration::ZERO).await;
            format!("cleared {removed} terminal batch(es) from memory")
        }
    };

    Ok(Json(ResetResponse { success: true, message }))
}
