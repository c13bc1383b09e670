//! `POST /api/summarize` and `POST /api/summarize/upload` (spec.md §4, §6):
//! run the segment -> batch -> merge pipeline and block until the batch
//! reaches a terminal stage, returning the final summary in one response
//! rather than making the caller poll `/batchProgressHub`.

use std::time::{Duration, Instant};

use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{SummarizeOptions, SummarizeRequest, SummarizeResponse, SummaryLength};
use crate::api::server::AppState;
use crate::database::SummaryRecord;
use crate::domain::{MergeParams, Stage};
use crate::scheduler::BatchView;
use crate::segmenter::Segmenter;

/// Wall-clock budget for the synchronous summarize path before the caller
/// gets a timeout instead of an indefinite wait.
const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(300);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(summarize)).route("/upload", post(summarize_upload))
}

#[utoipa::path(
    post,
    path = "/api/summarize",
    tag = "summarize",
    request_body = SummarizeRequest,
    responses(
        (status = 200, description = "Summary produced", body = SummarizeResponse),
        (status = 400, description = "Invalid input", body = crate::api::error::ApiErrorResponse),
        (status = 408, description = "Timed out waiting for the batch to finish", body = crate::api::error::ApiErrorResponse)
    )
)]
pub(crate) async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<Json<SummarizeResponse>> {
    let options = request.options.unwrap_or_default();
    let response = run_pipeline(&state, request.text, options, None).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/summarize/upload",
    tag = "summarize",
    responses(
        (status = 200, description = "Summary produced", body = SummarizeResponse),
        (status = 400, description = "Invalid multipart body", body = crate::api::error::ApiErrorResponse)
    )
)]
pub(crate) async fn summarize_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SummarizeResponse>> {
    let mut text: Option<String> = None;
    let mut options = SummarizeOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                text = Some(field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("uploaded file is not valid utf-8 text: {e}"))
                })?);
            }
            "length" => {
                let value = field.text().await.unwrap_or_default();
                options.length = match value.to_lowercase().as_str() {
                    "short" => Some(SummaryLength::Short),
                    "medium" => Some(SummaryLength::Medium),
                    "long" => Some(SummaryLength::Long),
                    _ => None,
                };
            }
            "language" => {
                let value = field.text().await.unwrap_or_default();
                if !value.is_empty() {
                    options.language = Some(value);
                }
            }
            _ => {}
        }
    }

    let text = text.ok_or_else(|| ApiError::bad_request("multipart body must include a 'file' field"))?;
    let response = run_pipeline(&state, text, options, None).await?;
    Ok(Json(response))
}

async fn run_pipeline(
    state: &AppState,
    text: String,
    options: SummarizeOptions,
    user_id: Option<String>,
) -> ApiResult<SummarizeResponse> {
    if text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }

    let started = Instant::now();
    let original_length = text.chars().count();

    if let Some(language) = &options.language {
        tracing::debug!(language, "summarize request specified a language hint");
    }

    let segmenter = Segmenter::new((*state.segmentation_config).clone(), Some(state.summarizer.clone()));
    let cancel = CancellationToken::new();
    let segments = segmenter.segment(&text, &cancel).await?;

    let merge_params = apply_length_option(&state.merge_defaults, options.length);

    let batch_id = state.scheduler.start(segments, text.clone(), user_id.clone(), merge_params)?;
    let view = await_completion(state, &batch_id).await?;

    let response = match view.stage {
        Stage::Completed => {
            let summary = view.final_summary.unwrap_or_default();
            SummarizeResponse {
                success: true,
                summary_length: summary.chars().count(),
                summary,
                original_length,
                processing_time_ms: started.elapsed().as_millis() as u64,
            }
        }
        Stage::Failed => {
            return Err(ApiError::internal(
                "batch processing failed: too many segments could not be summarized",
            ));
        }
        other => {
            return Err(ApiError::internal(format!("batch ended in unexpected stage {other:?}")));
        }
    };

    if let Some(store) = &state.summary_store {
        let record = SummaryRecord::new_success(
            batch_id,
            &text,
            &response.summary,
            user_id,
            response.processing_time_ms as i64,
        );
        if let Err(e) = store.insert(&record).await {
            tracing::warn!(error = %e, "failed to persist summary record");
        }
    }

    Ok(response)
}

/// Poll `BatchScheduler::view` until the batch reaches a terminal stage or
/// `SUMMARIZE_TIMEOUT` elapses. The scheduler itself is push-based via the
/// Notifier; this endpoint trades that for a single blocking response, so
/// it polls rather than threading a broadcast subscription through.
async fn await_completion(state: &AppState, batch_id: &str) -> ApiResult<BatchView> {
    let deadline = Instant::now() + SUMMARIZE_TIMEOUT;
    loop {
        match state.scheduler.view(batch_id).await {
            Some(view) if view.stage.is_terminal() => return Ok(view),
            Some(_) => {}
            None => {
                return Err(ApiError::not_found(format!("batch '{batch_id}' disappeared while processing")));
            }
        }
        if Instant::now() >= deadline {
            return Err(ApiError::timeout("summarization did not complete within the allotted time"));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Translate the coarse `SummaryLength` option into concrete `MergeParams`
/// knobs (spec.md §6 options; exact ratios/bounds are an implementation
/// choice recorded in DESIGN.md).
fn apply_length_option(defaults: &MergeParams, length: Option<SummaryLength>) -> MergeParams {
    let mut params = defaults.clone();
    match length {
        Some(SummaryLength::Short) => {
            params.target_length_ratio = 0.3;
            params.max_length_chars = params.max_length_chars.min(500).max(params.min_length_chars);
        }
        Some(SummaryLength::Long) => {
            params.target_length_ratio = 0.85;
            params.max_length_chars = params.max_length_chars.max(4000);
        }
        Some(SummaryLength::Medium) | None => {}
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_length_tightens_target_ratio_and_cap() {
        let defaults = MergeParams::default();
        let params = apply_length_option(&defaults, Some(SummaryLength::Short));
        assert!(params.target_length_ratio < defaults.target_length_ratio);
        assert!(params.max_length_chars <= 500);
    }

    #[test]
    fn long_length_relaxes_the_cap() {
        let defaults = MergeParams::default();
        let params = apply_length_option(&defaults, Some(SummaryLength::Long));
        assert!(params.max_length_chars >= 4000);
    }

    #[test]
    fn medium_or_absent_keeps_defaults() {
        let defaults = MergeParams::default();
        let params = apply_length_option(&defaults, None);
        assert_eq!(params.target_length_ratio, defaults.target_length_ratio);
        let params = apply_length_option(&defaults, Some(SummaryLength::Medium));
        assert_eq!(params.target_length_ratio, defaults.target_length_ratio);
    }
}
