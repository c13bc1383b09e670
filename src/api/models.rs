//! API request and response DTOs (spec.md §6 wire formats).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cancellation::CancellationResult;
use crate::domain::{CancelReason, CancellationRequest};
use crate::metrics::SystemHealth;

/// Desired summary length (spec.md `POST /api/summarize` options).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SummarizeOptions {
    pub length: Option<SummaryLength>,
    pub language: Option<String>,
}

/// `POST /api/summarize` request body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default)]
    pub options: Option<SummarizeOptions>,
}

/// Successful response for both `/api/summarize` and `/api/summarize/upload`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub success: bool,
    pub summary: String,
    pub original_length: usize,
    pub summary_length: usize,
    pub processing_time_ms: u64,
}

/// Request body for `POST /api/summarize/cancel/{batchId}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CancelRequestBody {
    #[serde(default)]
    pub reason: Option<CancelReason>,
    #[serde(default)]
    pub save_partial: bool,
    #[serde(default)]
    pub force: bool,
}

impl CancelRequestBody {
    pub fn into_request(self, batch_id: impl Into<String>, requested_by: impl Into<String>) -> CancellationRequest {
        CancellationRequest::new(
            batch_id,
            requested_by,
            self.reason.unwrap_or(CancelReason::User),
            self.save_partial,
            self.force,
        )
    }
}

/// Response body for the legacy `POST /api/summarize/batch/{batchId}/cancel`
/// endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LegacyCancelResponse {
    pub success: bool,
    pub message: String,
}

impl From<CancellationResult> for LegacyCancelResponse {
    fn from(result: CancellationResult) -> Self {
        Self { success: result.success, message: result.message }
    }
}

/// `GET /api/summarize/health` response body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProviderHealthResponse {
    pub success: bool,
    pub data: ProviderHealthData,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProviderHealthData {
    pub provider: String,
    pub healthy: bool,
}

/// `GET /api/summarize/health/system` response body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SystemHealthResponse {
    pub success: bool,
    pub data: SystemHealth,
}

/// Query parameters for `POST /api/summarize/recovery/{batchId}`.
#[derive(Debug, Clone, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct RecoveryQuery {
    pub reason: Option<String>,
}

/// Response body for `POST /api/summarize/recovery/{batchId}` and
/// `GET /api/summarize/recovery/{batchId}/status`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryResponse {
    pub success: bool,
    pub batch_id: String,
    pub status: String,
    pub message: String,
}

/// Which subsystem `POST /api/summarize/reset` should clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResetType {
    Ui,
    Batch,
    Resources,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResetQuery {
    pub reset_type: ResetType,
    pub batch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}

/// `POST /api/summarize/health/self-repair` response body.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SelfRepairResponse {
    pub success: bool,
    pub message: String,
    pub batches_cleaned: usize,
}

/// Multipart upload query/side-channel for `/api/summarize/upload`:
/// carries the same options as `SummarizeRequest` but as form fields
/// alongside the uploaded file.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UploadOptions {
    pub length: Option<SummaryLength>,
    pub language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_request_deserializes_minimal_body() {
        let json = r#"{"text": "hello world"}"#;
        let req: SummarizeRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.text, "hello world");
        assert!(req.options.is_none());
    }

    #[test]
    fn summarize_request_deserializes_with_options() {
        let json = r#"{"text": "hello", "options": {"length": "short", "language": "en"}}"#;
        let req: SummarizeRequest = serde_json::from_str(json).unwrap();
        let options = req.options.unwrap();
        assert_eq!(options.length, Some(SummaryLength::Short));
        assert_eq!(options.language.as_deref(), Some("en"));
    }

    #[test]
    fn summarize_response_serializes_camel_case() {
        let response = SummarizeResponse {
            success: true,
            summary: "s".into(),
            original_length: 10,
            summary_length: 2,
            processing_time_ms: 5,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("originalLength"));
        assert!(json.contains("processingTimeMs"));
    }
}
