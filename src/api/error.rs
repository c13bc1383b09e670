//! API error handling (spec.md §7): every failure response carries a
//! correlation id, severity, recoverability hint, and suggested next
//! actions on top of the teacher's `ApiError`/`ApiErrorResponse` shape
//! (`rust-srec/src/api/error.rs`).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, ErrorKind};

/// Severity classification surfaced to API clients, independent from
/// `tracing` log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

/// API error response body (spec.md §7).
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: ErrorSeverity,
    pub is_recoverable: bool,
    pub suggested_actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// API error type that can be converted to an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub is_recoverable: bool,
    pub suggested_actions: Vec<String>,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            severity: ErrorSeverity::Error,
            is_recoverable: false,
            suggested_actions: Vec::new(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn recoverable(mut self, suggested_actions: Vec<String>) -> Self {
        self.is_recoverable = true;
        self.suggested_actions = suggested_actions;
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "PROVIDER_TIMEOUT", message)
            .with_severity(ErrorSeverity::Warning)
            .recoverable(vec!["retry the request".into()])
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE", message)
            .with_severity(ErrorSeverity::Warning)
            .recoverable(vec!["retry after a short delay".into(), "check provider health".into()])
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "PROVIDER_PROTOCOL", message)
            .with_severity(ErrorSeverity::Error)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            .with_severity(ErrorSeverity::Critical)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            success: false,
            error: self.message,
            error_code: self.code,
            correlation_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity: self.severity,
            is_recoverable: self.is_recoverable,
            suggested_actions: self.suggested_actions,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match &err {
            Error::InvalidInput(msg) => ApiError::bad_request(msg.clone()),
            Error::Configuration(msg) => ApiError::bad_request(msg.clone()),
            Error::NotFound { entity_type, id } => {
                ApiError::not_found(format!("{entity_type} with id '{id}' not found"))
            }
            Error::ProviderTimeout(msg) => ApiError::timeout(msg.clone()),
            Error::ProviderUnavailable(msg) => ApiError::service_unavailable(msg.clone()),
            Error::ProviderProtocol(msg) => ApiError::bad_gateway(msg.clone()),
            Error::Cancelled => ApiError::conflict("the batch was cancelled")
                .with_severity(ErrorSeverity::Warning),
            Error::Database(e) => {
                tracing::error!(error = %e, "database error");
                ApiError::internal("a database error occurred")
            }
            Error::Serialization(e) => {
                tracing::error!(error = %e, "serialization error");
                ApiError::internal("a serialization error occurred")
            }
            Error::Io(e) => {
                tracing::error!(error = %e, "io error");
                ApiError::internal("an io error occurred")
            }
            Error::InternalInvariant(_) | Error::Other(_) => {
                tracing::error!(error = %err, "unexpected internal error");
                ApiError::internal("an unexpected error occurred")
            }
        }
    }
}

/// Map an `ErrorKind` straight to an `ApiError`, used by handlers that only
/// have a classified kind (e.g. provider health probes) rather than a full
/// `Error` value.
pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> ApiError {
    match kind {
        ErrorKind::InvalidInput => ApiError::bad_request(message),
        ErrorKind::ProviderTimeout => ApiError::timeout(message),
        ErrorKind::ProviderUnavailable => ApiError::service_unavailable(message),
        ErrorKind::ProviderProtocol => ApiError::bad_gateway(message),
        ErrorKind::Cancelled => ApiError::conflict(message).with_severity(ErrorSeverity::Warning),
        ErrorKind::InternalInvariant => ApiError::internal(message),
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err: ApiError = Error::not_found("batch", "b1").into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(err.message.contains("b1"));
    }

    #[test]
    fn provider_timeout_is_recoverable() {
        let err: ApiError = Error::ProviderTimeout("slow".into()).into();
        assert_eq!(err.status, StatusCode::REQUEST_TIMEOUT);
        assert!(err.is_recoverable);
    }

    #[test]
    fn internal_invariant_is_500_and_not_recoverable() {
        let err: ApiError = Error::InternalInvariant("bug".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_recoverable);
    }

    #[test]
    fn cancelled_is_conflict_not_internal() {
        let err: ApiError = Error::Cancelled.into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
