//! OpenAPI documentation (ambient stack, SPEC_FULL §6.1), grounded in the
//! teacher's `api::openapi` (`utoipa::OpenApi` aggregate + Swagger UI).
//! This crate has no auth layer, so — unlike the teacher's `SecurityAddon`
//! — there is no bearer scheme to register.

use utoipa::OpenApi;

use crate::api::error::ApiErrorResponse;
use crate::api::models::{
    CancelRequestBody, LegacyCancelResponse, ProviderHealthData, ProviderHealthResponse,
    RecoveryQuery, RecoveryResponse, ResetQuery, ResetResponse, ResetType, SelfRepairResponse,
    SummarizeOptions, SummarizeRequest, SummarizeResponse, SummaryLength, SystemHealthResponse,
};
use crate::api::routes::logging::{LoggingConfigResponse, ModuleInfo, UpdateLogFilterRequest};
use crate::cancellation::{CancellationResult, CancelStatus};
use crate::domain::CancelReason;
use crate::metrics::{ComponentHealth, HealthStatus, SystemHealth};

/// OpenAPI documentation for the synoptic batch summarization API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "synoptic API",
        version = "0.1.0",
        description = "Batch document summarization orchestrator: segmentation, retrying scheduler, live progress, cancellation, merging.",
        license(name = "MIT OR Apache-2.0")
    ),
    tags(
        (name = "summarize", description = "Submit text or files for batch summarization"),
        (name = "batch", description = "Cancellation, recovery, and reset of in-flight batches"),
        (name = "health", description = "Provider and system health checks"),
        (name = "logging", description = "Dynamic log level and real-time log streaming")
    ),
    paths(
        crate::api::routes::summarize::summarize,
        crate::api::routes::summarize::summarize_upload,
        crate::api::routes::batch::cancel,
        crate::api::routes::batch::legacy_cancel,
        crate::api::routes::batch::recover,
        crate::api::routes::batch::recovery_status,
    ),
    components(
        schemas(
            SummarizeRequest,
            SummarizeOptions,
            SummaryLength,
            SummarizeResponse,
            CancelRequestBody,
            CancelReason,
            CancellationResult,
            CancelStatus,
            LegacyCancelResponse,
            RecoveryQuery,
            RecoveryResponse,
            ResetQuery,
            ResetType,
            ResetResponse,
            SelfRepairResponse,
            ProviderHealthResponse,
            ProviderHealthData,
            SystemHealthResponse,
            SystemHealth,
            ComponentHealth,
            HealthStatus,
            LoggingConfigResponse,
            ModuleInfo,
            UpdateLogFilterRequest,
            ApiErrorResponse,
        )
    )
)]
pub struct ApiDoc;
