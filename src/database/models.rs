//! `SummaryRecord` database model (spec.md §6 persisted-record shape).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted summarization outcome, one row per completed or failed
/// `/api/summarize` request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SummaryRecord {
    pub id: String,
    pub original_text: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub original_length: i64,
    pub summary_length: i64,
    pub processing_time_ms: i64,
    pub error_message: Option<String>,
}

impl SummaryRecord {
    pub fn new_success(
        id: impl Into<String>,
        original_text: impl Into<String>,
        summary_text: impl Into<String>,
        user_id: Option<String>,
        processing_time_ms: i64,
    ) -> Self {
        let original_text = original_text.into();
        let summary_text = summary_text.into();
        let original_length = original_text.chars().count() as i64;
        let summary_length = summary_text.chars().count() as i64;
        Self {
            id: id.into(),
            original_text,
            summary_text,
            created_at: Utc::now(),
            user_id,
            original_length,
            summary_length,
            processing_time_ms,
            error_message: None,
        }
    }

    pub fn new_failure(
        id: impl Into<String>,
        original_text: impl Into<String>,
        user_id: Option<String>,
        error_message: impl Into<String>,
    ) -> Self {
        let original_text = original_text.into();
        let original_length = original_text.chars().count() as i64;
        Self {
            id: id.into(),
            original_text,
            summary_text: String::new(),
            created_at: Utc::now(),
            user_id,
            original_length,
            summary_length: 0,
            processing_time_ms: 0,
            error_message: Some(error_message.into()),
        }
    }
}
