//! ProgressSnapshot: the point-in-time progress view published by the tracker (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::Stage;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Throughput {
    pub segments_per_min: f64,
    pub chars_per_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub batch_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub current_index: Option<usize>,
    pub stage: Stage,
    pub overall_pct: f64,
    pub stage_pct: f64,
    pub elapsed_ms: i64,
    pub eta_ms: Option<i64>,
    pub avg_segment_ms: f64,
    pub throughput: Throughput,
    pub last_updated: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Whether `completed + failed <= total` holds (spec §8 invariant).
    pub fn respects_total(&self) -> bool {
        self.completed + self.failed <= self.total
    }
}
