//! Batch: the top-level unit of work owned by the scheduler (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cancellation::CancellationRequest;
use super::merge::PartialResult;
use super::progress::ProgressSnapshot;
use super::task::SegmentTask;

/// Batch lifecycle stage. Stage advances monotonically except to
/// `Failed`/`Cancelled`, which are reachable from any non-terminal stage
/// (spec §3 invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Initializing,
    Segmenting,
    BatchProcessing,
    Merging,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl Stage {
    /// Ordinal used to enforce monotonic progression through the
    /// non-terminal path. `None` for the two terminal-only stages, which are
    /// reachable from anywhere.
    fn ordinal(self) -> Option<u8> {
        match self {
            Stage::Initializing => Some(0),
            Stage::Segmenting => Some(1),
            Stage::BatchProcessing => Some(2),
            Stage::Merging => Some(3),
            Stage::Finalizing => Some(4),
            Stage::Completed => Some(5),
            Stage::Failed | Stage::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed | Stage::Cancelled)
    }

    /// Whether transitioning from `self` to `next` is a legal progression.
    pub fn can_advance_to(self, next: Stage) -> bool {
        if matches!(next, Stage::Failed | Stage::Cancelled) {
            return !self.is_terminal();
        }
        match (self.ordinal(), next.ordinal()) {
            (Some(a), Some(b)) => b >= a,
            _ => false,
        }
    }

    /// Overall-progress weight allocated to this stage (spec §4.2: batch
    /// processing is 70%, the rest split 5/10/10/5).
    pub fn weight_pct(self) -> f64 {
        match self {
            Stage::Initializing => 5.0,
            Stage::Segmenting => 10.0,
            Stage::BatchProcessing => 70.0,
            Stage::Merging => 10.0,
            Stage::Finalizing => 5.0,
            Stage::Completed | Stage::Failed | Stage::Cancelled => 0.0,
        }
    }

    /// Cumulative weight of all stages strictly before this one.
    pub fn offset_pct(self) -> f64 {
        const ORDER: [Stage; 5] = [
            Stage::Initializing,
            Stage::Segmenting,
            Stage::BatchProcessing,
            Stage::Merging,
            Stage::Finalizing,
        ];
        let mut acc = 0.0;
        for s in ORDER {
            if s == self {
                break;
            }
            acc += s.weight_pct();
        }
        acc
    }
}

#[derive(Debug, Clone)]
pub struct Batch {
    pub batch_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub original_text: String,
    /// Immutable order of tasks for the lifetime of the batch.
    pub tasks: Vec<SegmentTask>,
    pub stage: Stage,
    pub progress: Option<ProgressSnapshot>,
    pub cancel_request: Option<CancellationRequest>,
    pub partial_result: Option<PartialResult>,
    pub final_summary: Option<String>,
}

impl Batch {
    pub fn new(
        batch_id: impl Into<String>,
        user_id: Option<String>,
        original_text: impl Into<String>,
        tasks: Vec<SegmentTask>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            user_id,
            created_at: Utc::now(),
            original_text: original_text.into(),
            tasks,
            stage: Stage::Initializing,
            progress: None,
            cancel_request: None,
            partial_result: None,
            final_summary: None,
        }
    }

    /// Attempt a stage transition, enforcing monotonic progression.
    /// Returns `false` (no-op) on an illegal transition rather than panicking,
    /// since callers are internal and should treat this as a programmer error
    /// surfaced via `InternalInvariant` by the caller.
    pub fn advance_stage(&mut self, next: Stage) -> bool {
        if self.stage.can_advance_to(next) {
            self.stage = next;
            true
        } else {
            false
        }
    }

    pub fn total(&self) -> usize {
        self.tasks.len()
    }

    pub fn completed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == super::task::TaskStatus::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == super::task::TaskStatus::Failed)
            .count()
    }

    /// A summary of `Batch` suitable for `list_by_user` responses.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            batch_id: self.batch_id.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at,
            stage: self.stage,
            total: self.total(),
            completed: self.completed_count(),
            failed: self.failed_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_weights_sum_to_100() {
        let sum: f64 = [
            Stage::Initializing,
            Stage::Segmenting,
            Stage::BatchProcessing,
            Stage::Merging,
            Stage::Finalizing,
        ]
        .iter()
        .map(|s| s.weight_pct())
        .sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn stage_advance_monotonic() {
        assert!(Stage::Initializing.can_advance_to(Stage::Segmenting));
        assert!(!Stage::BatchProcessing.can_advance_to(Stage::Segmenting));
        assert!(Stage::BatchProcessing.can_advance_to(Stage::Failed));
        assert!(!Stage::Completed.can_advance_to(Stage::Failed));
    }

    #[test]
    fn batch_rejects_illegal_stage_transition() {
        let mut batch = Batch::new("b1", None, "text", vec![]);
        assert!(batch.advance_stage(Stage::Segmenting));
        assert!(!batch.advance_stage(Stage::Initializing));
        assert_eq!(batch.stage, Stage::Segmenting);
    }
}
