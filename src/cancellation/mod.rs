//! Cancellation Controller (C5): register batches, broadcast cancel
//! signals, enforce the safe-checkpoint policy, and trigger partial-result
//! capture (spec §4.5).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::domain::{CancellationRequest, PartialResult, PartialResultQuality, SegmentTask, TaskStatus};
use crate::error::{Error, Result};
use crate::notifier::{NotifierHub, ServerEvent};

const DEFAULT_SAFE_CHECKPOINT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CancelStatus {
    Forced,
    Graceful,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CancellationResult {
    pub success: bool,
    pub status: CancelStatus,
    pub message: String,
    pub partial_saved: Option<bool>,
}

struct BatchCancelState {
    token: CancellationToken,
    request: Option<CancellationRequest>,
    at_safe_checkpoint: bool,
    checkpoint_notify: Arc<Notify>,
}

impl BatchCancelState {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            request: None,
            at_safe_checkpoint: false,
            checkpoint_notify: Arc::new(Notify::new()),
        }
    }
}

/// Owns cancel tokens and safe-checkpoint state per batch. The scheduler
/// reads this controller's narrow API; it never reaches into batch-owned
/// task state from here (spec §4.5 shared-resources note).
pub struct CancellationController {
    batches: DashMap<String, BatchCancelState>,
    safe_checkpoint_timeout: Duration,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new(DEFAULT_SAFE_CHECKPOINT_TIMEOUT)
    }
}

impl CancellationController {
    pub fn new(safe_checkpoint_timeout: Duration) -> Self {
        Self {
            batches: DashMap::new(),
            safe_checkpoint_timeout,
        }
    }

    pub fn register(&self, batch_id: &str) -> CancellationToken {
        let state = self
            .batches
            .entry(batch_id.to_string())
            .or_insert_with(BatchCancelState::new);
        state.token.clone()
    }

    pub fn unregister(&self, batch_id: &str) {
        self.batches.remove(batch_id);
    }

    pub fn get_token(&self, batch_id: &str) -> Option<CancellationToken> {
        self.batches.get(batch_id).map(|s| s.token.clone())
    }

    pub fn is_cancelled(&self, batch_id: &str) -> bool {
        self.batches
            .get(batch_id)
            .map(|s| s.token.is_cancelled())
            .unwrap_or(false)
    }

    /// Scheduler calls this when a worker is between segments, i.e. safe to
    /// abort cleanly.
    pub fn set_safe_checkpoint(&self, batch_id: &str, value: bool) {
        if let Some(mut state) = self.batches.get_mut(batch_id) {
            state.at_safe_checkpoint = value;
            if value {
                state.checkpoint_notify.notify_waiters();
            }
        }
    }

    /// Apply the safe-checkpoint policy (spec §4.5). A `force` request or a
    /// request arriving while the batch is already at a safe checkpoint
    /// resolves synchronously; otherwise this spawns a bounded wait for the
    /// next checkpoint transition and returns `Pending` immediately.
    pub fn request(&self, req: CancellationRequest, notifier: Arc<NotifierHub>) -> Result<CancellationResult> {
        let batch_id = req.batch_id.clone();
        let (token, at_checkpoint, notify) = {
            let mut state = self
                .batches
                .get_mut(&batch_id)
                .ok_or_else(|| Error::not_found("batch", &batch_id))?;
            state.request = Some(req.clone());
            (state.token.clone(), state.at_safe_checkpoint, state.checkpoint_notify.clone())
        };

        if req.force {
            token.cancel();
            return Ok(CancellationResult {
                success: true,
                status: CancelStatus::Forced,
                message: "forced".into(),
                partial_saved: Some(false),
            });
        }

        if at_checkpoint {
            token.cancel();
            return Ok(CancellationResult {
                success: true,
                status: CancelStatus::Graceful,
                message: "graceful".into(),
                partial_saved: Some(req.save_partial),
            });
        }

        notifier.publish(&batch_id, ServerEvent::CancellationRequested { batch_id: batch_id.clone() });

        let timeout = self.safe_checkpoint_timeout;
        tokio::spawn(async move {
            let _ = tokio::time::timeout(timeout, notify.notified()).await;
            token.cancel();
        });

        Ok(CancellationResult {
            success: true,
            status: CancelStatus::Pending,
            message: "pending".into(),
            partial_saved: None,
        })
    }
}

/// Build a `PartialResult` from the batch owner's current task list. Pure
/// and synchronous so it can be called directly from the scheduler's own
/// single-writer loop the moment cancellation resolves, without waiting on
/// the full async Merger pipeline (spec §4.5's 15s checkpoint bound leaves
/// no room for an LLM polish pass here).
pub fn capture_partial(batch_id: &str, tasks: &[SegmentTask]) -> PartialResult {
    let quality = PartialResultQuality::assess(tasks);
    let completed_tasks: Vec<SegmentTask> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .cloned()
        .collect();

    let merged_partial_summary = completed_tasks
        .iter()
        .filter_map(|t| t.result.as_deref())
        .collect::<Vec<_>>()
        .join("\n\n");

    PartialResult {
        batch_id: batch_id.to_string(),
        completed_tasks,
        merged_partial_summary,
        quality,
        cancellation_time: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CancelReason, Segment, SegmentType};

    fn sample_task(index: usize, status: TaskStatus) -> SegmentTask {
        let mut t = SegmentTask::new(Segment::new(index, "t", "c", 0, 1, SegmentType::Paragraph));
        t.status = status;
        if status == TaskStatus::Completed {
            t.result = Some(format!("summary-{index}"));
        }
        t
    }

    #[test]
    fn register_then_forced_request_cancels_immediately() {
        let controller = CancellationController::default();
        let token = controller.register("b1");
        let notifier = Arc::new(NotifierHub::default());
        let req = CancellationRequest::new("b1", "user-1", CancelReason::User, false, true);
        let result = controller.request(req, notifier).unwrap();
        assert_eq!(result.status, CancelStatus::Forced);
        assert!(token.is_cancelled());
    }

    #[test]
    fn request_at_safe_checkpoint_resolves_gracefully() {
        let controller = CancellationController::default();
        controller.register("b1");
        controller.set_safe_checkpoint("b1", true);
        let notifier = Arc::new(NotifierHub::default());
        let req = CancellationRequest::new("b1", "user-1", CancelReason::User, true, false);
        let result = controller.request(req, notifier).unwrap();
        assert_eq!(result.status, CancelStatus::Graceful);
        assert_eq!(result.partial_saved, Some(true));
    }

    #[tokio::test]
    async fn request_not_at_checkpoint_is_pending_then_resolves() {
        let controller = Arc::new(CancellationController::new(Duration::from_millis(50)));
        let token = controller.register("b1");
        let notifier = Arc::new(NotifierHub::default());
        let req = CancellationRequest::new("b1", "user-1", CancelReason::User, false, false);
        let result = controller.request(req, notifier).unwrap();
        assert_eq!(result.status, CancelStatus::Pending);
        assert!(!token.is_cancelled());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn capture_partial_joins_completed_results() {
        let tasks = vec![
            sample_task(0, TaskStatus::Completed),
            sample_task(1, TaskStatus::Failed),
        ];
        let partial = capture_partial("b1", &tasks);
        assert_eq!(partial.completed_tasks.len(), 1);
        assert_eq!(partial.merged_partial_summary, "summary-0");
    }
}
