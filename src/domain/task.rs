//! SegmentTask: the per-segment unit of work tracked by the scheduler (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::segment::Segment;
use crate::error::ErrorKind;

/// Lifecycle status of a `SegmentTask`. Terminal states are `Completed` and
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTask {
    pub segment: Segment,
    pub status: TaskStatus,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
}

impl SegmentTask {
    pub fn new(segment: Segment) -> Self {
        Self {
            segment,
            status: TaskStatus::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            last_error_kind: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.attempts += 1;
    }

    pub fn mark_retrying(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = TaskStatus::Retrying;
        self.last_error_kind = Some(kind);
        self.error = Some(message.into());
    }

    pub fn mark_completed(&mut self, result: impl Into<String>) {
        self.status = TaskStatus::Completed;
        self.result = Some(result.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.last_error_kind = Some(kind);
        self.error = Some(message.into());
        self.finished_at = Some(Utc::now());
    }

    /// Duration of the finished attempt, if both timestamps are set.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(s), Some(f)) => Some((f - s).num_milliseconds().max(0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::segment::SegmentType;

    fn sample_task() -> SegmentTask {
        SegmentTask::new(Segment::new(0, "t", "content", 0, 7, SegmentType::Paragraph))
    }

    #[test]
    fn completed_implies_result() {
        let mut task = sample_task();
        task.mark_running();
        task.mark_completed("summary");
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
        assert!(task.status.is_terminal());
    }

    #[test]
    fn attempts_increment_on_each_running_transition() {
        let mut task = sample_task();
        task.mark_running();
        task.mark_retrying(ErrorKind::ProviderTimeout, "timed out");
        task.mark_running();
        assert_eq!(task.attempts, 2);
    }
}
