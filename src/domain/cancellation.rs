//! Cancellation-related domain types (spec §3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{SegmentTask, TaskStatus};

/// Why a cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CancelReason {
    User,
    Timeout,
    SystemError,
    ResourceExhaustion,
    QualityThreshold,
    Shutdown,
}

/// A recorded cancellation request against a batch. Owned exclusively by the
/// cancellation controller; the scheduler only ever reads it through the
/// controller's narrow API, never mutates it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub batch_id: String,
    pub requested_by: String,
    pub reason: CancelReason,
    pub save_partial: bool,
    /// `true` abandons an in-flight provider call immediately; `false` waits
    /// for the current work unit to reach its next safe checkpoint.
    pub force: bool,
    pub requested_at: DateTime<Utc>,
}

impl CancellationRequest {
    pub fn new(
        batch_id: impl Into<String>,
        requested_by: impl Into<String>,
        reason: CancelReason,
        save_partial: bool,
        force: bool,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            requested_by: requested_by.into(),
            reason,
            save_partial,
            force,
            requested_at: Utc::now(),
        }
    }
}

/// Quality bucket assigned to a partial result (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBucket {
    Excellent,
    Good,
    Acceptable,
    Poor,
    Unusable,
}

/// What the caller should do with a partial result, derived from its
/// `QualityBucket` (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Recommend,
    ReviewRequired,
    ConsiderContinue,
    Discard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialResultQuality {
    /// `completed / total`.
    pub completeness: f64,
    /// Ratio of contiguous completed indices to total completed — a rough
    /// proxy for how readable the partial summary will be.
    pub coherence: f64,
    /// Titles of segments that never completed.
    pub missing_topics: Vec<String>,
    /// Composite score in `[0,1]` driving the bucket/action.
    pub overall: f64,
    pub bucket: QualityBucket,
    pub recommended_action: RecommendedAction,
}

impl PartialResultQuality {
    /// Derive a quality assessment from the full task list (spec §4.5:
    /// completeness = completed/total; coherence = ratio of contiguous
    /// completed indices; missing-topics = titles not completed).
    pub fn assess(tasks: &[SegmentTask]) -> Self {
        let total = tasks.len();
        if total == 0 {
            return Self {
                completeness: 0.0,
                coherence: 0.0,
                missing_topics: Vec::new(),
                overall: 0.0,
                bucket: QualityBucket::Unusable,
                recommended_action: RecommendedAction::Discard,
            };
        }

        let completed_indices: Vec<usize> = tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Completed)
            .map(|(i, _)| i)
            .collect();
        let completed = completed_indices.len();
        let completeness = completed as f64 / total as f64;

        let coherence = if completed == 0 {
            0.0
        } else {
            let longest_run = longest_contiguous_run(&completed_indices);
            longest_run as f64 / completed as f64
        };

        let missing_topics = tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Completed)
            .map(|t| t.segment.title.clone())
            .collect();

        let overall = completeness * 0.65 + coherence * 0.35;
        let (bucket, recommended_action) = classify(overall);

        Self {
            completeness,
            coherence,
            missing_topics,
            overall,
            bucket,
            recommended_action,
        }
    }
}

fn longest_contiguous_run(sorted_indices: &[usize]) -> usize {
    if sorted_indices.is_empty() {
        return 0;
    }
    let mut best = 1;
    let mut current = 1;
    for window in sorted_indices.windows(2) {
        if window[1] == window[0] + 1 {
            current += 1;
        } else {
            current = 1;
        }
        best = best.max(current);
    }
    best
}

fn classify(overall: f64) -> (QualityBucket, RecommendedAction) {
    if overall >= 0.9 {
        (QualityBucket::Excellent, RecommendedAction::Recommend)
    } else if overall >= 0.75 {
        (QualityBucket::Good, RecommendedAction::Recommend)
    } else if overall >= 0.5 {
        (QualityBucket::Acceptable, RecommendedAction::ReviewRequired)
    } else if overall >= 0.25 {
        (QualityBucket::Poor, RecommendedAction::ConsiderContinue)
    } else {
        (QualityBucket::Unusable, RecommendedAction::Discard)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialResult {
    pub batch_id: String,
    pub completed_tasks: Vec<SegmentTask>,
    pub merged_partial_summary: String,
    pub quality: PartialResultQuality,
    pub cancellation_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::segment::{Segment, SegmentType};

    fn task(index: usize, status: TaskStatus) -> SegmentTask {
        let mut t = SegmentTask::new(Segment::new(
            index,
            format!("Segment {}", index + 1),
            "content",
            0,
            7,
            SegmentType::Paragraph,
        ));
        t.status = status;
        if status == TaskStatus::Completed {
            t.result = Some("summary".into());
        }
        t
    }

    #[test]
    fn fully_completed_batch_is_excellent() {
        let tasks = vec![
            task(0, TaskStatus::Completed),
            task(1, TaskStatus::Completed),
        ];
        let quality = PartialResultQuality::assess(&tasks);
        assert_eq!(quality.bucket, QualityBucket::Excellent);
        assert_eq!(quality.recommended_action, RecommendedAction::Recommend);
        assert!(quality.missing_topics.is_empty());
    }

    #[test]
    fn empty_batch_is_unusable() {
        let quality = PartialResultQuality::assess(&[]);
        assert_eq!(quality.bucket, QualityBucket::Unusable);
    }

    #[test]
    fn scattered_completions_lower_coherence() {
        let tasks = vec![
            task(0, TaskStatus::Completed),
            task(1, TaskStatus::Failed),
            task(2, TaskStatus::Completed),
            task(3, TaskStatus::Failed),
        ];
        let quality = PartialResultQuality::assess(&tasks);
        assert_eq!(quality.completeness, 0.5);
        assert_eq!(quality.coherence, 0.5);
        assert_eq!(quality.missing_topics.len(), 2);
    }
}
