//! Progress Tracker (C3): per-batch progress state, ETA, and throughput.

use std::collections::VecDeque;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;

use crate::domain::{ProgressSnapshot, Stage, Throughput};

const DEFAULT_WINDOW: usize = 20;
const OVERHEAD_FACTOR: f64 = 1.1;
const PUBLISH_OVERALL_DELTA_PCT: f64 = 1.0;
const PUBLISH_ETA_DELTA_FRAC: f64 = 0.05;
const PUBLISH_MIN_INTERVAL_SECS: f64 = 2.0;

struct BatchState {
    started_at: Instant,
    /// Ring buffer of the last `window` segment completion durations (ms).
    durations: VecDeque<f64>,
    window: usize,
    /// Total characters summarized across all completed segments, used for
    /// the `chars_per_sec` half of the throughput figure (spec §3).
    chars_completed: u64,
    last_published: Option<ProgressSnapshot>,
    last_published_at: Option<Instant>,
}

impl BatchState {
    fn new(window: usize) -> Self {
        Self {
            started_at: Instant::now(),
            durations: VecDeque::with_capacity(window),
            window,
            chars_completed: 0,
            last_published: None,
            last_published_at: None,
        }
    }

    fn record_completion(&mut self, duration_ms: f64, chars: u64) {
        if self.durations.len() == self.window {
            self.durations.pop_front();
        }
        self.durations.push_back(duration_ms);
        self.chars_completed += chars;
    }

    fn avg_segment_ms(&self) -> f64 {
        if self.durations.is_empty() {
            0.0
        } else {
            self.durations.iter().sum::<f64>() / self.durations.len() as f64
        }
    }
}

/// Maintains per-batch progress state and decides, via idempotent
/// snapshot-publish thresholds, when a new snapshot is worth emitting
/// (spec §4.3: the throttling is a core guarantee, not a UI concern).
pub struct ProgressTracker {
    batches: DashMap<String, BatchState>,
    window: usize,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ProgressTracker {
    pub fn new(window: usize) -> Self {
        Self {
            batches: DashMap::new(),
            window,
        }
    }

    pub fn register(&self, batch_id: &str) {
        self.batches
            .entry(batch_id.to_string())
            .or_insert_with(|| BatchState::new(self.window));
    }

    pub fn remove(&self, batch_id: &str) {
        self.batches.remove(batch_id);
    }

    pub fn record_segment_completion(&self, batch_id: &str, duration_ms: f64, chars: u64) {
        if let Some(mut state) = self.batches.get_mut(batch_id) {
            state.record_completion(duration_ms, chars);
        }
    }

    /// Compute a fresh snapshot for the batch's current state. `active_workers`
    /// is the scheduler's live concurrency count, used in the ETA formula.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_snapshot(
        &self,
        batch_id: &str,
        total: usize,
        completed: usize,
        failed: usize,
        current_index: Option<usize>,
        stage: Stage,
        active_workers: usize,
    ) -> ProgressSnapshot {
        self.register(batch_id);
        let state = self.batches.get(batch_id).expect("registered above");

        let elapsed_ms = state.started_at.elapsed().as_millis() as i64;
        let avg_segment_ms = state.avg_segment_ms();

        let stage_pct = match stage {
            Stage::BatchProcessing => {
                if total == 0 {
                    100.0
                } else {
                    100.0 * (completed + failed) as f64 / total as f64
                }
            }
            Stage::Completed => 100.0,
            _ => 0.0,
        };
        let overall_pct =
            (stage.offset_pct() + stage.weight_pct() * stage_pct / 100.0).clamp(0.0, 100.0);

        let remaining = total.saturating_sub(completed + failed);
        let eta_ms = if avg_segment_ms > 0.0 && remaining > 0 {
            let workers = active_workers.max(1) as f64;
            Some((avg_segment_ms * remaining as f64 / workers * OVERHEAD_FACTOR) as i64)
        } else {
            None
        };

        let elapsed_secs = (elapsed_ms as f64 / 1000.0).max(0.001);
        let throughput = Throughput {
            segments_per_min: completed as f64 / elapsed_secs * 60.0,
            chars_per_sec: state.chars_completed as f64 / elapsed_secs,
        };

        ProgressSnapshot {
            batch_id: batch_id.to_string(),
            total,
            completed,
            failed,
            current_index,
            stage,
            overall_pct,
            stage_pct,
            elapsed_ms,
            eta_ms,
            avg_segment_ms,
            throughput,
            last_updated: Utc::now(),
        }
    }

    /// Decide whether `candidate` is different enough from the last
    /// published snapshot to warrant emission, per spec §4.3's throttling
    /// rule, and if so record it as published.
    pub fn should_publish(&self, candidate: &ProgressSnapshot) -> bool {
        let mut state = match self.batches.get_mut(&candidate.batch_id) {
            Some(s) => s,
            None => return true,
        };

        let should = match (&state.last_published, state.last_published_at) {
            (None, _) => true,
            (Some(last), Some(last_at)) => {
                last.stage != candidate.stage
                    || (candidate.overall_pct - last.overall_pct).abs() >= PUBLISH_OVERALL_DELTA_PCT
                    || eta_delta_exceeds(last.eta_ms, candidate.eta_ms)
                    || last_at.elapsed().as_secs_f64() >= PUBLISH_MIN_INTERVAL_SECS
            }
            (Some(_), None) => true,
        };

        if should {
            state.last_published = Some(candidate.clone());
            state.last_published_at = Some(Instant::now());
        }
        should
    }
}

fn eta_delta_exceeds(last: Option<i64>, current: Option<i64>) -> bool {
    match (last, current) {
        (Some(l), Some(c)) if l > 0 => {
            ((l - c).abs() as f64 / l as f64) >= PUBLISH_ETA_DELTA_FRAC
        }
        (None, Some(_)) | (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_respects_total_invariant() {
        let tracker = ProgressTracker::default();
        let snapshot = tracker.compute_snapshot("b1", 10, 4, 1, Some(4), Stage::BatchProcessing, 2);
        assert!(snapshot.respects_total());
        assert_eq!(snapshot.stage_pct, 50.0);
    }

    #[test]
    fn first_snapshot_always_publishes() {
        let tracker = ProgressTracker::default();
        let snapshot = tracker.compute_snapshot("b1", 10, 0, 0, None, Stage::Initializing, 2);
        assert!(tracker.should_publish(&snapshot));
    }

    #[test]
    fn identical_snapshot_within_interval_is_throttled() {
        let tracker = ProgressTracker::default();
        let snapshot = tracker.compute_snapshot("b1", 10, 3, 0, Some(3), Stage::BatchProcessing, 2);
        assert!(tracker.should_publish(&snapshot));
        assert!(!tracker.should_publish(&snapshot));
    }

    #[test]
    fn stage_change_forces_publish() {
        let tracker = ProgressTracker::default();
        let s1 = tracker.compute_snapshot("b1", 10, 0, 0, None, Stage::Initializing, 2);
        assert!(tracker.should_publish(&s1));
        let s2 = tracker.compute_snapshot("b1", 10, 0, 0, None, Stage::Segmenting, 2);
        assert!(tracker.should_publish(&s2));
    }

    #[test]
    fn batch_processing_weight_dominates_overall_pct() {
        let tracker = ProgressTracker::default();
        let snapshot = tracker.compute_snapshot("b1", 10, 10, 0, None, Stage::BatchProcessing, 2);
        // offset (init+seg = 15) + weight(70) * 100% = 85
        assert!((snapshot.overall_pct - 85.0).abs() < 1e-9);
    }

    #[test]
    fn chars_per_sec_reflects_recorded_completions() {
        let tracker = ProgressTracker::default();
        tracker.register("b1");
        tracker.record_segment_completion("b1", 100.0, 500);
        tracker.record_segment_completion("b1", 100.0, 500);
        let snapshot = tracker.compute_snapshot("b1", 10, 2, 0, None, Stage::BatchProcessing, 2);
        assert!(snapshot.throughput.chars_per_sec > 0.0);
    }
}
