//! Batch Scheduler (C6): drives segments through the Summarizer capability
//! with bounded concurrency, retry/backoff, pause/resume, and cancellation,
//! feeding the Progress Tracker and Notifier as it goes (spec §4.2).

pub mod config;
pub mod gate;
pub mod registry;
mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cancellation::{CancellationController, CancellationResult};
use crate::domain::{
    Batch, BatchSummary, CancellationRequest, MergeOutput, MergeParams, MergeStats, MergeStrategy,
    PartialResult, PartialResultQuality, ProgressSnapshot, Segment, SegmentTask, Stage, TaskStatus,
};
use crate::error::{Error, Result};
use crate::merger::Merger;
use crate::notifier::{NotifierHub, ServerEvent, StageChangeInfo};
use crate::progress_tracker::ProgressTracker;
use crate::summarizer::Summarizer;

pub use config::SchedulerConfig;

struct RunState {
    pause_gate: gate::PauseGate,
    active_workers: Arc<AtomicUsize>,
    failed_count: Arc<AtomicUsize>,
}

/// Terminal-relevant batch fields the HTTP surface reads once a batch stops
/// actively processing (spec §6: `/api/summarize` blocks until this is
/// available; recovery endpoints read `partial_result`).
#[derive(Debug, Clone)]
pub struct BatchView {
    pub stage: Stage,
    pub final_summary: Option<String>,
    pub partial_result: Option<PartialResult>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Owns batch lifecycle end to end: creation, dispatch, progress/notifier
/// wiring, and termination. Cheaply cloneable — every field is an `Arc` (or,
/// for `config`, cheap to clone) so the driving future can be `'static` in
/// its own spawned task.
#[derive(Clone)]
pub struct BatchScheduler {
    registry: Arc<registry::BatchRegistry>,
    summarizer: Arc<dyn Summarizer>,
    tracker: Arc<ProgressTracker>,
    notifier: Arc<NotifierHub>,
    cancellation: Arc<CancellationController>,
    merger: Arc<Merger>,
    config: SchedulerConfig,
    run_states: Arc<DashMap<String, Arc<RunState>>>,
}

impl BatchScheduler {
    pub fn new(
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<NotifierHub>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry::BatchRegistry::new()),
            summarizer,
            tracker: Arc::new(ProgressTracker::new(config.progress_window)),
            notifier,
            cancellation: Arc::new(CancellationController::new(config.safe_checkpoint_timeout)),
            merger: Arc::new(Merger::new(None)),
            config,
            run_states: Arc::new(DashMap::new()),
        }
    }

    /// Provide an LLM-assist-capable merger (spec §4.6 step 4). Defaults to
    /// rule-based-only merging when never called.
    pub fn with_llm_merger(mut self, llm: Arc<dyn Summarizer>) -> Self {
        self.merger = Arc::new(Merger::new(Some(llm)));
        self
    }

    /// Start a new batch from already-segmented content. Non-blocking: the
    /// batch is registered and a driver task is spawned, then the batch id
    /// is returned immediately (spec §4.2 contract).
    pub fn start(
        &self,
        segments: Vec<Segment>,
        original_text: String,
        user_id: Option<String>,
        merge_params: MergeParams,
    ) -> Result<String> {
        if segments.is_empty() {
            return Err(Error::InvalidInput("a batch must contain at least one segment".into()));
        }

        let batch_id = Uuid::new_v4().to_string();
        let tasks: Vec<SegmentTask> = segments.into_iter().map(SegmentTask::new).collect();
        let batch = Batch::new(batch_id.clone(), user_id, original_text, tasks);
        let handle = self.registry.insert(batch);

        let cancel_token = self.cancellation.register(&batch_id);
        self.tracker.register(&batch_id);
        self.run_states.insert(
            batch_id.clone(),
            Arc::new(RunState {
                pause_gate: gate::PauseGate::default(),
                active_workers: Arc::new(AtomicUsize::new(0)),
                failed_count: Arc::new(AtomicUsize::new(0)),
            }),
        );

        let scheduler = self.clone();
        let driver_batch_id = batch_id.clone();
        tokio::spawn(async move {
            scheduler.run_batch(handle, driver_batch_id, cancel_token, merge_params).await;
        });

        Ok(batch_id)
    }

    /// Memory-resident progress lookup (spec §4.2 contract). Computes a
    /// fresh, un-throttled snapshot so callers always see current state.
    pub async fn progress(&self, batch_id: &str) -> Option<ProgressSnapshot> {
        let handle = self.registry.get(batch_id)?;
        let batch = handle.read().await;
        let active = self
            .run_states
            .get(batch_id)
            .map(|s| s.active_workers.load(Ordering::SeqCst))
            .unwrap_or(0);
        Some(self.tracker.compute_snapshot(
            batch_id,
            batch.total(),
            batch.completed_count(),
            batch.failed_count(),
            None,
            batch.stage,
            active,
        ))
    }

    pub async fn pause(&self, batch_id: &str) -> bool {
        let Some(handle) = self.registry.get(batch_id) else { return false };
        if handle.read().await.stage.is_terminal() {
            return false;
        }
        match self.run_states.get(batch_id) {
            Some(state) => {
                state.pause_gate.pause();
                true
            }
            None => false,
        }
    }

    pub async fn resume(&self, batch_id: &str) -> bool {
        let Some(handle) = self.registry.get(batch_id) else { return false };
        if handle.read().await.stage.is_terminal() {
            return false;
        }
        match self.run_states.get(batch_id) {
            Some(state) => {
                state.pause_gate.resume();
                true
            }
            None => false,
        }
    }

    /// Request cancellation (spec §4.5). Idempotent: cancelling an
    /// already-terminal batch succeeds without changing the outcome.
    pub async fn cancel(&self, request: CancellationRequest) -> Result<CancellationResult> {
        let handle = self
            .registry
            .get(&request.batch_id)
            .ok_or_else(|| Error::not_found("batch", &request.batch_id))?;

        {
            let batch = handle.read().await;
            if batch.stage.is_terminal() {
                return Ok(CancellationResult {
                    success: true,
                    status: crate::cancellation::CancelStatus::Graceful,
                    message: "batch already reached a terminal state".into(),
                    partial_saved: Some(false),
                });
            }
        }

        {
            let mut batch = handle.write().await;
            batch.cancel_request = Some(request.clone());
        }

        self.cancellation.request(request, self.notifier.clone())
    }

    pub async fn list_by_user(&self, user_id: &str) -> Vec<BatchSummary> {
        self.registry.list_by_user(user_id).await
    }

    pub async fn cleanup(&self, older_than: Duration) -> usize {
        self.registry.cleanup(older_than).await
    }

    /// Snapshot of the terminal-relevant fields the HTTP surface needs
    /// (final summary, partial result) that `progress()` doesn't carry.
    pub async fn view(&self, batch_id: &str) -> Option<BatchView> {
        let handle = self.registry.get(batch_id)?;
        let batch = handle.read().await;
        Some(BatchView {
            stage: batch.stage,
            final_summary: batch.final_summary.clone(),
            partial_result: batch.partial_result.clone(),
            total: batch.total(),
            completed: batch.completed_count(),
            failed: batch.failed_count(),
        })
    }

    /// Forcibly drop a batch from the registry regardless of its stage,
    /// used by `POST /api/summarize/reset?resetType=batch`.
    pub fn remove_batch(&self, batch_id: &str) -> bool {
        let existed = self.registry.get(batch_id).is_some();
        self.registry.remove(batch_id);
        existed
    }

    async fn transition_stage(&self, handle: &Arc<RwLock<Batch>>, batch_id: &str, stage: Stage) {
        let previous = {
            let mut batch = handle.write().await;
            let previous = batch.stage;
            batch.advance_stage(stage);
            previous
        };
        self.notifier.publish(
            batch_id,
            ServerEvent::StageChanged {
                batch_id: batch_id.to_string(),
                stage,
                info: Some(StageChangeInfo { previous: Some(previous), message: None }),
            },
        );
    }

    /// Drive one batch from `BatchProcessing` through to a terminal stage.
    async fn run_batch(
        self,
        handle: Arc<RwLock<Batch>>,
        batch_id: String,
        cancel_token: CancellationToken,
        merge_params: MergeParams,
    ) {
        self.transition_stage(&handle, &batch_id, Stage::Segmenting).await;
        self.transition_stage(&handle, &batch_id, Stage::BatchProcessing).await;

        let total = handle.read().await.total();
        let run_state = self
            .run_states
            .get(&batch_id)
            .expect("run state registered in start()")
            .clone();

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit));
        let mut join_set = tokio::task::JoinSet::new();
        for index in 0..total {
            let ctx = worker::WorkerContext {
                batch: handle.clone(),
                batch_id: batch_id.clone(),
                index,
                semaphore: semaphore.clone(),
                summarizer: self.summarizer.clone(),
                config: self.config.clone(),
                tracker: self.tracker.clone(),
                notifier: self.notifier.clone(),
                cancellation: self.cancellation.clone(),
                cancel_token: cancel_token.clone(),
                pause_gate: run_state.pause_gate.clone(),
                active_workers: run_state.active_workers.clone(),
                failed_count: run_state.failed_count.clone(),
                total,
            };
            join_set.spawn(worker::run_segment(ctx));
        }

        let mut fail_fast_tripped = false;
        while let Some(joined) = join_set.join_next().await {
            if let Ok(outcome) = joined {
                fail_fast_tripped |= outcome.fail_fast_tripped;
            }
        }

        let user_cancelled = handle.read().await.cancel_request.is_some();

        if fail_fast_tripped {
            self.finalize_failed(&handle, &batch_id).await;
        } else if user_cancelled && cancel_token.is_cancelled() {
            self.finalize_cancelled(&handle, &batch_id, &merge_params, &cancel_token).await;
        } else {
            self.finalize_completed(&handle, &batch_id, &merge_params, &cancel_token).await;
        }

        self.cancellation.unregister(&batch_id);
        self.notifier.remove_topic(&batch_id);
        self.tracker.remove(&batch_id);
        self.run_states.remove(&batch_id);
    }

    async fn finalize_completed(
        &self,
        handle: &Arc<RwLock<Batch>>,
        batch_id: &str,
        merge_params: &MergeParams,
        cancel_token: &CancellationToken,
    ) {
        self.transition_stage(handle, batch_id, Stage::Merging).await;

        let tasks = handle.read().await.tasks.clone();
        let merge_result = self.merger.merge(&tasks, merge_params, cancel_token).await;

        let failed_count = handle.read().await.failed_count();
        match merge_result {
            Ok(output) => {
                self.transition_stage(handle, batch_id, Stage::Finalizing).await;
                {
                    let mut batch = handle.write().await;
                    batch.final_summary = Some(output.summary.clone());
                }
                self.transition_stage(handle, batch_id, Stage::Completed).await;
                self.notifier.publish(
                    batch_id,
                    ServerEvent::BatchCompleted { batch_id: batch_id.to_string(), result: output },
                );
                let _ = failed_count;
            }
            Err(e) => {
                self.fail_batch(handle, batch_id, &e.to_string()).await;
            }
        }
    }

    async fn finalize_failed(&self, handle: &Arc<RwLock<Batch>>, batch_id: &str) {
        self.fail_batch(
            handle,
            batch_id,
            "fail-fast threshold exceeded: too many segments failed",
        )
        .await;
    }

    async fn fail_batch(&self, handle: &Arc<RwLock<Batch>>, batch_id: &str, error: &str) {
        {
            let mut batch = handle.write().await;
            batch.advance_stage(Stage::Failed);
        }
        self.notifier.publish(
            batch_id,
            ServerEvent::BatchFailed { batch_id: batch_id.to_string(), error: error.to_string() },
        );
    }

    async fn finalize_cancelled(
        &self,
        handle: &Arc<RwLock<Batch>>,
        batch_id: &str,
        merge_params: &MergeParams,
        cancel_token: &CancellationToken,
    ) {
        let request = handle.read().await.cancel_request.clone();
        let save_partial = request.map(|r| r.save_partial).unwrap_or(false);

        let output = if save_partial {
            let tasks = handle.read().await.tasks.clone();
            let partial = build_partial_result(batch_id, &tasks, &self.merger, merge_params, cancel_token).await;
            let output = MergeOutput {
                summary: partial.merged_partial_summary.clone(),
                stats: MergeStats {
                    input_length: 0,
                    output_length: partial.merged_partial_summary.chars().count(),
                    compression_ratio: 0.0,
                    segments_merged: partial.completed_tasks.len(),
                    duplicates_removed: 0,
                },
                quality: crate::domain::MergeQuality {
                    coherence: partial.quality.coherence,
                    completeness: partial.quality.completeness,
                    conciseness: 1.0,
                    accuracy: partial.quality.overall,
                },
                strategy_used: MergeStrategy::Balanced,
                processing_ms: 0,
            };
            {
                let mut batch = handle.write().await;
                batch.partial_result = Some(partial);
            }
            output
        } else {
            MergeOutput {
                summary: String::new(),
                stats: MergeStats {
                    input_length: 0,
                    output_length: 0,
                    compression_ratio: 0.0,
                    segments_merged: 0,
                    duplicates_removed: 0,
                },
                quality: crate::domain::MergeQuality {
                    coherence: 0.0,
                    completeness: 0.0,
                    conciseness: 0.0,
                    accuracy: 0.0,
                },
                strategy_used: MergeStrategy::Balanced,
                processing_ms: 0,
            }
        };

        {
            let mut batch = handle.write().await;
            batch.advance_stage(Stage::Cancelled);
        }
        self.notifier.publish(
            batch_id,
            ServerEvent::BatchCompleted { batch_id: batch_id.to_string(), result: output },
        );
    }
}

/// Build a `PartialResult` using the full Merger pipeline on the completed
/// subset (spec §4.5: "invoke Merger on that subset"). The cancelled token
/// is passed through so any LLM-assist polish step is skipped via its own
/// cancellation check and the rule-based draft is kept.
async fn build_partial_result(
    batch_id: &str,
    tasks: &[SegmentTask],
    merger: &Merger,
    merge_params: &MergeParams,
    cancel_token: &CancellationToken,
) -> PartialResult {
    let completed_tasks: Vec<SegmentTask> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .cloned()
        .collect();
    let quality = PartialResultQuality::assess(tasks);
    let merge_output = merger
        .merge(&completed_tasks, merge_params, cancel_token)
        .await
        .unwrap_or_else(|_| MergeOutput {
            summary: completed_tasks
                .iter()
                .filter_map(|t| t.result.as_deref())
                .collect::<Vec<_>>()
                .join("\n\n"),
            stats: MergeStats {
                input_length: 0,
                output_length: 0,
                compression_ratio: 0.0,
                segments_merged: completed_tasks.len(),
                duplicates_removed: 0,
            },
            quality: crate::domain::MergeQuality {
                coherence: 0.0,
                completeness: 0.0,
                conciseness: 0.0,
                accuracy: 0.0,
            },
            strategy_used: MergeStrategy::Balanced,
            processing_ms: 0,
        });

    PartialResult {
        batch_id: batch_id.to_string(),
        completed_tasks,
        merged_partial_summary: merge_output.summary,
        quality,
        cancellation_time: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CancelReason, SegmentType};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration as StdDuration;

    struct InstantSummarizer;
    #[async_trait]
    impl Summarizer for InstantSummarizer {
        fn name(&self) -> &str {
            "instant"
        }
        async fn summarize(&self, text: &str, _cancel: &CancellationToken) -> Result<String> {
            Ok(format!("summary of: {text}"))
        }
        async fn health(&self, _cancel: &CancellationToken) -> Result<bool> {
            Ok(true)
        }
    }

    struct NeverCompletes {
        hits: AtomicU32,
    }
    #[async_trait]
    impl Summarizer for NeverCompletes {
        fn name(&self) -> &str {
            "never"
        }
        async fn summarize(&self, _text: &str, _cancel: &CancellationToken) -> Result<String> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Err(Error::ProviderUnavailable("down".into()))
        }
        async fn health(&self, _cancel: &CancellationToken) -> Result<bool> {
            Ok(false)
        }
    }

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment::new(i, format!("Segment {}", i + 1), format!("content {i}"), 0, 7, SegmentType::Paragraph))
            .collect()
    }

    #[tokio::test]
    async fn start_rejects_zero_segments() {
        let scheduler = BatchScheduler::new(
            Arc::new(InstantSummarizer),
            Arc::new(NotifierHub::default()),
            SchedulerConfig::default(),
        );
        let err = scheduler
            .start(vec![], "text".into(), None, MergeParams::default())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn successful_batch_reaches_completed_stage() {
        let scheduler = BatchScheduler::new(
            Arc::new(InstantSummarizer),
            Arc::new(NotifierHub::default()),
            SchedulerConfig::default(),
        );
        let mut params = MergeParams::default();
        params.enable_llm_assist = false;
        let batch_id = scheduler
            .start(segments(3), "full text".into(), Some("u1".into()), params)
            .unwrap();

        let mut stage = None;
        for _ in 0..200 {
            if let Some(snapshot) = scheduler.progress(&batch_id).await {
                stage = Some(snapshot.stage);
                if snapshot.stage == Stage::Completed {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert_eq!(stage, Some(Stage::Completed));
    }

    #[tokio::test]
    async fn fail_fast_trips_batch_to_failed() {
        let scheduler = BatchScheduler::new(
            Arc::new(NeverCompletes { hits: AtomicU32::new(0) }),
            Arc::new(NotifierHub::default()),
            SchedulerConfig {
                retry_policy: crate::domain::RetryPolicy { base_delay_ms: 1, max_retries: 0, ..Default::default() },
                ..SchedulerConfig::default()
            },
        );
        let batch_id = scheduler
            .start(segments(5), "full text".into(), None, MergeParams::default())
            .unwrap();

        let mut stage = None;
        for _ in 0..400 {
            if let Some(snapshot) = scheduler.progress(&batch_id).await {
                stage = Some(snapshot.stage);
                if snapshot.stage == Stage::Failed {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert_eq!(stage, Some(Stage::Failed));
    }

    #[tokio::test]
    async fn cancel_is_idempotent_on_terminal_batch() {
        let scheduler = BatchScheduler::new(
            Arc::new(InstantSummarizer),
            Arc::new(NotifierHub::default()),
            SchedulerConfig::default(),
        );
        let batch_id = scheduler
            .start(segments(1), "text".into(), None, MergeParams::default())
            .unwrap();

        for _ in 0..200 {
            if let Some(snapshot) = scheduler.progress(&batch_id).await {
                if snapshot.stage == Stage::Completed {
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }

        let request = CancellationRequest::new(batch_id.clone(), "u1", CancelReason::User, false, false);
        let result = scheduler.cancel(request).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips() {
        let scheduler = BatchScheduler::new(
            Arc::new(InstantSummarizer),
            Arc::new(NotifierHub::default()),
            SchedulerConfig::default(),
        );
        let batch_id = scheduler
            .start(segments(2), "text".into(), None, MergeParams::default())
            .unwrap();
        assert!(scheduler.pause(&batch_id).await || scheduler.progress(&batch_id).await.is_some());
        assert!(scheduler.resume(&batch_id).await || scheduler.progress(&batch_id).await.is_some());
    }

    #[tokio::test]
    async fn view_reports_final_summary_once_completed() {
        let scheduler = BatchScheduler::new(
            Arc::new(InstantSummarizer),
            Arc::new(NotifierHub::default()),
            SchedulerConfig::default(),
        );
        let mut params = MergeParams::default();
        params.enable_llm_assist = false;
        let batch_id = scheduler
            .start(segments(2), "full text".into(), None, params)
            .unwrap();

        let mut view = None;
        for _ in 0..200 {
            if let Some(v) = scheduler.view(&batch_id).await {
                if v.stage == Stage::Completed {
                    view = Some(v);
                    break;
                }
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        let view = view.expect("batch should complete");
        assert!(view.final_summary.is_some());
        assert_eq!(view.completed, 2);
    }

    #[tokio::test]
    async fn remove_batch_drops_a_known_batch_and_reports_absence() {
        let scheduler = BatchScheduler::new(
            Arc::new(InstantSummarizer),
            Arc::new(NotifierHub::default()),
            SchedulerConfig::default(),
        );
        let batch_id = scheduler
            .start(segments(1), "text".into(), None, MergeParams::default())
            .unwrap();
        assert!(scheduler.remove_batch(&batch_id));
        assert!(scheduler.view(&batch_id).await.is_none());
        assert!(!scheduler.remove_batch(&batch_id));
    }
}
