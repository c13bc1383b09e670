//! Per-segment work unit (spec §4.2 "Per-segment protocol").

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::cancellation::CancellationController;
use crate::domain::{Batch, Stage, TaskStatus};
use crate::error::{Error, ErrorKind};
use crate::notifier::{NotifierHub, ServerEvent};
use crate::progress_tracker::ProgressTracker;
use crate::summarizer::Summarizer;

use super::config::SchedulerConfig;
use super::gate::PauseGate;

pub struct WorkerContext {
    pub batch: Arc<RwLock<Batch>>,
    pub batch_id: String,
    pub index: usize,
    pub semaphore: Arc<Semaphore>,
    pub summarizer: Arc<dyn Summarizer>,
    pub config: SchedulerConfig,
    pub tracker: Arc<ProgressTracker>,
    pub notifier: Arc<NotifierHub>,
    pub cancellation: Arc<CancellationController>,
    pub cancel_token: CancellationToken,
    pub pause_gate: PauseGate,
    pub active_workers: Arc<AtomicUsize>,
    pub failed_count: Arc<AtomicUsize>,
    pub total: usize,
}

/// Outcome of running one segment to a terminal state, used by the batch
/// driver to decide whether the fail-fast threshold has been crossed.
pub struct SegmentOutcome {
    pub failed: bool,
    pub fail_fast_tripped: bool,
}

/// Run one segment through the Summarizer with bounded concurrency,
/// retries, pause cooperation, and cancellation checks (spec §4.2 steps
/// 1-6).
pub async fn run_segment(ctx: WorkerContext) -> SegmentOutcome {
    let _permit = match ctx.semaphore.acquire().await {
        Ok(p) => p,
        Err(_) => return SegmentOutcome { failed: false, fail_fast_tripped: false },
    };

    ctx.pause_gate.wait_if_paused().await;

    // Between-segments point: safe to abort cleanly from here.
    ctx.cancellation.set_safe_checkpoint(&ctx.batch_id, true);

    if ctx.cancel_token.is_cancelled() {
        mark_task_failed(&ctx, ErrorKind::Cancelled, "cancelled before dispatch").await;
        return SegmentOutcome { failed: false, fail_fast_tripped: false };
    }

    ctx.cancellation.set_safe_checkpoint(&ctx.batch_id, false);
    ctx.active_workers.fetch_add(1, Ordering::SeqCst);

    let content = {
        let batch = ctx.batch.read().await;
        batch.tasks[ctx.index].segment.content.clone()
    };

    let timeout = ctx.config.call_timeout_for(content.chars().count());
    let mut last_error_kind = ErrorKind::InternalInvariant;
    let mut last_error_message = String::new();
    let started_attempt = Instant::now();

    let outcome = loop {
        // Each loop iteration is one attempt: `mark_running` bumps `attempts`
        // every time, including after a retry, so `attempts_made` below is
        // the true attempt count (spec §3: `attempts <= max_retries + 1`).
        let attempts_made = {
            let mut batch = ctx.batch.write().await;
            let task = &mut batch.tasks[ctx.index];
            task.mark_running();
            task.attempts
        };
        publish_task_update(&ctx).await;
        publish_progress(&ctx).await;

        let call = ctx.summarizer.summarize(&content, &ctx.cancel_token);
        let result = tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => Err(Error::Cancelled),
            r = tokio::time::timeout(timeout, call) => match r {
                Ok(inner) => inner,
                Err(_) => Err(Error::ProviderTimeout(format!("segment {} timed out after {:?}", ctx.index, timeout))),
            },
        };

        match result {
            Ok(summary) => {
                let duration_ms = started_attempt.elapsed().as_millis() as f64;
                let mut batch = ctx.batch.write().await;
                batch.tasks[ctx.index].mark_completed(summary);
                drop(batch);
                ctx.tracker
                    .record_segment_completion(&ctx.batch_id, duration_ms, content.chars().count() as u64);
                break Outcome::Completed;
            }
            Err(err) => {
                let kind = err.kind();
                last_error_kind = kind;
                last_error_message = err.to_string();

                let can_retry = (kind.retryable() || (kind.retryable_once() && attempts_made == 1))
                    && ctx.config.retry_policy.should_retry(attempts_made);

                if kind == ErrorKind::Cancelled {
                    break Outcome::Cancelled;
                }

                if can_retry {
                    {
                        let mut batch = ctx.batch.write().await;
                        batch.tasks[ctx.index].mark_retrying(kind, &last_error_message);
                    }
                    publish_task_update(&ctx).await;
                    let delay = ctx.config.retry_policy.delay_for_attempt(attempts_made);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancel_token.cancelled() => break Outcome::Cancelled,
                    }
                    continue;
                }

                break Outcome::Failed;
            }
        }
    };

    ctx.active_workers.fetch_sub(1, Ordering::SeqCst);

    let segment_failed = matches!(outcome, Outcome::Failed | Outcome::Cancelled);
    if segment_failed {
        mark_task_failed(&ctx, last_error_kind, &last_error_message).await;
    }

    publish_task_update(&ctx).await;
    publish_progress(&ctx).await;

    if !segment_failed {
        return SegmentOutcome { failed: false, fail_fast_tripped: false };
    }

    let failed_so_far = ctx.failed_count.fetch_add(1, Ordering::SeqCst) + 1;
    let fail_fast_tripped = failed_so_far > SchedulerConfig::fail_fast_threshold(ctx.total);
    if fail_fast_tripped {
        ctx.cancel_token.cancel();
    }

    SegmentOutcome { failed: true, fail_fast_tripped }
}

enum Outcome {
    Completed,
    Failed,
    Cancelled,
}

async fn mark_task_failed(ctx: &WorkerContext, kind: ErrorKind, message: &str) {
    let mut batch = ctx.batch.write().await;
    batch.tasks[ctx.index].mark_failed(kind, message);
}

async fn publish_task_update(ctx: &WorkerContext) {
    let task = {
        let batch = ctx.batch.read().await;
        batch.tasks[ctx.index].clone()
    };
    ctx.notifier.publish(
        &ctx.batch_id,
        ServerEvent::SegmentStatusUpdate {
            batch_id: ctx.batch_id.clone(),
            task,
        },
    );
}

async fn publish_progress(ctx: &WorkerContext) {
    let (total, completed, failed, stage) = {
        let batch = ctx.batch.read().await;
        (
            batch.total(),
            batch.completed_count(),
            batch.failed_count(),
            batch.stage,
        )
    };
    if stage != Stage::BatchProcessing {
        return;
    }
    let active = ctx.active_workers.load(Ordering::SeqCst);
    let snapshot = ctx.tracker.compute_snapshot(
        &ctx.batch_id,
        total,
        completed,
        failed,
        Some(ctx.index),
        stage,
        active,
    );
    if ctx.tracker.should_publish(&snapshot) {
        ctx.notifier
            .publish(&ctx.batch_id, ServerEvent::ProgressUpdate { snapshot });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationController;
    use crate::domain::{RetryPolicy, Segment, SegmentTask, SegmentType};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct FlakySummarizer {
        remaining_failures: AtomicU32,
    }

    #[async_trait]
    impl Summarizer for FlakySummarizer {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn summarize(&self, _text: &str, _cancel: &CancellationToken) -> crate::error::Result<String> {
            if self.remaining_failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(Error::ProviderTimeout("simulated".into()))
            } else {
                Ok("done".into())
            }
        }
        async fn health(&self, _cancel: &CancellationToken) -> crate::error::Result<bool> {
            Ok(true)
        }
    }

    fn make_batch(n: usize) -> Batch {
        let tasks: Vec<SegmentTask> = (0..n)
            .map(|i| SegmentTask::new(Segment::new(i, format!("s{i}"), "content", 0, 7, SegmentType::Paragraph)))
            .collect();
        let mut batch = Batch::new("b1", None, "text", tasks);
        batch.stage = Stage::BatchProcessing;
        batch
    }

    #[tokio::test]
    async fn successful_segment_marks_completed() {
        let batch = Arc::new(RwLock::new(make_batch(1)));
        let cancellation = Arc::new(CancellationController::default());
        let cancel_token = cancellation.register("b1");
        let ctx = WorkerContext {
            batch: batch.clone(),
            batch_id: "b1".into(),
            index: 0,
            semaphore: Arc::new(Semaphore::new(1)),
            summarizer: Arc::new(FlakySummarizer { remaining_failures: AtomicU32::new(0) }),
            config: SchedulerConfig {
                retry_policy: RetryPolicy { base_delay_ms: 1, ..RetryPolicy::default() },
                ..SchedulerConfig::default()
            },
            tracker: Arc::new(ProgressTracker::default()),
            notifier: Arc::new(NotifierHub::default()),
            cancellation,
            cancel_token,
            pause_gate: PauseGate::default(),
            active_workers: Arc::new(AtomicUsize::new(0)),
            failed_count: Arc::new(AtomicUsize::new(0)),
            total: 1,
        };
        let outcome = run_segment(ctx).await;
        assert!(!outcome.failed);
        assert_eq!(batch.read().await.tasks[0].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn retries_then_succeeds_records_attempts() {
        let batch = Arc::new(RwLock::new(make_batch(1)));
        let cancellation = Arc::new(CancellationController::default());
        let cancel_token = cancellation.register("b1");
        let ctx = WorkerContext {
            batch: batch.clone(),
            batch_id: "b1".into(),
            index: 0,
            semaphore: Arc::new(Semaphore::new(1)),
            summarizer: Arc::new(FlakySummarizer { remaining_failures: AtomicU32::new(2) }),
            config: SchedulerConfig {
                retry_policy: RetryPolicy { base_delay_ms: 1, ..RetryPolicy::default() },
                ..SchedulerConfig::default()
            },
            tracker: Arc::new(ProgressTracker::default()),
            notifier: Arc::new(NotifierHub::default()),
            cancellation,
            cancel_token,
            pause_gate: PauseGate::default(),
            active_workers: Arc::new(AtomicUsize::new(0)),
            failed_count: Arc::new(AtomicUsize::new(0)),
            total: 1,
        };
        let outcome = run_segment(ctx).await;
        assert!(!outcome.failed);
        let task = &batch.read().await.tasks[0];
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.attempts, 3);
    }

    struct AlwaysFails;
    #[async_trait]
    impl Summarizer for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }
        async fn summarize(&self, _text: &str, _cancel: &CancellationToken) -> crate::error::Result<String> {
            Err(Error::ProviderUnavailable("down".into()))
        }
        async fn health(&self, _cancel: &CancellationToken) -> crate::error::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn exhausted_retries_marks_failed_without_tripping_fail_fast_alone() {
        let batch = Arc::new(RwLock::new(make_batch(10)));
        let cancellation = Arc::new(CancellationController::default());
        let cancel_token = cancellation.register("b1");
        let ctx = WorkerContext {
            batch: batch.clone(),
            batch_id: "b1".into(),
            index: 0,
            semaphore: Arc::new(Semaphore::new(1)),
            summarizer: Arc::new(AlwaysFails),
            config: SchedulerConfig {
                retry_policy: RetryPolicy { base_delay_ms: 1, max_retries: 1, ..RetryPolicy::default() },
                ..SchedulerConfig::default()
            },
            tracker: Arc::new(ProgressTracker::default()),
            notifier: Arc::new(NotifierHub::default()),
            cancellation,
            cancel_token,
            pause_gate: PauseGate::default(),
            active_workers: Arc::new(AtomicUsize::new(0)),
            failed_count: Arc::new(AtomicUsize::new(0)),
            total: 10,
        };
        let outcome = run_segment(ctx).await;
        assert!(outcome.failed);
        assert!(!outcome.fail_fast_tripped);
        assert_eq!(batch.read().await.tasks[0].status, TaskStatus::Failed);
    }
}
