//! Pause/resume gate (spec §4.2): pausing a batch lets in-flight provider
//! calls finish but blocks workers from picking up new segments until
//! resumed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Clone)]
pub struct PauseGate {
    paused: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }
}

impl PauseGate {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Block the caller while the gate is paused. A worker calls this
    /// between segments, never while a provider call is in flight.
    pub async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::SeqCst) {
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn resume_releases_waiting_worker() {
        let gate = PauseGate::default();
        gate.pause();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.wait_if_paused().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        gate.resume();
        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("worker should unblock after resume")
            .unwrap();
    }

    #[tokio::test]
    async fn not_paused_returns_immediately() {
        let gate = PauseGate::default();
        tokio::time::timeout(Duration::from_millis(50), gate.wait_if_paused())
            .await
            .expect("should not block when not paused");
    }
}
