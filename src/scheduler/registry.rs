//! In-memory batch registry (spec §3 Lifecycle, §9 runtime-global
//! singletons): batches live only in memory, owned exclusively by the
//! scheduler, and are reaped by TTL or explicit cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::domain::{Batch, BatchSummary};

/// Shared `batch_id -> batch` map. Per spec §5's shared-resources note, only
/// the owning scheduler mutates `tasks`/`progress`; the cancellation
/// controller mutates its own narrow subfields via the controller's own
/// state, never reaching into `Batch` directly.
#[derive(Default)]
pub struct BatchRegistry {
    batches: DashMap<String, Arc<RwLock<Batch>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, batch: Batch) -> Arc<RwLock<Batch>> {
        let handle = Arc::new(RwLock::new(batch));
        let batch_id = {
            // Safe: insert happens before any other task can observe this id.
            let guard = handle.try_read().expect("freshly created batch is uncontended");
            guard.batch_id.clone()
        };
        self.batches.insert(batch_id, handle.clone());
        handle
    }

    pub fn get(&self, batch_id: &str) -> Option<Arc<RwLock<Batch>>> {
        self.batches.get(batch_id).map(|e| e.clone())
    }

    pub fn remove(&self, batch_id: &str) {
        self.batches.remove(batch_id);
    }

    pub async fn list_by_user(&self, user_id: &str) -> Vec<BatchSummary> {
        let mut out = Vec::new();
        for entry in self.batches.iter() {
            let batch = entry.value().read().await;
            if batch.user_id.as_deref() == Some(user_id) {
                out.push(batch.summary());
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Remove terminal batches whose terminal transition is older than
    /// `older_than`, returning the count removed.
    pub async fn cleanup(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or_default();
        let mut to_remove = Vec::new();
        for entry in self.batches.iter() {
            let batch = entry.value().read().await;
            if batch.stage.is_terminal() && batch.created_at < cutoff {
                to_remove.push(entry.key().clone());
            }
        }
        let count = to_remove.len();
        for id in to_remove {
            self.batches.remove(&id);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let registry = BatchRegistry::new();
        let batch = Batch::new("b1", Some("u1".into()), "text", vec![]);
        registry.insert(batch);
        let handle = registry.get("b1").unwrap();
        assert_eq!(handle.read().await.batch_id, "b1");
    }

    #[tokio::test]
    async fn list_by_user_filters_and_sorts_newest_first() {
        let registry = BatchRegistry::new();
        registry.insert(Batch::new("b1", Some("u1".into()), "t", vec![]));
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.insert(Batch::new("b2", Some("u1".into()), "t", vec![]));
        registry.insert(Batch::new("b3", Some("u2".into()), "t", vec![]));

        let summaries = registry.list_by_user("u1").await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].batch_id, "b2");
    }

    #[tokio::test]
    async fn cleanup_removes_only_terminal_batches_past_ttl() {
        let registry = BatchRegistry::new();
        let mut fresh = Batch::new("b1", None, "t", vec![]);
        fresh.stage = Stage::Completed;
        registry.insert(fresh);

        let mut still_running = Batch::new("b2", None, "t", vec![]);
        still_running.stage = Stage::BatchProcessing;
        registry.insert(still_running);

        let removed = registry.cleanup(Duration::from_secs(3600)).await;
        assert_eq!(removed, 0);
        assert_eq!(registry.len(), 2);

        let removed = registry.cleanup(Duration::from_secs(0)).await;
        assert_eq!(removed, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("b2").is_some());
    }
}
