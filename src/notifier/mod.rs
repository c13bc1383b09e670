//! Notifier (C4): pub/sub fan-out bus keyed by batch id, plus the
//! connection-to-batch-group bookkeeping used by `/batchProgressHub`.

pub mod events;
pub mod hub;

use std::collections::HashSet;

use parking_lot::Mutex;

pub use events::{ClientMessage, ServerEvent, StageChangeInfo};
pub use hub::{NotifierHub, Subscription, SubscriptionEvent};

/// Tracks which batch groups a single WebSocket connection has joined, so a
/// disconnect can clean up every topic subscription (spec §6, §4.5: the
/// connection-to-batch mapping is updated on join/leave/disconnect under a
/// lock).
pub struct ConnectionGroups {
    joined: Mutex<HashSet<String>>,
}

impl Default for ConnectionGroups {
    fn default() -> Self {
        Self {
            joined: Mutex::new(HashSet::new()),
        }
    }
}

impl ConnectionGroups {
    pub fn join(&self, batch_id: &str) -> bool {
        self.joined.lock().insert(batch_id.to_string())
    }

    pub fn leave(&self, batch_id: &str) -> bool {
        self.joined.lock().remove(batch_id)
    }

    pub fn joined_batches(&self) -> Vec<String> {
        self.joined.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent_and_tracked() {
        let groups = ConnectionGroups::default();
        assert!(groups.join("b1"));
        assert!(!groups.join("b1"));
        assert_eq!(groups.joined_batches(), vec!["b1".to_string()]);
        assert!(groups.leave("b1"));
        assert!(groups.joined_batches().is_empty());
    }
}
