//! Typed messages exchanged over the notifier's pub/sub bus and the
//! `/batchProgressHub` real-time channel (spec §4.4, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MergeOutput, ProgressSnapshot, SegmentTask, Stage};

/// Messages a connected client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    JoinBatchGroup { batch_id: String },
    LeaveBatchGroup { batch_id: String },
    RequestProgressUpdate { batch_id: String },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageChangeInfo {
    pub previous: Option<Stage>,
    pub message: Option<String>,
}

/// Events the server pushes to subscribers, either fanned out per batch or
/// addressed to a single connection (`Connected`, `JoinedBatchGroup`, `Pong`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    Connected {
        connection_id: String,
        timestamp: DateTime<Utc>,
    },
    JoinedBatchGroup {
        batch_id: String,
    },
    LeftBatchGroup {
        batch_id: String,
    },
    ProgressUpdate {
        snapshot: ProgressSnapshot,
    },
    SegmentStatusUpdate {
        batch_id: String,
        task: SegmentTask,
    },
    StageChanged {
        batch_id: String,
        stage: Stage,
        info: Option<StageChangeInfo>,
    },
    BatchCompleted {
        batch_id: String,
        result: MergeOutput,
    },
    BatchFailed {
        batch_id: String,
        error: String,
    },
    CancellationRequested {
        batch_id: String,
    },
    SystemStatusUpdate {
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Emitted to a lagging subscriber in place of the events it missed
    /// (spec §4.4: drop-oldest with a `SubscriberLagged` indicator).
    SubscriberLagged {
        batch_id: String,
        skipped: u64,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
}

impl ServerEvent {
    /// The batch id this event is scoped to, if any — used to route events
    /// published on the per-batch topic versus connection-addressed replies.
    pub fn batch_id(&self) -> Option<&str> {
        match self {
            ServerEvent::ProgressUpdate { snapshot } => Some(&snapshot.batch_id),
            ServerEvent::SegmentStatusUpdate { batch_id, .. }
            | ServerEvent::StageChanged { batch_id, .. }
            | ServerEvent::BatchCompleted { batch_id, .. }
            | ServerEvent::BatchFailed { batch_id, .. }
            | ServerEvent::CancellationRequested { batch_id }
            | ServerEvent::SubscriberLagged { batch_id, .. }
            | ServerEvent::JoinedBatchGroup { batch_id }
            | ServerEvent::LeftBatchGroup { batch_id } => Some(batch_id),
            ServerEvent::Connected { .. }
            | ServerEvent::SystemStatusUpdate { .. }
            | ServerEvent::Pong { .. } => None,
        }
    }
}
