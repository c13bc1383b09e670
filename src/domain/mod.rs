//! Core domain types shared across the orchestrator's components.

pub mod batch;
pub mod cancellation;
pub mod document;
pub mod merge;
pub mod progress;
pub mod segment;
pub mod task;
pub mod value_objects;

pub use batch::{Batch, BatchSummary, Stage};
pub use cancellation::{
    CancelReason, CancellationRequest, PartialResult, PartialResultQuality, QualityBucket,
    RecommendedAction,
};
pub use document::{Document, SourceFormat};
pub use merge::{MergeOutput, MergeParams, MergeQuality, MergeStats, MergeStrategy, MergeUserPreferences};
pub use progress::{ProgressSnapshot, Throughput};
pub use segment::{Segment, SegmentType};
pub use task::{SegmentTask, TaskStatus};
pub use value_objects::RetryPolicy;
