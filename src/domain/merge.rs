//! Merge-stage domain types (spec §3, §4.6).

use serde::{Deserialize, Serialize};

pub use super::cancellation::PartialResult;

/// Merge strategy selecting the target-length and tone defaults applied
/// during length control (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    Concise,
    Balanced,
    Detailed,
    Custom,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Balanced
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeUserPreferences {
    pub tone: Option<String>,
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeParams {
    pub strategy: MergeStrategy,
    pub target_length_ratio: f64,
    pub min_length_chars: usize,
    pub max_length_chars: usize,
    pub length_tolerance: f64,
    pub similarity_threshold: f64,
    pub context_window: usize,
    pub enable_llm_assist: bool,
    pub min_segments_for_llm: usize,
    pub fallback_to_rule_based: bool,
    pub preferences: MergeUserPreferences,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            strategy: MergeStrategy::default(),
            target_length_ratio: 0.6,
            min_length_chars: 100,
            max_length_chars: 2000,
            length_tolerance: 0.15,
            similarity_threshold: 0.8,
            context_window: 3,
            enable_llm_assist: true,
            min_segments_for_llm: 5,
            fallback_to_rule_based: true,
            preferences: MergeUserPreferences {
                tone: None,
                focus: None,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MergeQuality {
    pub coherence: f64,
    pub completeness: f64,
    pub conciseness: f64,
    pub accuracy: f64,
}

impl MergeQuality {
    /// Minima the scores must clear for the merge to be accepted rather
    /// than rejected back to the rule-based draft (spec §4.6 step 5).
    pub fn meets_minima(&self) -> bool {
        self.coherence >= 0.7 && self.completeness >= 0.8 && self.conciseness >= 0.6 && self.accuracy >= 0.75
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeStats {
    pub input_length: usize,
    pub output_length: usize,
    pub compression_ratio: f64,
    pub segments_merged: usize,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutput {
    pub summary: String,
    pub stats: MergeStats,
    pub quality: MergeQuality,
    pub strategy_used: MergeStrategy,
    pub processing_ms: i64,
}
