//! Segment: a bounded, ordered slice of an input document (spec §3).

use serde::{Deserialize, Serialize};

/// Kind of content a segment holds, detected by lightweight heuristics
/// during segmentation (spec §4.1 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    Paragraph,
    Code,
    Table,
    List,
    Quote,
}

/// An ordered, bounded, semantically coherent chunk of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Dense 0-based index within the batch.
    pub index: usize,
    /// Short label, either LLM/first-sentence derived or "Segment {i+1}".
    pub title: String,
    /// The segment's text content.
    pub content: String,
    /// Byte offset into the original text where this segment starts.
    pub start_offset: usize,
    /// Byte offset into the original text where this segment ends.
    pub end_offset: usize,
    #[serde(rename = "type")]
    pub kind: SegmentType,
}

impl Segment {
    pub fn new(
        index: usize,
        title: impl Into<String>,
        content: impl Into<String>,
        start_offset: usize,
        end_offset: usize,
        kind: SegmentType,
    ) -> Self {
        Self {
            index,
            title: title.into(),
            content: content.into(),
            start_offset,
            end_offset,
            kind,
        }
    }

    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
