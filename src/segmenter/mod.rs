//! Segmenter (C2): splits a document into ordered, bounded, semantically
//! coherent chunks.

pub mod llm_assist;
pub mod quality;
pub mod rules;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::Segment;
use crate::error::{Error, Result};
use crate::summarizer::Summarizer;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationConfig {
    pub max_segment_len: usize,
    pub trigger_len: usize,
    pub preserve_paragraphs: bool,
    pub generate_titles: bool,
    pub enable_llm_assist: bool,
    pub sentence_terminators: Vec<char>,
    /// Buffer applied when hard-splitting an oversized sentence, expressed as
    /// a fraction of `max_segment_len` (spec: `ContextLimitBuffer`, default 0.8).
    pub context_limit_buffer: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_segment_len: 2000,
            trigger_len: 2048,
            preserve_paragraphs: true,
            generate_titles: true,
            enable_llm_assist: true,
            sentence_terminators: vec!['.', '。', '!', '!', '?', '?'],
            context_limit_buffer: 0.8,
        }
    }
}

impl SegmentationConfig {
    /// Clamp `max_segment_len` into the spec's allowed band (500-5000).
    pub fn clamped(mut self) -> Self {
        self.max_segment_len = self.max_segment_len.clamp(500, 5000);
        self
    }
}

pub struct Segmenter {
    config: SegmentationConfig,
    llm: Option<Arc<dyn Summarizer>>,
}

impl Segmenter {
    pub fn new(config: SegmentationConfig, llm: Option<Arc<dyn Summarizer>>) -> Self {
        Self { config, llm }
    }

    /// Segment `text` into ordered chunks, applying the short-circuit,
    /// LLM-assist, and rule-based paths described in spec §4.1.
    pub async fn segment(&self, text: &str, cancel: &CancellationToken) -> Result<Vec<Segment>> {
        if text.is_empty() {
            return Err(Error::InvalidInput("text must not be empty".into()));
        }

        if text.chars().count() <= self.config.trigger_len {
            return Ok(vec![Segment::new(
                0,
                rules::derive_title(text, self.config.generate_titles),
                text.to_string(),
                0,
                text.len(),
                rules::detect_segment_type(text),
            )]);
        }

        if self.config.enable_llm_assist {
            if let Some(summarizer) = &self.llm {
                match llm_assist::segment_with_llm(summarizer.as_ref(), text, &self.config, cancel).await {
                    Ok(segments) => return Ok(segments),
                    Err(e) => {
                        tracing::debug!(error = %e, "llm-assisted segmentation failed, falling back to rules");
                    }
                }
            }
        }

        Ok(rules::segment_rule_based(text, &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_text_yields_single_segment() {
        let segmenter = Segmenter::new(SegmentationConfig::default(), None);
        let cancel = CancellationToken::new();
        let segments = segmenter.segment("short text here.", &cancel).await.unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].index, 0);
    }

    #[tokio::test]
    async fn empty_text_is_invalid_input() {
        let segmenter = Segmenter::new(SegmentationConfig::default(), None);
        let cancel = CancellationToken::new();
        let err = segmenter.segment("", &cancel).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }
}
