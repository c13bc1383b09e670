//! LLM-assisted segmentation path (spec §4.1): ask the backend to mark
//! segment boundaries, validate the result, and fall back silently to the
//! rule-based path on any problem.

use tokio_util::sync::CancellationToken;

use super::rules::detect_segment_type;
use super::SegmentationConfig;
use crate::domain::Segment;
use crate::error::{Error, Result};
use crate::summarizer::Summarizer;

const SEGMENT_MARKER: &str = "<<<SEGMENT>>>";

fn build_prompt(text: &str, config: &SegmentationConfig) -> String {
    format!(
        "Split the following document into coherent segments of at most {} characters each. \
         Separate each segment with the exact marker `{SEGMENT_MARKER}` on its own line. \
         Do not add commentary outside the segments.\n\n{text}",
        config.max_segment_len
    )
}

/// Request segmentation from `summarizer`, validate the response, and
/// produce `Segment`s anchored to their byte offsets in `text`. Any
/// validation failure or backend error is surfaced as `Err` so the caller
/// can fall back to the rule-based path.
pub async fn segment_with_llm(
    summarizer: &dyn Summarizer,
    text: &str,
    config: &SegmentationConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Segment>> {
    let prompt = build_prompt(text, config);
    let response = summarizer.summarize(&prompt, cancel).await?;

    let pieces: Vec<&str> = response
        .split(SEGMENT_MARKER)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    if pieces.is_empty() {
        return Err(Error::ProviderProtocol(
            "llm segmentation produced no segments".into(),
        ));
    }

    for piece in &pieces {
        if piece.chars().count() > config.max_segment_len {
            return Err(Error::ProviderProtocol(format!(
                "llm segment exceeds max_segment_len ({} > {})",
                piece.chars().count(),
                config.max_segment_len
            )));
        }
    }

    // Anchor each returned piece to its first occurrence in the source text,
    // scanning forward so offsets stay monotonic even with repeated content.
    let mut cursor = 0usize;
    let mut segments = Vec::with_capacity(pieces.len());
    for (index, piece) in pieces.iter().enumerate() {
        let found = text[cursor..].find(piece).ok_or_else(|| {
            Error::ProviderProtocol("llm segment text not found in source document".into())
        })?;
        let start = cursor + found;
        let end = start + piece.len();
        let kind = detect_segment_type(piece);
        let title = if config.generate_titles {
            super::rules::derive_title(piece, true)
        } else {
            format!("Segment {}", index + 1)
        };
        segments.push(Segment::new(index, title, piece.to_string(), start, end, kind));
        cursor = end;
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubSummarizer {
        response: String,
    }

    #[async_trait]
    impl Summarizer for StubSummarizer {
        fn name(&self) -> &str {
            "stub"
        }

        async fn summarize(&self, _text: &str, _cancel: &CancellationToken) -> Result<String> {
            Ok(self.response.clone())
        }

        async fn health(&self, _cancel: &CancellationToken) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn valid_response_produces_anchored_segments() {
        let text = "First chunk of text. Second chunk of text.";
        let stub = StubSummarizer {
            response: format!("First chunk of text. {SEGMENT_MARKER} Second chunk of text."),
        };
        let cancel = CancellationToken::new();
        let segments = segment_with_llm(&stub, text, &SegmentationConfig::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].content, "First chunk of text.");
        assert_eq!(segments[1].content, "Second chunk of text.");
    }

    #[tokio::test]
    async fn oversized_piece_is_rejected() {
        let text = "x".repeat(10);
        let stub = StubSummarizer {
            response: "x".repeat(10),
        };
        let mut config = SegmentationConfig::default();
        config.max_segment_len = 5;
        let cancel = CancellationToken::new();
        let err = segment_with_llm(&stub, &text, &config, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ProviderProtocol);
    }
}
