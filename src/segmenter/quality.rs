//! Segmentation quality assessment, exposed for tests (spec §4.1).

use crate::domain::Segment;

const SEMANTIC_WEIGHT: f64 = 0.4;
const PARAGRAPH_WEIGHT: f64 = 0.3;
const LENGTH_BALANCE_WEIGHT: f64 = 0.3;
const ACCEPTABLE_THRESHOLD: f64 = 60.0;

const TERMINATORS: [char; 6] = ['.', '。', '!', '!', '?', '?'];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationQuality {
    pub semantic_integrity: f64,
    pub paragraph_integrity: f64,
    pub length_balance: f64,
    pub overall: f64,
}

impl SegmentationQuality {
    pub fn acceptable(&self) -> bool {
        self.overall >= ACCEPTABLE_THRESHOLD
    }
}

/// Score a set of segments on [0,100] from three weighted components:
/// semantic integrity (fraction ending on a sentence terminator), paragraph
/// integrity (fraction that don't look mid-paragraph-cut), and
/// length-balance (inverse coefficient of variation of segment lengths).
pub fn assess(segments: &[Segment]) -> SegmentationQuality {
    if segments.is_empty() {
        return SegmentationQuality {
            semantic_integrity: 0.0,
            paragraph_integrity: 0.0,
            length_balance: 0.0,
            overall: 0.0,
        };
    }

    let semantic_integrity = semantic_integrity_score(segments);
    let paragraph_integrity = paragraph_integrity_score(segments);
    let length_balance = length_balance_score(segments);

    let overall = semantic_integrity * SEMANTIC_WEIGHT
        + paragraph_integrity * PARAGRAPH_WEIGHT
        + length_balance * LENGTH_BALANCE_WEIGHT;

    SegmentationQuality {
        semantic_integrity,
        paragraph_integrity,
        length_balance,
        overall,
    }
}

fn semantic_integrity_score(segments: &[Segment]) -> f64 {
    let ending_well = segments
        .iter()
        .filter(|s| s.content.trim_end().ends_with(TERMINATORS.as_slice()))
        .count();
    100.0 * ending_well as f64 / segments.len() as f64
}

fn paragraph_integrity_score(segments: &[Segment]) -> f64 {
    let intact = segments
        .iter()
        .filter(|s| {
            let trimmed = s.content.trim();
            !trimmed.is_empty()
                && trimmed
                    .chars()
                    .next()
                    .map(|c| c.is_uppercase() || !c.is_alphabetic())
                    .unwrap_or(true)
        })
        .count();
    100.0 * intact as f64 / segments.len() as f64
}

fn length_balance_score(segments: &[Segment]) -> f64 {
    let lens: Vec<f64> = segments.iter().map(|s| s.len() as f64).collect();
    let mean = lens.iter().sum::<f64>() / lens.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = lens.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / lens.len() as f64;
    let coefficient_of_variation = variance.sqrt() / mean;
    (100.0 * (1.0 - coefficient_of_variation)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SegmentType;

    fn seg(content: &str, index: usize) -> Segment {
        Segment::new(index, format!("s{index}"), content, 0, content.len(), SegmentType::Paragraph)
    }

    #[test]
    fn uniform_well_terminated_segments_score_highly() {
        let segments = vec![
            seg("First sentence ends cleanly.", 0),
            seg("Second sentence ends cleanly.", 1),
            seg("Third sentence ends cleanly.", 2),
        ];
        let quality = assess(&segments);
        assert!(quality.acceptable());
        assert!(quality.overall > 80.0);
    }

    #[test]
    fn empty_segments_score_zero() {
        let quality = assess(&[]);
        assert_eq!(quality.overall, 0.0);
        assert!(!quality.acceptable());
    }
}
