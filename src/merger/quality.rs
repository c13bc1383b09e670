//! Merge quality scoring (spec §4.6 step 5): coherence, completeness,
//! conciseness, and accuracy heuristics in `[0,1]`.

use crate::domain::MergeQuality;

/// Score a merged `summary` against how many segments it drew from
/// (`segments_merged`) out of how many completed (`total_completed`).
pub fn score(summary: &str, segments_merged: usize, total_completed: usize) -> MergeQuality {
    if summary.trim().is_empty() {
        return MergeQuality {
            coherence: 0.0,
            completeness: 0.0,
            conciseness: 0.0,
            accuracy: 0.0,
        };
    }

    MergeQuality {
        coherence: coherence_score(summary),
        completeness: completeness_score(segments_merged, total_completed),
        conciseness: conciseness_score(summary),
        accuracy: accuracy_score(summary),
    }
}

/// Fraction of paragraphs that end on a sentence terminator, as a proxy for
/// readability/coherence.
fn coherence_score(summary: &str) -> f64 {
    let paragraphs: Vec<&str> = summary.split("\n\n").filter(|p| !p.trim().is_empty()).collect();
    if paragraphs.is_empty() {
        return 0.0;
    }
    let well_formed = paragraphs
        .iter()
        .filter(|p| p.trim_end().ends_with(['.', '!', '?', '。', '!', '?']))
        .count();
    well_formed as f64 / paragraphs.len() as f64
}

/// How much of the completed segment set survived into the merged output
/// (post-dedup), as a fraction of the segments that could have contributed.
fn completeness_score(segments_merged: usize, total_completed: usize) -> f64 {
    if total_completed == 0 {
        0.0
    } else {
        (segments_merged as f64 / total_completed as f64).min(1.0)
    }
}

/// Penalize summaries with long runs of repeated whitespace/short filler,
/// rewarding a moderate average sentence length.
fn conciseness_score(summary: &str) -> f64 {
    let word_count = summary.split_whitespace().count().max(1);
    let sentence_count = summary
        .matches(['.', '!', '?'])
        .count()
        .max(1);
    let avg_words_per_sentence = word_count as f64 / sentence_count as f64;
    // Sentences around 12-25 words score highest; far outside that band
    // suggests either fragment soup or run-on prose.
    let ideal_low = 12.0;
    let ideal_high = 25.0;
    if avg_words_per_sentence >= ideal_low && avg_words_per_sentence <= ideal_high {
        1.0
    } else if avg_words_per_sentence < ideal_low {
        (avg_words_per_sentence / ideal_low).clamp(0.0, 1.0)
    } else {
        (ideal_high / avg_words_per_sentence).clamp(0.0, 1.0)
    }
}

/// Rule-based proxy for factual accuracy: penalizes suspiciously short
/// output (likely over-compressed) relative to a reasonable summary floor.
/// True factual grounding is outside what a rule-based pass can assess; an
/// LLM judge would replace this in a richer deployment.
fn accuracy_score(summary: &str) -> f64 {
    let len = summary.chars().count();
    if len < 20 {
        0.3
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_scores_zero() {
        let q = score("", 0, 0);
        assert_eq!(q.coherence, 0.0);
        assert_eq!(q.completeness, 0.0);
    }

    #[test]
    fn well_formed_summary_scores_highly() {
        let summary = "This is a well formed paragraph with a clear structure and an ending period. It reads coherently across two full sentences, each carrying a reasonable amount of detail.";
        let q = score(summary, 4, 4);
        assert_eq!(q.completeness, 1.0);
        assert!(q.coherence > 0.9);
    }
}
