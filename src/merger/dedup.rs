//! Deduplication pass (spec §4.6 step 1): collapse near-duplicate adjacent
//! segment summaries using a token-set Jaccard similarity score.

use std::collections::HashSet;

use crate::domain::{MergeParams, SegmentTask};

/// Collapse summaries that are sufficiently similar to a prior summary
/// within `context_window` positions into the earlier one. Returns the kept
/// tasks (in original order) and a count of how many were dropped.
pub fn deduplicate<'a>(
    completed: &[&'a SegmentTask],
    params: &MergeParams,
) -> (Vec<&'a SegmentTask>, usize) {
    let mut kept: Vec<&SegmentTask> = Vec::with_capacity(completed.len());
    let mut removed = 0usize;

    for task in completed {
        let text = task.result.as_deref().unwrap_or_default();
        let window_start = kept.len().saturating_sub(params.context_window);
        let is_duplicate = kept[window_start..].iter().any(|prior| {
            let prior_text = prior.result.as_deref().unwrap_or_default();
            jaccard_similarity(text, prior_text) >= params.similarity_threshold
        });

        if is_duplicate {
            removed += 1;
        } else {
            kept.push(task);
        }
    }

    (kept, removed)
}

/// Token-set Jaccard similarity: `|A ∩ B| / |A ∪ B|` over lowercased
/// whitespace-separated tokens.
fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Segment, SegmentType, TaskStatus};

    fn task(index: usize, result: &str) -> SegmentTask {
        let mut t = SegmentTask::new(Segment::new(index, "t", "c", 0, 1, SegmentType::Paragraph));
        t.status = TaskStatus::Completed;
        t.result = Some(result.to_string());
        t
    }

    #[test]
    fn identical_adjacent_summaries_collapse() {
        let a = task(0, "the quick brown fox jumps");
        let b = task(1, "the quick brown fox jumps");
        let tasks = vec![&a, &b];
        let (kept, removed) = deduplicate(&tasks, &MergeParams::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(removed, 1);
    }

    #[test]
    fn dissimilar_summaries_are_kept() {
        let a = task(0, "the weather today is sunny and warm");
        let b = task(1, "quarterly revenue grew by twelve percent");
        let tasks = vec![&a, &b];
        let (kept, removed) = deduplicate(&tasks, &MergeParams::default());
        assert_eq!(kept.len(), 2);
        assert_eq!(removed, 0);
    }

    #[test]
    fn similarity_checked_within_context_window_only() {
        let a = task(0, "alpha beta gamma delta epsilon");
        let b = task(1, "zeta eta theta iota kappa");
        let c = task(2, "lambda mu nu xi omicron");
        let d = task(3, "alpha beta gamma delta epsilon");
        let mut params = MergeParams::default();
        params.context_window = 1;
        let tasks = vec![&a, &b, &c, &d];
        let (kept, removed) = deduplicate(&tasks, &params);
        // d is identical to a, but a is outside the 1-segment context window.
        assert_eq!(kept.len(), 4);
        assert_eq!(removed, 0);
    }
}
