//! Rule-based segmentation algorithm (spec §4.1, steps 1-5).

use std::sync::OnceLock;

use regex::Regex;

use super::SegmentationConfig;
use crate::domain::{Segment, SegmentType};

fn paragraph_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*\n+").expect("static paragraph boundary regex"))
}

/// Split `text` into paragraph byte spans on blank-line boundaries.
fn split_paragraphs(text: &str) -> Vec<(usize, usize)> {
    let re = paragraph_boundary_re();
    let mut spans = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            spans.push((last, m.start()));
        }
        last = m.end();
    }
    if last < text.len() {
        spans.push((last, text.len()));
    }
    if spans.is_empty() {
        spans.push((0, text.len()));
    }
    spans
}

/// Classify a block's dominant structure via line-prefix heuristics
/// (spec §4.1 step 3).
pub fn detect_segment_type(content: &str) -> SegmentType {
    if content.trim_start().starts_with("```") {
        return SegmentType::Code;
    }

    let mut total = 0usize;
    let mut quote = 0usize;
    let mut list = 0usize;
    let mut table = 0usize;
    for line in content.lines() {
        let l = line.trim_start();
        if l.is_empty() {
            continue;
        }
        total += 1;
        if l.starts_with('>') {
            quote += 1;
        } else if l.starts_with("- ") || l.starts_with("* ") || l.starts_with("+ ") || is_numbered_item(l) {
            list += 1;
        } else if l.starts_with('|') {
            table += 1;
        }
    }

    if total == 0 {
        return SegmentType::Paragraph;
    }
    let frac = |n: usize| n as f64 / total as f64;
    if frac(table) > 0.5 {
        SegmentType::Table
    } else if frac(quote) > 0.5 {
        SegmentType::Quote
    } else if frac(list) > 0.5 {
        SegmentType::List
    } else {
        SegmentType::Paragraph
    }
}

fn is_numbered_item(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && line[digits.len()..].starts_with(". ")
}

/// `title = first sentence, truncated to 30 chars (+ "…" if truncated)`.
fn first_sentence_title(content: &str, terminators: &[char]) -> String {
    let trimmed = content.trim_start();
    let end = trimmed
        .find(|c: char| terminators.contains(&c))
        .map(|i| i + 1)
        .unwrap_or(trimmed.len());
    truncate_chars(trimmed[..end].trim(), 30)
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}…")
    }
}

pub fn derive_title(content: &str, generate_titles: bool) -> String {
    if generate_titles {
        first_sentence_title(content, &['.', '。', '!', '!', '?', '?'])
    } else {
        String::new()
    }
}

/// Split `content` (a paragraph or special block exceeding its limit) into
/// bounded byte spans relative to `content`'s own start (spec §4.1 step 2).
fn split_into_bounded_spans(content: &str, config: &SegmentationConfig) -> Vec<(usize, usize)> {
    let sentences = split_sentences(content, &config.sentence_terminators);
    let mut spans = Vec::new();
    let mut buf_start = 0usize;
    let mut buf_chars = 0usize;

    for (s_start, s_end) in sentences {
        let sentence = &content[s_start..s_end];
        let sentence_chars = sentence.chars().count();

        if sentence_chars > config.max_segment_len {
            if buf_chars > 0 {
                spans.push((buf_start, s_start));
                buf_chars = 0;
            }
            for (h_start, h_end) in hard_split_oversized(sentence, config) {
                spans.push((s_start + h_start, s_start + h_end));
            }
            buf_start = s_end;
            continue;
        }

        if buf_chars > 0 && buf_chars + sentence_chars > config.max_segment_len {
            spans.push((buf_start, s_start));
            buf_start = s_start;
            buf_chars = 0;
        }
        buf_chars += sentence_chars;
    }

    if buf_chars > 0 || buf_start < content.len() {
        spans.push((buf_start, content.len()));
    }
    spans
}

/// Split `text` at sentence-terminator positions, inclusive of the
/// terminator character in the preceding span.
fn split_sentences(text: &str, terminators: &[char]) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0usize;
    for (byte_idx, ch) in text.char_indices() {
        if terminators.contains(&ch) {
            let end = byte_idx + ch.len_utf8();
            spans.push((start, end));
            start = end;
        }
    }
    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

/// Hard-split an oversized sentence at the nearest terminator within
/// `[max*context_limit_buffer, max]`; fall back to a flat `max_segment_len`
/// cut when no terminator falls in that window (spec §4.1 step 2).
fn hard_split_oversized(text: &str, config: &SegmentationConfig) -> Vec<(usize, usize)> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let total_chars = chars.len();
    let max_chars = config.max_segment_len;
    let min_chars = ((max_chars as f64) * config.context_limit_buffer) as usize;

    let mut spans = Vec::new();
    let mut cursor = 0usize;
    while cursor < total_chars {
        let remaining = total_chars - cursor;
        if remaining <= max_chars {
            let start_byte = chars[cursor].0;
            spans.push((start_byte, text.len()));
            break;
        }

        let hi = (cursor + max_chars).min(total_chars);
        let lo = (cursor + min_chars).min(hi);
        let split_at = (lo..hi)
            .rev()
            .find(|&idx| config.sentence_terminators.contains(&chars[idx].1))
            .map(|idx| idx + 1)
            .unwrap_or(cursor + max_chars)
            .min(total_chars);

        let start_byte = chars[cursor].0;
        let end_byte = if split_at < total_chars {
            chars[split_at].0
        } else {
            text.len()
        };
        spans.push((start_byte, end_byte));
        cursor = split_at;
    }
    spans
}

/// The full rule-based path (spec §4.1 steps 1-5).
pub fn segment_rule_based(text: &str, config: &SegmentationConfig) -> Vec<Segment> {
    let paragraph_spans = if config.preserve_paragraphs {
        split_paragraphs(text)
    } else {
        vec![(0, text.len())]
    };

    let mut raw: Vec<(usize, usize, SegmentType)> = Vec::new();
    for (p_start, p_end) in paragraph_spans {
        let content = &text[p_start..p_end];
        if content.trim().is_empty() {
            continue;
        }
        let kind = detect_segment_type(content);
        let limit = if matches!(kind, SegmentType::Paragraph) {
            config.max_segment_len
        } else {
            ((config.max_segment_len as f64) * 1.5) as usize
        };

        if content.chars().count() <= limit {
            raw.push((p_start, p_end, kind));
        } else {
            for (s, e) in split_into_bounded_spans(content, config) {
                raw.push((p_start + s, p_start + e, kind));
            }
        }
    }

    raw.into_iter()
        .enumerate()
        .map(|(index, (start, end, kind))| {
            let content = &text[start..end];
            let title = if config.generate_titles {
                derive_title(content, true)
            } else {
                format!("Segment {}", index + 1)
            };
            Segment::new(index, title, content.to_string(), start, end, kind)
        })
        .collect()
}
