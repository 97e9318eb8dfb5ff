//! Whitespace-insensitive anchoring of comments to rendered text.
//!
//! A comment remembers the text that was selected and the char offset at
//! which the selection started. On every render the selected text is
//! searched for again in the new plain text; when it occurs several times
//! the occurrence closest to the remembered offset wins. Offsets are only
//! hints, so edits that shift text around do not break anchors as long as
//! the selected words are still present.

use crate::comments::Comment;
use std::ops::Range;

/// Collapses every run of ASCII whitespace into one space and trims both ends.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Normalized form of a text together with, for every normalized char,
/// the raw char range it stands for. A collapsed space covers its whole
/// whitespace run; every other char covers exactly one raw char.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    chars: Vec<char>,
    raw_ranges: Vec<Range<usize>>,
}

impl NormalizedText {
    pub fn build(raw: &str) -> Self {
        let mut chars = Vec::with_capacity(raw.len());
        let mut raw_ranges = Vec::with_capacity(raw.len());
        let mut whitespace_run: Option<Range<usize>> = None;

        for (idx, c) in raw.chars().enumerate() {
            if c.is_ascii_whitespace() {
                whitespace_run = Some(match whitespace_run {
                    Some(run) => run.start..idx + 1,
                    None => idx..idx + 1,
                });
                continue;
            }
            if let Some(run) = whitespace_run.take() {
                if !chars.is_empty() {
                    chars.push(' ');
                    raw_ranges.push(run);
                }
            }
            chars.push(c);
            raw_ranges.push(idx..idx + 1);
        }

        Self { chars, raw_ranges }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    /// Raw char offset where the normalized char at `index` starts.
    pub fn raw_start(&self, index: usize) -> Option<usize> {
        self.raw_ranges.get(index).map(|range| range.start)
    }

    /// Raw char range covered by the normalized range `[start, end)`.
    pub fn raw_span(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if start >= end {
            return None;
        }
        let first = self.raw_ranges.get(start)?;
        let last = self.raw_ranges.get(end - 1)?;
        Some(first.start..last.end)
    }

    /// Every start index of `needle`, overlapping matches included.
    pub fn occurrences(&self, needle: &[char]) -> Vec<usize> {
        let mut found = Vec::new();
        if needle.is_empty() || needle.len() > self.chars.len() {
            return found;
        }
        let mut from = 0;
        while let Some(pos) = find_from(&self.chars, needle, from) {
            found.push(pos);
            from = pos + 1;
        }
        found
    }
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Finds the span of `search_text` in `document_text` closest to `target_offset`.
///
/// Matching ignores whitespace width. The returned range is in raw chars of
/// `document_text` and covers whole whitespace runs inside the match. Ties
/// in distance go to the leftmost occurrence. Returns `None` when the
/// normalized search text is empty or does not occur.
pub fn locate(document_text: &str, search_text: &str, target_offset: usize) -> Option<Range<usize>> {
    let needle: Vec<char> = normalize(search_text).chars().collect();
    if needle.is_empty() {
        return None;
    }

    let haystack = NormalizedText::build(document_text);
    let mut best: Option<(usize, usize)> = None;

    for start in haystack.occurrences(&needle) {
        let Some(raw_start) = haystack.raw_start(start) else {
            continue;
        };
        let distance = raw_start.abs_diff(target_offset);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((start, distance));
        }
    }

    let (start, _) = best?;
    haystack.raw_span(start, start + needle.len())
}

/// Outcome of resolving one comment against the current rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAnchor {
    pub comment_id: String,
    /// Raw char span in the rendered plain text; `None` when orphaned.
    pub span: Option<Range<usize>>,
}

impl ResolvedAnchor {
    pub fn is_orphaned(&self) -> bool {
        self.span.is_none()
    }
}

/// Resolves every comment against `plain_text`, preserving comment order.
pub fn resolve_anchors(plain_text: &str, comments: &[Comment]) -> Vec<ResolvedAnchor> {
    comments
        .iter()
        .map(|comment| ResolvedAnchor {
            comment_id: comment.id.clone(),
            span: locate(plain_text, &comment.selected_text, comment.char_offset),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_slice(text: &str, span: &Range<usize>) -> String {
        text.chars().skip(span.start).take(span.len()).collect()
    }

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize("  a \t b\n\n c  "), "a b c");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
        assert_eq!(normalize("single"), "single");
    }

    #[test]
    fn normalize_is_idempotent() {
        for sample in ["", "  x  ", "a\n\nb\tc", "é  ü\r\nß", " lead", "trail "] {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn normalized_table_maps_runs() {
        let table = NormalizedText::build(" a  b\n");
        assert_eq!(table.as_string(), "a b");
        assert_eq!(table.raw_span(0, 1), Some(1..2));
        assert_eq!(table.raw_span(1, 2), Some(2..4));
        assert_eq!(table.raw_span(0, 3), Some(1..5));
    }

    #[test]
    fn picks_occurrence_nearest_offset() {
        let text = "The quick brown fox. The quick brown fox jumps.";
        assert_eq!(locate(text, "quick brown fox", 20), Some(25..40));
        assert_eq!(locate(text, "quick brown fox", 0), Some(4..19));
    }

    #[test]
    fn ties_go_to_leftmost() {
        let text = "ab xx ab";
        // Both occurrences are 3 chars from offset 3.
        assert_eq!(locate(text, "ab", 3), Some(0..2));
    }

    #[test]
    fn missing_text_is_none() {
        assert_eq!(locate("nothing here", "missing phrase", 0), None);
        assert_eq!(locate("anything", "   ", 0), None);
        assert_eq!(locate("", "a", 0), None);
    }

    #[test]
    fn whitespace_runs_extend_the_span() {
        let text = "alpha   beta\n\ngamma";
        let span = locate(text, "beta gamma", 0).unwrap();
        assert_eq!(raw_slice(text, &span), "beta\n\ngamma");

        let span = locate(text, "alpha\tbeta", 0).unwrap();
        assert_eq!(raw_slice(text, &span), "alpha   beta");
    }

    #[test]
    fn overlapping_occurrences_are_found() {
        let table = NormalizedText::build("aaaa");
        assert_eq!(table.occurrences(&['a', 'a']), vec![0, 1, 2]);
        assert_eq!(locate("aaaa", "aa", 2), Some(2..4));
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let text = "ééé word ééé word";
        assert_eq!(locate(text, "word", 13), Some(13..17));
        assert_eq!(locate(text, "word", 0), Some(4..8));
    }

    #[test]
    fn every_substring_matches_itself() {
        let samples = [
            "The quick brown fox.\n\nThe  quick brown fox jumps.",
            "a a a\tb  b\n c",
            "• item one\n• item two\n\n│ quoted text",
        ];
        for text in samples {
            let chars: Vec<char> = text.chars().collect();
            for start in 0..chars.len() {
                for end in start + 1..=chars.len() {
                    let sub: String = chars[start..end].iter().collect();
                    let trimmed = sub.trim_matches(|c: char| c.is_ascii_whitespace());
                    if trimmed.is_empty() {
                        continue;
                    }
                    let lead = sub.chars().take_while(|c| c.is_ascii_whitespace()).count();
                    let offset = start + lead;
                    let span = locate(text, &normalize(trimmed), offset)
                        .unwrap_or_else(|| panic!("no match for {trimmed:?}"));
                    assert_eq!(raw_slice(text, &span), trimmed, "text {text:?}");
                    assert_eq!(span.start, offset);
                }
            }
        }
    }

    #[test]
    fn resolve_keeps_comment_order_and_orphans() {
        let comments = vec![
            Comment::new("c1", "note", "brown fox", 0),
            Comment::new("c2", "note", "missing phrase", 0),
        ];
        let resolved = resolve_anchors("the brown fox", &comments);
        assert_eq!(resolved[0].comment_id, "c1");
        assert_eq!(resolved[0].span, Some(4..13));
        assert!(resolved[1].is_orphaned());
    }
}
