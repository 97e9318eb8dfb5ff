//! Marks resolved comment spans on rendered rich text.
//!
//! Highlighting never patches a previous result: every pass starts from
//! the text with all marks removed and rebuilds the run list, so the output
//! only depends on the text and the anchors passed in.

use crate::anchor::ResolvedAnchor;
use crate::rich_text::{RichLine, RichText, Run};
use std::ops::Range;

/// Returns a copy of `text` with every comment mark removed and adjacent
/// runs that became identical merged back together.
pub fn clear_highlights(text: &RichText) -> RichText {
    let lines = text
        .lines
        .iter()
        .map(|line| {
            let runs = line
                .runs
                .iter()
                .map(|run| Run::new(run.text.clone(), run.style.clone()))
                .collect();
            RichLine::with_runs(line.kind, runs)
        })
        .collect();
    RichText { lines }
}

/// Marks every resolved span of `anchors` on a fresh copy of `rendered`.
///
/// A span inside one run splits that run in place. A span crossing run or
/// line boundaries is marked on each run it touches; the line breaks
/// themselves carry no mark. Styles of the marked runs are left untouched,
/// the mark is carried as the comment id. Orphaned anchors are skipped.
pub fn apply_highlights(rendered: &RichText, anchors: &[ResolvedAnchor]) -> RichText {
    let mut text = clear_highlights(rendered);
    for anchor in anchors {
        if let Some(span) = &anchor.span {
            mark_span(&mut text, span.clone(), &anchor.comment_id);
        }
    }
    canonicalize(&mut text);
    text
}

fn mark_span(text: &mut RichText, span: Range<usize>, comment_id: &str) {
    if span.is_empty() {
        return;
    }

    let mut line_start = 0;
    for line in &mut text.lines {
        let line_len = line.char_len();
        let line_end = line_start + line_len;

        if span.start < line_end && span.end > line_start {
            let local = span.start.saturating_sub(line_start)..(span.end - line_start).min(line_len);
            mark_line(line, local, comment_id);
        }

        line_start = line_end + 1;
        if line_start >= span.end {
            break;
        }
    }
}

fn mark_line(line: &mut RichLine, local: Range<usize>, comment_id: &str) {
    let mut runs = Vec::with_capacity(line.runs.len() + 2);
    let mut column = 0;

    for run in line.runs.drain(..) {
        let len = run.char_len();
        let run_range = column..column + len;
        column += len;

        let start = local.start.max(run_range.start);
        let end = local.end.min(run_range.end);
        if start >= end {
            runs.push(run);
            continue;
        }

        let cut_start = start - run_range.start;
        let cut_end = end - run_range.start;
        let (before, middle, after) = split_run(&run, cut_start, cut_end);

        if let Some(before) = before {
            runs.push(before);
        }
        let mut middle = middle;
        if !middle.comment_ids.iter().any(|id| id == comment_id) {
            middle.comment_ids.push(comment_id.to_string());
        }
        runs.push(middle);
        if let Some(after) = after {
            runs.push(after);
        }
    }

    line.runs = runs;
}

/// Splits `run` at char positions `start` and `end`, keeping style and marks on each piece.
fn split_run(run: &Run, start: usize, end: usize) -> (Option<Run>, Run, Option<Run>) {
    let byte_at = |chars: usize| {
        run.text
            .char_indices()
            .nth(chars)
            .map(|(idx, _)| idx)
            .unwrap_or(run.text.len())
    };
    let start_byte = byte_at(start);
    let end_byte = byte_at(end);

    let piece = |range: Range<usize>| Run {
        text: run.text[range].to_string(),
        style: run.style.clone(),
        comment_ids: run.comment_ids.clone(),
    };

    let before = (start_byte > 0).then(|| piece(0..start_byte));
    let after = (end_byte < run.text.len()).then(|| piece(end_byte..run.text.len()));
    (before, piece(start_byte..end_byte), after)
}

fn canonicalize(text: &mut RichText) {
    for line in &mut text.lines {
        let runs = std::mem::take(&mut line.runs);
        for run in runs {
            line.push(run);
        }
    }
}
