//! Cursor, selection and scroll state of one document's content pane.

use crate::rich_text::RichText;
use ratatui::layout::Rect;
use std::ops::Range;
use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

impl CursorPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// One screen row of a wrapped rendered line. `start` and `len` are chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualRow {
    pub line: usize,
    pub start: usize,
    pub len: usize,
}

/// Wraps every rendered line at `width` display columns. Empty lines keep one row.
pub fn wrap_rows(text: &RichText, width: usize) -> Vec<VisualRow> {
    let width = width.max(1);
    let mut rows = Vec::new();

    for (line_idx, line) in text.lines.iter().enumerate() {
        let mut start = 0;
        let mut len = 0;
        let mut used = 0;

        for run in &line.runs {
            for ch in run.text.chars() {
                let w = ch.width().unwrap_or(0);
                if used + w > width && len > 0 {
                    rows.push(VisualRow {
                        line: line_idx,
                        start,
                        len,
                    });
                    start += len;
                    len = 0;
                    used = 0;
                }
                len += 1;
                used += w;
            }
        }

        rows.push(VisualRow {
            line: line_idx,
            start,
            len,
        });
    }

    rows
}

#[derive(Debug)]
pub struct ReaderView {
    pub cursor: CursorPosition,
    pub visual_anchor: Option<CursorPosition>,
    /// First visible visual row.
    pub scroll_offset: usize,
    pub scrolloff: usize,
    rows: Vec<VisualRow>,
    viewport_height: usize,
    dragging: bool,
}

impl Default for ReaderView {
    fn default() -> Self {
        Self {
            cursor: CursorPosition::default(),
            visual_anchor: None,
            scroll_offset: 0,
            scrolloff: 3,
            rows: Vec::new(),
            viewport_height: 0,
            dragging: false,
        }
    }
}

impl ReaderView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes wrapping for the current text and viewport, then keeps
    /// the cursor inside the text and on screen.
    pub fn layout(&mut self, text: &RichText, width: u16, height: u16) {
        self.rows = wrap_rows(text, width as usize);
        self.viewport_height = height as usize;
        self.clamp_cursor(text);
        self.ensure_cursor_visible();
    }

    pub fn rows(&self) -> &[VisualRow] {
        &self.rows
    }

    pub fn visible_rows(&self) -> &[VisualRow] {
        let start = self.scroll_offset.min(self.rows.len());
        let end = (start + self.viewport_height).min(self.rows.len());
        &self.rows[start..end]
    }

    pub fn cursor_offset(&self, text: &RichText) -> usize {
        text.offset_of(self.cursor.line, self.cursor.column)
    }

    pub fn move_left(&mut self) {
        self.cursor.column = self.cursor.column.saturating_sub(1);
        self.ensure_cursor_visible();
    }

    pub fn move_right(&mut self, text: &RichText) {
        self.cursor.column += 1;
        self.clamp_cursor(text);
        self.ensure_cursor_visible();
    }

    pub fn move_up(&mut self, text: &RichText) {
        self.cursor.line = self.cursor.line.saturating_sub(1);
        self.clamp_cursor(text);
        self.ensure_cursor_visible();
    }

    pub fn move_down(&mut self, text: &RichText) {
        self.cursor.line += 1;
        self.clamp_cursor(text);
        self.ensure_cursor_visible();
    }

    pub fn move_to_offset(&mut self, text: &RichText, offset: usize) {
        let (line, column) = text.position_of(offset);
        self.cursor = CursorPosition::new(line, column);
        self.clamp_cursor(text);
        self.ensure_cursor_visible();
    }

    pub fn start_selection(&mut self) {
        self.visual_anchor = Some(self.cursor);
    }

    pub fn clear_selection(&mut self) {
        self.visual_anchor = None;
        self.dragging = false;
    }

    pub fn is_selecting(&self) -> bool {
        self.visual_anchor.is_some()
    }

    /// Selected char range, inclusive of the char under the cursor.
    pub fn selection_range(&self, text: &RichText) -> Option<Range<usize>> {
        let anchor = self.visual_anchor?;
        let a = text.offset_of(anchor.line, anchor.column);
        let b = self.cursor_offset(text);
        let end = (a.max(b) + 1).min(text.char_len());
        let start = a.min(b);
        (start < end).then_some(start..end)
    }

    /// Selected text, its start offset and the 1-based line it starts on.
    pub fn selection(&self, text: &RichText) -> Option<(String, usize, usize)> {
        let range = self.selection_range(text)?;
        let (line, _) = text.position_of(range.start);
        Some((text.slice(range.start, range.end), range.start, line + 1))
    }

    pub fn scroll_down(&mut self, rows: usize) {
        let max = self.rows.len().saturating_sub(self.viewport_height);
        self.scroll_offset = (self.scroll_offset + rows).min(max);
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(rows);
    }

    /// Maps a screen cell inside `content_area` to a text position.
    /// A cell covered by the second half of a wide char maps to that char.
    pub fn screen_to_text_coords(
        &self,
        text: &RichText,
        x: u16,
        y: u16,
        content_area: Rect,
    ) -> Option<CursorPosition> {
        if x < content_area.x || y < content_area.y {
            return None;
        }
        if x >= content_area.x + content_area.width || y >= content_area.y + content_area.height {
            return None;
        }

        let row = self.rows.get(self.scroll_offset + (y - content_area.y) as usize)?;
        let cell = (x - content_area.x) as usize;
        let chars = text
            .lines
            .get(row.line)?
            .runs
            .iter()
            .flat_map(|run| run.text.chars())
            .skip(row.start)
            .take(row.len);

        let mut used = 0;
        let mut column = 0;
        for ch in chars {
            used += ch.width().unwrap_or(0);
            if used > cell {
                break;
            }
            column += 1;
        }

        Some(CursorPosition::new(
            row.line,
            row.start + column.min(row.len.saturating_sub(1)),
        ))
    }

    pub fn handle_mouse_down(&mut self, text: &RichText, x: u16, y: u16, content_area: Rect) -> bool {
        let Some(position) = self.screen_to_text_coords(text, x, y, content_area) else {
            return false;
        };
        self.cursor = position;
        self.visual_anchor = None;
        self.dragging = true;
        true
    }

    /// Extends a drag selection. Returns true when the selection changed.
    pub fn handle_mouse_drag(&mut self, text: &RichText, x: u16, y: u16, content_area: Rect) -> bool {
        if !self.dragging {
            return false;
        }
        let Some(position) = self.screen_to_text_coords(text, x, y, content_area) else {
            return false;
        };
        if self.visual_anchor.is_none() {
            self.visual_anchor = Some(self.cursor);
        }
        self.cursor = position;
        self.ensure_cursor_visible();
        true
    }

    pub fn handle_mouse_up(&mut self) {
        self.dragging = false;
    }

    fn clamp_cursor(&mut self, text: &RichText) {
        if text.lines.is_empty() {
            self.cursor = CursorPosition::default();
            return;
        }
        self.cursor.line = self.cursor.line.min(text.lines.len() - 1);
        let len = text.lines[self.cursor.line].char_len();
        self.cursor.column = self.cursor.column.min(len.saturating_sub(1));
    }

    fn cursor_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|row| row.line == self.cursor.line && row.start <= self.cursor.column)
            .unwrap_or(0)
    }

    fn ensure_cursor_visible(&mut self) {
        if self.viewport_height == 0 {
            return;
        }
        let row = self.cursor_row();
        let margin = self.scrolloff.min(self.viewport_height.saturating_sub(1) / 2);

        if row < self.scroll_offset + margin {
            self.scroll_offset = row.saturating_sub(margin);
        } else if row + margin >= self.scroll_offset + self.viewport_height {
            self.scroll_offset = row + margin + 1 - self.viewport_height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::render_markdown;

    #[test]
    fn wraps_long_lines_by_width() {
        let text = render_markdown("abcdefghij\n\nxy\n");
        let rows = wrap_rows(&text, 4);
        assert_eq!(
            rows,
            vec![
                VisualRow { line: 0, start: 0, len: 4 },
                VisualRow { line: 0, start: 4, len: 4 },
                VisualRow { line: 0, start: 8, len: 2 },
                VisualRow { line: 1, start: 0, len: 0 },
                VisualRow { line: 2, start: 0, len: 2 },
            ]
        );
    }

    #[test]
    fn wide_chars_count_two_columns() {
        let text = render_markdown("日本語\n");
        let rows = wrap_rows(&text, 4);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len, 2);
    }

    #[test]
    fn cursor_stays_inside_text() {
        let text = render_markdown("abc\n\nde\n");
        let mut view = ReaderView::new();
        view.layout(&text, 80, 10);

        for _ in 0..10 {
            view.move_right(&text);
        }
        assert_eq!(view.cursor, CursorPosition::new(0, 2));

        view.move_down(&text);
        assert_eq!(view.cursor, CursorPosition::new(1, 0));
        view.move_down(&text);
        view.move_down(&text);
        assert_eq!(view.cursor, CursorPosition::new(2, 0));
    }

    #[test]
    fn selection_includes_cursor_char() {
        let text = render_markdown("hello world\n");
        let mut view = ReaderView::new();
        view.layout(&text, 80, 10);
        view.move_to_offset(&text, 6);
        view.start_selection();
        for _ in 0..4 {
            view.move_right(&text);
        }

        assert_eq!(view.selection(&text), Some(("world".to_string(), 6, 1)));

        // Selecting backwards gives the same range.
        view.visual_anchor = Some(CursorPosition::new(0, 10));
        view.cursor = CursorPosition::new(0, 6);
        assert_eq!(view.selection_range(&text), Some(6..11));
    }

    #[test]
    fn selection_across_lines() {
        let text = render_markdown("one\n\ntwo\n");
        let mut view = ReaderView::new();
        view.layout(&text, 80, 10);
        view.move_to_offset(&text, 1);
        view.start_selection();
        view.move_to_offset(&text, 6);
        assert_eq!(view.selection(&text).unwrap().0, "ne\n\ntw");
    }

    #[test]
    fn scrolls_to_keep_cursor_visible() {
        let source: String = (0..30).map(|i| format!("line {i}\n\n")).collect();
        let text = render_markdown(&source);
        let mut view = ReaderView::new();
        view.layout(&text, 80, 10);

        for _ in 0..20 {
            view.move_down(&text);
        }
        assert!(view.scroll_offset > 0);
        assert!(view.cursor_row() < view.scroll_offset + 10);

        for _ in 0..20 {
            view.move_up(&text);
        }
        assert_eq!(view.scroll_offset, 0);
    }

    #[test]
    fn mouse_drag_selects() {
        let text = render_markdown("hello world\n");
        let mut view = ReaderView::new();
        let area = Rect::new(2, 1, 40, 5);
        view.layout(&text, area.width, area.height);

        assert!(view.handle_mouse_down(&text, 8, 1, area));
        assert!(view.handle_mouse_drag(&text, 12, 1, area));
        view.handle_mouse_up();

        assert_eq!(view.selection(&text).unwrap().0, "world");
        assert!(!view.handle_mouse_drag(&text, 3, 1, area));
    }

    #[test]
    fn clicks_outside_the_pane_are_ignored() {
        let text = render_markdown("hello\n");
        let mut view = ReaderView::new();
        let area = Rect::new(2, 1, 40, 5);
        view.layout(&text, area.width, area.height);

        assert_eq!(view.screen_to_text_coords(&text, 0, 1, area), None);
        assert_eq!(view.screen_to_text_coords(&text, 3, 4, area), None);
        assert_eq!(
            view.screen_to_text_coords(&text, 30, 1, area),
            Some(CursorPosition::new(0, 4))
        );
    }

    #[test]
    fn mouse_drag_after_wide_chars_selects_drawn_text() {
        let text = render_markdown("日本語 word\n");
        let mut view = ReaderView::new();
        let area = Rect::new(0, 0, 40, 5);
        view.layout(&text, area.width, area.height);

        // "日本語 " fills cells 0..7, "word" is drawn at cells 7..11.
        assert!(view.handle_mouse_down(&text, 7, 0, area));
        assert!(view.handle_mouse_drag(&text, 10, 0, area));
        view.handle_mouse_up();
        assert_eq!(view.selection(&text).unwrap().0, "word");

        // Both cells of a wide char map to it.
        assert_eq!(
            view.screen_to_text_coords(&text, 2, 0, area),
            Some(CursorPosition::new(0, 1))
        );
        assert_eq!(
            view.screen_to_text_coords(&text, 3, 0, area),
            Some(CursorPosition::new(0, 1))
        );
    }
}
