use crate::markdown::{
    BlockKind, BlockNode, ColumnAlign, Inline, Inlines, ListEntry, MarkdownTree, Marks, Table,
};
use crate::rich_text::{LineKind, RichLine, RichText, Run, RunStyle, Tint};

const RULE_WIDTH: usize = 40;

/// Markdown AST to [`RichText`] renderer.
///
/// Rendering is a pure tree walk: identical documents always produce
/// identical output, which the highlighter and the anchor locator rely on.
///
/// # Layout
///
/// - Top-level blocks and blocks inside quotes are separated by one blank line
/// - List items get a bullet (or number / checkbox) and their continuation
///   lines are indented to the bullet width
/// - Quotes prefix every line with a bar
/// - Tables are laid out as padded columns separated by `│`
pub struct RichTextRenderer {
    // Stateless; the struct exists so rendering options have a home.
}

impl RichTextRenderer {
    pub fn new() -> Self {
        RichTextRenderer {}
    }

    pub fn render(&self, tree: &MarkdownTree) -> RichText {
        RichText {
            lines: self.render_blocks(&tree.blocks, true),
        }
    }

    fn render_blocks(&self, nodes: &[BlockNode], spaced: bool) -> Vec<RichLine> {
        let mut lines = Vec::new();
        for (idx, node) in nodes.iter().enumerate() {
            if idx > 0 && spaced {
                lines.push(RichLine::blank());
            }
            lines.extend(self.render_node(node));
        }
        lines
    }

    fn render_node(&self, node: &BlockNode) -> Vec<RichLine> {
        match &node.kind {
            BlockKind::Heading { level, inlines } => {
                let base = RunStyle {
                    bold: true,
                    foreground: Some(Tint::Heading),
                    ..Default::default()
                };
                self.render_text(inlines, &base, LineKind::Heading(*level))
            }
            BlockKind::Paragraph(inlines) => {
                self.render_text(inlines, &RunStyle::default(), LineKind::Paragraph)
            }
            BlockKind::Code { literal, .. } => self.render_code_block(literal),
            BlockKind::Html(html) => html
                .lines()
                .map(|line| {
                    RichLine::with_runs(
                        LineKind::Code,
                        vec![Run::new(line, RunStyle::tinted(Tint::Muted))],
                    )
                })
                .collect(),
            BlockKind::Quote(blocks) => self.render_quote(blocks),
            BlockKind::List {
                first_number,
                entries,
            } => self.render_list(*first_number, entries),
            BlockKind::Table(table) => self.render_table(table),
            BlockKind::Rule => vec![RichLine::with_runs(
                LineKind::Rule,
                vec![Run::new("─".repeat(RULE_WIDTH), RunStyle::tinted(Tint::Muted))],
            )],
        }
    }

    fn render_code_block(&self, content: &str) -> Vec<RichLine> {
        let style = RunStyle {
            foreground: Some(Tint::Code),
            background: Some(Tint::Code),
            ..Default::default()
        };
        if content.is_empty() {
            return vec![RichLine::new(LineKind::Code)];
        }
        content
            .split('\n')
            .map(|line| RichLine::with_runs(LineKind::Code, vec![Run::new(line, style.clone())]))
            .collect()
    }

    fn render_quote(&self, content: &[BlockNode]) -> Vec<RichLine> {
        let bar = Run::new("│ ", RunStyle::tinted(Tint::Quote));
        let mut lines = self.render_blocks(content, true);
        for line in &mut lines {
            line.runs.insert(0, bar.clone());
            for run in line.runs.iter_mut().skip(1) {
                if run.style.foreground.is_none() {
                    run.style.foreground = Some(Tint::Quote);
                }
            }
            if line.kind == LineKind::Paragraph || line.kind == LineKind::Blank {
                line.kind = LineKind::Quote;
            }
        }
        lines
    }

    fn render_list(&self, first_number: Option<u64>, entries: &[ListEntry]) -> Vec<RichLine> {
        let mut lines = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            let mut bullet = match first_number {
                Some(start) => format!("{}. ", start + idx as u64),
                None => "• ".to_string(),
            };
            match entry.checked {
                Some(true) => bullet.push_str("☑ "),
                Some(false) => bullet.push_str("☐ "),
                None => {}
            }
            let indent = " ".repeat(bullet.chars().count());

            let mut item_lines = self.render_blocks(&entry.blocks, false);
            if item_lines.is_empty() {
                item_lines.push(RichLine::new(LineKind::ListItem));
            }
            for (line_idx, line) in item_lines.iter_mut().enumerate() {
                let prefix = if line_idx == 0 {
                    Run::new(bullet.clone(), RunStyle::tinted(Tint::Marker))
                } else {
                    Run::plain(indent.clone())
                };
                if line_idx > 0 && line.is_empty() {
                    continue;
                }
                line.runs.insert(0, prefix);
                if line.kind == LineKind::Paragraph {
                    line.kind = LineKind::ListItem;
                }
            }
            if let Some(first) = item_lines.first_mut() {
                first.kind = LineKind::ListItem;
            }
            lines.extend(item_lines);
        }
        lines
    }

    fn render_table(&self, table: &Table) -> Vec<RichLine> {
        let columns = table.column_count();
        let rows: Vec<(&[Inlines], bool)> = table
            .header
            .iter()
            .map(|cells| (cells.as_slice(), true))
            .chain(table.rows.iter().map(|cells| (cells.as_slice(), false)))
            .collect();

        let mut widths = vec![0usize; columns];
        for (cells, _) in &rows {
            for (col, cell) in cells.iter().enumerate() {
                widths[col] = widths[col].max(cell.plain().chars().count());
            }
        }

        let empty = Inlines::default();
        let mut lines = Vec::new();
        for (row_idx, (cells, is_header)) in rows.iter().enumerate() {
            let base = if *is_header {
                RunStyle::bold()
            } else {
                RunStyle::default()
            };
            let mut line = RichLine::new(LineKind::Table);
            for (col, width) in widths.iter().enumerate() {
                if col > 0 {
                    line.push(Run::new(" │ ", RunStyle::tinted(Tint::Muted)));
                }
                let cell = cells.get(col).unwrap_or(&empty);
                let pad = width.saturating_sub(cell.plain().chars().count());
                let (left, right) = match table.align.get(col) {
                    Some(ColumnAlign::Right) => (pad, 0),
                    Some(ColumnAlign::Center) => (pad / 2, pad - pad / 2),
                    _ => (0, pad),
                };
                if left > 0 {
                    line.push(Run::plain(" ".repeat(left)));
                }
                let mut cell_lines = vec![RichLine::new(LineKind::Table)];
                self.push_inline_runs(cell, &base, &mut cell_lines);
                for run in cell_lines.into_iter().flat_map(|l| l.runs) {
                    line.push(run);
                }
                if right > 0 && col + 1 < columns {
                    line.push(Run::plain(" ".repeat(right)));
                }
            }
            lines.push(line);

            if row_idx == 0 && *is_header {
                let separator = widths
                    .iter()
                    .map(|w| "─".repeat(*w))
                    .collect::<Vec<_>>()
                    .join("─┼─");
                lines.push(RichLine::with_runs(
                    LineKind::Table,
                    vec![Run::new(separator, RunStyle::tinted(Tint::Muted))],
                ));
            }
        }
        lines
    }

    fn render_text(&self, inlines: &Inlines, base: &RunStyle, kind: LineKind) -> Vec<RichLine> {
        let mut lines = vec![RichLine::new(kind)];
        self.push_inline_runs(inlines, base, &mut lines);
        lines
    }

    /// Appends runs for `text` to the last line of `lines`, opening a new
    /// line for every hard break.
    fn push_inline_runs(&self, inlines: &Inlines, base: &RunStyle, lines: &mut Vec<RichLine>) {
        for inline in inlines {
            self.push_inline(inline, base, lines);
        }
    }

    fn push_inline(&self, inline: &Inline, base: &RunStyle, lines: &mut Vec<RichLine>) {
        match inline {
            Inline::Text { content, marks } => {
                push_run(lines, Run::new(content.clone(), marked(base, *marks)));
            }
            Inline::Link { label, url } => {
                let style = RunStyle {
                    underline: true,
                    foreground: Some(Tint::Link),
                    link: Some(url.clone()),
                    ..base.clone()
                };
                self.push_inline_runs(label, &style, lines);
            }
            Inline::Image { alt, .. } => {
                let label = if alt.is_empty() {
                    "[image]".to_string()
                } else {
                    format!("[image: {alt}]")
                };
                push_run(lines, Run::new(label, RunStyle::tinted(Tint::Muted)));
            }
            Inline::SoftBreak => push_run(lines, Run::new(" ", base.clone())),
            Inline::HardBreak => {
                let kind = lines
                    .last()
                    .map(|line| line.kind)
                    .unwrap_or(LineKind::Paragraph);
                lines.push(RichLine::new(kind));
            }
        }
    }
}

impl Default for RichTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn marked(base: &RunStyle, marks: Marks) -> RunStyle {
    let mut style = base.clone();
    style.bold |= marks.strong;
    style.italic |= marks.emphasis;
    style.strikethrough |= marks.strike;
    if marks.code {
        style.foreground = Some(Tint::Code);
        style.background = Some(Tint::Code);
    }
    style
}

fn push_run(lines: &mut Vec<RichLine>, run: Run) {
    if lines.is_empty() {
        lines.push(RichLine::new(LineKind::Paragraph));
    }
    if let Some(line) = lines.last_mut() {
        line.push(run);
    }
}

/// Renders Markdown source straight to rich text. Deterministic for identical input.
pub fn render_markdown(source: &str) -> RichText {
    let tree = super::markdown_parser::parse_markdown(source);
    RichTextRenderer::new().render(&tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let text = render_markdown("# Plan\n\nFirst step.\n\nSecond step.\n");
        assert_eq!(text.plain_text(), "Plan\n\nFirst step.\n\nSecond step.");
        assert_eq!(text.lines[0].kind, LineKind::Heading(1));
        assert!(text.lines[0].runs[0].style.bold);
    }

    #[test]
    fn soft_breaks_become_spaces() {
        let text = render_markdown("one\ntwo\n");
        assert_eq!(text.plain_text(), "one two");
    }

    #[test]
    fn hard_breaks_open_new_lines() {
        let text = render_markdown("one  \ntwo\n");
        assert_eq!(text.plain_text(), "one\ntwo");
    }

    #[test]
    fn inline_styles_become_runs() {
        let text = render_markdown("plain **bold** `code`");
        let runs = &text.lines[0].runs;
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[1].text, "bold");
        assert!(runs[1].style.bold);
        assert_eq!(runs[3].text, "code");
        assert_eq!(runs[3].style.background, Some(Tint::Code));
    }

    #[test]
    fn lists_get_bullets_and_numbers() {
        let text = render_markdown("- a\n- b\n\n3. x\n4. y\n");
        assert_eq!(text.plain_text(), "• a\n• b\n\n3. x\n4. y");
    }

    #[test]
    fn nested_lists_are_indented() {
        let text = render_markdown("- a\n  - b\n");
        assert_eq!(text.plain_text(), "• a\n  • b");
    }

    #[test]
    fn task_items_show_checkboxes() {
        let text = render_markdown("- [x] done\n- [ ] open\n");
        assert_eq!(text.plain_text(), "• ☑ done\n• ☐ open");
    }

    #[test]
    fn quotes_are_prefixed() {
        let text = render_markdown("> hello\n> world\n");
        assert_eq!(text.plain_text(), "│ hello world");
        assert_eq!(text.lines[0].kind, LineKind::Quote);
    }

    #[test]
    fn code_blocks_keep_lines() {
        let text = render_markdown("```\nlet a = 1;\nlet b = 2;\n```\n");
        assert_eq!(text.plain_text(), "let a = 1;\nlet b = 2;");
        assert!(text.lines.iter().all(|l| l.kind == LineKind::Code));
    }

    #[test]
    fn tables_are_padded() {
        let text = render_markdown("| a | bb |\n|---|----|\n| ccc | d |\n");
        assert_eq!(text.plain_text(), "a   │ bb\n────┼───\nccc │ d");
    }

    #[test]
    fn rendering_is_deterministic() {
        let source = "# T\n\n- **x** and _y_\n\n> q\n";
        assert_eq!(render_markdown(source), render_markdown(source));
    }
}
