use crate::markdown::{
    BlockKind, BlockNode, ColumnAlign, Inline, Inlines, ListEntry, Marks, MarkdownTree, Table,
};
use pulldown_cmark::{Alignment, CodeBlockKind, Event, OffsetIter, Options, Parser, Tag, TagEnd};
use std::iter::Peekable;

type Events<'a> = Peekable<OffsetIter<'a>>;

/// Builds a [`MarkdownTree`] from `pulldown-cmark`'s event stream.
///
/// Each block keeps the byte range of the source it was produced from.
/// Constructs the reader pane cannot show (footnote definitions, definition
/// lists) are folded into quotes or flattened into their children.
pub struct MarkdownParser {
    options: Options,
}

impl MarkdownParser {
    pub fn new() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS,
        }
    }

    pub fn parse(&self, source: &str) -> MarkdownTree {
        let mut events = Parser::new_ext(source, self.options)
            .into_offset_iter()
            .peekable();
        MarkdownTree {
            blocks: blocks_until_end(&mut events),
        }
    }
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_markdown(source: &str) -> MarkdownTree {
    MarkdownParser::new().parse(source)
}

/// Reads blocks up to and including the `End` of the enclosing container.
fn blocks_until_end(events: &mut Events<'_>) -> Vec<BlockNode> {
    let mut blocks = Vec::new();

    while let Some((event, range)) = events.peek() {
        if starts_inline(event) {
            // Tight list entries hold bare inlines.
            let range = range.clone();
            let inlines = read_inlines(events, MarkStack::default());
            if !inlines.is_empty() {
                blocks.push(BlockNode::new(BlockKind::Paragraph(inlines), range));
            }
            continue;
        }

        let Some((event, range)) = events.next() else {
            break;
        };
        let kind = match event {
            Event::End(_) => break,
            Event::Start(Tag::Paragraph) => BlockKind::Paragraph(inline_body(events)),
            Event::Start(Tag::Heading { level, .. }) => BlockKind::Heading {
                level: level as u8,
                inlines: inline_body(events),
            },
            Event::Start(Tag::CodeBlock(kind)) => BlockKind::Code {
                lang: match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                },
                literal: literal_body(events),
            },
            Event::Start(Tag::MetadataBlock(_)) => BlockKind::Code {
                lang: Some("yaml".to_string()),
                literal: literal_body(events),
            },
            Event::Start(Tag::HtmlBlock) => BlockKind::Html(literal_body(events)),
            Event::Start(Tag::BlockQuote(_) | Tag::FootnoteDefinition(_)) => {
                BlockKind::Quote(blocks_until_end(events))
            }
            Event::Start(Tag::List(first_number)) => BlockKind::List {
                first_number,
                entries: list_entries(events),
            },
            Event::Start(Tag::Table(alignments)) => BlockKind::Table(table(events, &alignments)),
            Event::Rule => BlockKind::Rule,
            Event::Html(html) => BlockKind::Html(html.into_string()),
            Event::Start(_) => {
                blocks.extend(blocks_until_end(events));
                continue;
            }
            _ => continue,
        };
        blocks.push(BlockNode::new(kind, range));
    }

    blocks
}

/// Inline content of a paragraph or heading; consumes the closing tag.
fn inline_body(events: &mut Events<'_>) -> Inlines {
    let inlines = read_inlines(events, MarkStack::default());
    if let Some((Event::End(TagEnd::Paragraph | TagEnd::Heading(_)), _)) = events.peek() {
        events.next();
    }
    inlines
}

/// Raw text of a code, metadata or HTML block without its final newline.
fn literal_body(events: &mut Events<'_>) -> String {
    let mut literal = String::new();
    for (event, _) in events.by_ref() {
        match event {
            Event::Text(text) | Event::Html(text) => literal.push_str(&text),
            Event::End(_) => break,
            _ => {}
        }
    }
    if literal.ends_with('\n') {
        literal.pop();
    }
    literal
}

fn list_entries(events: &mut Events<'_>) -> Vec<ListEntry> {
    let mut entries = Vec::new();

    while let Some((event, _)) = events.next() {
        match event {
            Event::Start(Tag::Item) => {
                let checked = match events.peek() {
                    Some((Event::TaskListMarker(checked), _)) => {
                        let checked = *checked;
                        events.next();
                        Some(checked)
                    }
                    _ => None,
                };
                entries.push(ListEntry {
                    checked,
                    blocks: blocks_until_end(events),
                });
            }
            Event::End(TagEnd::List(_)) => break,
            _ => {}
        }
    }

    entries
}

fn table(events: &mut Events<'_>, alignments: &[Alignment]) -> Table {
    let mut table = Table {
        align: alignments
            .iter()
            .map(|alignment| match alignment {
                Alignment::None => ColumnAlign::Default,
                Alignment::Left => ColumnAlign::Left,
                Alignment::Center => ColumnAlign::Center,
                Alignment::Right => ColumnAlign::Right,
            })
            .collect(),
        ..Table::default()
    };

    while let Some((event, _)) = events.next() {
        match event {
            Event::Start(Tag::TableHead) => table.header = Some(table_cells(events)),
            Event::Start(Tag::TableRow) => table.rows.push(table_cells(events)),
            Event::End(TagEnd::Table) => break,
            _ => {}
        }
    }

    table
}

fn table_cells(events: &mut Events<'_>) -> Vec<Inlines> {
    let mut cells = Vec::new();

    while let Some((event, _)) = events.next() {
        match event {
            Event::Start(Tag::TableCell) => {
                cells.push(read_inlines(events, MarkStack::default()));
                if let Some((Event::End(TagEnd::TableCell), _)) = events.peek() {
                    events.next();
                }
            }
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => break,
            _ => {}
        }
    }

    cells
}

fn starts_inline(event: &Event<'_>) -> bool {
    match event {
        Event::Text(_)
        | Event::Code(_)
        | Event::InlineHtml(_)
        | Event::InlineMath(_)
        | Event::DisplayMath(_)
        | Event::FootnoteReference(_)
        | Event::SoftBreak
        | Event::HardBreak
        | Event::TaskListMarker(_) => true,
        Event::Start(tag) => matches!(
            tag,
            Tag::Emphasis
                | Tag::Strong
                | Tag::Strikethrough
                | Tag::Link { .. }
                | Tag::Image { .. }
                | Tag::Superscript
                | Tag::Subscript
        ),
        Event::End(tag) => matches!(
            tag,
            TagEnd::Emphasis
                | TagEnd::Strong
                | TagEnd::Strikethrough
                | TagEnd::Link
                | TagEnd::Image
                | TagEnd::Superscript
                | TagEnd::Subscript
        ),
        _ => false,
    }
}

/// Nesting depth of each emphasis kind; `*a *b* c*` stays emphasized after the inner close.
#[derive(Debug, Clone, Copy, Default)]
struct MarkStack {
    strong: u8,
    emphasis: u8,
    strike: u8,
}

impl MarkStack {
    fn marks(&self) -> Marks {
        Marks {
            strong: self.strong > 0,
            emphasis: self.emphasis > 0,
            strike: self.strike > 0,
            code: false,
        }
    }
}

/// Reads inline events until a non-inline event, or through the `End` of
/// the link or image that the caller opened.
fn read_inlines(events: &mut Events<'_>, mut stack: MarkStack) -> Inlines {
    let mut out = Inlines::default();

    loop {
        match events.peek() {
            Some((event, _)) if starts_inline(event) => {}
            _ => return out,
        }
        let Some((event, _)) = events.next() else {
            return out;
        };

        match event {
            Event::Text(text) | Event::InlineHtml(text) => out.push_text(text, stack.marks()),
            Event::Code(code) | Event::InlineMath(code) | Event::DisplayMath(code) => {
                out.push_text(code, stack.marks().code())
            }
            Event::FootnoteReference(label) => {
                out.push_text(format!("[^{label}]"), stack.marks())
            }
            Event::TaskListMarker(checked) => {
                out.push_text(if checked { "[x] " } else { "[ ] " }, stack.marks())
            }
            Event::SoftBreak => out.push(Inline::SoftBreak),
            Event::HardBreak => out.push(Inline::HardBreak),
            Event::Start(Tag::Strong) => stack.strong += 1,
            Event::Start(Tag::Emphasis) => stack.emphasis += 1,
            Event::Start(Tag::Strikethrough) => stack.strike += 1,
            Event::End(TagEnd::Strong) => stack.strong = stack.strong.saturating_sub(1),
            Event::End(TagEnd::Emphasis) => stack.emphasis = stack.emphasis.saturating_sub(1),
            Event::End(TagEnd::Strikethrough) => stack.strike = stack.strike.saturating_sub(1),
            Event::Start(Tag::Link { dest_url, .. }) => out.push(Inline::Link {
                label: read_inlines(events, stack),
                url: dest_url.into_string(),
            }),
            Event::Start(Tag::Image { dest_url, .. }) => out.push(Inline::Image {
                alt: read_inlines(events, stack).plain(),
                url: dest_url.into_string(),
            }),
            Event::End(TagEnd::Link | TagEnd::Image) => return out,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(tree: &MarkdownTree, idx: usize) -> &Inlines {
        match &tree.blocks[idx].kind {
            BlockKind::Paragraph(inlines) => inlines,
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn headings_and_paragraphs_keep_source_ranges() {
        let source = "# Title\n\nSome *body* text.\n";
        let tree = parse_markdown(source);
        assert_eq!(tree.blocks.len(), 2);
        match &tree.blocks[0].kind {
            BlockKind::Heading { level, inlines } => {
                assert_eq!(*level, 1);
                assert_eq!(inlines.plain(), "Title");
            }
            other => panic!("expected heading, got {other:?}"),
        }
        assert_eq!(paragraph(&tree, 1).plain(), "Some body text.");
        assert!(source[tree.blocks[1].source.clone()].starts_with("Some *body* text."));
    }

    #[test]
    fn nested_emphasis_combines_marks() {
        let tree = parse_markdown("***both*** plain");
        let Some(Inline::Text { content, marks }) = paragraph(&tree, 0).iter().next() else {
            panic!("expected text");
        };
        assert_eq!(content, "both");
        assert!(marks.strong && marks.emphasis);
        assert!(!marks.code);
    }

    #[test]
    fn inner_close_keeps_outer_emphasis() {
        let tree = parse_markdown("**a `b` c**");
        let marks: Vec<Marks> = paragraph(&tree, 0)
            .iter()
            .filter_map(|inline| match inline {
                Inline::Text { marks, .. } => Some(*marks),
                _ => None,
            })
            .collect();
        assert_eq!(marks.len(), 3);
        assert!(marks.iter().all(|m| m.strong));
        assert!(marks[1].code);
    }

    #[test]
    fn task_and_tight_lists() {
        let tree = parse_markdown("- [x] done\n- [ ] todo\n- plain\n");
        let BlockKind::List {
            first_number,
            entries,
        } = &tree.blocks[0].kind
        else {
            panic!("expected list");
        };
        assert_eq!(*first_number, None);
        let checked: Vec<Option<bool>> = entries.iter().map(|e| e.checked).collect();
        assert_eq!(checked, vec![Some(true), Some(false), None]);
        let BlockKind::Paragraph(inlines) = &entries[2].blocks[0].kind else {
            panic!("expected paragraph in entry");
        };
        assert_eq!(inlines.plain(), "plain");
    }

    #[test]
    fn ordered_list_remembers_start() {
        let tree = parse_markdown("3. x\n4. y\n");
        assert!(matches!(
            tree.blocks[0].kind,
            BlockKind::List {
                first_number: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn fenced_code_keeps_language() {
        let tree = parse_markdown("```rust\nfn main() {}\n```\n");
        assert_eq!(
            tree.blocks[0].kind,
            BlockKind::Code {
                lang: Some("rust".to_string()),
                literal: "fn main() {}".to_string(),
            }
        );
    }

    #[test]
    fn tables_have_header_rows_and_alignment() {
        let tree = parse_markdown("| a | b |\n|---|:-:|\n| 1 | 2 |\n");
        let BlockKind::Table(table) = &tree.blocks[0].kind else {
            panic!("expected table");
        };
        assert_eq!(table.header.as_ref().map(Vec::len), Some(2));
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1].plain(), "2");
        assert_eq!(table.align[1], ColumnAlign::Center);
    }

    #[test]
    fn links_keep_label_and_url() {
        let tree = parse_markdown("see [the docs](https://example.com) now");
        let inlines = paragraph(&tree, 0);
        let link = inlines.iter().find_map(|inline| match inline {
            Inline::Link { label, url } => Some((label.plain(), url.as_str())),
            _ => None,
        });
        assert_eq!(link, Some(("the docs".to_string(), "https://example.com")));
        assert_eq!(inlines.plain(), "see the docs now");
    }

    #[test]
    fn quotes_hold_nested_blocks() {
        let tree = parse_markdown("> quoted\n>\n> - item\n");
        let BlockKind::Quote(blocks) = &tree.blocks[0].kind else {
            panic!("expected quote");
        };
        assert_eq!(blocks.len(), 2);
    }
}
