//! Block and inline tree of a Markdown document under review.
//!
//! Built by [`crate::parsing::parse_markdown`] and walked once by the rich
//! text renderer. Nodes only carry what the reader pane displays.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkdownTree {
    pub blocks: Vec<BlockNode>,
}

/// A block together with the byte range of the source it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    pub kind: BlockKind,
    pub source: Range<usize>,
}

impl BlockNode {
    pub fn new(kind: BlockKind, source: Range<usize>) -> Self {
        Self { kind, source }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// `level` is 1..=6.
    Heading { level: u8, inlines: Inlines },
    Paragraph(Inlines),
    Code { lang: Option<String>, literal: String },
    /// Raw HTML, shown verbatim.
    Html(String),
    Quote(Vec<BlockNode>),
    /// `first_number` is set for ordered lists.
    List {
        first_number: Option<u64>,
        entries: Vec<ListEntry>,
    },
    Table(Table),
    Rule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    /// `Some` for task list entries.
    pub checked: Option<bool>,
    pub blocks: Vec<BlockNode>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Option<Vec<Inlines>>,
    pub rows: Vec<Vec<Inlines>>,
    pub align: Vec<ColumnAlign>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.header
            .iter()
            .chain(self.rows.iter())
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnAlign {
    #[default]
    Default,
    Left,
    Center,
    Right,
}

/// Inline emphasis active on a stretch of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Marks {
    pub strong: bool,
    pub emphasis: bool,
    pub strike: bool,
    pub code: bool,
}

impl Marks {
    pub fn code(self) -> Self {
        Self { code: true, ..self }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text { content: String, marks: Marks },
    Link { label: Inlines, url: String },
    Image { alt: String, url: String },
    SoftBreak,
    HardBreak,
}

/// Ordered inline content of a paragraph, heading, table cell or link label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Inlines(Vec<Inline>);

impl Inlines {
    pub fn push(&mut self, inline: Inline) {
        self.0.push(inline);
    }

    /// Appends text, extending the previous text node when its marks match.
    pub fn push_text(&mut self, content: impl AsRef<str>, marks: Marks) {
        let content = content.as_ref();
        match self.0.last_mut() {
            Some(Inline::Text {
                content: last,
                marks: last_marks,
            }) if *last_marks == marks => {
                last.push_str(content);
                return;
            }
            _ => {}
        }
        self.0.push(Inline::Text {
            content: content.to_string(),
            marks,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Inline> {
        self.0.iter()
    }

    /// Text as it reads on screen, links reduced to their label.
    pub fn plain(&self) -> String {
        let mut out = String::new();
        for inline in &self.0 {
            match inline {
                Inline::Text { content, .. } => out.push_str(content),
                Inline::Link { label, .. } => out.push_str(&label.plain()),
                Inline::Image { alt, .. } => out.push_str(alt),
                Inline::SoftBreak => out.push(' '),
                Inline::HardBreak => out.push('\n'),
            }
        }
        out
    }
}

impl From<&str> for Inlines {
    fn from(value: &str) -> Self {
        let mut inlines = Self::default();
        inlines.push_text(value, Marks::default());
        inlines
    }
}

impl<'a> IntoIterator for &'a Inlines {
    type Item = &'a Inline;
    type IntoIter = std::slice::Iter<'a, Inline>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_text_merges_equal_marks() {
        let bold = Marks {
            strong: true,
            ..Marks::default()
        };
        let mut inlines = Inlines::default();
        inlines.push_text("a", Marks::default());
        inlines.push_text("b", Marks::default());
        inlines.push_text("c", bold);
        inlines.push(Inline::SoftBreak);
        inlines.push_text("d", bold);

        assert_eq!(inlines.iter().count(), 4);
        assert_eq!(inlines.plain(), "abc d");
    }

    #[test]
    fn column_count_covers_ragged_rows() {
        let table = Table {
            header: Some(vec!["a".into()]),
            rows: vec![vec!["1".into(), "2".into(), "3".into()]],
            align: Vec::new(),
        };
        assert_eq!(table.column_count(), 3);
    }
}
