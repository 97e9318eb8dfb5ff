//! Styled text model produced by the renderer and consumed by the
//! highlighter and the terminal view.
//!
//! A [`RichText`] is an ordered list of lines, each an ordered list of
//! [`Run`]s. Offsets used throughout the crate are `char` offsets into
//! [`RichText::plain_text`], where lines are joined with a single `\n`.

/// Color roles, resolved to concrete colors by the theme at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Heading,
    Link,
    Code,
    Quote,
    Marker,
    Muted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub foreground: Option<Tint>,
    pub background: Option<Tint>,
    pub link: Option<String>,
}

impl RunStyle {
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Default::default()
        }
    }

    pub fn tinted(tint: Tint) -> Self {
        Self {
            foreground: Some(tint),
            ..Default::default()
        }
    }
}

/// A contiguous piece of text sharing one style and one set of comment marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub style: RunStyle,
    /// Ids of the comments whose highlight covers this run, in comment order.
    pub comment_ids: Vec<String>,
}

impl Run {
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        Self {
            text: text.into(),
            style,
            comment_ids: Vec::new(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, RunStyle::default())
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_highlighted(&self) -> bool {
        !self.comment_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading(u8),
    Paragraph,
    ListItem,
    Quote,
    Code,
    Table,
    Rule,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RichLine {
    pub runs: Vec<Run>,
    pub kind: LineKind,
}

impl RichLine {
    pub fn new(kind: LineKind) -> Self {
        Self {
            runs: Vec::new(),
            kind,
        }
    }

    pub fn blank() -> Self {
        Self::new(LineKind::Blank)
    }

    pub fn with_runs(kind: LineKind, runs: Vec<Run>) -> Self {
        let mut line = Self::new(kind);
        for run in runs {
            line.push(run);
        }
        line
    }

    /// Appends a run, folding it into the previous one when style and marks match.
    pub fn push(&mut self, run: Run) {
        if run.text.is_empty() {
            return;
        }
        if let Some(last) = self.runs.last_mut() {
            if last.style == run.style && last.comment_ids == run.comment_ids {
                last.text.push_str(&run.text);
                return;
            }
        }
        self.runs.push(run);
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    pub fn char_len(&self) -> usize {
        self.runs.iter().map(Run::char_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|run| run.text.is_empty())
    }

    /// Returns the run covering `column` together with the column at which it starts.
    pub fn run_at(&self, column: usize) -> Option<(&Run, usize)> {
        let mut start = 0;
        for run in &self.runs {
            let len = run.char_len();
            if column < start + len {
                return Some((run, start));
            }
            start += len;
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    pub lines: Vec<RichLine>,
}

impl RichText {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// The raw rendered text all anchor offsets refer to.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            for run in &line.runs {
                out.push_str(&run.text);
            }
        }
        out
    }

    /// Char offset at which each line starts in [`Self::plain_text`].
    pub fn line_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.lines.len());
        let mut offset = 0;
        for line in &self.lines {
            offsets.push(offset);
            offset += line.char_len() + 1;
        }
        offsets
    }

    pub fn char_len(&self) -> usize {
        let joins = self.lines.len().saturating_sub(1);
        self.lines.iter().map(RichLine::char_len).sum::<usize>() + joins
    }

    /// Converts a (line, column) position into a plain-text char offset.
    pub fn offset_of(&self, line: usize, column: usize) -> usize {
        let offsets = self.line_offsets();
        match offsets.get(line) {
            Some(start) => {
                let len = self.lines[line].char_len();
                start + column.min(len)
            }
            None => self.char_len(),
        }
    }

    /// Converts a plain-text char offset back into (line, column).
    pub fn position_of(&self, offset: usize) -> (usize, usize) {
        let mut remaining = offset;
        for (idx, line) in self.lines.iter().enumerate() {
            let len = line.char_len();
            if remaining <= len {
                return (idx, remaining);
            }
            remaining -= len + 1;
        }
        let last = self.lines.len().saturating_sub(1);
        let column = self.lines.last().map(RichLine::char_len).unwrap_or(0);
        (last, column)
    }

    /// Chars in `[start, end)` of the plain text.
    pub fn slice(&self, start: usize, end: usize) -> String {
        self.plain_text()
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect()
    }

    /// Comment ids marked at the given plain-text offset.
    pub fn comment_ids_at(&self, offset: usize) -> &[String] {
        let (line, column) = self.position_of(offset);
        self.lines
            .get(line)
            .and_then(|l| l.run_at(column))
            .map(|(run, _)| run.comment_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(RichLine::is_empty)
    }
}
