use crate::comments::excerpt;
use crate::event_source::{EventSource, KeyCode, KeyEvent, KeyModifiers};
use crate::notification::{NotificationLevel, NotificationManager};
use crate::review::{ReviewEvent, ReviewState};
use crate::session::{DocumentSession, Session};
use crate::settings::{self, Settings};
use crate::signal::ReviewStatus;
use crate::theme::Theme;

use anyhow::Result;
use crossterm::event::{Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use log::{debug, error, info};
use ratatui::Terminal;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Quit,
}

pub struct App {
    session: Session,
    notifications: NotificationManager,
    theme: Theme,
    show_orphaned: bool,
    /// Comment picked in the side panel with `n`/`p`. Takes precedence over
    /// the comment under the cursor for edit and resolve.
    focused_comment: Option<String>,
    content_area: Rect,
    outcomes: Vec<(PathBuf, ReviewStatus)>,
}

impl App {
    pub fn new(session: Session) -> Self {
        Self::with_settings(session, &settings::get_settings())
    }

    pub fn with_settings(session: Session, settings: &Settings) -> Self {
        Self {
            session,
            notifications: NotificationManager::new(),
            theme: Theme::from_settings(settings),
            show_orphaned: settings.show_orphaned,
            focused_comment: None,
            content_area: Rect::default(),
            outcomes: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    /// Documents whose review finished during this run, in finishing order.
    pub fn outcomes(&self) -> &[(PathBuf, ReviewStatus)] {
        &self.outcomes
    }

    pub fn focused_comment(&self) -> Option<&str> {
        self.focused_comment.as_deref()
    }

    /// True once every document has been approved or sent back.
    pub fn should_exit(&self) -> bool {
        self.session.is_empty()
    }

    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        let Some(doc) = self.session.active() else {
            return Some(AppAction::Quit);
        };
        let drafting = doc.controller.draft().is_some();
        let finished = doc.controller.is_finished();

        let action = if finished {
            None
        } else if drafting {
            self.handle_draft_key(key);
            None
        } else {
            self.handle_viewing_key(key)
        };

        self.process_review_events();
        action
    }

    fn handle_draft_key(&mut self, key: KeyEvent) {
        let Some(doc) = self.session.active_mut() else {
            return;
        };
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Esc => {
                doc.controller.cancel();
                doc.view.clear_selection();
            }
            KeyCode::Enter => match doc.controller.submit_draft() {
                Ok(Some(_)) => doc.view.clear_selection(),
                Ok(None) => self.notifications.warn("Comment is empty"),
                Err(e) => {
                    error!("Failed to submit comment: {e:#}");
                    self.notifications.error(format!("{e:#}"));
                }
            },
            KeyCode::Char('d') if ctrl => {
                if doc.controller.delete_editing().is_some() {
                    doc.view.clear_selection();
                }
            }
            KeyCode::Backspace => {
                if let Some(draft) = doc.controller.draft_mut() {
                    draft.pop();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if let Some(draft) = doc.controller.draft_mut() {
                    draft.push(c);
                }
            }
            _ => {}
        }
    }

    fn handle_viewing_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('n') => {
                self.cycle_focus(true);
                return None;
            }
            KeyCode::Char('p') => {
                self.cycle_focus(false);
                return None;
            }
            KeyCode::Enter | KeyCode::Char('x') | KeyCode::Esc | KeyCode::Char('q') => {}
            _ => self.focused_comment = None,
        }

        let focused = self.focused_comment.clone();
        let doc = self.session.active_mut()?;
        let text = doc.controller.rendered();

        match key.code {
            KeyCode::Char('q') => return Some(AppAction::Quit),
            KeyCode::Char('j') | KeyCode::Down => doc.view.move_down(text),
            KeyCode::Char('k') | KeyCode::Up => doc.view.move_up(text),
            KeyCode::Char('h') | KeyCode::Left => doc.view.move_left(),
            KeyCode::Char('l') | KeyCode::Right => doc.view.move_right(text),
            KeyCode::Char('v') => {
                if doc.view.is_selecting() {
                    doc.view.clear_selection();
                } else {
                    doc.view.start_selection();
                }
            }
            KeyCode::Esc => {
                if doc.view.is_selecting() {
                    doc.view.clear_selection();
                } else if focused.is_some() {
                    self.focused_comment = None;
                    return None;
                } else {
                    self.notifications.dismiss_current();
                }
            }
            KeyCode::Char('c') => {
                if !doc.controller.begin_comment() {
                    self.notifications
                        .warn("Select text first: v starts a selection");
                }
                return None;
            }
            KeyCode::Enter => {
                let offset = doc.view.cursor_offset(text);
                let target = focused.or_else(|| doc.controller.comments_at(offset).last().cloned());
                match target {
                    Some(id) => {
                        doc.view.clear_selection();
                        if !doc.controller.begin_edit(&id) {
                            self.focused_comment = None;
                        }
                    }
                    None => self
                        .notifications
                        .info("No comment under the cursor: n/p picks one from the list"),
                }
                return None;
            }
            KeyCode::Char('x') => {
                let offset = doc.view.cursor_offset(text);
                let target = focused.or_else(|| doc.controller.comments_at(offset).last().cloned());
                if let Some(id) = target {
                    match doc.controller.toggle_resolved(&id) {
                        Ok(true) => self.notifications.info("Comment resolved"),
                        Ok(false) => self.notifications.info("Comment reopened"),
                        Err(e) => self.notifications.error(format!("{e:#}")),
                    }
                }
                return None;
            }
            KeyCode::Char(']') => {
                let offset = doc.view.cursor_offset(text);
                if let Some(next) = doc
                    .controller
                    .highlight_starts()
                    .into_iter()
                    .find(|start| *start > offset)
                {
                    doc.view.move_to_offset(text, next);
                }
            }
            KeyCode::Char('[') => {
                let offset = doc.view.cursor_offset(text);
                if let Some(prev) = doc
                    .controller
                    .highlight_starts()
                    .into_iter()
                    .rev()
                    .find(|start| *start < offset)
                {
                    doc.view.move_to_offset(text, prev);
                }
            }
            KeyCode::Tab => {
                self.session.next();
                return None;
            }
            KeyCode::BackTab => {
                self.session.previous();
                return None;
            }
            KeyCode::Char('a') => {
                self.finish_active(ReviewStatus::Approved);
                return None;
            }
            KeyCode::Char('r') => {
                self.finish_active(ReviewStatus::ChangesRequested);
                return None;
            }
            _ => return None,
        }

        sync_selection(doc);
        None
    }

    /// Moves the panel focus to the next or previous listed comment, wrapping
    /// around. Anchored comments also bring the cursor to their text.
    fn cycle_focus(&mut self, forward: bool) {
        let show_orphaned = self.show_orphaned;
        let Some(doc) = self.session.active_mut() else {
            return;
        };
        let listed: Vec<String> = doc
            .controller
            .comments()
            .iter()
            .filter(|comment| show_orphaned || !doc.controller.is_orphaned(&comment.id))
            .map(|comment| comment.id.clone())
            .collect();
        if listed.is_empty() {
            self.focused_comment = None;
            self.notifications.info("No comments yet");
            return;
        }

        let current = self
            .focused_comment
            .as_ref()
            .and_then(|id| listed.iter().position(|listed_id| listed_id == id));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => listed.len() - 1,
            (Some(idx), true) => (idx + 1) % listed.len(),
            (Some(idx), false) => (idx + listed.len() - 1) % listed.len(),
        };
        let id = listed[next].clone();

        doc.view.clear_selection();
        if let Some(span) = doc.controller.span_of(&id) {
            let text = doc.controller.rendered();
            doc.view.move_to_offset(text, span.start);
        }
        sync_selection(doc);
        debug!("Panel focus on comment {id}");
        self.focused_comment = Some(id);
    }

    fn finish_active(&mut self, status: ReviewStatus) {
        let Some(doc) = self.session.active_mut() else {
            return;
        };
        doc.view.clear_selection();
        let result = match status {
            ReviewStatus::Approved => doc.controller.approve(),
            ReviewStatus::ChangesRequested => doc.controller.request_changes(),
        };
        if let Err(e) = result {
            debug!("Finish rejected: {e}");
        }
    }

    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        let area = self.content_area;
        let Some(doc) = self.session.active_mut() else {
            return;
        };
        if !matches!(
            doc.controller.state(),
            ReviewState::Viewing | ReviewState::Selecting(_)
        ) {
            return;
        }

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.focused_comment = None;
                let text = doc.controller.rendered();
                if doc.view.handle_mouse_down(text, mouse.column, mouse.row, area) {
                    sync_selection(doc);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let text = doc.controller.rendered();
                if doc.view.handle_mouse_drag(text, mouse.column, mouse.row, area) {
                    sync_selection(doc);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => doc.view.handle_mouse_up(),
            MouseEventKind::ScrollDown => doc.view.scroll_down(3),
            MouseEventKind::ScrollUp => doc.view.scroll_up(3),
            _ => {}
        }
    }

    /// Turns controller events into status messages and closes finished tabs.
    fn process_review_events(&mut self) {
        let Some(doc) = self.session.active_mut() else {
            return;
        };
        let name = doc.controller.document().display_name();
        for event in doc.controller.drain_events() {
            match event {
                ReviewEvent::Rendered { .. } => {}
                ReviewEvent::CommentAdded(_) => self.notifications.info("Comment added"),
                ReviewEvent::CommentUpdated(_) => {}
                ReviewEvent::CommentRemoved(id) => {
                    if self.focused_comment.as_deref() == Some(id.as_str()) {
                        self.focused_comment = None;
                    }
                    self.notifications.info("Comment deleted");
                }
                ReviewEvent::CommentsNotSaved(e) => {
                    self.notifications.error(format!("Comments not saved: {e}"))
                }
                ReviewEvent::Finished(signal) => {
                    info!("{name}: {}", signal.status.as_str());
                    self.notifications.info(format!(
                        "{name}: {} ({} comments)",
                        signal.status.label(),
                        signal.comment_count
                    ));
                }
                ReviewEvent::SubmitFailed(e) => self.notifications.error(e),
            }
        }

        let closed = self.session.close_finished();
        self.outcomes.extend(closed);
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(f.area());

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
            .split(chunks[1]);

        self.render_tabs(f, chunks[0]);
        self.render_content(f, main_chunks[0]);
        self.render_comments(f, main_chunks[1]);
        self.render_help_bar(f, chunks[2]);
    }

    fn render_tabs(&self, f: &mut ratatui::Frame, area: Rect) {
        let palette = &self.theme.palette;
        let titles: Vec<Line> = self
            .session
            .documents()
            .iter()
            .map(|doc| {
                let document = doc.controller.document();
                let dirty = if document.is_dirty() { "*" } else { "" };
                Line::from(format!("{}{dirty}", document.display_name()))
            })
            .collect();

        let tabs = Tabs::new(titles)
            .select(self.session.active_index())
            .style(Style::default().fg(palette.base_04))
            .highlight_style(
                Style::default()
                    .fg(palette.base_07)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            );
        f.render_widget(tabs, area);
    }

    fn render_content(&mut self, f: &mut ratatui::Frame, area: Rect) {
        let (_, border_color) = self.theme.panel_colors(true);
        let Some(doc) = self.session.active_mut() else {
            return;
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(doc.controller.document().display_name());
        let inner = block.inner(area);
        f.render_widget(block, area);
        self.content_area = inner;

        let DocumentSession { controller, view } = doc;
        let text = controller.rendered();
        view.layout(text, inner.width, inner.height);

        let selection = view.selection_range(text);
        let cursor = view.cursor;
        let offsets = text.line_offsets();
        let mut lines = Vec::with_capacity(inner.height as usize);

        for row in view.visible_rows() {
            let line = &text.lines[row.line];
            let line_start = offsets[row.line];
            let mut spans: Vec<Span> = Vec::new();
            let mut pending = String::new();
            let mut pending_style = Style::default();
            let mut column = 0;

            for run in &line.runs {
                let base = self.theme.run_style(&run.style, run.is_highlighted());
                for ch in run.text.chars() {
                    if column >= row.start && column < row.start + row.len {
                        let offset = line_start + column;
                        let mut style = base;
                        if selection.as_ref().is_some_and(|s| s.contains(&offset)) {
                            style = style.bg(self.theme.selection_bg);
                        }
                        if cursor.line == row.line && cursor.column == column {
                            style = style.add_modifier(Modifier::REVERSED);
                        }
                        if style != pending_style && !pending.is_empty() {
                            spans.push(Span::styled(std::mem::take(&mut pending), pending_style));
                        }
                        pending_style = style;
                        pending.push(ch);
                    }
                    column += 1;
                }
            }
            if !pending.is_empty() {
                spans.push(Span::styled(pending, pending_style));
            }
            if line.is_empty() && cursor.line == row.line {
                spans.push(Span::styled(
                    " ",
                    Style::default().add_modifier(Modifier::REVERSED),
                ));
            }
            lines.push(Line::from(spans));
        }

        f.render_widget(Paragraph::new(lines), inner);
    }

    fn render_comments(&self, f: &mut ratatui::Frame, area: Rect) {
        let palette = &self.theme.palette;
        let (_, border_color) = self.theme.panel_colors(false);
        let Some(doc) = self.session.active() else {
            return;
        };
        let controller = &doc.controller;

        let title = match controller.orphaned_count() {
            0 => format!("Comments ({})", controller.comments().len()),
            n => format!("Comments ({}, {n} orphaned)", controller.comments().len()),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(title);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let width = (inner.width as usize).max(8);
        let cursor_offset = doc.view.cursor_offset(controller.rendered());
        let under_cursor = controller.comments_at(cursor_offset);
        let mut lines: Vec<Line> = Vec::new();

        for (idx, comment) in controller.comments().iter().enumerate() {
            let orphaned = controller.is_orphaned(&comment.id);
            if orphaned && !self.show_orphaned {
                continue;
            }

            let focused = self.focused_comment.as_deref() == Some(comment.id.as_str());
            let mut header_style = Style::default().fg(palette.base_0a);
            if focused {
                header_style = header_style
                    .bg(self.theme.selection_bg)
                    .add_modifier(Modifier::BOLD);
            } else if under_cursor.contains(&comment.id) {
                header_style = header_style.bg(self.theme.highlight_bg);
            }
            let marker = if focused { "> " } else { "" };
            let mut header = vec![Span::styled(
                format!(
                    "{marker}{}. \"{}\"",
                    idx + 1,
                    comment.excerpt(width.saturating_sub(10))
                ),
                header_style,
            )];
            if orphaned {
                header.push(Span::styled(
                    " [orphaned]",
                    Style::default().fg(palette.base_08),
                ));
            }
            if comment.resolved {
                header.push(Span::styled(
                    " [resolved]",
                    Style::default().fg(palette.base_0b),
                ));
            }
            lines.push(Line::from(header));

            let body_style = if comment.resolved {
                Style::default().fg(palette.base_03)
            } else {
                Style::default().fg(palette.base_05)
            };
            for wrapped in textwrap::wrap(&comment.text, width.saturating_sub(2)) {
                lines.push(Line::from(Span::styled(format!("  {wrapped}"), body_style)));
            }
            lines.push(Line::default());
        }

        if let Some(draft) = controller.draft() {
            let label = match controller.state() {
                ReviewState::Editing { .. } => "Edit comment".to_string(),
                _ => match controller.selection() {
                    Some(selection) => format!(
                        "New comment on \"{}\"",
                        excerpt(&selection.text, width.saturating_sub(18))
                    ),
                    None => "New comment".to_string(),
                },
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default()
                    .fg(palette.base_0d)
                    .add_modifier(Modifier::BOLD),
            )));
            let input = format!("{draft}█");
            for wrapped in textwrap::wrap(&input, width) {
                lines.push(Line::from(Span::styled(
                    wrapped.into_owned(),
                    Style::default().fg(palette.base_07),
                )));
            }
        }

        f.render_widget(Paragraph::new(lines), inner);
    }

    fn render_help_bar(&self, f: &mut ratatui::Frame, area: Rect) {
        let palette = &self.theme.palette;
        let (text, color) = if let Some(notification) = self.notifications.current() {
            let color = match notification.level {
                NotificationLevel::Info => palette.base_0b,
                NotificationLevel::Warning => palette.base_0a,
                NotificationLevel::Error => palette.base_08,
            };
            (notification.message.clone(), color)
        } else {
            let help = match self.session.active().map(|doc| doc.controller.state()) {
                Some(ReviewState::Composing { .. }) => "Type comment | Enter: Save | Esc: Cancel",
                Some(ReviewState::Editing { .. }) => {
                    "Type comment | Enter: Save | Ctrl+d: Delete | Esc: Cancel"
                }
                Some(ReviewState::Selecting(_)) => {
                    "hjkl: Extend | c: Comment | v/Esc: Clear selection"
                }
                _ if self.focused_comment.is_some() => {
                    "n/p: Next/prev in list | Enter: Edit | x: Resolve | Esc: Back to text"
                }
                _ => {
                    "hjkl: Move | v: Select | Enter: Edit | ]/[: Next/prev comment | n/p: Pick from list | x: Resolve | a: Approve | r: Request changes | Tab: Next doc | q: Quit"
                }
            };
            (help.to_string(), palette.base_04)
        };

        f.render_widget(
            Paragraph::new(text).style(Style::default().fg(color).bg(palette.base_01)),
            area,
        );
    }

    pub fn update(&mut self) -> bool {
        self.notifications.update()
    }
}

/// Reports the pane selection of `doc` to its review controller.
fn sync_selection(doc: &mut DocumentSession) {
    let text = doc.controller.rendered();
    match doc.view.selection(text) {
        Some((selected, offset, line)) => {
            doc.controller.selection_changed(&selected, offset, Some(line))
        }
        None => {
            let offset = doc.view.cursor_offset(text);
            doc.controller.selection_changed("", offset, None)
        }
    }
}

pub fn run_app_with_event_source<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_source: &mut dyn EventSource,
) -> Result<()>
where
    B::Error: Send + Sync + 'static,
{
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = std::time::Instant::now();

    // Mouse mapping needs the content area of a drawn frame.
    terminal.draw(|f| app.draw(f))?;

    loop {
        let mut events_processed = 0;
        let mut should_quit = false;

        while event_source.poll(Duration::from_millis(0))? && events_processed < 50 {
            let event = event_source.read()?;
            events_processed += 1;

            match event {
                Event::Key(key) => {
                    if app.handle_key_event(key) == Some(AppAction::Quit) {
                        should_quit = true;
                    }
                }
                Event::Mouse(mouse_event) => app.handle_mouse_event(mouse_event),
                _ => {}
            }

            if should_quit || app.should_exit() {
                break;
            }
        }

        let mut needs_redraw = events_processed > 0;

        if last_tick.elapsed() >= tick_rate {
            if app.update() {
                needs_redraw = true;
            }
            last_tick = std::time::Instant::now();
        }

        if should_quit || app.should_exit() {
            terminal.draw(|f| app.draw(f))?;
            return Ok(());
        }

        if needs_redraw {
            terminal.draw(|f| app.draw(f))?;
        }

        if events_processed == 0 {
            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_secs(0));
            let _ = event_source.poll(timeout);
        }
    }
}
