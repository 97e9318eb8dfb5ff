//! Per-document review state machine.
//!
//! The controller is the only place that mutates a document's comments.
//! Every mutation re-renders the document and re-resolves all anchors, and
//! the UI learns about the outcome through the events drained from
//! [`ReviewController::drain_events`].

use crate::anchor::{ResolvedAnchor, normalize, resolve_anchors};
use crate::comments::Comment;
use crate::document::Document;
use crate::highlight::apply_highlights;
use crate::parsing::render_markdown;
use crate::rich_text::RichText;
use crate::signal::{CompletionSignal, ReviewStatus, clear_stale_signal, write_signal};
use crate::storage::Storage;
use anyhow::{Result, bail};
use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Selection captured when composing starts. Later selection changes do not touch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub text: String,
    /// Char offset of the selection start in the rendered text.
    pub char_offset: usize,
    /// 1-based rendered line of the selection start.
    pub line_number: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewState {
    Viewing,
    Selecting(SelectionSnapshot),
    Composing {
        selection: SelectionSnapshot,
        draft: String,
    },
    Editing {
        comment_id: String,
        draft: String,
    },
    Finished(ReviewStatus),
}

impl ReviewState {
    pub fn name(&self) -> &'static str {
        match self {
            ReviewState::Viewing => "viewing",
            ReviewState::Selecting(_) => "selecting",
            ReviewState::Composing { .. } => "composing",
            ReviewState::Editing { .. } => "editing",
            ReviewState::Finished(_) => "finished",
        }
    }
}

/// Outcomes the controller reports to whoever drives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewEvent {
    Rendered { highlighted: usize, orphaned: usize },
    CommentAdded(String),
    CommentUpdated(String),
    CommentRemoved(String),
    /// Autosave of the sidecar failed; the document stays dirty.
    CommentsNotSaved(String),
    Finished(CompletionSignal),
    SubmitFailed(String),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("review is already finished")]
    AlreadyFinished,
    #[error("cannot finish while {0}")]
    Busy(&'static str),
    #[error("failed to save document: {0:#}")]
    Source(anyhow::Error),
    #[error("failed to save comments: {0:#}")]
    Comments(anyhow::Error),
    #[error("failed to write completion signal: {0:#}")]
    Signal(anyhow::Error),
}

pub struct ReviewController {
    storage: Arc<dyn Storage>,
    document: Document,
    state: ReviewState,
    rendered: RichText,
    anchors: Vec<ResolvedAnchor>,
    events: Vec<ReviewEvent>,
}

impl ReviewController {
    /// Loads `path` and its comments. A completion signal left by an
    /// earlier round is removed so a new waiter blocks until this review
    /// finishes.
    pub fn open(storage: Arc<dyn Storage>, path: &Path) -> Result<Self> {
        let document = Document::open(storage.as_ref(), path)?;
        if let Err(e) = clear_stale_signal(storage.as_ref(), path) {
            warn!("{e:#}");
        }
        Ok(Self::new(storage, document))
    }

    pub fn new(storage: Arc<dyn Storage>, document: Document) -> Self {
        let mut controller = Self {
            storage,
            document,
            state: ReviewState::Viewing,
            rendered: RichText::new(),
            anchors: Vec::new(),
            events: Vec::new(),
        };
        controller.rerender();
        controller
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn state(&self) -> &ReviewState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ReviewState::Finished(_))
    }

    /// Rendered text with comment marks applied.
    pub fn rendered(&self) -> &RichText {
        &self.rendered
    }

    pub fn anchors(&self) -> &[ResolvedAnchor] {
        &self.anchors
    }

    pub fn comments(&self) -> &[Comment] {
        self.document.comments().all()
    }

    pub fn is_orphaned(&self, comment_id: &str) -> bool {
        self.anchors
            .iter()
            .find(|anchor| anchor.comment_id == comment_id)
            .is_none_or(ResolvedAnchor::is_orphaned)
    }

    pub fn orphaned_count(&self) -> usize {
        self.anchors.iter().filter(|a| a.is_orphaned()).count()
    }

    /// Comment ids marked at `offset`, innermost (last added) last.
    pub fn comments_at(&self, offset: usize) -> &[String] {
        self.rendered.comment_ids_at(offset)
    }

    /// Start offsets of resolved highlights, sorted and deduplicated.
    pub fn highlight_starts(&self) -> Vec<usize> {
        let mut starts: Vec<usize> = self
            .anchors
            .iter()
            .filter_map(|anchor| anchor.span.as_ref().map(|span| span.start))
            .collect();
        starts.sort_unstable();
        starts.dedup();
        starts
    }

    pub fn span_of(&self, comment_id: &str) -> Option<std::ops::Range<usize>> {
        self.anchors
            .iter()
            .find(|anchor| anchor.comment_id == comment_id)
            .and_then(|anchor| anchor.span.clone())
    }

    pub fn drain_events(&mut self) -> Vec<ReviewEvent> {
        std::mem::take(&mut self.events)
    }

    /// Replaces the Markdown source and re-renders. The new text is only
    /// written to disk by the terminal review action.
    pub fn set_source(&mut self, source: impl Into<String>) {
        if self.is_finished() {
            return;
        }
        self.document.set_source(source);
        self.rerender();
    }

    /// Render, resolve every anchor against the fresh text, then highlight.
    /// Offset hints of resolved comments follow their current position;
    /// those moves are persisted with the next save.
    pub fn rerender(&mut self) {
        let fresh = render_markdown(self.document.source());
        let text = fresh.plain_text();
        let anchors = resolve_anchors(&text, self.document.comments().all());

        for anchor in &anchors {
            if let Some(span) = &anchor.span {
                self.document
                    .comments_mut()
                    .refresh_offset(&anchor.comment_id, span.start);
            }
        }

        let orphaned = anchors.iter().filter(|a| a.is_orphaned()).count();
        if orphaned > 0 {
            debug!(
                "{}: {orphaned} of {} comments could not be anchored",
                self.document.display_name(),
                anchors.len()
            );
        }

        self.rendered = apply_highlights(&fresh, &anchors);
        self.events.push(ReviewEvent::Rendered {
            highlighted: anchors.len() - orphaned,
            orphaned,
        });
        self.anchors = anchors;
    }

    /// Reports the current selection. Text that is empty after whitespace
    /// normalization means no selection. Ignored while composing or editing,
    /// whose snapshot is already taken.
    pub fn selection_changed(&mut self, text: &str, char_offset: usize, line_number: Option<usize>) {
        match self.state {
            ReviewState::Viewing | ReviewState::Selecting(_) => {}
            _ => return,
        }

        self.state = if normalize(text).is_empty() {
            ReviewState::Viewing
        } else {
            ReviewState::Selecting(SelectionSnapshot {
                text: text.to_string(),
                char_offset,
                line_number,
            })
        };
    }

    pub fn selection(&self) -> Option<&SelectionSnapshot> {
        match &self.state {
            ReviewState::Selecting(selection) => Some(selection),
            ReviewState::Composing { selection, .. } => Some(selection),
            _ => None,
        }
    }

    /// Selecting -> Composing. Returns false when there is no selection.
    pub fn begin_comment(&mut self) -> bool {
        if let ReviewState::Selecting(selection) = &self.state {
            self.state = ReviewState::Composing {
                selection: selection.clone(),
                draft: String::new(),
            };
            true
        } else {
            false
        }
    }

    /// Viewing/Selecting -> Editing for an existing comment.
    pub fn begin_edit(&mut self, comment_id: &str) -> bool {
        if !matches!(self.state, ReviewState::Viewing | ReviewState::Selecting(_)) {
            return false;
        }
        let Some(comment) = self.document.comments().get(comment_id) else {
            return false;
        };
        self.state = ReviewState::Editing {
            comment_id: comment.id.clone(),
            draft: comment.text.clone(),
        };
        true
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.state {
            ReviewState::Composing { draft, .. } | ReviewState::Editing { draft, .. } => {
                Some(draft)
            }
            _ => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut String> {
        match &mut self.state {
            ReviewState::Composing { draft, .. } | ReviewState::Editing { draft, .. } => {
                Some(draft)
            }
            _ => None,
        }
    }

    /// Submits the current draft. A new comment is created when composing,
    /// the body is replaced when editing. A blank draft submits nothing and
    /// keeps the state. Returns the affected comment id.
    pub fn submit_draft(&mut self) -> Result<Option<String>> {
        let state = std::mem::replace(&mut self.state, ReviewState::Viewing);
        match state {
            ReviewState::Composing { selection, draft } => {
                if draft.trim().is_empty() {
                    self.state = ReviewState::Composing { selection, draft };
                    return Ok(None);
                }
                let comments = self.document.comments_mut();
                let comment = comments.add(draft, selection.text.clone(), selection.char_offset)?;
                comments.set_line_number(&comment.id, selection.line_number)?;
                info!(
                    "Added comment {} on {:?}",
                    comment.id,
                    comment.excerpt(40)
                );
                self.events.push(ReviewEvent::CommentAdded(comment.id.clone()));
                self.comments_changed();
                Ok(Some(comment.id))
            }
            ReviewState::Editing { comment_id, draft } => {
                if draft.trim().is_empty() {
                    self.state = ReviewState::Editing { comment_id, draft };
                    return Ok(None);
                }
                self.document
                    .comments_mut()
                    .update(&comment_id, draft)?;
                debug!("Updated comment {comment_id}");
                self.events
                    .push(ReviewEvent::CommentUpdated(comment_id.clone()));
                self.comments_changed();
                Ok(Some(comment_id))
            }
            other => {
                self.state = other;
                Ok(None)
            }
        }
    }

    /// Leaves Selecting, Composing or Editing without changing anything.
    pub fn cancel(&mut self) {
        match self.state {
            ReviewState::Selecting(_) | ReviewState::Composing { .. } | ReviewState::Editing { .. } => {
                self.state = ReviewState::Viewing;
            }
            _ => {}
        }
    }

    /// Deletes the comment being edited.
    pub fn delete_editing(&mut self) -> Option<Comment> {
        let ReviewState::Editing { comment_id, .. } = &self.state else {
            return None;
        };
        let comment_id = comment_id.clone();
        self.state = ReviewState::Viewing;
        self.delete_comment(&comment_id)
    }

    /// Removes a comment. Absent ids are a no-op.
    pub fn delete_comment(&mut self, comment_id: &str) -> Option<Comment> {
        if self.is_finished() {
            return None;
        }
        let removed = self.document.comments_mut().remove(comment_id)?;
        info!("Removed comment {comment_id}");
        self.events
            .push(ReviewEvent::CommentRemoved(comment_id.to_string()));
        self.comments_changed();
        Some(removed)
    }

    /// Flips the resolved flag. Returns the new value.
    pub fn toggle_resolved(&mut self, comment_id: &str) -> Result<bool> {
        if self.is_finished() {
            bail!("Review is already finished");
        }
        let resolved = match self.document.comments().get(comment_id) {
            Some(comment) => !comment.resolved,
            None => bail!("Comment not found"),
        };
        self.document
            .comments_mut()
            .set_resolved(comment_id, resolved)?;
        self.events
            .push(ReviewEvent::CommentUpdated(comment_id.to_string()));
        self.comments_changed();
        Ok(resolved)
    }

    pub fn approve(&mut self) -> Result<CompletionSignal, SubmitError> {
        self.finish(ReviewStatus::Approved)
    }

    pub fn request_changes(&mut self) -> Result<CompletionSignal, SubmitError> {
        self.finish(ReviewStatus::ChangesRequested)
    }

    /// Saves the source, then the comments, then writes the completion
    /// signal. Any failure stops the sequence before the signal is written
    /// and leaves the document dirty so the action can be retried.
    fn finish(&mut self, status: ReviewStatus) -> Result<CompletionSignal, SubmitError> {
        match &self.state {
            ReviewState::Viewing | ReviewState::Selecting(_) => {}
            ReviewState::Finished(_) => return Err(SubmitError::AlreadyFinished),
            other => return Err(SubmitError::Busy(other.name())),
        }

        let result = self.write_all(status);
        match &result {
            Ok(signal) => {
                self.document.mark_clean();
                self.state = ReviewState::Finished(status);
                self.events.push(ReviewEvent::Finished(signal.clone()));
            }
            Err(e) => {
                error!("{}: {e}", self.document.display_name());
                self.document.mark_dirty();
                self.events.push(ReviewEvent::SubmitFailed(e.to_string()));
            }
        }
        result
    }

    fn write_all(&self, status: ReviewStatus) -> Result<CompletionSignal, SubmitError> {
        let storage = self.storage.as_ref();
        self.document
            .save_source(storage)
            .map_err(SubmitError::Source)?;
        self.document
            .save_comments(storage)
            .map_err(SubmitError::Comments)?;

        let signal = CompletionSignal::new(status, self.document.comments().len());
        write_signal(storage, self.document.path(), &signal).map_err(SubmitError::Signal)?;
        Ok(signal)
    }

    /// Re-renders after a comment change and autosaves the sidecar.
    fn comments_changed(&mut self) {
        self.rerender();
        match self.document.save_comments(self.storage.as_ref()) {
            Ok(()) => {}
            Err(e) => {
                warn!("Autosave of comments failed: {e:#}");
                self.document.mark_dirty();
                self.events
                    .push(ReviewEvent::CommentsNotSaved(format!("{e:#}")));
            }
        }
    }
}
