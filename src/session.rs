use crate::reader_view::ReaderView;
use crate::review::{ReviewController, ReviewState};
use crate::signal::ReviewStatus;
use crate::storage::Storage;
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One open tab: the review state machine and its pane state.
pub struct DocumentSession {
    pub controller: ReviewController,
    pub view: ReaderView,
}

impl DocumentSession {
    pub fn new(controller: ReviewController) -> Self {
        Self {
            controller,
            view: ReaderView::new(),
        }
    }

    pub fn path(&self) -> &Path {
        self.controller.document().path()
    }
}

/// Every document under review plus the active tab.
#[derive(Default)]
pub struct Session {
    documents: Vec<DocumentSession>,
    active: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(storage: Arc<dyn Storage>, paths: &[PathBuf]) -> Result<Self> {
        let mut session = Self::new();
        for path in paths {
            let controller = ReviewController::open(storage.clone(), path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            session.push(controller);
        }
        Ok(session)
    }

    pub fn push(&mut self, controller: ReviewController) {
        self.documents.push(DocumentSession::new(controller));
    }

    pub fn documents(&self) -> &[DocumentSession] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> Option<&DocumentSession> {
        self.documents.get(self.active)
    }

    pub fn active_mut(&mut self) -> Option<&mut DocumentSession> {
        self.documents.get_mut(self.active)
    }

    pub fn next(&mut self) {
        if !self.documents.is_empty() {
            self.active = (self.active + 1) % self.documents.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.documents.is_empty() {
            self.active = (self.active + self.documents.len() - 1) % self.documents.len();
        }
    }

    pub fn select(&mut self, index: usize) {
        if index < self.documents.len() {
            self.active = index;
        }
    }

    /// Drops tabs whose review finished and returns their outcome. The
    /// active tab stays on the same document when it is still open.
    pub fn close_finished(&mut self) -> Vec<(PathBuf, ReviewStatus)> {
        let mut closed = Vec::new();
        let mut idx = 0;
        while idx < self.documents.len() {
            let status = match self.documents[idx].controller.state() {
                ReviewState::Finished(status) => Some(*status),
                _ => None,
            };
            match status {
                Some(status) => {
                    let doc = self.documents.remove(idx);
                    info!("Closed {:?} ({})", doc.path(), status.as_str());
                    closed.push((doc.path().to_path_buf(), status));
                    if idx < self.active {
                        self.active -= 1;
                    }
                }
                None => idx += 1,
            }
        }
        if self.active >= self.documents.len() {
            self.active = self.documents.len().saturating_sub(1);
        }
        closed
    }
}
