use crate::comments::CommentStore;
use crate::storage::Storage;
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

/// One reviewed Markdown file with its comments.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    source: String,
    comments: CommentStore,
    dirty: bool,
}

impl Document {
    /// Reads the source and its comments sidecar. The source must exist;
    /// the sidecar is optional and tolerated when malformed.
    pub fn open(storage: &dyn Storage, path: &Path) -> Result<Self> {
        let source = storage
            .read_file(path)?
            .with_context(|| format!("Document not found: {}", path.display()))?;
        let comments = CommentStore::load(storage, path);
        info!(
            "Opened {path:?} ({} bytes, {} comments)",
            source.len(),
            comments.len()
        );
        Ok(Self::from_parts(path, source, comments))
    }

    pub fn from_parts(path: impl Into<PathBuf>, source: impl Into<String>, comments: CommentStore) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            comments,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.dirty = true;
    }

    pub fn comments(&self) -> &CommentStore {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut CommentStore {
        &mut self.comments
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn save_source(&self, storage: &dyn Storage) -> Result<()> {
        storage
            .write_file(&self.path, &self.source)
            .with_context(|| format!("Failed to write document {}", self.path.display()))
    }

    pub fn save_comments(&self, storage: &dyn Storage) -> Result<()> {
        self.comments.save(storage, &self.path)
    }
}
