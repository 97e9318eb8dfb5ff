use crate::storage::Storage;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A reviewer comment anchored to a piece of rendered text.
///
/// Field order is the serialized key order of the sidecar file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    /// The comment body.
    pub text: String,
    /// Rendered text that was selected when the comment was made.
    pub selected_text: String,
    /// Char offset of the selection in the rendered text. Disambiguation hint only.
    #[serde(default)]
    pub char_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(default)]
    pub resolved: bool,
}

impl Comment {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        selected_text: impl Into<String>,
        char_offset: usize,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            selected_text: selected_text.into(),
            char_offset,
            line_number: None,
            resolved: false,
        }
    }

    /// One-line preview of the anchored text for lists and status lines.
    pub fn excerpt(&self, max_chars: usize) -> String {
        excerpt(&self.selected_text, max_chars)
    }
}

/// Whitespace-flattened `text`, cut to `max_chars` with a trailing ellipsis.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = crate::anchor::normalize(text);
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Sidecar path for a source document: `plan.md` -> `plan.comments.json`.
pub fn comments_path(source: &Path) -> PathBuf {
    source.with_extension("comments.json")
}

/// Ordered comment collection of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentStore {
    comments: Vec<Comment>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_comments(comments: Vec<Comment>) -> Self {
        Self { comments }
    }

    /// Loads the sidecar of `source`. A missing or unreadable sidecar, or one
    /// that fails to decode, yields an empty store; the problem is logged.
    pub fn load(storage: &dyn Storage, source: &Path) -> Self {
        let path = comments_path(source);
        let content = match storage.read_file(&path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("No comments sidecar at {path:?}");
                return Self::new();
            }
            Err(e) => {
                warn!("Failed to read comments sidecar {path:?}: {e:#}");
                return Self::new();
            }
        };

        match Self::from_json(&content) {
            Ok(comments) => {
                debug!("Loaded {} comments from {path:?}", comments.len());
                Self { comments }
            }
            Err(e) => {
                warn!("Ignoring malformed comments sidecar {path:?}: {e:#}");
                Self::new()
            }
        }
    }

    pub fn save(&self, storage: &dyn Storage, source: &Path) -> Result<()> {
        let path = comments_path(source);
        let json = self.to_json()?;
        storage
            .write_file(&path, &json)
            .with_context(|| format!("Failed to write comments file {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json =
            serde_json::to_string_pretty(&self.comments).context("Failed to serialize comments")?;
        json.push('\n');
        Ok(json)
    }

    /// Decodes a sidecar document. Any invalid record fails the whole decode.
    pub fn from_json(content: &str) -> Result<Vec<Comment>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let comments: Vec<Comment> =
            serde_json::from_str(content).context("Failed to parse comments JSON")?;
        if let Some(bad) = comments.iter().find(|c| c.selected_text.is_empty()) {
            bail!("Comment {} has no selected text", bad.id);
        }
        Ok(comments)
    }

    pub fn add(
        &mut self,
        body: impl Into<String>,
        selected_text: impl Into<String>,
        offset_hint: usize,
    ) -> Result<Comment> {
        let selected_text = selected_text.into();
        if selected_text.is_empty() {
            bail!("Cannot anchor a comment to an empty selection");
        }
        let comment = Comment::new(
            Uuid::new_v4().to_string(),
            body,
            selected_text,
            offset_hint,
        );
        self.comments.push(comment.clone());
        Ok(comment)
    }

    /// Removes a comment. Absent ids are ignored.
    pub fn remove(&mut self, id: &str) -> Option<Comment> {
        let idx = self.position(id)?;
        Some(self.comments.remove(idx))
    }

    pub fn update(&mut self, id: &str, new_body: impl Into<String>) -> Result<()> {
        let comment = self.get_mut(id).context("Comment not found")?;
        comment.text = new_body.into();
        Ok(())
    }

    pub fn set_resolved(&mut self, id: &str, resolved: bool) -> Result<()> {
        let comment = self.get_mut(id).context("Comment not found")?;
        comment.resolved = resolved;
        Ok(())
    }

    pub fn set_line_number(&mut self, id: &str, line_number: Option<usize>) -> Result<()> {
        let comment = self.get_mut(id).context("Comment not found")?;
        comment.line_number = line_number;
        Ok(())
    }

    /// Moves the offset hint of `id` to `offset`. Returns true if it changed.
    pub fn refresh_offset(&mut self, id: &str, offset: usize) -> bool {
        match self.get_mut(id) {
            Some(comment) if comment.char_offset != offset => {
                comment.char_offset = offset;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.comments.iter().position(|c| c.id == id)
    }

    pub fn all(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn unresolved_count(&self) -> usize {
        self.comments.iter().filter(|c| !c.resolved).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FsStorage, MemoryStorage};
    use tempfile::TempDir;

    #[test]
    fn sidecar_path_replaces_extension() {
        assert_eq!(
            comments_path(Path::new("/tmp/plan.md")),
            PathBuf::from("/tmp/plan.comments.json")
        );
        assert_eq!(
            comments_path(Path::new("notes")),
            PathBuf::from("notes.comments.json")
        );
    }

    #[test]
    fn add_keeps_insertion_order() {
        let mut store = CommentStore::new();
        let a = store.add("first", "alpha", 10).unwrap();
        let b = store.add("second", "beta", 0).unwrap();

        let ids: Vec<&str> = store.all().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn add_rejects_empty_selection() {
        let mut store = CommentStore::new();
        assert!(store.add("body", "", 0).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn update_and_remove() {
        let mut store = CommentStore::new();
        let c = store.add("old", "text", 0).unwrap();

        store.update(&c.id, "new").unwrap();
        assert_eq!(store.get(&c.id).unwrap().text, "new");
        assert!(store.update("missing", "x").is_err());

        assert!(store.remove("missing").is_none());
        assert_eq!(store.len(), 1);
        assert!(store.remove(&c.id).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn json_uses_camel_case_keys_in_order() {
        let store = CommentStore::from_comments(vec![Comment {
            line_number: Some(3),
            ..Comment::new("id-1", "body", "sel", 7)
        }]);
        let json = store.to_json().unwrap();
        let id = json.find("\"id\"").unwrap();
        let text = json.find("\"text\"").unwrap();
        let selected = json.find("\"selectedText\"").unwrap();
        let offset = json.find("\"charOffset\"").unwrap();
        let line = json.find("\"lineNumber\"").unwrap();
        let resolved = json.find("\"resolved\"").unwrap();
        assert!(id < text && text < selected && selected < offset);
        assert!(offset < line && line < resolved);
    }

    #[test]
    fn round_trip_preserves_fields() {
        let mut store = CommentStore::new();
        store.add("one", "quick brown", 4).unwrap();
        let second = store.add("two", "lazy\ndog", 30).unwrap();
        store.set_resolved(&second.id, true).unwrap();

        let decoded = CommentStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(decoded, store.all());
    }

    #[test]
    fn line_number_only_records_decode() {
        let json = r#"[{"id":"x","text":"t","selectedText":"s","lineNumber":4}]"#;
        let decoded = CommentStore::from_json(json).unwrap();
        assert_eq!(decoded[0].char_offset, 0);
        assert_eq!(decoded[0].line_number, Some(4));
        assert!(!decoded[0].resolved);
    }

    #[test]
    fn any_bad_record_fails_whole_decode() {
        let json = r#"[{"id":"a","text":"t","selectedText":"ok"},{"id":"b","text":"t","selectedText":""}]"#;
        assert!(CommentStore::from_json(json).is_err());
        assert!(CommentStore::from_json("{not json").is_err());
        assert!(CommentStore::from_json("  \n").unwrap().is_empty());
    }

    #[test]
    fn load_tolerates_missing_and_corrupt_sidecars() {
        let source = PathBuf::from("/docs/plan.md");
        let empty = MemoryStorage::new();
        assert!(CommentStore::load(&empty, &source).is_empty());

        let corrupt = MemoryStorage::new().with_file("/docs/plan.comments.json", "[{oops");
        assert!(CommentStore::load(&corrupt, &source).is_empty());
    }

    #[test]
    fn save_and_load_on_disk() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("plan.md");
        let mut store = CommentStore::new();
        store.add("needs detail", "Step 1", 0).unwrap();

        store.save(&FsStorage, &source).unwrap();
        assert!(dir.path().join("plan.comments.json").exists());

        let loaded = CommentStore::load(&FsStorage, &source);
        assert_eq!(loaded, store);
    }

    #[test]
    fn refresh_offset_reports_changes() {
        let mut store = CommentStore::new();
        let c = store.add("b", "s", 5).unwrap();
        assert!(!store.refresh_offset(&c.id, 5));
        assert!(store.refresh_offset(&c.id, 9));
        assert_eq!(store.get(&c.id).unwrap().char_offset, 9);
    }

    #[test]
    fn excerpt_flattens_and_truncates() {
        let c = Comment::new("x", "", "a\n\nlong   selection", 0);
        assert_eq!(c.excerpt(40), "a long selection");
        assert_eq!(c.excerpt(6), "a lon…");
    }
}
