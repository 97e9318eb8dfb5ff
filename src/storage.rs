use anyhow::{Context, Result, anyhow};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// File access used by the review core. Reads distinguish "not found"
/// (`Ok(None)`) from real failures.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &Path) -> Result<Option<String>>;

    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// Deletes `path`. A missing file is not an error.
    fn remove_file(&self, path: &Path) -> Result<()>;
}

/// Real filesystem storage. Writes go to a temp file in the target
/// directory which is synced and then renamed over the destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(contents.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("Failed to sync {}", path.display()))?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}

/// In-memory storage with per-path failure injection.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, String>>,
    failing: Mutex<HashSet<PathBuf>>,
    writes: Mutex<Vec<PathBuf>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), contents.into());
        }
        self
    }

    /// Makes every subsequent write to `path` fail until [`Self::heal`] is called.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(path.into());
        }
    }

    pub fn heal(&self) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.clear();
        }
    }

    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files.lock().ok()?.get(path).cloned()
    }

    /// Paths written so far, in write order.
    pub fn write_log(&self) -> Vec<PathBuf> {
        self.writes
            .lock()
            .map(|writes| writes.clone())
            .unwrap_or_default()
    }
}

impl Storage for MemoryStorage {
    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        let files = self
            .files
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?;
        Ok(files.get(path).cloned())
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?;
        if failing.contains(path) {
            return Err(anyhow!("simulated write failure for {}", path.display()));
        }
        drop(failing);

        self.files
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?
            .insert(path.to_path_buf(), contents.to_string());
        self.writes
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?
            .push(path.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let failing = self
            .failing
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?;
        if failing.contains(path) {
            return Err(anyhow!("simulated remove failure for {}", path.display()));
        }
        drop(failing);

        self.files
            .lock()
            .map_err(|_| anyhow!("storage lock poisoned"))?
            .remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn fs_storage_reads_missing_as_none() {
        let dir = TempDir::new().unwrap();
        let storage = FsStorage;
        assert_eq!(storage.read_file(&dir.path().join("nope.md")).unwrap(), None);
    }

    #[test]
    fn fs_storage_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.md");
        let storage = FsStorage;

        storage.write_file(&path, "first").unwrap();
        storage.write_file(&path, "second").unwrap();

        assert_eq!(storage.read_file(&path).unwrap().as_deref(), Some("second"));
        assert!(storage.exists(&path));
        // Only the destination is left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn remove_tolerates_missing_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.done");
        let storage = FsStorage;

        storage.remove_file(&path).unwrap();
        storage.write_file(&path, "{}").unwrap();
        storage.remove_file(&path).unwrap();
        assert!(!storage.exists(&path));

        let memory = MemoryStorage::new().with_file("/virtual/plan.done", "{}");
        memory.remove_file(Path::new("/virtual/plan.done")).unwrap();
        memory.remove_file(Path::new("/virtual/plan.done")).unwrap();
        assert!(!memory.exists(Path::new("/virtual/plan.done")));
    }

    #[test]
    fn memory_storage_injects_failures() {
        let storage = MemoryStorage::new();
        let path = PathBuf::from("/virtual/doc.md");

        storage.fail_writes_to(&path);
        assert!(storage.write_file(&path, "x").is_err());
        assert!(!storage.exists(&path));

        storage.heal();
        storage.write_file(&path, "x").unwrap();
        assert_eq!(storage.contents(&path).as_deref(), Some("x"));
        assert_eq!(storage.write_log(), vec![path]);
    }
}
