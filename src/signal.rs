use crate::storage::Storage;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Final verdict of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    ChangesRequested,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Approved => "approved",
            ReviewStatus::ChangesRequested => "changes_requested",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviewStatus::Approved => "Approved",
            ReviewStatus::ChangesRequested => "Changes requested",
        }
    }
}

/// Contents of the `.done` file an external waiter polls for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSignal {
    pub status: ReviewStatus,
    pub comment_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl CompletionSignal {
    pub fn new(status: ReviewStatus, comment_count: usize) -> Self {
        Self {
            status,
            comment_count,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json =
            serde_json::to_string_pretty(self).context("Failed to serialize completion signal")?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse completion signal")
    }
}

/// Signal path for a source document: `plan.md` -> `plan.done`.
pub fn signal_path(source: &Path) -> PathBuf {
    source.with_extension("done")
}

pub fn write_signal(storage: &dyn Storage, source: &Path, signal: &CompletionSignal) -> Result<()> {
    let path = signal_path(source);
    storage
        .write_file(&path, &signal.to_json()?)
        .with_context(|| format!("Failed to write completion signal {}", path.display()))?;
    info!(
        "Wrote completion signal {path:?}: {} with {} comments",
        signal.status.as_str(),
        signal.comment_count
    );
    Ok(())
}

pub fn read_signal(storage: &dyn Storage, source: &Path) -> Result<Option<CompletionSignal>> {
    let path = signal_path(source);
    match storage.read_file(&path)? {
        Some(content) => Ok(Some(CompletionSignal::from_json(&content)?)),
        None => Ok(None),
    }
}

/// Removes a completion signal left over from an earlier review round that
/// no waiter consumed. Returns true when a file was removed.
pub fn clear_stale_signal(storage: &dyn Storage, source: &Path) -> Result<bool> {
    let path = signal_path(source);
    if !storage.exists(&path) {
        return Ok(false);
    }
    storage
        .remove_file(&path)
        .with_context(|| format!("Failed to remove stale completion signal {}", path.display()))?;
    info!("Removed stale completion signal {path:?}");
    Ok(true)
}

/// Blocks until the completion signal of `source` appears on disk, then
/// reads it and removes the file so the next review round starts clean.
pub fn wait_for_signal(
    source: &Path,
    poll_interval: Duration,
    timeout: Option<Duration>,
) -> Result<CompletionSignal> {
    let path = signal_path(source);
    let started = Instant::now();
    debug!("Waiting for {path:?}");

    loop {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            // The writer renames a complete file into place, so a parse
            // failure means the file is not ours.
            let signal = CompletionSignal::from_json(&content)?;
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            return Ok(signal);
        }

        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                bail!("Timed out after {:?} waiting for {}", timeout, path.display());
            }
        }

        thread::sleep(poll_interval);
    }
}
