//! Durable, newest-first history of analysis results.
//!
//! The whole sequence lives in a single JSON file that is overwritten on
//! every mutation. Writes go through a temporary file in the same directory
//! and are renamed into place, so a crash never leaves a half-written slot.

use crate::error::AnalysisError;
use crate::models::AnalysisResult;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File name of the history slot inside the data directory.
pub const HISTORY_FILE_NAME: &str = "history.json";

/// Ordered history backed by a single file.
///
/// Every mutation takes `&mut self`, so there is exactly one writer.
#[derive(Debug)]
pub struct HistoryStore {
    slot: PathBuf,
    entries: Vec<AnalysisResult>,
}

impl HistoryStore {
    /// Open the store at `slot` and load whatever it holds.
    pub fn open(slot: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            slot: slot.into(),
            entries: Vec::new(),
        };
        store.load();
        store
    }

    /// Default slot: `<data dir>/emotioninsight/history.json`, falling back
    /// to the working directory when the platform has no data dir.
    pub fn default_slot() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join("emotioninsight").join(HISTORY_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(".emotioninsight_history.json"))
    }

    /// Re-read the slot, replacing the in-memory sequence.
    ///
    /// Missing, unreadable or corrupt state loads as an empty history.
    pub fn load(&mut self) -> &[AnalysisResult] {
        self.entries = match read_slot(&self.slot) {
            Ok(entries) => {
                debug!(
                    "Loaded {} history entries from {}",
                    entries.len(),
                    self.slot.display()
                );
                entries
            }
            Err(e) => {
                warn!("{}; starting with empty history", e);
                Vec::new()
            }
        };
        &self.entries
    }

    /// Newest-first view of the history.
    pub fn entries(&self) -> &[AnalysisResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.slot
    }

    /// Find the newest entry whose id starts with `prefix`.
    pub fn find(&self, prefix: &str) -> Option<&AnalysisResult> {
        self.entries.iter().find(|entry| entry.matches_ref(prefix))
    }

    /// Insert `result` at the front and persist.
    ///
    /// On a write failure the in-memory history keeps the new entry.
    pub fn append(&mut self, result: AnalysisResult) -> Result<(), AnalysisError> {
        self.entries.insert(0, result);
        self.persist()
    }

    /// Insert `results` as one block at the front, keeping their order, and
    /// persist once.
    pub fn append_many(&mut self, results: Vec<AnalysisResult>) -> Result<(), AnalysisError> {
        if results.is_empty() {
            return Ok(());
        }
        let count = results.len();
        self.entries.splice(0..0, results);
        info!("Added {} results to history", count);
        self.persist()
    }

    /// Drop every entry and persist the empty state.
    pub fn clear(&mut self) -> Result<(), AnalysisError> {
        let removed = self.entries.len();
        self.entries.clear();
        info!("Cleared {} history entries", removed);
        self.persist()
    }

    /// Overwrite the slot with the current sequence.
    pub fn persist(&self) -> Result<(), AnalysisError> {
        let blob = serde_json::to_vec(&self.entries)
            .map_err(|e| AnalysisError::Persistence(format!("failed to serialize history: {}", e)))?;

        let dir = match self.slot.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| {
            AnalysisError::Persistence(format!("failed to create {}: {}", dir.display(), e))
        })?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| {
            AnalysisError::Persistence(format!(
                "failed to create temporary file in {}: {}",
                dir.display(),
                e
            ))
        })?;
        tmp.write_all(&blob)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AnalysisError::Persistence(format!("failed to write history: {}", e)))?;
        tmp.persist(&self.slot).map_err(|e| {
            AnalysisError::Persistence(format!(
                "failed to replace {}: {}",
                self.slot.display(),
                e.error
            ))
        })?;

        debug!(
            "Persisted {} history entries to {}",
            self.entries.len(),
            self.slot.display()
        );
        Ok(())
    }
}

fn read_slot(slot: &Path) -> Result<Vec<AnalysisResult>, AnalysisError> {
    if !slot.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(slot).map_err(|e| {
        AnalysisError::Persistence(format!("failed to read {}: {}", slot.display(), e))
    })?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|e| {
        AnalysisError::Persistence(format!("corrupt history in {}: {}", slot.display(), e))
    })
}
