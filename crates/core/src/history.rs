// crates/core/src/history.rs
//! Durable, bounded history of completed transfers.
//!
//! The whole history lives in one small JSON document that is read fully,
//! modified in memory and replaced on disk in one rename. Readers never see a
//! partially written file. Only one writer (the ingest loop) is expected.

use std::path::{Path, PathBuf};

use ingest_monitor_types::{HistoryStats, TransferRecord};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::HistoryError;
use crate::size::parse_size_gb;

/// Maximum number of stored records; oldest are evicted first.
pub const HISTORY_CAP: usize = 100;

/// A new record is discarded when one of this many most recent entries has
/// the same filename.
pub const DEDUP_WINDOW: usize = 10;

/// Persisted document: `{"transfers": [...]}` in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub transfers: Vec<TransferRecord>,
}

/// Result of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub accepted: usize,
    pub discarded: usize,
}

impl History {
    /// Append records that are not duplicates of a recent entry.
    ///
    /// Records are considered one at a time, so a record accepted earlier in
    /// the same batch suppresses a later one with the same filename.
    pub fn merge(&mut self, records: impl IntoIterator<Item = TransferRecord>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for record in records {
            let recent_start = self.transfers.len().saturating_sub(DEDUP_WINDOW);
            let duplicate = self.transfers[recent_start..]
                .iter()
                .any(|existing| existing.filename == record.filename);
            if duplicate {
                outcome.discarded += 1;
                continue;
            }

            self.transfers.push(record);
            outcome.accepted += 1;

            if self.transfers.len() > HISTORY_CAP {
                let excess = self.transfers.len() - HISTORY_CAP;
                self.transfers.drain(..excess);
            }
        }

        outcome
    }

    /// Up to `n` records, most recent first.
    pub fn recent(&self, n: usize) -> Vec<TransferRecord> {
        self.transfers.iter().rev().take(n).cloned().collect()
    }

    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            total_files: self.transfers.len(),
            total_gb: self.transfers.iter().map(|r| parse_size_gb(&r.size)).sum(),
            last_active: self.transfers.last().map(|r| r.timestamp),
        }
    }
}

/// File-backed history.
///
/// All methods do blocking file I/O; async callers should go through
/// `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Open the store, creating an empty history file if none exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            if let Some(parent) = store.parent_dir() {
                std::fs::create_dir_all(parent).map_err(|e| HistoryError::io(parent, e))?;
            }
            store.write(&History::default())?;
            tracing::info!(path = %store.path.display(), "Created empty transfer history");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the history.
    ///
    /// A missing or corrupt file reads as empty. Any other read failure is an
    /// error, so a merge never overwrites history it could not see.
    pub fn load(&self) -> Result<History, HistoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(History::default()),
            Err(e) => return Err(HistoryError::io(&self.path, e)),
        };

        match serde_json::from_str(&content) {
            Ok(history) => Ok(history),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Transfer history is corrupt, treating as empty"
                );
                Ok(History::default())
            }
        }
    }

    /// Merge `records` and rewrite the file. Empty input does not touch disk.
    pub fn merge(&self, records: Vec<TransferRecord>) -> Result<MergeOutcome, HistoryError> {
        if records.is_empty() {
            return Ok(MergeOutcome::default());
        }

        let mut history = self.load()?;
        let outcome = history.merge(records);
        if outcome.accepted > 0 {
            self.write(&history)?;
        }

        tracing::debug!(
            accepted = outcome.accepted,
            discarded = outcome.discarded,
            stored = history.transfers.len(),
            "Merged completed transfers"
        );
        Ok(outcome)
    }

    pub fn recent(&self, n: usize) -> Result<Vec<TransferRecord>, HistoryError> {
        Ok(self.load()?.recent(n))
    }

    pub fn stats(&self) -> Result<HistoryStats, HistoryError> {
        Ok(self.load()?.stats())
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|p| !p.as_os_str().is_empty())
    }

    /// Write to a sibling temp file, then rename it over the real one.
    fn write(&self, history: &History) -> Result<(), HistoryError> {
        let dir = self.parent_dir().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| HistoryError::io(dir, e))?;

        serde_json::to_writer_pretty(tmp.as_file_mut(), history)?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| HistoryError::io(tmp.path(), e))?;

        tmp.persist(&self.path).map_err(|e| HistoryError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }
}
