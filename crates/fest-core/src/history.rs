//! Append-only status history kept inside each festival.
//!
//! Stored at `<festival>/.fest/status_history.json` as a JSON array. Entries
//! are only ever appended; a transition to the same status is never recorded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FestError, Result};
use crate::fsops::atomic_write;
use crate::status::Status;

/// Per-festival metadata directory.
pub const META_DIR: &str = ".fest";
pub const HISTORY_FILE: &str = "status_history.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub from_status: Status,
    pub to_status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Path of the history file for the festival at `festival_dir`.
#[must_use]
pub fn history_path(festival_dir: &Path) -> PathBuf {
    festival_dir.join(META_DIR).join(HISTORY_FILE)
}

/// Read a festival's history. A missing file is an empty history.
///
/// # Errors
///
/// Returns [`FestError::HistoryCorrupt`] if the file is not a JSON array of
/// entries and [`FestError::Io`] if it cannot be read.
pub fn read_history(festival_dir: &Path) -> Result<Vec<HistoryEntry>> {
    let path = history_path(festival_dir);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FestError::io("read", &path, e)),
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|source| FestError::HistoryCorrupt { path, source })
}

/// Append one transition. Returns `Ok(false)` without touching the file
/// when `entry` does not change the status.
///
/// # Errors
///
/// Returns an error if the existing history cannot be read or the updated
/// file cannot be written.
pub fn append_history(festival_dir: &Path, entry: HistoryEntry) -> Result<bool> {
    if entry.from_status == entry.to_status {
        return Ok(false);
    }

    let mut entries = read_history(festival_dir)?;
    entries.push(entry);
    let json = serde_json::to_vec_pretty(&entries).map_err(|source| FestError::HistoryCorrupt {
        path: history_path(festival_dir),
        source,
    })?;
    atomic_write(&history_path(festival_dir), &json)?;
    Ok(true)
}

/// A festival's history file as it was before an append, so a transition
/// whose move fails can put it back.
#[derive(Debug)]
pub(crate) struct HistorySnapshot {
    path: PathBuf,
    meta_dir_existed: bool,
    bytes: Option<Vec<u8>>,
}

impl HistorySnapshot {
    pub(crate) fn take(festival_dir: &Path) -> Result<Self> {
        let path = history_path(festival_dir);
        let meta_dir_existed = festival_dir.join(META_DIR).is_dir();
        let bytes = match fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(FestError::io("read", &path, e)),
        };
        Ok(Self {
            path,
            meta_dir_existed,
            bytes,
        })
    }

    /// Put the file back. Failures are logged, not returned.
    pub(crate) fn restore(self) {
        let restored = match &self.bytes {
            Some(bytes) => atomic_write(&self.path, bytes),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(FestError::io("remove", &self.path, e)),
            },
        };
        if let Err(e) = restored {
            tracing::warn!(path = %self.path.display(), error = %e, "status history not restored");
            return;
        }
        if let Some(meta_dir) = self.path.parent().filter(|_| !self.meta_dir_existed) {
            // Only succeeds while empty.
            let _ = fs::remove_dir(meta_dir);
        }
        tracing::debug!(path = %self.path.display(), "status history restored");
    }
}
