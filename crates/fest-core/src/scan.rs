//! Read-only listing of numbered siblings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FestError, Result};
use crate::naming::{EntryKind, ParsedName, parse_kind_name};

/// A numbered phase, sequence, or task found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedEntry {
    pub kind: EntryKind,
    pub number: u32,
    /// File or directory name as it appears on disk.
    pub name: String,
    pub path: PathBuf,
    parsed: ParsedName,
}

impl OrderedEntry {
    /// Slug part of the name (extension stripped for tasks).
    #[must_use]
    pub fn slug(&self) -> &str {
        self.parsed.slug()
    }

    /// The name this entry would have if it carried `number`.
    #[must_use]
    pub fn name_with_number(&self, number: u32) -> String {
        self.parsed.renumbered(self.kind, number)
    }

    /// Directory containing this entry.
    #[must_use]
    pub fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// List the `kind` entries directly under `parent`, ascending by number.
///
/// Hidden entries, names that fail to parse, and entries of the wrong file
/// type (a directory where a task file is expected, and vice versa) are
/// skipped. Entries sharing a number are ordered by name.
///
/// # Errors
///
/// Returns [`FestError::NotFound`] if `parent` does not exist and
/// [`FestError::Io`] if it cannot be read.
pub fn scan(parent: &Path, kind: EntryKind) -> Result<Vec<OrderedEntry>> {
    let read_dir = fs::read_dir(parent).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            FestError::NotFound {
                what: "parent directory",
                path: parent.to_path_buf(),
            }
        } else {
            FestError::io("read_dir", parent, e)
        }
    })?;

    let mut entries = Vec::new();
    for dirent in read_dir {
        let dirent = dirent.map_err(|e| FestError::io("read_dir", parent, e))?;
        let os_name = dirent.file_name();
        let Some(name) = os_name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let Some(parsed) = parse_kind_name(kind, name) else {
            continue;
        };

        let path = dirent.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "skipping dangling entry");
                continue;
            }
            Err(e) => return Err(FestError::io("stat", &path, e)),
        };
        let type_matches = if kind.is_dir() {
            meta.is_dir()
        } else {
            meta.is_file()
        };
        if !type_matches {
            continue;
        }

        entries.push(OrderedEntry {
            kind,
            number: parsed.number,
            name: name.to_string(),
            path,
            parsed,
        });
    }

    entries.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

/// Like [`scan`], but a missing `parent` yields an empty list so callers can
/// start numbering fresh at 1.
///
/// # Errors
///
/// Returns [`FestError::Io`] for failures other than a missing directory.
pub fn scan_or_empty(parent: &Path, kind: EntryKind) -> Result<Vec<OrderedEntry>> {
    match scan(parent, kind) {
        Err(FestError::NotFound { .. }) => Ok(Vec::new()),
        other => other,
    }
}

/// Highest number among `entries`, or 0 when empty.
#[must_use]
pub fn max_number(entries: &[OrderedEntry]) -> u32 {
    entries.iter().map(|e| e.number).max().unwrap_or(0)
}

/// Next free number under `parent` (`max + 1`, starting at 1).
///
/// # Errors
///
/// Returns [`FestError::Io`] if `parent` exists but cannot be read and
/// [`FestError::InvalidEntryName`] if the highest number is `u32::MAX`.
pub fn next_number(parent: &Path, kind: EntryKind) -> Result<u32> {
    let max = max_number(&scan_or_empty(parent, kind)?);
    max.checked_add(1)
        .ok_or_else(|| FestError::InvalidEntryName(format!("no number left after {max} in {}", parent.display())))
}
