//! Inserting and removing numbered siblings while keeping them contiguous.
//!
//! # Ordering
//!
//! Every shift is a sequence of single renames ordered so that each target
//! name has already been vacated:
//!
//! - insert shifts entries `> after` up by one, highest number first;
//! - remove shifts entries above the removed one down by one, lowest first;
//! - compact moves entries down in ascending order, then up in descending
//!   order (only needed when hand edits left duplicate numbers).
//!
//! # Partial failure
//!
//! A failed rename aborts the shift immediately. Renames already performed
//! are NOT rolled back; they are listed in [`FestError::ShiftAborted`] so the
//! directory can be inspected and repaired (or fixed with [`Renumberer::compact`]).

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::{AppliedRename, FestError, Result};
use crate::fsops::{FsOps, StdFs, ensure_dir};
use crate::naming::{EntryKind, format_name};
use crate::scan::{OrderedEntry, max_number, scan};

/// A newly created slot.
#[derive(Debug, Clone, Serialize)]
pub struct InsertOutcome {
    pub kind: EntryKind,
    pub number: u32,
    pub path: PathBuf,
    /// Siblings moved up to make room, in the order they were renamed.
    pub shifted: Vec<AppliedRename>,
}

/// A removed entry and the siblings that closed the gap.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveOutcome {
    pub kind: EntryKind,
    pub number: u32,
    pub removed: PathBuf,
    pub shifted: Vec<AppliedRename>,
}

/// Performs numbered inserts, removals, and compaction under one parent.
pub struct Renumberer<'a> {
    ops: &'a dyn FsOps,
}

impl std::fmt::Debug for Renumberer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renumberer").finish_non_exhaustive()
    }
}

impl Default for Renumberer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Renumberer<'static> {
    #[must_use]
    pub fn new() -> Self {
        static STD_FS: StdFs = StdFs;
        Self { ops: &STD_FS }
    }
}

impl<'a> Renumberer<'a> {
    /// Route renames through `ops`.
    #[must_use]
    pub fn with_ops(ops: &'a dyn FsOps) -> Self {
        Self { ops }
    }

    /// Insert a phase directory after phase `after` (0 = first).
    ///
    /// # Errors
    ///
    /// See [`Renumberer::insert`].
    pub fn insert_phase(&self, festival: &Path, after: u32, name: &str, cancel: &CancelToken) -> Result<InsertOutcome> {
        self.insert(festival, EntryKind::Phase, after, name, cancel)
    }

    /// Insert a sequence directory inside a phase.
    ///
    /// # Errors
    ///
    /// See [`Renumberer::insert`].
    pub fn insert_sequence(&self, phase: &Path, after: u32, name: &str, cancel: &CancelToken) -> Result<InsertOutcome> {
        self.insert(phase, EntryKind::Sequence, after, name, cancel)
    }

    /// Insert an empty task file inside a sequence. The sequence directory is
    /// created if missing.
    ///
    /// # Errors
    ///
    /// See [`Renumberer::insert`].
    pub fn insert_task(&self, sequence: &Path, after: u32, name: &str, cancel: &CancelToken) -> Result<InsertOutcome> {
        self.insert(sequence, EntryKind::Task, after, name, cancel)
    }

    /// Create a `kind` entry numbered `after + 1` under `parent`, shifting
    /// every sibling numbered above `after` up by one.
    ///
    /// `after` beyond the current maximum appends at `max + 1`.
    ///
    /// # Errors
    ///
    /// - [`FestError::NotFound`] if `parent` is missing (phases, sequences).
    /// - [`FestError::ShiftAborted`] if a rename failed after others were
    ///   applied; the error of the first rename is returned as-is.
    /// - [`FestError::DestinationExists`] if the new slot's name is taken.
    /// - [`FestError::InvalidEntryName`] if a shifted number would exceed
    ///   `u32::MAX`; nothing is renamed in that case.
    /// - [`FestError::Cancelled`] if the token fires.
    pub fn insert(
        &self,
        parent: &Path,
        kind: EntryKind,
        after: u32,
        name: &str,
        cancel: &CancelToken,
    ) -> Result<InsertOutcome> {
        cancel.check()?;
        if !kind.is_dir() {
            ensure_dir(parent)?;
        }

        let entries = scan(parent, kind)?;
        let after = after.min(max_number(&entries));
        let number = after
            .checked_add(1)
            .ok_or_else(|| FestError::InvalidEntryName(format!("no number left after {after} in {}", parent.display())))?;

        let plan = entries
            .iter()
            .rev()
            .filter(|e| e.number > after)
            .map(|e| {
                e.number
                    .checked_add(1)
                    .map(|n| planned_move(e, n))
                    .ok_or_else(|| FestError::InvalidEntryName(format!("{} cannot be shifted up", e.name)))
            })
            .collect::<Result<Vec<_>>>()?;
        let shifted = self.apply(parent, &plan, false, cancel)?;

        let path = parent.join(format_name(kind, number, name));
        let created = create_slot(kind, &path);
        if let Err(e) = created {
            return Err(abort(parent, shifted, e));
        }

        tracing::info!(
            kind = %kind,
            number,
            path = %path.display(),
            shifted = shifted.len(),
            "inserted entry"
        );
        Ok(InsertOutcome {
            kind,
            number,
            path,
            shifted,
        })
    }

    /// Delete the `kind` entry numbered `number` and shift every higher
    /// sibling down by one.
    ///
    /// # Errors
    ///
    /// - [`FestError::NotFound`] if no such entry exists.
    /// - [`FestError::InvalidEntryName`] if several entries share `number`.
    /// - [`FestError::ShiftAborted`] if the entry was removed but the shift
    ///   did not complete.
    pub fn remove(&self, parent: &Path, kind: EntryKind, number: u32, cancel: &CancelToken) -> Result<RemoveOutcome> {
        cancel.check()?;
        let entries = scan(parent, kind)?;

        let mut matching = entries.iter().filter(|e| e.number == number);
        let Some(target) = matching.next() else {
            return Err(FestError::NotFound {
                what: "numbered entry",
                path: parent.join(format!("{number:0width$}_*", width = kind.width())),
            });
        };
        if let Some(other) = matching.next() {
            return Err(FestError::InvalidEntryName(format!(
                "{} and {} share number {number}",
                target.name, other.name
            )));
        }

        let removed = target.path.clone();
        let deleted = if kind.is_dir() {
            fs::remove_dir_all(&removed)
        } else {
            fs::remove_file(&removed)
        };
        deleted.map_err(|e| FestError::io("remove", &removed, e))?;
        tracing::debug!(path = %removed.display(), "removed entry");

        let plan: Vec<_> = entries
            .iter()
            .filter(|e| e.number > number)
            .map(|e| planned_move(e, e.number - 1))
            .collect();
        let shifted = self.apply(parent, &plan, true, cancel)?;

        tracing::info!(
            kind = %kind,
            number,
            path = %removed.display(),
            shifted = shifted.len(),
            "removed entry and closed gap"
        );
        Ok(RemoveOutcome {
            kind,
            number,
            removed,
            shifted,
        })
    }

    /// Renumber the `kind` entries under `parent` to exactly `1..=count`,
    /// keeping their current order. Returns the renames performed.
    ///
    /// # Errors
    ///
    /// Same as the shift in [`Renumberer::insert`].
    pub fn compact(&self, parent: &Path, kind: EntryKind, cancel: &CancelToken) -> Result<Vec<AppliedRename>> {
        cancel.check()?;
        let entries = scan(parent, kind)?;

        let targets: Vec<(&OrderedEntry, u32)> = entries.iter().zip(1..).collect();
        let down = targets.iter().filter(|(e, n)| *n < e.number);
        let up = targets.iter().rev().filter(|(e, n)| *n > e.number);
        let plan: Vec<_> = down.chain(up).map(|(e, n)| planned_move(e, *n)).collect();

        let applied = self.apply(parent, &plan, false, cancel)?;
        if !applied.is_empty() {
            tracing::info!(kind = %kind, parent = %parent.display(), renamed = applied.len(), "compacted entries");
        }
        Ok(applied)
    }

    /// Execute `plan` in order. When `mutated` is set the caller already
    /// changed the directory, so even a first-rename failure is reported as
    /// [`FestError::ShiftAborted`].
    fn apply(
        &self,
        parent: &Path,
        plan: &[(PathBuf, PathBuf)],
        mutated: bool,
        cancel: &CancelToken,
    ) -> Result<Vec<AppliedRename>> {
        let mut applied = Vec::with_capacity(plan.len());
        for (from, to) in plan {
            if let Err(e) = self.rename_one(from, to, cancel) {
                if applied.is_empty() && !mutated {
                    return Err(e);
                }
                return Err(abort(parent, applied, e));
            }
            applied.push(AppliedRename {
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(applied)
    }

    fn rename_one(&self, from: &Path, to: &Path, cancel: &CancelToken) -> Result<()> {
        cancel.check()?;
        if to.exists() {
            return Err(FestError::DestinationExists(to.to_path_buf()));
        }
        self.ops
            .rename(from, to)
            .map_err(|e| FestError::io("rename", from, e))?;
        tracing::debug!(from = %from.display(), to = %to.display(), "shifted entry");
        Ok(())
    }
}

fn planned_move(entry: &OrderedEntry, number: u32) -> (PathBuf, PathBuf) {
    let to = entry.parent().join(entry.name_with_number(number));
    (entry.path.clone(), to)
}

fn create_slot(kind: EntryKind, path: &Path) -> Result<()> {
    let created = if kind.is_dir() {
        fs::create_dir(path)
    } else {
        OpenOptions::new().write(true).create_new(true).open(path).map(drop)
    };
    created.map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            FestError::DestinationExists(path.to_path_buf())
        } else {
            FestError::io("create", path, e)
        }
    })
}

fn abort(parent: &Path, applied: Vec<AppliedRename>, source: FestError) -> FestError {
    if applied.is_empty() {
        return source;
    }
    tracing::error!(
        parent = %parent.display(),
        applied = applied.len(),
        error = %source,
        "shift aborted; applied renames were not rolled back"
    );
    FestError::ShiftAborted {
        parent: parent.to_path_buf(),
        applied,
        source: Box::new(source),
    }
}
