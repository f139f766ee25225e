//! Moving festivals between lifecycle directories.
//!
//! The directory move is the authoritative change. The status history entry
//! and the registry update are side records: each goes through its own
//! best-effort path, and a failure there is reported in the
//! [`TransitionOutcome`] and logged, never returned as the move's error.
//!
//! # Algorithm
//!
//! 1. Infer the current status from the festival's parent directory. Moving
//!    to the same status is a no-op: nothing is written or moved.
//! 2. Compute the destination (`completed/YYYY-MM/<name>` for completed,
//!    `<status>/<name>` otherwise). An existing destination aborts the
//!    transition before anything is touched.
//! 3. Append the history entry inside the festival, so it travels with it.
//! 4. Create the destination's parent and move the directory: one rename,
//!    or copy-then-delete across devices. If the move fails, the history
//!    file is put back as it was and the festival is left unmodified.
//! 5. Update the registry entry's status and path.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::config::ProjectConfig;
use crate::error::{FestError, Result};
use crate::fsops::{FsOps, MoveMethod, StdFs, ensure_dir, move_dir};
use crate::history::{HistoryEntry, HistorySnapshot, append_history};
use crate::id::extract_id_from_dir_name;
use crate::registry::Registry;
use crate::root::{destination_for, registry_entry_for, status_of};
use crate::status::Status;

/// What happened to a side record during a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SideRecord {
    Written,
    /// Turned off in `.festival/config.toml`.
    Disabled,
    /// The festival has no ID suffix and no registry entry.
    NotRegistered,
    /// Nothing to record (no-op transition).
    Unchanged,
    /// The write failed; the move still stands.
    Skipped(String),
}

impl SideRecord {
    #[must_use]
    pub const fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// A requested status change.
#[derive(Debug, Clone)]
pub struct Transition {
    pub festival: PathBuf,
    pub to: Status,
    pub note: Option<String>,
    /// Wall-clock time of the transition. Picks the completed month.
    pub at: DateTime<Utc>,
}

/// Result of [`StatusEngine::transition`].
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub from: Status,
    pub to: Status,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    /// `None` for a no-op transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<MoveMethod>,
    pub history: SideRecord,
    pub registry: SideRecord,
}

impl TransitionOutcome {
    /// Whether the festival actually moved.
    #[must_use]
    pub const fn moved(&self) -> bool {
        self.method.is_some()
    }
}

/// Moves festivals between status directories under one root.
pub struct StatusEngine<'a> {
    root: PathBuf,
    ops: &'a dyn FsOps,
    record_history: bool,
    update_registry: bool,
}

impl std::fmt::Debug for StatusEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusEngine")
            .field("root", &self.root)
            .field("record_history", &self.record_history)
            .field("update_registry", &self.update_registry)
            .finish_non_exhaustive()
    }
}

impl StatusEngine<'static> {
    /// Engine using the real filesystem with both side records on.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        static STD_FS: StdFs = StdFs;
        Self {
            root: root.into(),
            ops: &STD_FS,
            record_history: true,
            update_registry: true,
        }
    }
}

impl<'a> StatusEngine<'a> {
    /// Route renames and copies through `ops`.
    #[must_use]
    pub fn with_ops<'b>(self, ops: &'b dyn FsOps) -> StatusEngine<'b> {
        StatusEngine {
            root: self.root,
            ops,
            record_history: self.record_history,
            update_registry: self.update_registry,
        }
    }

    /// Apply the side-record switches from project config.
    #[must_use]
    pub const fn with_config(mut self, config: &ProjectConfig) -> Self {
        self.record_history = config.history.enabled;
        self.update_registry = config.registry.enabled;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Move a festival to `request.to`. Returns where it ended up.
    ///
    /// # Errors
    ///
    /// - [`FestError::NotFound`] if the festival directory does not exist.
    /// - [`FestError::FestivalNotFound`] if it is not inside a status
    ///   directory.
    /// - [`FestError::DestinationExists`] if the target exists; nothing is
    ///   modified in that case.
    /// - [`FestError::Cancelled`] / [`FestError::Io`] from the move itself.
    ///
    /// History and registry failures are not errors; see
    /// [`TransitionOutcome::history`] and [`TransitionOutcome::registry`].
    pub fn transition(&self, request: &Transition, cancel: &CancelToken) -> Result<TransitionOutcome> {
        cancel.check()?;
        let source = &request.festival;
        if !source.is_dir() {
            return Err(FestError::NotFound {
                what: "festival directory",
                path: source.clone(),
            });
        }
        let from = status_of(&self.root, source)?;

        if from == request.to {
            tracing::debug!(status = %from, path = %source.display(), "status unchanged");
            return Ok(TransitionOutcome {
                from,
                to: request.to,
                old_path: source.clone(),
                new_path: source.clone(),
                method: None,
                history: SideRecord::Unchanged,
                registry: SideRecord::Unchanged,
            });
        }

        let dir_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FestError::InvalidEntryName(source.display().to_string()))?;
        let destination = destination_for(&self.root, request.to, dir_name, request.at);
        if destination.exists() {
            return Err(FestError::DestinationExists(destination));
        }

        let (history, snapshot) = self.record_history_entry(source, from, request);

        let method = match self.move_festival(source, &destination, cancel) {
            Ok(method) => method,
            Err(e) => {
                if let Some(snapshot) = snapshot {
                    snapshot.restore();
                }
                return Err(e);
            }
        };

        let registry = self.update_registry_entry(source, &destination, request);

        tracing::info!(
            from = %from,
            to = %request.to,
            path = %destination.display(),
            ?method,
            "festival moved"
        );

        Ok(TransitionOutcome {
            from,
            to: request.to,
            old_path: source.clone(),
            new_path: destination,
            method: Some(method),
            history,
            registry,
        })
    }

    fn move_festival(&self, source: &Path, destination: &Path, cancel: &CancelToken) -> Result<MoveMethod> {
        if let Some(parent) = destination.parent() {
            ensure_dir(parent)?;
        }
        move_dir(self.ops, source, destination, cancel)
    }

    /// Best-effort history append. The snapshot undoes the append if the
    /// move then fails.
    fn record_history_entry(
        &self,
        festival: &Path,
        from: Status,
        request: &Transition,
    ) -> (SideRecord, Option<HistorySnapshot>) {
        if !self.record_history {
            return (SideRecord::Disabled, None);
        }
        let snapshot = match HistorySnapshot::take(festival) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(path = %festival.display(), error = %e, "status history not written");
                return (SideRecord::Skipped(e.to_string()), None);
            }
        };
        let entry = HistoryEntry {
            timestamp: request.at,
            from_status: from,
            to_status: request.to,
            note: request.note.clone(),
        };
        match append_history(festival, entry) {
            Ok(true) => (SideRecord::Written, Some(snapshot)),
            Ok(false) => (SideRecord::Unchanged, None),
            Err(e) => {
                tracing::warn!(path = %festival.display(), error = %e, "status history not written");
                (SideRecord::Skipped(e.to_string()), None)
            }
        }
    }

    /// Best-effort registry update. The directory is already at `new_path`.
    fn update_registry_entry(&self, old_path: &Path, new_path: &Path, request: &Transition) -> SideRecord {
        if !self.update_registry {
            return SideRecord::Disabled;
        }
        match self.try_update_registry(old_path, new_path, request) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    path = %new_path.display(),
                    error = %e,
                    "registry not updated; run `fest reconcile` to repair"
                );
                SideRecord::Skipped(e.to_string())
            }
        }
    }

    fn try_update_registry(&self, old_path: &Path, new_path: &Path, request: &Transition) -> Result<SideRecord> {
        let mut registry = Registry::load(&self.root)?;

        let existing = registry_entry_for(&registry, old_path).cloned();
        let entry = match existing {
            Some(mut entry) => {
                entry.status = request.to;
                entry.path = registry.relative(new_path);
                entry.updated_at = request.at;
                entry
            }
            None => {
                let Some(id) = new_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(extract_id_from_dir_name)
                else {
                    return Ok(SideRecord::NotRegistered);
                };
                let name = new_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.rsplit_once('_'))
                    .map(|(stem, _)| stem.replace('-', " "))
                    .unwrap_or_default();
                registry.new_entry(id, name, request.to, new_path, request.at)
            }
        };

        registry.update(entry);
        registry.save()?;
        Ok(SideRecord::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsops::testing::CrossDeviceFs;
    use crate::history::{history_path, read_history};
    use crate::root::{create_festival, init_root};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).single().expect("ts")
    }

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("festivals");
        init_root(&root).expect("init");
        let mut reg = Registry::load(&root).expect("load");
        let created = create_festival(&mut reg, "guild usable", Status::Active, march()).expect("create");
        fs::create_dir_all(created.path.join("001_PLANNING/01_requirements")).expect("mkdir");
        fs::write(created.path.join("001_PLANNING/01_requirements/01_scope.md"), "scope").expect("write");
        (tmp, root, created.path)
    }

    fn to(festival: &Path, status: Status) -> Transition {
        Transition {
            festival: festival.to_path_buf(),
            to: status,
            note: None,
            at: march(),
        }
    }

    #[test]
    fn completing_files_under_month() {
        let (_tmp, root, festival) = setup();
        let outcome = StatusEngine::new(&root)
            .transition(&to(&festival, Status::Completed), &CancelToken::new())
            .expect("transition");

        let expected = root.join("completed/2025-03/guild-usable_GU0001");
        assert_eq!(outcome.new_path, expected);
        assert_eq!(outcome.method, Some(MoveMethod::Renamed));
        assert!(!festival.exists());
        assert_eq!(
            fs::read_to_string(expected.join("001_PLANNING/01_requirements/01_scope.md")).expect("read"),
            "scope"
        );

        assert!(outcome.history.is_written());
        let history = read_history(&expected).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from_status, Status::Active);
        assert_eq!(history[0].to_status, Status::Completed);

        assert!(outcome.registry.is_written());
        let reg = Registry::load(&root).expect("reload");
        let entry = reg.get(&"GU0001".parse().expect("id")).expect("entry");
        assert_eq!(entry.status, Status::Completed);
        assert_eq!(entry.path, PathBuf::from("completed/2025-03/guild-usable_GU0001"));
    }

    #[test]
    fn same_status_is_a_no_op() {
        let (_tmp, root, festival) = setup();
        let outcome = StatusEngine::new(&root)
            .transition(&to(&festival, Status::Active), &CancelToken::new())
            .expect("transition");
        assert!(!outcome.moved());
        assert_eq!(outcome.new_path, festival);
        assert_eq!(outcome.history, SideRecord::Unchanged);
        assert!(!history_path(&festival).exists());
    }

    #[test]
    fn conflicting_destination_leaves_source_untouched() {
        let (_tmp, root, festival) = setup();
        fs::create_dir_all(root.join("dungeon/guild-usable_GU0001")).expect("mkdir");

        let err = StatusEngine::new(&root)
            .transition(&to(&festival, Status::Dungeon), &CancelToken::new())
            .expect_err("conflict");
        assert!(matches!(err, FestError::DestinationExists(_)));
        assert!(festival.join("001_PLANNING/01_requirements/01_scope.md").exists());
        assert!(!history_path(&festival).exists());
    }

    #[test]
    fn cross_device_move_copies_then_deletes() {
        let (_tmp, root, festival) = setup();
        let ops = CrossDeviceFs::new(None);
        let outcome = StatusEngine::new(&root)
            .with_ops(&ops)
            .transition(&to(&festival, Status::Planned), &CancelToken::new())
            .expect("transition");

        assert_eq!(outcome.method, Some(MoveMethod::CopiedAcrossDevices));
        assert!(!festival.exists());
        let moved = root.join("planned/guild-usable_GU0001");
        assert_eq!(
            fs::read_to_string(moved.join("001_PLANNING/01_requirements/01_scope.md")).expect("read"),
            "scope"
        );
        assert_eq!(read_history(&moved).expect("history").len(), 1);
    }

    #[test]
    fn failed_copy_keeps_festival_in_place() {
        let (_tmp, root, festival) = setup();
        let ops = CrossDeviceFs::new(Some(0));
        let err = StatusEngine::new(&root)
            .with_ops(&ops)
            .transition(&to(&festival, Status::Planned), &CancelToken::new())
            .expect_err("copy fails");
        assert!(matches!(err, FestError::Io { .. }));
        assert!(festival.is_dir());
        assert!(!root.join("planned/guild-usable_GU0001").exists());
        assert!(read_history(&festival).expect("history").is_empty());

        let reg = Registry::load(&root).expect("reload");
        let entry = reg.get(&"GU0001".parse().expect("id")).expect("entry");
        assert_eq!(entry.status, Status::Active);
    }

    #[test]
    fn registry_failure_does_not_undo_move() {
        let (_tmp, root, festival) = setup();
        fs::write(Registry::path_for(&root), "{broken").expect("corrupt registry");

        let outcome = StatusEngine::new(&root)
            .transition(&to(&festival, Status::Dungeon), &CancelToken::new())
            .expect("transition");
        assert!(matches!(outcome.registry, SideRecord::Skipped(_)));
        assert!(root.join("dungeon/guild-usable_GU0001").is_dir());
        assert!(!festival.exists());
    }

    #[test]
    fn history_failure_does_not_block_move() {
        let (_tmp, root, festival) = setup();
        let path = history_path(&festival);
        fs::write(&path, "not an array").expect("corrupt history");

        let outcome = StatusEngine::new(&root)
            .transition(&to(&festival, Status::Planned), &CancelToken::new())
            .expect("transition");
        assert!(matches!(outcome.history, SideRecord::Skipped(_)));
        assert!(outcome.registry.is_written());
        assert!(root.join("planned/guild-usable_GU0001").is_dir());
    }

    #[test]
    fn legacy_festival_is_not_registered() {
        let (_tmp, root, _festival) = setup();
        let legacy = root.join("planned/legacy-work");
        fs::create_dir_all(&legacy).expect("mkdir");

        let outcome = StatusEngine::new(&root)
            .transition(&to(&legacy, Status::Active), &CancelToken::new())
            .expect("transition");
        assert_eq!(outcome.registry, SideRecord::NotRegistered);
        assert!(root.join("active/legacy-work").is_dir());
    }

    #[test]
    fn side_records_can_be_disabled() {
        let (_tmp, root, festival) = setup();
        let mut config = ProjectConfig::default();
        config.history.enabled = false;
        config.registry.enabled = false;

        let outcome = StatusEngine::new(&root)
            .with_config(&config)
            .transition(&to(&festival, Status::Dungeon), &CancelToken::new())
            .expect("transition");
        assert_eq!(outcome.history, SideRecord::Disabled);
        assert_eq!(outcome.registry, SideRecord::Disabled);
        assert!(!history_path(&outcome.new_path).exists());
    }

    #[test]
    fn cancelled_transition_does_nothing() {
        let (_tmp, root, festival) = setup();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = StatusEngine::new(&root)
            .transition(&to(&festival, Status::Completed), &cancel)
            .expect_err("cancelled");
        assert!(matches!(err, FestError::Cancelled));
        assert!(festival.is_dir());
    }
}
