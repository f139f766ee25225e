//! Festivals root layout, discovery, and festival enumeration.
//!
//! # Directory Layout
//!
//! ```text
//! festivals/
//!   .festival/
//!     id_registry.json
//!     config.toml                 # optional
//!   planned/
//!     guild-usable_GU0001/
//!   active/
//!   completed/
//!     2025-03/
//!       guild-ui_GU0002/
//!   dungeon/
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::error::{FestError, Result};
use crate::fsops::ensure_dir;
use crate::history::META_DIR;
use crate::id::{EntityId, derive_prefix, extract_id_from_dir_name, festival_dir_name};
use crate::registry::{Registry, RegistryEntry};
use crate::status::{Status, month_dir_name, parse_month_dir};

/// Marker directory identifying a festivals root.
pub const MARKER_DIR: &str = ".festival";
pub const REGISTRY_FILE: &str = "id_registry.json";
pub const CONFIG_FILE: &str = "config.toml";

/// A festival directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FestivalRef {
    /// Directory name, e.g. `guild-usable_GU0001`.
    pub dir_name: String,
    pub path: PathBuf,
    pub status: Status,
    /// `YYYY-MM` bucket for completed festivals filed by month.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    /// ID parsed from the directory name; `None` for unregistered festivals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
}

/// Directory holding festivals in `status`.
#[must_use]
pub fn status_dir(root: &Path, status: Status) -> PathBuf {
    root.join(status.as_str())
}

/// Where a festival named `dir_name` lands when it enters `status` at `at`.
#[must_use]
pub fn destination_for(root: &Path, status: Status, dir_name: &str, at: DateTime<Utc>) -> PathBuf {
    let base = status_dir(root, status);
    if status.is_dated() {
        base.join(month_dir_name(at.year(), at.month())).join(dir_name)
    } else {
        base.join(dir_name)
    }
}

/// Walk up from `start` to the nearest directory containing `.festival/`.
///
/// # Errors
///
/// Returns [`FestError::NotInitialized`] if no ancestor is a festivals root.
pub fn find_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(MARKER_DIR).is_dir() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(FestError::NotInitialized(start.to_path_buf()));
        }
    }
}

/// Create the marker and lifecycle directories under `root`. Idempotent.
///
/// # Errors
///
/// Returns [`FestError::Io`] if a directory cannot be created.
pub fn init_root(root: &Path) -> Result<()> {
    ensure_dir(&root.join(MARKER_DIR))?;
    for status in Status::ALL {
        ensure_dir(&status_dir(root, status))?;
    }
    tracing::info!(root = %root.display(), "initialized festivals root");
    Ok(())
}

/// Infer a festival's status from where it sits under `root`.
///
/// # Errors
///
/// Returns [`FestError::FestivalNotFound`] if `festival` is not directly
/// inside a status directory (or a completed month directory).
pub fn status_of(root: &Path, festival: &Path) -> Result<Status> {
    let not_found = || FestError::FestivalNotFound(festival.display().to_string());
    let rel = festival.strip_prefix(root).map_err(|_| not_found())?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str().unwrap_or(""))
        .collect();

    match parts.as_slice() {
        [status, _] => status.parse().map_err(|_| not_found()),
        [status, month, _] if parse_month_dir(month).is_some() => {
            let status: Status = status.parse().map_err(|_| not_found())?;
            if status.is_dated() {
                Ok(status)
            } else {
                Err(not_found())
            }
        }
        _ => Err(not_found()),
    }
}

fn visible_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FestError::io("read_dir", dir, e)),
    };

    let mut out = Vec::new();
    for dirent in read_dir {
        let dirent = dirent.map_err(|e| FestError::io("read_dir", dir, e))?;
        let Some(name) = dirent.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let path = dirent.path();
        if name.starts_with('.') || !path.is_dir() {
            continue;
        }
        out.push((name, path));
    }
    out.sort();
    Ok(out)
}

/// Every festival under `root`, grouped by status in lifecycle order.
///
/// Under `completed/`, `YYYY-MM` directories are descended into; any other
/// directory there is a festival completed before month filing.
///
/// # Errors
///
/// Returns [`FestError::Io`] if a status directory cannot be read.
pub fn list_festivals(root: &Path) -> Result<Vec<FestivalRef>> {
    let mut festivals = Vec::new();
    for status in Status::ALL {
        for (name, path) in visible_dirs(&status_dir(root, status))? {
            if status.is_dated() && parse_month_dir(&name).is_some() {
                for (inner, inner_path) in visible_dirs(&path)? {
                    festivals.push(FestivalRef {
                        id: extract_id_from_dir_name(&inner),
                        dir_name: inner,
                        path: inner_path,
                        status,
                        month: Some(name.clone()),
                    });
                }
            } else {
                festivals.push(FestivalRef {
                    id: extract_id_from_dir_name(&name),
                    dir_name: name,
                    path,
                    status,
                    month: None,
                });
            }
        }
    }
    Ok(festivals)
}

/// Resolve `key` to a festival: an ID (registry first, then a scan), a
/// directory name, or a path.
///
/// # Errors
///
/// Returns [`FestError::FestivalNotFound`] when nothing matches.
pub fn resolve(root: &Path, registry: Option<&Registry>, key: &str) -> Result<FestivalRef> {
    let as_path = Path::new(key);
    if as_path.components().count() > 1 || as_path.is_absolute() {
        let path = if as_path.is_absolute() {
            as_path.to_path_buf()
        } else {
            root.join(as_path)
        };
        if path.is_dir() {
            let status = status_of(root, &path)?;
            return Ok(festival_ref(&path, status));
        }
    }

    if let (Ok(id), Some(registry)) = (key.parse::<EntityId>(), registry) {
        if let Some(entry) = registry.get(&id) {
            let path = registry.absolute_path(entry);
            if path.is_dir() {
                if let Ok(status) = status_of(root, &path) {
                    return Ok(festival_ref(&path, status));
                }
            }
            tracing::debug!(%id, "registry path is stale, falling back to scan");
        }
    }

    let wanted_id = key.parse::<EntityId>().ok();
    list_festivals(root)?
        .into_iter()
        .find(|f| f.dir_name == key || (wanted_id.is_some() && f.id == wanted_id))
        .ok_or_else(|| FestError::FestivalNotFound(key.to_string()))
}

fn festival_ref(path: &Path, status: Status) -> FestivalRef {
    let dir_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let month = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .filter(|n| status.is_dated() && parse_month_dir(n).is_some())
        .map(str::to_string);
    FestivalRef {
        id: extract_id_from_dir_name(&dir_name),
        dir_name,
        path: path.to_path_buf(),
        status,
        month,
    }
}

/// Result of [`create_festival`].
#[derive(Debug, Clone, Serialize)]
pub struct CreatedFestival {
    pub id: EntityId,
    pub name: String,
    pub status: Status,
    pub path: PathBuf,
}

/// Allocate an ID for `name`, create its directory under `status`, and
/// register it.
///
/// The ID is allocated (and persisted) before the directory is created, so
/// a failed mkdir burns a counter rather than risking a reused one.
///
/// # Errors
///
/// Returns [`FestError::DestinationExists`] if the directory already
/// exists, plus any registry or IO error.
pub fn create_festival(
    registry: &mut Registry,
    name: &str,
    status: Status,
    at: DateTime<Utc>,
) -> Result<CreatedFestival> {
    let root = registry.root().to_path_buf();
    let id = registry.next_id(&derive_prefix(name))?;
    let path = destination_for(&root, status, &festival_dir_name(name, &id), at);
    if path.exists() {
        return Err(FestError::DestinationExists(path));
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::create_dir(&path).map_err(|e| FestError::io("create_dir", &path, e))?;
    ensure_dir(&path.join(META_DIR))?;

    registry.update(registry.new_entry(id.clone(), name, status, &path, at));
    registry.save()?;

    tracing::info!(%id, path = %path.display(), "created festival");
    Ok(CreatedFestival {
        id,
        name: name.to_string(),
        status,
        path,
    })
}

/// What [`reconcile`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<EntityId>,
    pub updated: Vec<EntityId>,
    pub dropped: Vec<EntityId>,
    /// Festivals without an ID suffix. Left unregistered.
    pub unregistered: Vec<PathBuf>,
}

impl ReconcileReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.dropped.is_empty()
    }
}

/// Bring the registry in line with the directory tree, which is
/// authoritative. Saves only when something changed.
///
/// # Errors
///
/// Returns an error if the tree cannot be listed or the registry cannot be
/// saved.
pub fn reconcile(registry: &mut Registry, at: DateTime<Utc>) -> Result<ReconcileReport> {
    let root = registry.root().to_path_buf();
    let festivals = list_festivals(&root)?;
    let mut report = ReconcileReport::default();
    let mut seen = Vec::new();

    for festival in &festivals {
        let Some(id) = festival.id.clone() else {
            report.unregistered.push(festival.path.clone());
            continue;
        };
        seen.push(id.clone());
        let rel = registry.relative(&festival.path);

        match registry.get(&id).cloned() {
            Some(entry) if entry.path == rel && entry.status == festival.status => {}
            Some(mut entry) => {
                entry.path = rel;
                entry.status = festival.status;
                entry.updated_at = at;
                registry.update(entry);
                report.updated.push(id);
            }
            None => {
                let name = festival
                    .dir_name
                    .rsplit_once('_')
                    .map_or(festival.dir_name.as_str(), |(stem, _)| stem)
                    .replace('-', " ");
                registry.update(registry.new_entry(id.clone(), name, festival.status, &festival.path, at));
                report.added.push(id);
            }
        }
    }

    let stale: Vec<EntityId> = registry
        .entries()
        .filter(|e| !seen.contains(&e.id))
        .map(|e| e.id.clone())
        .collect();
    for id in stale {
        registry.remove(&id);
        report.dropped.push(id);
    }

    if !report.is_clean() {
        registry.save()?;
    }
    tracing::info!(
        added = report.added.len(),
        updated = report.updated.len(),
        dropped = report.dropped.len(),
        "reconciled registry"
    );
    Ok(report)
}

/// Registry entry for a festival, by its ID suffix or recorded path.
#[must_use]
pub fn registry_entry_for<'r>(registry: &'r Registry, festival: &Path) -> Option<&'r RegistryEntry> {
    festival
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(extract_id_from_dir_name)
        .and_then(|id| registry.get(&id))
        .or_else(|| registry.find_by_path(festival))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).single().expect("ts")
    }

    fn setup() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("festivals");
        init_root(&root).expect("init");
        (tmp, root)
    }

    #[test]
    fn init_is_idempotent_and_discoverable() {
        let (_tmp, root) = setup();
        init_root(&root).expect("re-init");
        for status in Status::ALL {
            assert!(status_dir(&root, status).is_dir());
        }
        let nested = root.join("active");
        assert_eq!(find_root(&nested).expect("find"), root);
    }

    #[test]
    fn find_root_fails_outside_a_root() {
        let tmp = TempDir::new().expect("tempdir");
        assert!(matches!(
            find_root(tmp.path()),
            Err(FestError::NotInitialized(_))
        ));
    }

    #[test]
    fn creates_festivals_with_incrementing_ids() {
        let (_tmp, root) = setup();
        let mut reg = Registry::load(&root).expect("load");
        let first = create_festival(&mut reg, "guild usable", Status::Planned, march()).expect("create");
        let second = create_festival(&mut reg, "guild ui", Status::Planned, march()).expect("create");

        assert_eq!(first.id.to_string(), "GU0001");
        assert_eq!(second.id.to_string(), "GU0002");
        assert_eq!(first.path, root.join("planned/guild-usable_GU0001"));
        assert!(second.path.join(META_DIR).is_dir());

        let reloaded = Registry::load(&root).expect("reload");
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(&second.id).map(|e| e.name.as_str()), Some("guild ui"));
    }

    #[test]
    fn completed_creation_is_month_filed() {
        let (_tmp, root) = setup();
        let mut reg = Registry::load(&root).expect("load");
        let created = create_festival(&mut reg, "old work", Status::Completed, march()).expect("create");
        assert_eq!(created.path, root.join("completed/2025-03/old-work_OW0001"));
        assert_eq!(status_of(&root, &created.path).expect("status"), Status::Completed);
    }

    #[test]
    fn status_of_reads_parent_directories() {
        let (_tmp, root) = setup();
        assert_eq!(status_of(&root, &root.join("active/x")).expect("status"), Status::Active);
        assert_eq!(
            status_of(&root, &root.join("completed/legacy")).expect("status"),
            Status::Completed
        );
        assert!(status_of(&root, &root.join("active/2025-03/x")).is_err());
        assert!(status_of(&root, &root.join("elsewhere/x")).is_err());
        assert!(status_of(&root, Path::new("/not/under/root")).is_err());
    }

    #[test]
    fn lists_all_statuses_and_month_buckets() {
        let (_tmp, root) = setup();
        fs::create_dir_all(root.join("active/alpha_AL0001")).expect("mkdir");
        fs::create_dir_all(root.join("completed/2025-02/beta_BE0001")).expect("mkdir");
        fs::create_dir_all(root.join("completed/legacy-fest")).expect("mkdir");
        fs::create_dir_all(root.join("dungeon/.hidden")).expect("mkdir");

        let found = list_festivals(&root).expect("list");
        let summary: Vec<_> = found
            .iter()
            .map(|f| (f.status, f.dir_name.as_str(), f.month.as_deref(), f.id.is_some()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Status::Active, "alpha_AL0001", None, true),
                (Status::Completed, "beta_BE0001", Some("2025-02"), true),
                (Status::Completed, "legacy-fest", None, false),
            ]
        );
    }

    #[test]
    fn resolves_by_id_name_and_path() {
        let (_tmp, root) = setup();
        let mut reg = Registry::load(&root).expect("load");
        let created = create_festival(&mut reg, "guild usable", Status::Active, march()).expect("create");

        let by_id = resolve(&root, Some(&reg), "GU0001").expect("by id");
        assert_eq!(by_id.path, created.path);
        let by_scan = resolve(&root, None, "GU0001").expect("by scan");
        assert_eq!(by_scan.path, created.path);
        let by_name = resolve(&root, None, "guild-usable_GU0001").expect("by name");
        assert_eq!(by_name.status, Status::Active);
        let by_path = resolve(&root, None, "active/guild-usable_GU0001").expect("by path");
        assert_eq!(by_path.id, Some(created.id));

        assert!(matches!(
            resolve(&root, Some(&reg), "ZZ0001"),
            Err(FestError::FestivalNotFound(_))
        ));
    }

    #[test]
    fn reconcile_repairs_registry_from_tree() {
        let (_tmp, root) = setup();
        let mut reg = Registry::load(&root).expect("load");
        let kept = create_festival(&mut reg, "guild usable", Status::Planned, march()).expect("create");
        let gone = create_festival(&mut reg, "gone away", Status::Planned, march()).expect("create");

        // Moved by hand, deleted by hand, and one festival from before the registry.
        fs::rename(&kept.path, root.join("active/guild-usable_GU0001")).expect("mv");
        fs::remove_dir_all(&gone.path).expect("rm");
        fs::create_dir_all(root.join("dungeon/manual_MA0042")).expect("mkdir");
        fs::create_dir_all(root.join("dungeon/no-id-here")).expect("mkdir");

        let report = reconcile(&mut reg, march()).expect("reconcile");
        assert_eq!(report.updated, vec![kept.id.clone()]);
        assert_eq!(report.dropped, vec![gone.id.clone()]);
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.unregistered, vec![root.join("dungeon/no-id-here")]);

        let reg = Registry::load(&root).expect("reload");
        assert_eq!(reg.get(&kept.id).map(|e| e.status), Some(Status::Active));
        assert!(reg.get(&gone.id).is_none());
        assert_eq!(reg.high_water("MA"), 42);
        assert_eq!(reg.high_water("GA"), 1);
    }

    #[test]
    fn reconcile_of_clean_tree_changes_nothing() {
        let (_tmp, root) = setup();
        let mut reg = Registry::load(&root).expect("load");
        create_festival(&mut reg, "guild usable", Status::Planned, march()).expect("create");
        let report = reconcile(&mut reg, march()).expect("reconcile");
        assert!(report.is_clean());
    }
}
