//! Persistent ID registry for a festivals root.
//!
//! Lives at `<root>/.festival/id_registry.json`:
//!
//! ```json
//! {
//!   "version": 1,
//!   "counters": { "GU": 2 },
//!   "entries": {
//!     "GU0001": { "id": "GU0001", "name": "guild usable", "status": "active",
//!                 "path": "active/guild-usable_GU0001", ... }
//!   }
//! }
//! ```
//!
//! # Invariants
//!
//! - `counters` is a per-prefix high-water mark. Counters are never reused,
//!   even after an entry is removed.
//! - [`Registry::next_id`] persists the new high-water mark before it
//!   returns.
//! - Every save replaces the whole file atomically.
//! - `path` is stored relative to the root.
//!
//! The registry assumes a single writer per root; it takes no locks.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FestError, Result};
use crate::fsops::atomic_write;
use crate::id::{EntityId, MAX_COUNTER};
use crate::root::{MARKER_DIR, REGISTRY_FILE};
use crate::status::Status;

const REGISTRY_VERSION: u32 = 1;

/// One registered festival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    pub status: Status,
    /// Location relative to the festivals root.
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    counters: BTreeMap<String, u32>,
    #[serde(default)]
    entries: BTreeMap<String, RegistryEntry>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            counters: BTreeMap::new(),
            entries: BTreeMap::new(),
        }
    }
}

const fn default_version() -> u32 {
    REGISTRY_VERSION
}

/// In-memory view of a registry file. Load, mutate, [`save`](Self::save).
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
    file: RegistryFile,
}

impl Registry {
    /// Registry file location for `root`.
    #[must_use]
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(MARKER_DIR).join(REGISTRY_FILE)
    }

    /// Load the registry for `root`. A missing file is an empty registry.
    ///
    /// # Errors
    ///
    /// Returns [`FestError::RegistryCorrupt`] if the file is not valid JSON
    /// and [`FestError::Io`] if it cannot be read.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path_for(root);
        let file = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => RegistryFile::default(),
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|source| FestError::RegistryCorrupt { path, source })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => RegistryFile::default(),
            Err(e) => return Err(FestError::io("read", &path, e)),
        };
        Ok(Self {
            root: root.to_path_buf(),
            file,
        })
    }

    /// A registry with no entries and no counters, ignoring whatever is on
    /// disk. Used to rebuild a corrupt registry from a tree scan.
    #[must_use]
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            file: RegistryFile::default(),
        }
    }

    /// Write the whole registry atomically.
    ///
    /// # Errors
    ///
    /// Returns [`FestError::Io`] if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let path = Self::path_for(&self.root);
        let json = serde_json::to_vec_pretty(&self.file)
            .map_err(|source| FestError::RegistryCorrupt {
                path: path.clone(),
                source,
            })?;
        atomic_write(&path, &json)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate the next ID for `prefix` and persist the high-water mark.
    ///
    /// # Errors
    ///
    /// Returns [`FestError::InvalidEntityId`] for a malformed prefix,
    /// [`FestError::CounterExhausted`] past `9999`, and any error from
    /// [`save`](Self::save). On a save error the in-memory counter is not
    /// advanced.
    pub fn next_id(&mut self, prefix: &str) -> Result<EntityId> {
        let issued = self.high_water(prefix);
        if issued >= MAX_COUNTER {
            return Err(FestError::CounterExhausted(prefix.to_string()));
        }
        let id = EntityId::new(prefix, issued + 1)?;

        let previous = self.file.counters.insert(prefix.to_string(), id.counter());
        if let Err(e) = self.save() {
            match previous {
                Some(v) => self.file.counters.insert(prefix.to_string(), v),
                None => self.file.counters.remove(prefix),
            };
            return Err(e);
        }

        tracing::debug!(%id, "allocated festival id");
        Ok(id)
    }

    /// Highest counter issued for `prefix`, from the counters table or any
    /// entry carrying that prefix.
    #[must_use]
    pub fn high_water(&self, prefix: &str) -> u32 {
        let recorded = self.file.counters.get(prefix).copied().unwrap_or(0);
        let seen = self
            .file
            .entries
            .values()
            .filter(|e| e.id.prefix() == prefix)
            .map(|e| e.id.counter())
            .max()
            .unwrap_or(0);
        recorded.max(seen)
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&RegistryEntry> {
        self.file.entries.get(&id.to_string())
    }

    /// Insert or replace the entry for `entry.id`. Raises the prefix
    /// counter if the entry's counter is above it. Call
    /// [`save`](Self::save) to persist.
    pub fn update(&mut self, entry: RegistryEntry) {
        let prefix = entry.id.prefix().to_string();
        let counter = self.file.counters.entry(prefix).or_insert(0);
        *counter = (*counter).max(entry.id.counter());
        self.file.entries.insert(entry.id.to_string(), entry);
    }

    /// Drop a live entry. Its counter stays reserved.
    pub fn remove(&mut self, id: &EntityId) -> Option<RegistryEntry> {
        self.file.entries.remove(&id.to_string())
    }

    /// Find the entry whose recorded location is `path` (absolute or
    /// relative to the root).
    #[must_use]
    pub fn find_by_path(&self, path: &Path) -> Option<&RegistryEntry> {
        let rel = self.relative(path);
        self.file.entries.values().find(|e| e.path == rel)
    }

    /// Entries ordered by ID.
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.file.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file.entries.is_empty()
    }

    /// Absolute location of `entry`.
    #[must_use]
    pub fn absolute_path(&self, entry: &RegistryEntry) -> PathBuf {
        self.root.join(&entry.path)
    }

    /// `path` relative to the root when it lives under it, unchanged
    /// otherwise.
    #[must_use]
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map_or_else(|_| path.to_path_buf(), Path::to_path_buf)
    }

    /// Build a fresh entry for a festival at `path`.
    #[must_use]
    pub fn new_entry(
        &self,
        id: EntityId,
        name: impl Into<String>,
        status: Status,
        path: &Path,
        at: DateTime<Utc>,
    ) -> RegistryEntry {
        RegistryEntry {
            id,
            name: name.into(),
            status,
            path: self.relative(path),
            created_at: at,
            updated_at: at,
        }
    }
}
