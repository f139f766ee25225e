use crate::cmd::display_path;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use anyhow::Result;
use clap::Args;
use fest_core::history::{HistoryEntry, read_history};
use fest_core::root::{FestivalRef, find_root, registry_entry_for, resolve};
use fest_core::scan::scan_or_empty;
use fest_core::{EntryKind, Registry, RegistryEntry};
use serde::Serialize;
use std::path::{Component, Path};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Festival ID (GU0001), directory name, or path.
    pub festival: String,
}

/// Load the registry for lookups. A corrupt registry only costs the fast
/// path, so it is logged and skipped.
pub fn load_registry_for_lookup(root: &Path) -> Option<Registry> {
    match Registry::load(root) {
        Ok(registry) => Some(registry),
        Err(e) => {
            tracing::warn!(error = %e, "registry unreadable, resolving by scan");
            None
        }
    }
}

/// Resolve a user-supplied festival key. Paths are taken relative to the
/// working directory; IDs and names go through the registry and a scan.
pub fn resolve_festival(root: &Path, cwd: &Path, key: &str) -> Result<FestivalRef> {
    let as_path = Path::new(key);
    let looks_like_path = as_path.components().count() > 1
        || matches!(as_path.components().next(), Some(Component::CurDir | Component::ParentDir));
    if looks_like_path {
        let candidate = cwd.join(as_path);
        if candidate.is_dir() {
            let canonical = candidate.canonicalize().unwrap_or(candidate);
            let canonical_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
            let rel = canonical.strip_prefix(&canonical_root).unwrap_or(&canonical);
            return Ok(resolve(root, None, &root.join(rel).display().to_string())?);
        }
    }

    let registry = load_registry_for_lookup(root);
    Ok(resolve(root, registry.as_ref(), key)?)
}

#[derive(Serialize)]
struct PhaseSummary {
    number: u32,
    name: String,
    sequences: usize,
}

#[derive(Serialize)]
struct ShowResult {
    #[serde(flatten)]
    festival: FestivalRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    registry: Option<RegistryEntry>,
    phases: Vec<PhaseSummary>,
    history: Vec<HistoryEntry>,
}

pub fn run_show(args: &ShowArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let root = find_root(cwd)?;
    let festival = resolve_festival(&root, cwd, &args.festival)?;

    let registry = load_registry_for_lookup(&root)
        .and_then(|r| registry_entry_for(&r, &festival.path).cloned());

    let mut phases = Vec::new();
    for phase in scan_or_empty(&festival.path, EntryKind::Phase)? {
        let sequences = scan_or_empty(&phase.path, EntryKind::Sequence)?.len();
        phases.push(PhaseSummary {
            number: phase.number,
            name: phase.name,
            sequences,
        });
    }

    let history = match read_history(&festival.path) {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(error = %e, "status history unreadable");
            Vec::new()
        }
    };

    let result = ShowResult {
        festival,
        registry,
        phases,
        history,
    };

    render(output, &result, |r, w| {
        let id = r
            .festival
            .id
            .as_ref()
            .map_or_else(|| "(unregistered)".to_string(), ToString::to_string);
        pretty_section(w, &format!("{} {}", id, r.festival.dir_name))?;
        pretty_kv(w, "status", r.festival.status.as_str())?;
        pretty_kv(w, "path", display_path(&root, &r.festival.path))?;
        if let Some(entry) = &r.registry {
            pretty_kv(w, "name", &entry.name)?;
            pretty_kv(w, "created", entry.created_at.to_rfc3339())?;
        }
        if !r.phases.is_empty() {
            writeln!(w)?;
            for phase in &r.phases {
                writeln!(w, "  {}  ({} sequences)", phase.name, phase.sequences)?;
            }
        }
        if !r.history.is_empty() {
            writeln!(w)?;
            for entry in &r.history {
                write!(
                    w,
                    "  {}  {} -> {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.from_status,
                    entry.to_status
                )?;
                match &entry.note {
                    Some(note) => writeln!(w, "  {note}")?,
                    None => writeln!(w)?,
                }
            }
        }
        Ok(())
    })
}
