use crate::cmd::display_path;
use crate::output::{OutputMode, render};
use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use fest_core::root::{find_root, reconcile};
use fest_core::{FestError, Registry};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Start from an empty registry when the existing file is unreadable.
    /// The old file is kept as `id_registry.json.corrupt`.
    #[arg(long)]
    pub rebuild: bool,
}

pub fn run_reconcile(args: &ReconcileArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let root = find_root(cwd)?;
    let mut rebuilt = false;
    let mut registry = match Registry::load(&root) {
        Ok(registry) => registry,
        Err(FestError::RegistryCorrupt { path, source }) if args.rebuild => {
            let backup = path.with_extension("json.corrupt");
            std::fs::rename(&path, &backup)
                .with_context(|| format!("Failed to set aside {}", path.display()))?;
            tracing::warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %source,
                "rebuilding corrupt registry"
            );
            rebuilt = true;
            Registry::empty(&root)
        }
        Err(e) => return Err(e.into()),
    };

    let report = reconcile(&mut registry, Utc::now())?;
    if rebuilt {
        registry.save()?;
    }

    render(output, &report, |r, w| {
        if r.is_clean() {
            writeln!(w, "✓ registry matches the tree ({} entries)", registry.len())?;
        } else {
            writeln!(
                w,
                "✓ registry repaired: {} added, {} updated, {} dropped",
                r.added.len(),
                r.updated.len(),
                r.dropped.len()
            )?;
        }
        for path in &r.unregistered {
            writeln!(w, "  unregistered: {}", display_path(&root, path))?;
        }
        Ok(())
    })
}
