use crate::cmd::{display_path, target_dir};
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use fest_core::{AppliedRename, CancelToken, EntryKind, Renumberer};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct RenumberArgs {
    /// Entry kind: phase, sequence (seq), or task.
    pub kind: EntryKind,

    /// Directory holding the entries (default: current directory).
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(Serialize)]
struct RenumberResult {
    kind: EntryKind,
    renamed: Vec<AppliedRename>,
}

pub fn run_renumber(args: &RenumberArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let parent = target_dir(cwd, args.dir.as_deref());
    let renamed = Renumberer::new().compact(&parent, args.kind, &CancelToken::new())?;
    let result = RenumberResult {
        kind: args.kind,
        renamed,
    };

    render(output, &result, |r, w| {
        if r.renamed.is_empty() {
            return writeln!(w, "✓ {} entries already numbered 1..N", r.kind);
        }
        writeln!(w, "✓ renumbered {} {} entries", r.renamed.len(), r.kind)?;
        for rename in &r.renamed {
            writeln!(
                w,
                "  {} -> {}",
                display_path(&parent, &rename.from),
                display_path(&parent, &rename.to)
            )?;
        }
        Ok(())
    })
}
