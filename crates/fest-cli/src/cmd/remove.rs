use crate::cmd::{display_path, target_dir};
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use fest_core::{CancelToken, EntryKind, Renumberer};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Entry kind: phase, sequence (seq), or task.
    pub kind: EntryKind,

    /// Number of the entry to delete.
    pub number: u32,

    /// Directory holding the entry (default: current directory).
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn run_remove(args: &RemoveArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let parent = target_dir(cwd, args.dir.as_deref());
    let outcome = Renumberer::new().remove(&parent, args.kind, args.number, &CancelToken::new())?;

    render(output, &outcome, |o, w| {
        writeln!(w, "✓ removed {}", display_path(&parent, &o.removed))?;
        for rename in &o.shifted {
            writeln!(
                w,
                "  shifted {} -> {}",
                display_path(&parent, &rename.from),
                display_path(&parent, &rename.to)
            )?;
        }
        Ok(())
    })
}
