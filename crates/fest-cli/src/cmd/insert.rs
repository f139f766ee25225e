use crate::cmd::{display_path, target_dir};
use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use fest_core::{CancelToken, EntryKind, Renumberer};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InsertArgs {
    /// Entry kind: phase, sequence (seq), or task.
    pub kind: EntryKind,

    /// Human name for the new entry.
    pub name: String,

    /// Number of the entry to insert after (0 inserts first).
    #[arg(long)]
    pub after: u32,

    /// Parent directory: the festival for phases, a phase for sequences, a
    /// sequence for tasks (default: current directory).
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn run_insert(args: &InsertArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let parent = target_dir(cwd, args.dir.as_deref());
    let outcome = Renumberer::new().insert(&parent, args.kind, args.after, &args.name, &CancelToken::new())?;

    render(output, &outcome, |o, w| {
        writeln!(w, "✓ {} {} -> {}", o.kind, o.number, display_path(&parent, &o.path))?;
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
