use crate::cmd::display_path;
use crate::cmd::show::resolve_festival;
use crate::output::{OutputMode, render};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use fest_core::config::ProjectConfig;
use fest_core::root::find_root;
use fest_core::{CancelToken, SideRecord, Status, StatusEngine, Transition};
use std::path::Path;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Festival ID (GU0001), directory name, or path.
    pub festival: String,

    /// Target status: planned, active, completed, or dungeon.
    pub to: Status,

    /// Note recorded in the festival's status history.
    #[arg(long)]
    pub note: Option<String>,
}

pub fn run_status(args: &StatusArgs, output: OutputMode, config: &ProjectConfig, cwd: &Path) -> Result<()> {
    let root = find_root(cwd)?;
    let festival = resolve_festival(&root, cwd, &args.festival)?;

    let request = Transition {
        festival: festival.path,
        to: args.to,
        note: args.note.clone(),
        at: Utc::now(),
    };
    let outcome = StatusEngine::new(&root)
        .with_config(config)
        .transition(&request, &CancelToken::new())?;

    render(output, &outcome, |o, w| {
        if !o.moved() {
            return writeln!(w, "✓ already {}: {}", o.to, display_path(&root, &o.new_path));
        }
        writeln!(
            w,
            "✓ {} -> {}: {}",
            o.from,
            o.to,
            display_path(&root, &o.new_path)
        )?;
        for (label, record) in [("history", &o.history), ("registry", &o.registry)] {
            if let SideRecord::Skipped(reason) = record {
                writeln!(w, "  warning: {label} not updated: {reason}")?;
            }
        }
        Ok(())
    })
}
