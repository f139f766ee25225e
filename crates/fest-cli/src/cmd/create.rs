use crate::cmd::display_path;
use crate::output::{OutputMode, pretty_kv, render};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use fest_core::root::{create_festival, find_root};
use fest_core::{Registry, Status};
use std::path::Path;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Human name, e.g. "guild usable". The ID prefix comes from its words.
    pub name: String,

    /// Lifecycle status to create the festival in.
    #[arg(long, default_value = "planned")]
    pub status: Status,
}

pub fn run_create(args: &CreateArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let root = find_root(cwd)?;
    let mut registry = Registry::load(&root)?;
    let created = create_festival(&mut registry, &args.name, args.status, Utc::now())?;

    render(output, &created, |c, w| {
        if output.is_pretty() {
            writeln!(w, "✓ created {}", c.id)?;
            pretty_kv(w, "name", &c.name)?;
            pretty_kv(w, "status", c.status.as_str())?;
            pretty_kv(w, "path", display_path(&root, &c.path))
        } else {
            writeln!(w, "{}\t{}\t{}", c.id, c.status, display_path(&root, &c.path))
        }
    })
}
