use crate::cmd::display_path;
use crate::output::{OutputMode, pretty_section, render};
use anyhow::Result;
use clap::Args;
use fest_core::Status;
use fest_core::root::{FestivalRef, find_root, list_festivals};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only festivals in this status.
    #[arg(long)]
    pub status: Option<Status>,
}

pub fn run_list(args: &ListArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let root = find_root(cwd)?;
    let festivals: Vec<FestivalRef> = list_festivals(&root)?
        .into_iter()
        .filter(|f| args.status.is_none_or(|s| f.status == s))
        .collect();

    render(output, &festivals, |list, w| {
        if output.is_pretty() {
            for status in Status::ALL {
                let group: Vec<_> = list.iter().filter(|f| f.status == status).collect();
                if group.is_empty() {
                    continue;
                }
                pretty_section(w, &format!("{status} ({})", group.len()))?;
                for f in group {
                    let id = f.id.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
                    writeln!(w, "  {id:<7} {}", display_path(&root, &f.path))?;
                }
                writeln!(w)?;
            }
            if list.is_empty() {
                writeln!(w, "no festivals")?;
            }
            Ok(())
        } else {
            for f in list {
                let id = f.id.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
                writeln!(w, "{id}\t{}\t{}", f.status, display_path(&root, &f.path))?;
            }
            Ok(())
        }
    })
}
