use crate::output::{OutputMode, render};
use anyhow::Result;
use clap::Args;
use fest_core::config::project_config_path;
use fest_core::root::init_root;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory).
    pub path: Option<PathBuf>,
}

const CONFIG_TOML: &str = "[registry]\n\
    enabled = true\n\
    \n\
    [history]\n\
    enabled = true\n";

#[derive(Serialize)]
struct InitResult {
    root: PathBuf,
    created_config: bool,
}

/// Execute `fest init`. Creates the root skeleton:
///
/// ```text
/// .festival/
///   config.toml       (default project config, kept if present)
/// planned/  active/  completed/  dungeon/
/// ```
///
/// Running it again on an existing root is harmless.
///
/// # Errors
///
/// Returns an error if a directory or the config file cannot be created.
pub fn run_init(args: &InitArgs, output: OutputMode, cwd: &Path) -> Result<()> {
    let root = crate::cmd::target_dir(cwd, args.path.as_deref());
    init_root(&root)?;

    let config_path = project_config_path(&root);
    let created_config = !config_path.exists();
    if created_config {
        fest_core::fsops::atomic_write(&config_path, CONFIG_TOML.as_bytes())?;
    }

    let result = InitResult {
        root,
        created_config,
    };
    render(output, &result, |r, w| {
        writeln!(w, "✓ festivals root ready at {}", r.root.display())
    })
}
