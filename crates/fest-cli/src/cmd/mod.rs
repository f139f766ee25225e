pub mod create;
pub mod init;
pub mod insert;
pub mod list;
pub mod reconcile;
pub mod remove;
pub mod renumber;
pub mod show;
pub mod status;

use std::path::{Path, PathBuf};

/// `--dir` relative to the working directory, or the working directory.
pub fn target_dir(cwd: &Path, dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd.to_path_buf(),
    }
}

/// Path shown to users: relative to `base` when inside it.
pub fn display_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
