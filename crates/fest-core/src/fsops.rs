//! Filesystem primitives shared by the registry, history log, and movers.
//!
//! # Invariants
//!
//! - Whole-file writes go to a sibling temp file first and are renamed over
//!   the target, so readers never see a truncated file.
//! - A directory move is a single `rename` when possible. When source and
//!   destination are on different devices it becomes copy-then-delete, and
//!   the source is only removed after the copy fully succeeded. A failed copy
//!   removes the partial destination and leaves the source untouched.

use std::fs::{self, File};
use std::io::{self, Write as IoWrite};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::{FestError, Result};

/// `EXDEV` on Linux and macOS.
#[cfg(unix)]
const EXDEV: i32 = 18;

/// The fallible filesystem calls a directory move depends on.
///
/// [`StdFs`] is the real implementation; tests substitute one that fails on
/// demand to drive the copy fallback and its cleanup path.
pub trait FsOps {
    /// Rename `from` to `to` in one step.
    ///
    /// # Errors
    ///
    /// Whatever the underlying rename reports.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copy one regular file, including its permission bits.
    ///
    /// # Errors
    ///
    /// Whatever the underlying copy reports.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;
}

/// [`FsOps`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl FsOps for StdFs {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }
}

/// How a directory ended up at its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMethod {
    Renamed,
    CopiedAcrossDevices,
}

/// True when `err` means the rename crossed a filesystem boundary.
#[must_use]
pub fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || is_exdev(err)
}

#[cfg(unix)]
fn is_exdev(err: &io::Error) -> bool {
    err.raw_os_error() == Some(EXDEV)
}

#[cfg(not(unix))]
fn is_exdev(_err: &io::Error) -> bool {
    false
}

/// Create `path` and any missing parents.
///
/// # Errors
///
/// Returns [`FestError::Io`] if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| FestError::io("create_dir", path, e))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "fest".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Replace `path` with `bytes` via write-to-temp-then-rename.
///
/// # Errors
///
/// Returns [`FestError::Io`] if the parent cannot be created, the temp file
/// cannot be written, or the final rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let tmp = temp_sibling(path);
    let write = || -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(FestError::io("write", &tmp, e));
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        FestError::io("persist", path, e)
    })
}

/// Move directory `from` to `to`, falling back to copy-then-delete when a
/// plain rename crosses devices.
///
/// `to` must not exist and its parent must exist.
///
/// # Errors
///
/// Returns [`FestError::DestinationExists`] if `to` exists,
/// [`FestError::Cancelled`] if the token fires during a copy (the partial
/// copy is removed), and [`FestError::Io`] for any other failure.
pub fn move_dir(
    ops: &dyn FsOps,
    from: &Path,
    to: &Path,
    cancel: &CancelToken,
) -> Result<MoveMethod> {
    cancel.check()?;
    if to.exists() {
        return Err(FestError::DestinationExists(to.to_path_buf()));
    }

    match ops.rename(from, to) {
        Ok(()) => {
            tracing::debug!(from = %from.display(), to = %to.display(), "renamed directory");
            Ok(MoveMethod::Renamed)
        }
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(
                from = %from.display(),
                to = %to.display(),
                "rename crosses devices, copying instead"
            );
            if let Err(copy_err) = copy_tree(ops, from, to, cancel) {
                if to.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(to) {
                        tracing::error!(
                            path = %to.display(),
                            error = %cleanup,
                            "failed to remove partial copy"
                        );
                    }
                }
                return Err(copy_err);
            }
            fs::remove_dir_all(from).map_err(|e| FestError::io("remove_source", from, e))?;
            Ok(MoveMethod::CopiedAcrossDevices)
        }
        Err(e) => Err(FestError::io("rename", from, e)),
    }
}

/// Recursively copy directory `from` into a new directory `to`, keeping
/// file and directory permissions and recreating symlinks.
///
/// # Errors
///
/// Returns [`FestError::Io`] for the first failing entry and
/// [`FestError::Cancelled`] if the token fires between entries. Nothing is
/// cleaned up here; see [`move_dir`].
pub fn copy_tree(ops: &dyn FsOps, from: &Path, to: &Path, cancel: &CancelToken) -> Result<()> {
    let mut dir_perms = Vec::new();

    for entry in WalkDir::new(from).follow_links(false).sort_by_file_name() {
        cancel.check()?;
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| from.to_path_buf(), Path::to_path_buf);
            FestError::io("walk", path, io::Error::other(e.to_string()))
        })?;

        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| FestError::io("walk", entry.path(), io::Error::other(e.to_string())))?;
        let target = to.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir(&target).map_err(|e| FestError::io("create_dir", &target, e))?;
            let meta = entry
                .metadata()
                .map_err(|e| FestError::io("stat", entry.path(), io::Error::other(e.to_string())))?;
            dir_perms.push((target, meta.permissions()));
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            ops.copy_file(entry.path(), &target)
                .map_err(|e| FestError::io("copy", entry.path(), e))?;
        }
    }

    // Applied last so a read-only directory does not block its own children.
    for (dir, perms) in dir_perms.into_iter().rev() {
        fs::set_permissions(&dir, perms).map_err(|e| FestError::io("chmod", &dir, e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(|e| FestError::io("read_link", src, e))?;
    std::os::unix::fs::symlink(&link, dst).map_err(|e| FestError::io("symlink", dst, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| FestError::io("read_link", src, e))?;
    let resolved = src.parent().map_or(target.clone(), |p| p.join(&target));
    fs::copy(&resolved, dst)
        .map(|_| ())
        .map_err(|e| FestError::io("copy", src, e))
}


#[cfg(test)]
mod tests {
    use super::testing::CrossDeviceFs;
    use super::*;
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("001_PLAN/01_seq")).expect("mkdir");
        fs::write(dir.join("FESTIVAL.md"), "# fest").expect("write");
        fs::write(dir.join("001_PLAN/01_seq/01_a.md"), "alpha").expect("write");
        fs::write(dir.join("001_PLAN/01_seq/02_b.md"), "beta").expect("write");
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_temp() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("nested/registry.json");
        atomic_write(&path, b"one").expect("write");
        atomic_write(&path, b"two").expect("rewrite");
        assert_eq!(fs::read_to_string(&path).expect("read"), "two");
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn move_dir_renames_on_same_device() {
        let tmp = TempDir::new().expect("tempdir");
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        populate(&from);
        let method = move_dir(&StdFs, &from, &to, &CancelToken::new()).expect("move");
        assert_eq!(method, MoveMethod::Renamed);
        assert!(!from.exists());
        assert_eq!(
            fs::read_to_string(to.join("001_PLAN/01_seq/02_b.md")).expect("read"),
            "beta"
        );
    }

    #[test]
    fn move_dir_refuses_existing_destination() {
        let tmp = TempDir::new().expect("tempdir");
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        populate(&from);
        fs::create_dir(&to).expect("mkdir");
        let err = move_dir(&StdFs, &from, &to, &CancelToken::new()).expect_err("conflict");
        assert!(matches!(err, FestError::DestinationExists(_)));
        assert!(from.join("FESTIVAL.md").exists());
    }

    #[test]
    fn cross_device_falls_back_to_copy() {
        let tmp = TempDir::new().expect("tempdir");
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        populate(&from);

        let ops = CrossDeviceFs::new(None);
        let method = move_dir(&ops, &from, &to, &CancelToken::new()).expect("move");
        assert_eq!(method, MoveMethod::CopiedAcrossDevices);
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(to.join("FESTIVAL.md")).expect("read"), "# fest");
        assert_eq!(
            fs::read_to_string(to.join("001_PLAN/01_seq/01_a.md")).expect("read"),
            "alpha"
        );
    }

    #[test]
    fn failed_copy_removes_partial_destination() {
        let tmp = TempDir::new().expect("tempdir");
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        populate(&from);

        let ops = CrossDeviceFs::new(Some(1));
        let err = move_dir(&ops, &from, &to, &CancelToken::new()).expect_err("copy fails");
        assert!(matches!(err, FestError::Io { op: "copy", .. }));
        assert!(!to.exists());
        assert_eq!(
            fs::read_to_string(from.join("001_PLAN/01_seq/02_b.md")).expect("read"),
            "beta"
        );
    }

    #[cfg(unix)]
    #[test]
    fn copy_preserves_modes() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().expect("tempdir");
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        populate(&from);
        let script = from.join("run.sh");
        fs::write(&script, "#!/bin/sh\n").expect("write");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).expect("chmod");

        copy_tree(&StdFs, &from, &to, &CancelToken::new()).expect("copy");
        let mode = fs::metadata(to.join("run.sh")).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn cancelled_move_touches_nothing() {
        let tmp = TempDir::new().expect("tempdir");
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        populate(&from);

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = move_dir(&CrossDeviceFs::new(None), &from, &to, &cancel).expect_err("cancelled");
        assert!(matches!(err, FestError::Cancelled));
        assert!(!to.exists());
        assert!(from.exists());
    }

    /// Forces the copy path and cancels the token after the first file copy.
    struct CancelOnCopy {
        cancel: CancelToken,
    }

    impl FsOps for CancelOnCopy {
        fn rename(&self, _from: &Path, _to: &Path) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::CrossesDevices))
        }

        fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
            let copied = fs::copy(from, to)?;
            self.cancel.cancel();
            Ok(copied)
        }
    }

    #[test]
    fn cancel_mid_copy_removes_partial_destination() {
        let tmp = TempDir::new().expect("tempdir");
        let from = tmp.path().join("a");
        let to = tmp.path().join("b");
        populate(&from);

        let cancel = CancelToken::new();
        let ops = CancelOnCopy { cancel: cancel.clone() };
        let err = move_dir(&ops, &from, &to, &cancel).expect_err("cancelled");
        assert!(matches!(err, FestError::Cancelled));
        assert!(!to.exists());
        assert_eq!(fs::read_to_string(from.join("FESTIVAL.md")).expect("read"), "# fest");
        assert_eq!(
            fs::read_to_string(from.join("001_PLAN/01_seq/01_a.md")).expect("read"),
            "alpha"
        );
        assert_eq!(
            fs::read_to_string(from.join("001_PLAN/01_seq/02_b.md")).expect("read"),
            "beta"
        );
    }

    #[test]
    fn exdev_is_cross_device() {
        assert!(is_cross_device(&io::Error::from(io::ErrorKind::CrossesDevices)));
        #[cfg(unix)]
        assert!(is_cross_device(&io::Error::from_raw_os_error(EXDEV)));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
