//! Small filesystem helpers shared by the Index Store, Extractor Pool, and
//! Transaction Manager: atomic whole-file writes, manifest (tree) I/O, and
//! per-path removal with empty-ancestor pruning.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// What: Write `contents` to `path` atomically.
///
/// Details: writes to a sibling temp file in the same directory, then
/// renames over the destination. A same-directory temp file guarantees the
/// rename is same-filesystem and therefore atomic on POSIX. Required for
/// I3 (§3) to survive a crash mid-write: readers only ever observe the old
/// or the new complete contents, never a partial write.
///
/// # Errors
/// Propagates the underlying I/O error (via `SpkmError`'s blanket
/// `From<io::Error>` conversion) on any write, create, or rename failure.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp_path = tmp_sibling(path);
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("index");
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!(".{file_name}.tmp"))
}

/// Read a manifest file (`trees/<name>.tree`): one filesystem path per
/// line, relative to the install root.
///
/// # Errors
/// Returns [`crate::error::SpkmError::ManifestMissing`] mapping is the
/// caller's responsibility; this function surfaces the raw I/O error.
pub fn read_manifest(path: &Path) -> Result<Vec<PathBuf>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Write a manifest file from an ordered list of relative paths.
///
/// # Errors
/// Propagates I/O errors from the underlying atomic write.
pub fn write_manifest(path: &Path, paths: &[PathBuf]) -> Result<()> {
    let mut body = String::new();
    for p in paths {
        body.push_str(&p.display().to_string());
        body.push('\n');
    }
    atomic_write(path, &body)
}

/// What: Remove every path in `manifest_paths` from beneath `root`,
/// pruning directories only if they end up empty.
///
/// Details: mirrors §4.7 Phase 1's per-package removal algorithm — regular
/// files and symlinks are unlinked immediately; directories are collected
/// and only removed once every other removal has completed, so that a
/// directory is never removed while it might still contain another
/// manifest path. Individual unlink failures are logged and skipped, not
/// propagated, matching "failures during unlink are logged but not fatal".
pub fn remove_manifest_paths(root: &Path, manifest_paths: &[PathBuf]) {
    let mut dirs = Vec::new();

    for rel in manifest_paths {
        let full = root.join(rel);
        match fs::symlink_metadata(&full) {
            Ok(meta) if meta.is_dir() => dirs.push(full),
            Ok(_) => {
                if let Err(e) = fs::remove_file(&full) {
                    tracing::warn!(path = %full.display(), error = %e, "failed to remove file");
                }
            }
            Err(e) => {
                tracing::warn!(path = %full.display(), error = %e, "manifest path missing during removal");
            }
        }
    }

    // Remove deepest directories first so empty-ancestor pruning converges
    // in one pass.
    dirs.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
    for dir in dirs {
        prune_if_empty(&dir);
    }
}

fn prune_if_empty(dir: &Path) {
    if fs::read_dir(dir).is_ok_and(|mut it| it.next().is_none()) {
        if let Err(e) = fs::remove_dir(dir) {
            tracing::warn!(path = %dir.display(), error = %e, "failed to remove empty directory");
        }
    }
}
