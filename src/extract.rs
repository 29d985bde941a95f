//! Extractor Pool (C6): unpacks archives to the install root in bounded
//! parallel batches, emitting a file manifest per package.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, SpkmError};

/// One package's extraction work: source archive, install root, and the
/// name used to report failures and to name the resulting manifest.
///
/// `root` as constructed by a caller (the Transaction Manager) is always
/// the real install root; [`extract_batches`] substitutes a private
/// staging directory in its place before handing a job to the
/// [`ArchiveExtractor`], so `job.root` as seen *inside* `extract()` is not
/// necessarily the final install root — see `extract_batches`.
#[derive(Debug, Clone)]
pub struct ExtractJob {
    /// Package name, for error reporting and the resulting `<name>.tree`.
    pub name: String,
    /// Path to the fetched `.tar.zst` archive.
    pub archive: PathBuf,
    /// Directory to extract into.
    pub root: PathBuf,
}

/// Abstracts the actual unpacking step so tests can substitute a fake
/// extractor instead of shelling out to a real `tar` binary.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `job.archive` into `job.root`, leaving a `.PKGTREE` file at
    /// `job.root/.PKGTREE` on success.
    ///
    /// Returns `Ok(())` on a zero exit status; `Err` otherwise. Does not
    /// itself classify the failure — that's [`extract_batches`]'s job, so
    /// a single trait impl can be reused for both fresh installs and
    /// single-package upgrade re-extraction.
    fn extract(&self, job: &ExtractJob) -> std::io::Result<()>;
}

/// Production extractor: shells out to a `tar`-compatible tool with zstd
/// support, following symlinks (`-h`) and preserving permissions (`-p`),
/// per §4.6.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarZstdExtractor;

impl ArchiveExtractor for TarZstdExtractor {
    fn extract(&self, job: &ExtractJob) -> std::io::Result<()> {
        std::fs::create_dir_all(&job.root)?;
        let status = Command::new("tar")
            .arg("-h")
            .arg("-p")
            .arg("--zstd")
            .arg("-xf")
            .arg(&job.archive)
            .arg("-C")
            .arg(&job.root)
            .status()?;

        if !status.success() {
            return Err(std::io::Error::other(format!(
                "tar exited with status {status}"
            )));
        }
        Ok(())
    }
}

/// What: Extract every job in `jobs`, `threads` at a time, per the
/// consecutive-windows batching algorithm in §4.6.
///
/// Details: `[T]::chunks(threads)` partitions `jobs` into windows; each
/// window's workers are dispatched via `std::thread::scope` (standing in
/// for the "isolated OS processes" the spec describes — each job's
/// extraction is itself a separate `tar` child process, so parallelism
/// here is still process-level, just launched from worker threads) and
/// joined before the next window starts. A window either succeeds
/// entirely or reports the worst outcome; this function does not clean up
/// after a failure — that is the Transaction Manager's responsibility
/// (§4.6: "the pool itself does not clean up").
///
/// Every job in a window shares the same `root` (the install root), so
/// each is actually extracted into a private staging directory under
/// `<trees_dir>/.staging/<name>` rather than straight into `root` —
/// otherwise two packages extracting concurrently would both write
/// `<root>/.PKGTREE` and race over that one path. Once a job's own
/// extraction finishes, its `.PKGTREE` is captured out of its staging
/// directory into `<trees_dir>/<name>.tree` before anything is merged
/// into the real root, so no other job's manifest can ever overwrite it.
/// The remaining staged files are then moved into `root` and the staging
/// directory is removed.
///
/// # Errors
/// [`SpkmError::ExtractionFailed`] for any job in the batch whose
/// extractor invocation failed. [`SpkmError::ManifestMissing`] if
/// extraction reported success but `.PKGTREE` is absent.
pub fn extract_batches(
    jobs: &[ExtractJob],
    threads: usize,
    trees_dir: &Path,
    extractor: &dyn ArchiveExtractor,
) -> Result<()> {
    std::fs::create_dir_all(trees_dir)?;
    let staging_base = trees_dir.join(".staging");

    for window in jobs.chunks(threads.max(1)) {
        let outcomes: Vec<(String, std::io::Result<()>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = window
                .iter()
                .map(|job| {
                    let staged = ExtractJob {
                        name: job.name.clone(),
                        archive: job.archive.clone(),
                        root: staging_base.join(&job.name),
                    };
                    scope.spawn(move || (staged.name.clone(), extractor.extract(&staged)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap_or_else(|_| {
                (String::new(), Err(std::io::Error::other("extractor thread panicked")))
            })).collect()
        });

        for (name, outcome) in &outcomes {
            outcome
                .as_ref()
                .map_err(|_| SpkmError::ExtractionFailed { name: name.clone() })?;
        }

        for job in window {
            let staging = staging_base.join(&job.name);
            install_manifest(&staging, &job.name, trees_dir)?;
            merge_staging_into_root(&staging, &job.root)?;
            let _ = std::fs::remove_dir_all(&staging);
        }
    }

    Ok(())
}

/// Move `staging/.PKGTREE` to `<trees_dir>/<name>.tree`, failing if the
/// archive never produced one.
fn install_manifest(staging: &Path, name: &str, trees_dir: &Path) -> Result<()> {
    let pkgtree = staging.join(".PKGTREE");
    if !pkgtree.exists() {
        return Err(SpkmError::ManifestMissing {
            name: name.to_string(),
        });
    }
    let dest = trees_dir.join(format!("{name}.tree"));
    std::fs::rename(&pkgtree, &dest)?;
    Ok(())
}

/// Move every entry left in `staging` (a job's extracted files, now that
/// its `.PKGTREE` has already been captured out) into `root`, creating
/// parent directories as needed. This reproduces what extracting straight
/// into `root` would have produced, with the shared-`.PKGTREE` race
/// removed.
fn merge_staging_into_root(staging: &Path, root: &Path) -> Result<()> {
    if !staging.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(root)?;
    for entry in std::fs::read_dir(staging)? {
        let entry = entry?;
        move_entry(&entry.path(), &root.join(entry.file_name()))?;
    }
    Ok(())
}

/// Recursively move a single staged path to `dest`, merging into any
/// directory already present there instead of failing.
fn move_entry(src: &Path, dest: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(src)?;
    if meta.is_dir() {
        std::fs::create_dir_all(dest)?;
        for child in std::fs::read_dir(src)? {
            let child = child?;
            move_entry(&child.path(), &dest.join(child.file_name()))?;
        }
        std::fs::remove_dir(src)?;
    } else {
        if dest.exists() {
            std::fs::remove_file(dest)?;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(src, dest)?;
    }
    Ok(())
}
