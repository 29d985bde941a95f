//! Index Store (C1): parses and writes the `local` and `world*` index
//! documents.
//!
//! Each document is a key-sectioned TOML table: every top-level section is
//! a package name, and every section carries `version`/`release` scalars.
//! This directly generalizes `get_pkg_info`'s `tomllib.load` shape from the
//! original implementation, replacing its hand-written
//! string-concatenation writer with an atomic write (see `fs_utils`).

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, SpkmError};
use crate::fs_utils::atomic_write;
use crate::types::{IndexEntry, IndexMap};

/// What: Load an index document from `path`.
///
/// # Errors
/// [`SpkmError::IndexMissing`] if the file does not exist;
/// [`SpkmError::IndexCorrupt`] if it exists but fails to parse.
pub fn load(path: &Path) -> Result<IndexMap> {
    if !path.exists() {
        return Err(SpkmError::IndexMissing(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path).map_err(|e| SpkmError::IndexCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    parse(path, &raw)
}

/// What: Load an index document if present, or an empty map if absent.
///
/// Used for `world.new`, which "exists only while edits are pending"
/// (§3) — its absence is not an error, just the empty staged set.
///
/// # Errors
/// [`SpkmError::IndexCorrupt`] if the file exists but fails to parse.
pub fn load_optional(path: &Path) -> Result<IndexMap> {
    if path.exists() {
        load(path)
    } else {
        Ok(IndexMap::new())
    }
}

fn parse(path: &Path, raw: &str) -> Result<IndexMap> {
    // toml::Table preserves the document's section order, which we then
    // replay into the insertion-ordered IndexMap.
    let table: toml::Table = raw.parse().map_err(|e| SpkmError::IndexCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut map = IndexMap::new();
    for (name, value) in table {
        let entry = parse_entry(path, &name, &value)?;
        map.insert(name, entry);
    }
    Ok(map)
}

fn parse_entry(path: &Path, name: &str, value: &toml::Value) -> Result<IndexEntry> {
    let corrupt = |reason: String| SpkmError::IndexCorrupt {
        path: path.to_path_buf(),
        reason: format!("section `{name}`: {reason}"),
    };

    let table = value
        .as_table()
        .ok_or_else(|| corrupt("expected a table".to_string()))?;

    let version = table
        .get("version")
        .and_then(toml::Value::as_str)
        .ok_or_else(|| corrupt("missing string field `version`".to_string()))?
        .to_string();

    let release = table
        .get("release")
        .and_then(toml::Value::as_integer)
        .ok_or_else(|| corrupt("missing integer field `release`".to_string()))?;

    let release = u64::try_from(release).map_err(|_| corrupt("`release` must be non-negative".to_string()))?;

    Ok(IndexEntry::new(version, release))
}

/// What: Write an index document to `path`, overwriting any existing
/// contents.
///
/// Details: total and atomic per §4.1. Section order in the written
/// document follows `map`'s iteration order (insertion order, since
/// `IndexMap` is an `indexmap::IndexMap`); consumers must not rely on it.
///
/// # Errors
/// Propagates I/O failures from the underlying atomic write.
pub fn write(path: &Path, map: &IndexMap) -> Result<()> {
    // toml::Table is a BTreeMap internally and would sort keys alphabetically,
    // losing insertion order; build the document by hand to preserve it.
    let mut body = String::new();
    for (name, entry) in map {
        body.push_str(&format!("[{name}]\n"));
        body.push_str(&format!("version = {:?}\n", entry.version));
        body.push_str(&format!("release = {}\n", entry.release));
        body.push('\n');
    }
    atomic_write(path, &body)
}

/// What: Remove `path` if present, treating absence as success.
///
/// Used to delete `world.new`/`world.old` once their ephemeral lifecycle
/// (§3, I3) ends.
///
/// # Errors
/// Propagates I/O errors other than "not found".
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// What: Copy one index document onto another's path, creating parent
/// directories as needed.
///
/// Used by the commit ceremony to snapshot `world` into `world.old`.
///
/// # Errors
/// Propagates I/O failures.
pub fn copy(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to)?;
    Ok(())
}

/// What: Diff two index maps' keys, for callers wanting a quick summary.
///
/// Not used by the planner (which needs full entries, not just keys) but
/// kept small and public for front-ends implementing `info`/`conf`-style
/// diagnostics.
#[must_use]
pub fn key_diff<'a>(a: &'a IndexMap, b: &'a IndexMap) -> BTreeMap<&'a str, bool> {
    let mut out = BTreeMap::new();
    for name in a.keys() {
        out.insert(name.as_str(), b.contains_key(name));
    }
    out
}
