//! Repository Catalog (C2): locates packages across configured
//! repositories and reads their per-package metadata documents.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::cache::RecordCache;
use crate::config::{Config, RepoConfig};
use crate::error::{Result, SpkmError};
use crate::types::{DepRef, PackageRecord, RepoRef};

/// `package.toml`: base fields, per §3's repository layout.
#[derive(Debug, Deserialize)]
struct PackageToml {
    version: String,
    release: u64,
    description: String,
    packager: String,
}

/// `infos.toml`: run-deps, reverse-deps, size, digest.
#[derive(Debug, Deserialize)]
struct InfosToml {
    size: u64,
    digest: String,
    #[serde(default)]
    dependencies: Vec<DepRef>,
    #[serde(default, rename = "reverse-deps")]
    reverse_deps: Vec<DepRef>,
}

/// Resolves package names against the repositories named in a [`Config`],
/// memoizing resolved records in an in-memory [`RecordCache`] (§2+).
pub struct Catalog<'a> {
    config: &'a Config,
    cache: RecordCache,
}

impl<'a> Catalog<'a> {
    /// Build a catalog over `config`'s repository list.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            cache: RecordCache::new(),
        }
    }

    /// What: Resolve `name` to a [`PackageRecord`] by scanning configured
    /// repositories in order.
    ///
    /// Details: within each repository, walks `<dbpath>/dist/<repo>/<group>/`
    /// subdirectories looking for a `<name>/` match. The first repository
    /// (in configured order) containing a matching package directory wins;
    /// no version comparison across repositories is performed (§4.2).
    ///
    /// # Errors
    /// [`SpkmError::CatalogCorrupt`] if a matching package directory's
    /// metadata documents are missing or malformed, or if enumerating a
    /// repository's directory tree itself fails.
    pub fn lookup(&self, name: &str) -> Result<Option<PackageRecord>> {
        if let Some(hit) = self.cache.get(name) {
            return Ok(Some(hit));
        }

        for repo in &self.config.repos {
            if let Some(record) = self.lookup_in_repo(repo, name)? {
                self.cache.put(record.clone());
                return Ok(Some(record));
            }
        }

        Ok(None)
    }

    /// Same as [`Catalog::lookup`] but fails with [`SpkmError::NotFound`]
    /// when absent, for callers resolving a single required name.
    ///
    /// # Errors
    /// [`SpkmError::NotFound`] if no repository has `name`;
    /// [`SpkmError::CatalogCorrupt`] as in [`Catalog::lookup`].
    pub fn require(&self, name: &str) -> Result<PackageRecord> {
        self.lookup(name)?.ok_or_else(|| SpkmError::NotFound {
            names: vec![name.to_string()],
        })
    }

    fn lookup_in_repo(&self, repo: &RepoConfig, name: &str) -> Result<Option<PackageRecord>> {
        let repo_dist = self.config.dist_dir(&repo.name);
        if !repo_dist.exists() {
            return Ok(None);
        }

        let enumeration_error = |e: std::io::Error| SpkmError::CatalogCorrupt {
            name: name.to_string(),
            reason: format!("enumerating {}: {e}", repo_dist.display()),
        };

        for group_entry in fs::read_dir(&repo_dist).map_err(enumeration_error)? {
            let group_entry = group_entry.map_err(enumeration_error)?;
            if !group_entry.file_type().map_err(enumeration_error)?.is_dir() {
                continue;
            }
            let pkg_dir = group_entry.path().join(name);
            if pkg_dir.is_dir() {
                let group = group_entry.file_name().to_string_lossy().into_owned();
                return self
                    .read_record(repo, &group, name, &pkg_dir)
                    .map(Some);
            }
        }

        Ok(None)
    }

    fn read_record(
        &self,
        repo: &RepoConfig,
        group: &str,
        name: &str,
        pkg_dir: &Path,
    ) -> Result<PackageRecord> {
        let package_toml = read_toml::<PackageToml>(&pkg_dir.join("package.toml"), name)?;
        let infos_toml = read_toml::<InfosToml>(&pkg_dir.join("infos.toml"), name)?;

        Ok(PackageRecord {
            repo: RepoRef {
                name: repo.name.clone(),
                url: repo.url.clone(),
            },
            group: group.to_string(),
            name: name.to_string(),
            version: package_toml.version,
            release: package_toml.release,
            digest: infos_toml.digest,
            size: infos_toml.size,
            description: package_toml.description,
            packager: package_toml.packager,
            dependencies: infos_toml.dependencies,
            reverse_deps: if infos_toml.reverse_deps.is_empty() {
                None
            } else {
                Some(infos_toml.reverse_deps)
            },
        })
    }
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path, name: &str) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| SpkmError::CatalogCorrupt {
        name: name.to_string(),
        reason: format!("cannot read {}: {e}", path.display()),
    })?;
    toml::from_str(&raw).map_err(|e| SpkmError::CatalogCorrupt {
        name: name.to_string(),
        reason: format!("cannot parse {}: {e}", path.display()),
    })
}
