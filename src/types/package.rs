//! Package identity as resolved from the repository catalog.

use serde::{Deserialize, Serialize};

/// A dependency or reverse-dependency reference, as it appears in
/// `infos.toml`'s `dependencies`/`reverse-deps` lists.
///
/// What: names a related package by identity only — no version
/// constraint. The catalog resolves the current version at lookup time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepRef {
    /// Name of the related package.
    pub name: String,
}

impl DepRef {
    /// Build a reference to `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A package's source repository, as recorded on its [`PackageRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Repository name (matches a configured `RepoConfig::name`).
    pub name: String,
    /// Repository URL (path or network endpoint), copied from config at
    /// resolution time so a `PackageRecord` is self-contained.
    pub url: String,
}

/// A fully resolved catalog entry for one package.
///
/// What: the closed, typed replacement for the source catalog's
/// `False`-or-dict-on-miss convention (see `CatalogCorrupt`/`lookup`'s
/// `Option` return instead). Every field here is mandatory once a record
/// exists; optionality lives in `reverse_deps` only, matching §3's
/// "optional list of reverse-deps".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Repository this record was resolved from.
    pub repo: RepoRef,
    /// Group (namespace) within the repository.
    pub group: String,
    /// Package name, unique across all configured repositories.
    pub name: String,
    /// Opaque version string, compared only by equality.
    pub version: String,
    /// Monotonic release number within `version`.
    pub release: u64,
    /// Hex-encoded integrity digest over the archive bytes.
    pub digest: String,
    /// Declared archive size in bytes.
    pub size: u64,
    /// Human-readable description.
    pub description: String,
    /// Identity string of the packager.
    pub packager: String,
    /// Ordered run-time dependencies.
    pub dependencies: Vec<DepRef>,
    /// Packages that declare a run-time dependency on this one, if the
    /// catalog records any.
    pub reverse_deps: Option<Vec<DepRef>>,
}

impl PackageRecord {
    /// Archive filename for this record's version, per §3's
    /// `<name>-<version>.tar.zst` convention.
    #[must_use]
    pub fn archive_filename(&self) -> String {
        format!("{}-{}.tar.zst", self.name, self.version)
    }

    /// Relative catalog path `<group>/<name>` within a repository.
    #[must_use]
    pub fn catalog_relpath(&self) -> String {
        format!("{}/{}", self.group, self.name)
    }

    /// What: decide whether `candidate` appears in this record's
    /// reverse-dependency list.
    ///
    /// Used by the resolver's `can_delete` to veto a deletion when some
    /// other still-desired package depends on this one.
    #[must_use]
    pub fn has_reverse_dep(&self, candidate: &str) -> bool {
        self.reverse_deps
            .as_ref()
            .is_some_and(|deps| deps.iter().any(|d| d.name == candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PackageRecord {
        PackageRecord {
            repo: RepoRef {
                name: "core".into(),
                url: "https://repo.example.org/core".into(),
            },
            group: "base".into(),
            name: "alpha".into(),
            version: "1.0".into(),
            release: 1,
            digest: "abc123".into(),
            size: 1024,
            description: "sample package".into(),
            packager: "builder@example.org".into(),
            dependencies: vec![DepRef::new("libc")],
            reverse_deps: Some(vec![DepRef::new("beta")]),
        }
    }

    #[test]
    fn archive_filename_matches_name_version_convention() {
        let record = sample();
        assert_eq!(record.archive_filename(), "alpha-1.0.tar.zst");
    }

    #[test]
    fn has_reverse_dep_checks_name_only() {
        let record = sample();
        assert!(record.has_reverse_dep("beta"));
        assert!(!record.has_reverse_dep("gamma"));
    }

    #[test]
    fn no_reverse_deps_means_no_veto() {
        let mut record = sample();
        record.reverse_deps = None;
        assert!(!record.has_reverse_dep("beta"));
    }

    #[test]
    fn clone_preserves_equality() {
        let record = sample();
        let cloned = record.clone();
        assert_eq!(cloned, record);
    }
}
