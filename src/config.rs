//! Configuration document for spkm.
//!
//! Read from the path named by the `SPKM_CONF` environment variable,
//! defaulting to `/etc/spkm.conf` — the same default and override
//! mechanism the original implementation's `get_config()` used, ported
//! from `tomllib` to the `toml` crate.
//!
//! Loading the document from its fixed path is, per the engine's scope, a
//! front-end concern: the engine itself only ever consumes a parsed
//! [`Config`]. `Config::load_from_env` exists so the crate can be exercised
//! end to end without a separate front-end crate.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpkmError};

/// Environment variable naming the configuration document's path.
pub const SPKM_CONF_VAR: &str = "SPKM_CONF";

/// Default configuration path used when `SPKM_CONF` is unset.
pub const DEFAULT_CONF_PATH: &str = "/etc/spkm.conf";

/// `[general]` section of the configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root of the three index documents and the `trees/`/`dist/` trees.
    pub dbpath: PathBuf,
    /// Directory archives are fetched into before extraction.
    pub cache: PathBuf,
    /// Install root archives are extracted into.
    pub root: PathBuf,
    /// Extraction parallelism. Must be at least 1.
    pub threads: usize,
    /// Whether the front-end should render colored status output.
    #[serde(default = "default_colors")]
    pub colors: bool,
}

const fn default_colors() -> bool {
    true
}

/// A single configured repository (`[[repos]]` entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoConfig {
    /// Repository name, used as the `<repo>` path segment under `dist/`
    /// and `cache/`.
    pub name: String,
    /// Either a filesystem path (local mirror) or a network endpoint.
    pub url: String,
}

impl RepoConfig {
    /// What: Decide whether this repository's `url` is a local mirror.
    ///
    /// Details: a repository is local when its `url` names a path that
    /// exists on disk. This matches the Fetcher's own rule (§4.5): local
    /// mirrors are copied, everything else is fetched over the network.
    #[must_use]
    pub fn is_local_mirror(&self) -> bool {
        Path::new(&self.url).exists()
    }
}

/// The parsed `spkm.conf` configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `[general]` section.
    pub general: GeneralConfig,
    /// Ordered `[[repos]]` list. Resolution order follows this list.
    #[serde(default)]
    pub repos: Vec<RepoConfig>,
}

impl Config {
    /// What: Parse a configuration document from its raw TOML text.
    ///
    /// # Errors
    /// Returns [`SpkmError::Config`] if the document does not parse, or if
    /// `threads` is zero (a zero-width extraction batch can never make
    /// progress).
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| SpkmError::Config(format!("invalid config: {e}")))?;

        if config.general.threads == 0 {
            return Err(SpkmError::Config(
                "general.threads must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// What: Load the configuration document from an explicit path.
    ///
    /// # Errors
    /// Returns [`SpkmError::Config`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SpkmError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    /// What: Load the configuration document from the path named by
    /// `SPKM_CONF`, defaulting to [`DEFAULT_CONF_PATH`].
    ///
    /// # Errors
    /// Returns [`SpkmError::Config`] if the file cannot be read or parsed.
    pub fn load_from_env() -> Result<Self> {
        let path = env::var(SPKM_CONF_VAR).unwrap_or_else(|_| DEFAULT_CONF_PATH.to_string());
        tracing::debug!(path = %path, "loading spkm configuration");
        Self::load(Path::new(&path))
    }

    /// Path to the `local` index document.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        self.general.dbpath.join("local")
    }

    /// Path to the committed `world` index document.
    #[must_use]
    pub fn world_path(&self) -> PathBuf {
        self.general.dbpath.join("world")
    }

    /// Path to the staged `world.new` index document.
    #[must_use]
    pub fn world_new_path(&self) -> PathBuf {
        self.general.dbpath.join("world.new")
    }

    /// Path to the `world.old` rollback snapshot.
    #[must_use]
    pub fn world_old_path(&self) -> PathBuf {
        self.general.dbpath.join("world.old")
    }

    /// Path to the directory holding per-package file manifests.
    #[must_use]
    pub fn trees_dir(&self) -> PathBuf {
        self.general.dbpath.join("trees")
    }

    /// Path to the directory holding catalog metadata for one repository.
    #[must_use]
    pub fn dist_dir(&self, repo: &str) -> PathBuf {
        self.general.dbpath.join("dist").join(repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [general]
        dbpath = "/var/lib/spkm"
        cache = "/var/cache/spkm"
        root = "/"
        threads = 4
        colors = true

        [[repos]]
        name = "core"
        url = "https://repo.example.org/core"

        [[repos]]
        name = "local"
        url = "/srv/spkm/local"
    "#;

    #[test]
    fn parses_general_and_repos() {
        let config = Config::parse(SAMPLE).expect("sample config should parse");
        assert_eq!(config.general.threads, 4);
        assert!(config.general.colors);
        assert_eq!(config.repos.len(), 2);
        assert_eq!(config.repos[0].name, "core");
        assert_eq!(config.repos[1].url, "/srv/spkm/local");
    }

    #[test]
    fn derives_index_paths_from_dbpath() {
        let config = Config::parse(SAMPLE).expect("sample config should parse");
        assert_eq!(config.local_path(), PathBuf::from("/var/lib/spkm/local"));
        assert_eq!(config.world_path(), PathBuf::from("/var/lib/spkm/world"));
        assert_eq!(
            config.world_new_path(),
            PathBuf::from("/var/lib/spkm/world.new")
        );
        assert_eq!(config.trees_dir(), PathBuf::from("/var/lib/spkm/trees"));
    }

    #[test]
    fn rejects_zero_threads() {
        let bad = SAMPLE.replace("threads = 4", "threads = 0");
        let err = Config::parse(&bad).expect_err("zero threads should be rejected");
        assert!(matches!(err, SpkmError::Config(_)));
    }

    #[test]
    fn colors_defaults_true_when_absent() {
        let raw = r#"
            [general]
            dbpath = "/var/lib/spkm"
            cache = "/var/cache/spkm"
            root = "/"
            threads = 1
        "#;
        let config = Config::parse(raw).expect("config without colors should parse");
        assert!(config.general.colors);
    }
}
