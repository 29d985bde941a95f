//! Index document entry shape, shared by `local`, `world`, `world.new`,
//! and `world.old`.

use indexmap::IndexMap as OrderedMap;
use serde::{Deserialize, Serialize};

/// One package's recorded state within an index document: `{version,
/// release}` per §3's index-state definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Opaque version string, compared only by equality.
    pub version: String,
    /// Monotonic release number within `version`.
    pub release: u64,
}

impl IndexEntry {
    /// Build an entry from a `version`/`release` pair.
    #[must_use]
    pub fn new(version: impl Into<String>, release: u64) -> Self {
        Self {
            version: version.into(),
            release,
        }
    }
}

/// Name-keyed index document, preserving insertion order on write per
/// §4.1 ("order is insertion order of the in-memory mapping; consumers
/// must not rely on order").
pub type IndexMap = OrderedMap<String, IndexEntry>;
