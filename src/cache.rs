//! In-memory catalog metadata cache (§2+ enrichment).
//!
//! Generalizes the teacher crate's `CacheWrapper`/`MemoryCache` pair (an
//! LRU of JSON-serialized AUR responses) to a single typed LRU of resolved
//! [`PackageRecord`]s, scoped to the lifetime of one [`crate::catalog::Catalog`].
//! The disk tier is intentionally dropped — see `DESIGN.md` — since a
//! `PackageRecord` is already backed by fast local `package.toml`/
//! `infos.toml` reads; persisting it across process runs would just add a
//! second source of staleness to reconcile against the catalog files.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::types::PackageRecord;

/// Default capacity when a caller does not specify one. Sized generously
/// for a typical closure walk (a handful of direct deps per package).
const DEFAULT_CAPACITY: usize = 256;

/// Thread-safe LRU cache of resolved catalog records, keyed by name.
///
/// The engine itself is single-threaded above C6 (§5), so the `Mutex` here
/// is not load-bearing for correctness today; it costs nothing and keeps
/// the type `Sync` if a future caller shares a `Catalog` across extraction
/// workers.
pub struct RecordCache {
    inner: Mutex<LruCache<String, PackageRecord>>,
}

impl RecordCache {
    /// Build a cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Build a cache holding at most `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a previously memoized record.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<PackageRecord> {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.get(name).cloned()
    }

    /// Memoize a freshly resolved record.
    pub fn put(&self, record: PackageRecord) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.put(record.name.clone(), record);
    }

    /// Drop every memoized record. Used when a caller knows catalog files
    /// on disk changed underneath a long-lived `Catalog`.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.clear();
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}
