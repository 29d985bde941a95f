//! Unified error type for spkm.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for all spkm operations.
///
/// Variants map directly onto the error taxonomy the engine is specified
/// against: every failure mode any component can produce surfaces as one of
/// these, so the Transaction Manager can match on kind rather than on
/// component-specific error types.
#[derive(Error, Debug)]
pub enum SpkmError {
    /// One or more requested packages could not be found in any configured
    /// repository. Aggregated so the caller sees every missing name at once.
    #[error("package(s) not found: {}", .names.join(", "))]
    NotFound {
        /// Names that could not be resolved.
        names: Vec<String>,
    },

    /// A dependency closure could not resolve one or more dependency names.
    #[error("dependency resolution failed, missing: {}", .names.join(", "))]
    ResolveMissing {
        /// Names that could not be resolved while walking a closure.
        names: Vec<String>,
    },

    /// A repository's metadata documents are malformed or contradict each
    /// other (e.g. `infos.toml` missing a mandatory field).
    #[error("catalog metadata corrupt for `{name}`: {reason}")]
    CatalogCorrupt {
        /// Package name whose metadata could not be parsed.
        name: String,
        /// Human-readable reason.
        reason: String,
    },

    /// An index document (`local`, `world`, `world.new`, `world.old`) is
    /// absent when a read was required.
    #[error("index file missing: {0}")]
    IndexMissing(PathBuf),

    /// An index document exists but failed to parse.
    #[error("index file corrupt: {path} ({reason})")]
    IndexCorrupt {
        /// Path of the offending file.
        path: PathBuf,
        /// Parse failure reason.
        reason: String,
    },

    /// A network transport error occurred while fetching an archive.
    #[error("network error fetching `{url}`: {source}")]
    FetchNetworkError {
        /// URL that was being fetched.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// A filesystem error occurred while copying or staging an archive.
    #[error("I/O error fetching archive: {0}")]
    FetchIOError(#[from] std::io::Error),

    /// A fetched archive's digest did not match the catalog's declared
    /// digest. The partial/mismatched file has already been removed.
    #[error("digest mismatch for `{name}`: expected {expected}, got {actual}")]
    FetchDigestMismatch {
        /// Package whose archive failed verification.
        name: String,
        /// Digest declared by the catalog.
        expected: String,
        /// Digest actually computed over the fetched bytes.
        actual: String,
    },

    /// The extractor's external tool invocation exited non-zero, or a
    /// manifest-less archive extracted with no recoverable output.
    #[error("extraction failed for `{name}`")]
    ExtractionFailed {
        /// Package whose archive failed to extract.
        name: String,
    },

    /// An archive extracted successfully but did not carry a top-level
    /// `.PKGTREE` entry.
    #[error("archive for `{name}` did not produce a file manifest (.PKGTREE)")]
    ManifestMissing {
        /// Package whose archive lacked a manifest.
        name: String,
    },

    /// The user declined the confirmation prompt before an apply began.
    #[error("apply cancelled by user")]
    UserCancelled,

    /// The configuration document could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for spkm operations.
pub type Result<T> = std::result::Result<T, SpkmError>;
