//! Progress/UI boundary between the Fetcher and a front-end's terminal
//! logger (colored status output is explicitly out of scope, §1).
//!
//! Mirrors `original_source/src/utils/download.py`'s `print_progress`
//! signature (bytes transferred, total, rolling rate, display name) as a
//! trait so the engine never writes to standard output itself.

/// Receives fetch progress callbacks. Implementations decide how (or
/// whether) to render them; the engine only calls the trait.
pub trait ProgressSink: Send + Sync {
    /// Called periodically while streaming an archive.
    ///
    /// `bytes` / `total` are cumulative; `total` is `None` when the
    /// server did not report a `Content-Length`. `rate` is bytes/sec,
    /// averaged over a short rolling window.
    fn on_progress(&self, name: &str, bytes: u64, total: Option<u64>, rate: f64);

    /// Called once a fetch for `name` completes, successfully or not.
    fn on_finished(&self, name: &str, success: bool);
}

/// Structured-logging sink: the ambient default, reporting through
/// `tracing` instead of standard output. Suitable for library consumers
/// that don't render an interactive terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, name: &str, bytes: u64, total: Option<u64>, rate: f64) {
        tracing::debug!(
            package = name,
            bytes,
            total,
            rate_bytes_per_sec = rate,
            "fetch progress"
        );
    }

    fn on_finished(&self, name: &str, success: bool) {
        if success {
            tracing::debug!(package = name, "fetch finished");
        } else {
            tracing::warn!(package = name, "fetch did not complete");
        }
    }
}

/// A sink that does nothing, for tests and callers that don't care about
/// progress reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _name: &str, _bytes: u64, _total: Option<u64>, _rate: f64) {}
    fn on_finished(&self, _name: &str, _success: bool) {}
}
