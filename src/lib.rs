//! spkm — the reconciliation core of a source-style package manager.
//!
//! This crate compares a user-declared *world* set of packages against the
//! *local* set actually installed, computes the minimal add/remove/upgrade
//! operations, and applies them transactionally against an on-disk root.
//! It is a library: a front-end (CLI, configuration loader, colored
//! terminal logger, `tar` tool packaging) is expected to drive it — see
//! each module's docs for the exact boundary.
//!
//! # Example
//!
//! ```no_run
//! use spkm::catalog::Catalog;
//! use spkm::config::Config;
//! use spkm::extract::TarZstdExtractor;
//! use spkm::progress::TracingProgress;
//! use spkm::transaction::TransactionManager;
//!
//! # fn main() -> spkm::error::Result<()> {
//! let config = Config::load_from_env()?;
//! let catalog = Catalog::new(&config);
//! let extractor = TarZstdExtractor;
//! let progress = TracingProgress;
//! let manager = TransactionManager::new(&config, &catalog, &extractor, &progress);
//!
//! let outcome = manager.apply(|plan| {
//!     println!("{} to add, {} to remove, {} to upgrade", plan.adds.len(), plan.dels.len(), plan.ups.len());
//!     true
//! })?;
//! println!("{:?}", outcome.state);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fs_utils;
pub mod index_store;
pub mod planner;
pub mod progress;
pub mod resolve;
pub mod transaction;
pub mod types;

pub use error::{Result, SpkmError};
