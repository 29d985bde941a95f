//! Core data types shared across components: package identity, index
//! entries, and the three-way operation plan.

mod index;
mod package;
mod plan;

pub use index::{IndexEntry, IndexMap};
pub use package::{DepRef, PackageRecord, RepoRef};
pub use plan::{Plan, Upgrade};
