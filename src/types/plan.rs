//! The three-way operation plan produced by the Operation Planner (C4).

use serde::Serialize;

use crate::types::index::IndexEntry;
use crate::types::package::PackageRecord;

/// A single package upgrade: its installed identity paired with the
/// catalog-current record to install in its place.
#[derive(Debug, Clone, Serialize)]
pub struct Upgrade {
    /// Name of the package being upgraded.
    pub name: String,
    /// Catalog record with version/release overridden to the currently
    /// installed values, so callers can display "from" without a second
    /// lookup.
    pub old: PackageRecord,
    /// Catalog-current record to install.
    pub new: PackageRecord,
}

/// The disjoint `{adds, dels, ups}` plan, per §4.4.
///
/// Disjointness (P2) is a property of how [`crate::planner`] builds a
/// `Plan`, not something this type enforces structurally.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    /// Packages to install, dependencies ordered before dependents.
    pub adds: Vec<PackageRecord>,
    /// Packages to remove, with their installed identity.
    pub dels: Vec<(String, IndexEntry)>,
    /// Packages to upgrade in place.
    pub ups: Vec<Upgrade>,
}

impl Plan {
    /// `true` when all three lists are empty — the apply would do nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.dels.is_empty() && self.ups.is_empty()
    }
}
