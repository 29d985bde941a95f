//! Operation Planner (C4): produces the disjoint `{adds, dels, ups}` plan
//! from the `local`/`world.new` comparison.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::resolve::{can_delete, closure};
use crate::types::{IndexEntry, IndexMap, Plan, Upgrade};

/// What: Build a [`Plan`] from the currently installed set and the staged
/// desired set.
///
/// Details: `desired` is `world.new` if staged, else `world` (§4.4's "if
/// `world.new` does not exist, `adds`/`ups` are still computed... `dels`
/// degenerates to the empty set" is modeled by the caller passing `world`
/// itself as `desired` and `dels_enabled = false` in that case — see
/// [`plan`] which wraps this with that decision).
///
/// # Errors
/// [`crate::error::SpkmError::NotFound`] if an installed package can no
/// longer be resolved in the catalog (§3, I4: "failure to resolve an
/// installed package is a hard error"). [`crate::error::SpkmError::ResolveMissing`]
/// if an add's dependency closure cannot be fully resolved.
fn build(
    catalog: &Catalog<'_>,
    local: &IndexMap,
    desired: &IndexMap,
    dels_enabled: bool,
) -> Result<Plan> {
    let mut plan = Plan::default();
    let mut queued_adds: HashSet<String> = HashSet::new();

    if dels_enabled {
        for (name, entry) in local {
            if desired.contains_key(name) {
                continue;
            }
            let record = catalog.require(name)?;
            if can_delete(&record, desired) {
                plan.dels.push((name.clone(), entry.clone()));
            }
        }
    }

    for name in desired.keys() {
        if local.contains_key(name) {
            continue;
        }
        queue_closure(catalog, name, local, &mut queued_adds, &mut plan.adds)?;
    }

    for (name, local_entry) in local {
        if !desired.contains_key(name) {
            continue;
        }
        let current = catalog.require(name)?;
        if current.version == local_entry.version && current.release == local_entry.release {
            continue;
        }

        let old = overlay_installed(&current, local_entry);

        for dep in &current.dependencies {
            if local.contains_key(&dep.name) {
                continue;
            }
            queue_closure(catalog, &dep.name, local, &mut queued_adds, &mut plan.adds)?;
        }

        plan.ups.push(Upgrade {
            name: name.clone(),
            old,
            new: current,
        });
    }

    Ok(plan)
}

/// Resolve `name`'s full closure and append every member not already
/// installed or already queued to `adds`, deduplicating on name.
fn queue_closure(
    catalog: &Catalog<'_>,
    name: &str,
    local: &IndexMap,
    queued: &mut HashSet<String>,
    adds: &mut Vec<crate::types::PackageRecord>,
) -> Result<()> {
    for record in closure(catalog, name)? {
        if local.contains_key(&record.name) || queued.contains(&record.name) {
            continue;
        }
        queued.insert(record.name.clone());
        adds.push(record);
    }
    Ok(())
}

/// Produce a catalog record pinned to an installed version/release, for
/// [`Upgrade::old`]'s "from" display (§4.4).
fn overlay_installed(
    current: &crate::types::PackageRecord,
    installed: &IndexEntry,
) -> crate::types::PackageRecord {
    let mut old = current.clone();
    old.version = installed.version.clone();
    old.release = installed.release;
    old
}

/// What: Build the plan for a full apply, choosing whether deletions are
/// considered based on whether edits are staged.
///
/// Details: `world_new` is `Some` when `world.new` exists (an edit is
/// staged); in that case `desired = world_new` and deletions are
/// evaluated. When `world_new` is `None`, `desired = world` and `dels` is
/// always empty — §4.4's "plain `upgrade` without edits" case.
///
/// # Errors
/// See [`build`].
pub fn plan(
    catalog: &Catalog<'_>,
    local: &IndexMap,
    world: &IndexMap,
    world_new: Option<&IndexMap>,
) -> Result<Plan> {
    match world_new {
        Some(desired) => build(catalog, local, desired, true),
        None => build(catalog, local, world, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GeneralConfig, RepoConfig};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_package(dir: &Path, name: &str, version: &str, release: u64, deps: &[&str], reverse: &[&str]) {
        let pkg_dir = dir.join("dist/core/base").join(name);
        fs::create_dir_all(&pkg_dir).expect("mkdir");
        fs::write(
            pkg_dir.join("package.toml"),
            format!("version = \"{version}\"\nrelease = {release}\ndescription = \"\"\npackager = \"\"\n"),
        )
        .expect("write package.toml");

        let deps_toml: String = deps
            .iter()
            .map(|d| format!("{{ name = \"{d}\" }}"))
            .collect::<Vec<_>>()
            .join(", ");
        let reverse_toml: String = reverse
            .iter()
            .map(|d| format!("{{ name = \"{d}\" }}"))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(
            pkg_dir.join("infos.toml"),
            format!(
                "size = 1\ndigest = \"d\"\ndependencies = [{deps_toml}]\nreverse-deps = [{reverse_toml}]\n"
            ),
        )
        .expect("write infos.toml");
    }

    fn config(dir: &Path) -> Config {
        Config {
            general: GeneralConfig {
                dbpath: dir.to_path_buf(),
                cache: dir.join("cache"),
                root: dir.join("root"),
                threads: 1,
                colors: false,
            },
            repos: vec![RepoConfig {
                name: "core".to_string(),
                url: "https://repo.example.org".to_string(),
            }],
        }
    }

    #[test]
    fn fresh_install_adds_closure() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "libc", "2.35", 3, &[], &["alpha"]);
        write_package(dir.path(), "alpha", "1.0", 1, &["libc"], &[]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let local = IndexMap::new();
        let mut world_new = IndexMap::new();
        world_new.insert("alpha".to_string(), IndexEntry::new("1.0", 1));

        let result = plan(&catalog, &local, &IndexMap::new(), Some(&world_new)).expect("plan");
        let names: Vec<&str> = result.adds.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["libc", "alpha"]);
        assert!(result.dels.is_empty());
        assert!(result.ups.is_empty());
    }

    #[test]
    fn pure_deletion_with_no_reverse_dep() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "libc", "2.35", 3, &[], &[]);
        write_package(dir.path(), "alpha", "1.0", 1, &["libc"], &[]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let mut local = IndexMap::new();
        local.insert("alpha".to_string(), IndexEntry::new("1.0", 1));
        local.insert("libc".to_string(), IndexEntry::new("2.35", 3));

        let mut world_new = IndexMap::new();
        world_new.insert("libc".to_string(), IndexEntry::new("2.35", 3));

        let result = plan(&catalog, &local, &local.clone(), Some(&world_new)).expect("plan");
        assert_eq!(result.dels.len(), 1);
        assert_eq!(result.dels[0].0, "alpha");
        assert!(result.adds.is_empty());
    }

    #[test]
    fn deletion_blocked_by_reverse_dep() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "libc", "2.35", 3, &[], &["alpha"]);
        write_package(dir.path(), "alpha", "1.0", 1, &["libc"], &[]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let mut local = IndexMap::new();
        local.insert("alpha".to_string(), IndexEntry::new("1.0", 1));
        local.insert("libc".to_string(), IndexEntry::new("2.35", 3));

        let mut world_new = IndexMap::new();
        world_new.insert("alpha".to_string(), IndexEntry::new("1.0", 1));

        let result = plan(&catalog, &local, &local.clone(), Some(&world_new)).expect("plan");
        assert!(result.dels.is_empty());
    }

    #[test]
    fn upgrade_only_adds_new_dependency() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "alpha", "1.1", 1, &["beta"], &[]);
        write_package(dir.path(), "beta", "0.2", 1, &[], &[]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let mut local = IndexMap::new();
        local.insert("alpha".to_string(), IndexEntry::new("1.0", 1));

        let mut world = IndexMap::new();
        world.insert("alpha".to_string(), IndexEntry::new("1.0", 1));

        let result = plan(&catalog, &local, &world, None).expect("plan");
        assert_eq!(result.ups.len(), 1);
        assert_eq!(result.ups[0].old.version, "1.0");
        assert_eq!(result.ups[0].new.version, "1.1");
        assert_eq!(result.adds.len(), 1);
        assert_eq!(result.adds[0].name, "beta");
        assert!(result.dels.is_empty());
    }

    #[test]
    fn idempotent_apply_with_no_drift_produces_empty_plan() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "alpha", "1.0", 1, &[], &[]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let mut local = IndexMap::new();
        local.insert("alpha".to_string(), IndexEntry::new("1.0", 1));
        let world = local.clone();

        let result = plan(&catalog, &local, &world, None).expect("plan");
        assert!(result.is_empty());
    }
}
