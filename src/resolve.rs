//! Dependency Resolver (C3): transitive dependency closures and
//! reverse-dependency deletion safety.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::error::{Result, SpkmError};
use crate::types::{IndexMap, PackageRecord};

/// What: Compute the full transitive dependency closure for `name`,
/// ordered so every dependency precedes the package that requires it.
///
/// Details: iterative DFS with an explicit stack and a visited set keyed
/// by name (§4.3), replacing the source's recursive walk over two
/// module-level mutable lists. Cycles terminate naturally because a
/// visited name is never pushed again; a dependency cycle simply installs
/// its members together, in whatever order the DFS first reaches them.
///
/// # Errors
/// [`SpkmError::NotFound`] if `name` itself is not in the catalog.
/// [`SpkmError::ResolveMissing`] collecting every dependency name, at any
/// depth, that the catalog could not resolve — gathered in one pass
/// rather than failing on the first miss.
pub fn closure(catalog: &Catalog<'_>, name: &str) -> Result<Vec<PackageRecord>> {
    let root = catalog.require(name)?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut missing: Vec<String> = Vec::new();
    let mut order: Vec<PackageRecord> = Vec::new();

    // Explicit worklist of (record, next-unprocessed-dependency-index).
    // A package is pushed to `order` only once every dependency above it
    // on the stack has been pushed first, giving the dependencies-before-
    // dependent ordering the planner relies on.
    let mut stack: Vec<(PackageRecord, usize)> = vec![(root, 0)];
    visited.insert(stack[0].0.name.clone());

    while let Some((record, dep_idx)) = stack.pop() {
        if dep_idx >= record.dependencies.len() {
            order.push(record);
            continue;
        }

        let dep_name = record.dependencies[dep_idx].name.clone();
        // Re-push this frame to resume at the next dependency once the
        // current one (if any) has been fully explored.
        stack.push((record, dep_idx + 1));

        if visited.contains(&dep_name) {
            continue;
        }

        match catalog.lookup(&dep_name) {
            Ok(Some(dep_record)) => {
                visited.insert(dep_record.name.clone());
                stack.push((dep_record, 0));
            }
            Ok(None) => missing.push(dep_name),
            Err(SpkmError::CatalogCorrupt { name, reason }) => {
                missing.push(format!("{name} ({reason})"));
            }
            Err(_) => missing.push(dep_name),
        }
    }

    if !missing.is_empty() {
        missing.sort();
        missing.dedup();
        return Err(SpkmError::ResolveMissing { names: missing });
    }

    Ok(order)
}

/// What: Decide whether `record` may be deleted given the currently
/// desired set.
///
/// Details: true iff none of `record`'s reverse-deps is a key of
/// `desired`. This is the mechanism that keeps a package installed even
/// after it drops out of `world` because something else still needs it
/// (§4.3).
#[must_use]
pub fn can_delete(record: &PackageRecord, desired: &IndexMap) -> bool {
    match &record.reverse_deps {
        None => true,
        Some(deps) => !deps.iter().any(|d| desired.contains_key(&d.name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GeneralConfig, RepoConfig};
    use crate::types::{DepRef, IndexEntry, RepoRef};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_package(dir: &Path, name: &str, deps: &[&str]) {
        let pkg_dir = dir.join("dist/core/base").join(name);
        fs::create_dir_all(&pkg_dir).expect("mkdir");
        fs::write(
            pkg_dir.join("package.toml"),
            "version = \"1.0\"\nrelease = 1\ndescription = \"\"\npackager = \"\"\n",
        )
        .expect("write package.toml");

        let deps_toml: String = deps
            .iter()
            .map(|d| format!("{{ name = \"{d}\" }}"))
            .collect::<Vec<_>>()
            .join(", ");
        fs::write(
            pkg_dir.join("infos.toml"),
            format!("size = 1\ndigest = \"d\"\ndependencies = [{deps_toml}]\n"),
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
    fn closure_orders_dependencies_before_dependent() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "libc", &[]);
        write_package(dir.path(), "alpha", &["libc"]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let order = closure(&catalog, "alpha").expect("closure should resolve");
        let names: Vec<&str> = order.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["libc", "alpha"]);
    }

    #[test]
    fn closure_deduplicates_diamond_dependency() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "libc", &[]);
        write_package(dir.path(), "beta", &["libc"]);
        write_package(dir.path(), "alpha", &["libc", "beta"]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let order = closure(&catalog, "alpha").expect("closure should resolve");
        let names: Vec<&str> = order.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.iter().filter(|&&n| n == "libc").count(), 1);
        assert_eq!(names.last(), Some(&"alpha"));
    }

    #[test]
    fn closure_handles_dependency_cycle() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "alpha", &["beta"]);
        write_package(dir.path(), "beta", &["alpha"]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let order = closure(&catalog, "alpha").expect("cyclic closure should still resolve");
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn closure_reports_missing_dependency() {
        let dir = tempdir().expect("tempdir");
        write_package(dir.path(), "alpha", &["ghost"]);
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let err = closure(&catalog, "alpha").expect_err("missing dep should fail");
        match err {
            SpkmError::ResolveMissing { names } => assert_eq!(names, vec!["ghost".to_string()]),
            other => panic!("expected ResolveMissing, got {other:?}"),
        }
    }

    #[test]
    fn closure_root_not_found_is_not_found() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("dist/core/base")).expect("mkdir");
        let config = config(dir.path());
        let catalog = Catalog::new(&config);

        let err = closure(&catalog, "ghost").expect_err("missing root should fail");
        assert!(matches!(err, SpkmError::NotFound { .. }));
    }

    fn record_with_reverse_deps(reverse: &[&str]) -> PackageRecord {
        PackageRecord {
            repo: RepoRef {
                name: "core".into(),
                url: "u".into(),
            },
            group: "base".into(),
            name: "libc".into(),
            version: "1.0".into(),
            release: 1,
            digest: "d".into(),
            size: 1,
            description: String::new(),
            packager: String::new(),
            dependencies: vec![],
            reverse_deps: if reverse.is_empty() {
                None
            } else {
                Some(reverse.iter().map(|n| DepRef::new(*n)).collect())
            },
        }
    }

    #[test]
    fn can_delete_true_when_no_reverse_deps_desired() {
        let record = record_with_reverse_deps(&["alpha"]);
        let mut desired = IndexMap::new();
        desired.insert("other".to_string(), IndexEntry::new("1.0", 1));
        assert!(can_delete(&record, &desired));
    }

    #[test]
    fn can_delete_false_when_reverse_dep_desired() {
        let record = record_with_reverse_deps(&["alpha"]);
        let mut desired = IndexMap::new();
        desired.insert("alpha".to_string(), IndexEntry::new("1.0", 1));
        assert!(!can_delete(&record, &desired));
    }

    #[test]
    fn can_delete_true_when_no_reverse_deps_at_all() {
        let record = record_with_reverse_deps(&[]);
        let desired = IndexMap::new();
        assert!(can_delete(&record, &desired));
    }
}
