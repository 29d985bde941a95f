//! Transaction Manager (C7): sequences the three-phase apply, manages
//! `world` rotation, and reverts on failure.

use std::path::PathBuf;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{Result, SpkmError};
use crate::extract::{extract_batches, ArchiveExtractor, ExtractJob};
use crate::fetch::Fetcher;
use crate::fs_utils::{read_manifest, remove_manifest_paths};
use crate::index_store;
use crate::planner;
use crate::progress::ProgressSink;
use crate::types::{IndexEntry, IndexMap, Plan};

/// Per-apply state machine, per §4.7's diagram. Exposed so a front-end can
/// render progress without re-deriving it from call sequencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyState {
    /// No apply in progress.
    Idle,
    /// Plan computed, awaiting user confirmation.
    Planning,
    /// User confirmed; about to mutate the filesystem.
    Confirmed,
    /// Phase 1 running.
    Deleting,
    /// Phase 2 running.
    Adding,
    /// Phase 3 running.
    Upgrading,
    /// Terminal: completed successfully.
    Done,
    /// Terminal: user declined confirmation.
    Cancelled,
    /// Terminal: an unrecoverable failure occurred.
    Failed,
}

/// Outcome of a completed apply attempt.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// Final state machine state. Always one of `Done`, `Cancelled`, or
    /// `Failed` when returned from [`TransactionManager::apply`].
    pub state: ApplyState,
    /// The plan that was executed (or would have been, if cancelled).
    pub plan: Plan,
}

/// Orchestrates a single apply against a [`Config`]'s on-disk state.
pub struct TransactionManager<'a> {
    config: &'a Config,
    catalog: &'a Catalog<'a>,
    extractor: &'a dyn ArchiveExtractor,
    progress: &'a dyn ProgressSink,
}

impl<'a> TransactionManager<'a> {
    /// Build a transaction manager over `config`, resolving packages
    /// through `catalog`, extracting via `extractor`, and reporting fetch
    /// progress via `progress`.
    #[must_use]
    pub fn new(
        config: &'a Config,
        catalog: &'a Catalog<'a>,
        extractor: &'a dyn ArchiveExtractor,
        progress: &'a dyn ProgressSink,
    ) -> Self {
        Self {
            config,
            catalog,
            extractor,
            progress,
        }
    }

    /// What: Plan, confirm, and apply the staged edits (or a plain
    /// upgrade if none are staged).
    ///
    /// Details: `confirm` is called once, after the plan is built, with
    /// the plan to approve; returning `false` raises
    /// [`SpkmError::UserCancelled`] without touching the filesystem. This
    /// is the only cancellation point (§5): once Phase 1 begins, the
    /// apply runs to completion or to a failure-induced rollback.
    ///
    /// # Errors
    /// Any [`crate::error::SpkmError`] variant surfaced by planning,
    /// fetching, or extraction. See §7 for the propagation policy this
    /// method implements.
    pub fn apply(&self, confirm: impl FnOnce(&Plan) -> bool) -> Result<ApplyOutcome> {
        let (plan, has_staged_edits) = self.build_plan()?;

        if !confirm(&plan) {
            return Err(SpkmError::UserCancelled);
        }

        if plan.is_empty() {
            return Ok(ApplyOutcome {
                state: ApplyState::Done,
                plan,
            });
        }

        self.commit_ceremony(has_staged_edits)?;
        self.run_phases(plan, false, has_staged_edits)
    }

    fn build_plan(&self) -> Result<(Plan, bool)> {
        let local = index_store::load_optional(&self.config.local_path())?;
        let world = index_store::load_optional(&self.config.world_path())?;
        let world_new_path = self.config.world_new_path();
        let world_new = if world_new_path.exists() {
            Some(index_store::load(&world_new_path)?)
        } else {
            None
        };

        let plan = planner::plan(self.catalog, &local, &world, world_new.as_ref())?;
        Ok((plan, world_new.is_some()))
    }

    /// Runs the three phases against `plan`. `plan` is the one confirmed by
    /// the caller, built *before* `commit_ceremony` ran — it must not be
    /// re-derived from post-rotation on-disk state, since `commit_ceremony`
    /// removes `world.new` on success and a re-plan at that point would see
    /// no staged edits and silently drop `dels` (§4.4: deletions require
    /// `world.new` to still be staged). `retry` bounds the "recursive
    /// re-apply on failure" flagged in §9 to exactly one re-entrant call —
    /// no user confirmation is re-requested on that retry, since it is
    /// system-initiated recovery, not a new user-directed edit; that retry
    /// call is the one case allowed to re-plan, because
    /// `restore_world_new_from_old` has just put `world.new` back so a
    /// fresh `build_plan` sees the same staged edits again. `has_staged_edits`
    /// mirrors the same flag `commit_ceremony` was called with, so a failure
    /// only unwinds the `world`/`world.new` rotation when that rotation
    /// actually happened (a plain upgrade with no staged edits never touches
    /// it).
    fn run_phases(&self, plan: Plan, retry: bool, has_staged_edits: bool) -> Result<ApplyOutcome> {
        let local_path = self.config.local_path();
        let mut local = index_store::load_optional(&local_path)?;
        let mut persisted = local.clone();

        self.phase_delete(&plan, &mut local)?;
        if local != persisted {
            index_store::write(&local_path, &local)?;
            persisted = local.clone();
        }

        let add_result = self.phase_add(&plan, &mut local);
        if local != persisted {
            index_store::write(&local_path, &local)?;
            persisted = local.clone();
        }

        if let Err(e) = add_result {
            // Only the original attempt unwinds the world/world.new
            // rotation — the bounded retry re-plans from whatever that
            // unwind produced, and must not undo it a second time if it
            // also fails.
            if !retry && has_staged_edits {
                self.restore_world_new_from_old()?;
            }

            if retry {
                return Err(e);
            }
            tracing::warn!(error = %e, "addition phase failed, retrying once after rollback");
            let (retry_plan, _) = self.build_plan()?;
            return self
                .run_phases(retry_plan, true, has_staged_edits)
                .map_err(|_| e);
        }

        self.phase_upgrade(&plan, &mut local)?;
        if local != persisted {
            index_store::write(&local_path, &local)?;
        }
        index_store::remove_if_exists(&self.config.world_old_path())?;

        Ok(ApplyOutcome {
            state: ApplyState::Done,
            plan,
        })
    }

    /// Commit ceremony (before any filesystem mutation), per §4.7.
    fn commit_ceremony(&self, has_staged_edits: bool) -> Result<()> {
        if !has_staged_edits {
            return Ok(());
        }

        let world_path = self.config.world_path();
        let world_old_path = self.config.world_old_path();
        let world_new_path = self.config.world_new_path();

        if world_path.exists() {
            index_store::copy(&world_path, &world_old_path)?;
        }
        std::fs::rename(&world_new_path, &world_path)?;
        index_store::remove_if_exists(&world_new_path)?;
        Ok(())
    }

    /// Phase 1 — Deletions.
    fn phase_delete(&self, plan: &Plan, local: &mut IndexMap) -> Result<()> {
        for (name, _entry) in &plan.dels {
            let tree_path = self.config.trees_dir().join(format!("{name}.tree"));
            if let Ok(paths) = read_manifest(&tree_path) {
                remove_manifest_paths(&self.config.general.root, &paths);
            } else {
                tracing::warn!(package = %name, "manifest unreadable during deletion, skipping file removal");
            }

            local.shift_remove(name);
            if let Err(e) = std::fs::remove_file(&tree_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(package = %name, error = %e, "failed to remove manifest file");
                }
            }
        }
        Ok(())
    }

    /// Phase 2 — Additions.
    fn phase_add(&self, plan: &Plan, local: &mut IndexMap) -> Result<()> {
        if plan.adds.is_empty() {
            return Ok(());
        }

        let fetcher = Fetcher::new(self.config);
        let mut jobs = Vec::with_capacity(plan.adds.len());
        let mut entries = Vec::with_capacity(plan.adds.len());

        for record in &plan.adds {
            let repo = self
                .config
                .repos
                .iter()
                .find(|r| r.name == record.repo.name)
                .ok_or_else(|| SpkmError::CatalogCorrupt {
                    name: record.name.clone(),
                    reason: format!("repository `{}` is not configured", record.repo.name),
                })?;

            let archive = fetcher.ensure_cached(record, repo, self.progress)?;
            jobs.push(ExtractJob {
                name: record.name.clone(),
                archive,
                root: self.config.general.root.clone(),
            });
            entries.push(IndexEntry::new(record.version.clone(), record.release));
        }

        // Each window is dispatched and joined as its own C6 call so a
        // failing window stops the loop before its (and any later
        // window's) names are recorded in `local` — only packages whose
        // window fully succeeded keep I1 (§3) holding after a partial
        // failure.
        let width = self.config.general.threads.max(1);
        for (window_jobs, window_entries) in jobs.chunks(width).zip(entries.chunks(width)) {
            extract_batches(
                window_jobs,
                window_jobs.len(),
                &self.config.trees_dir(),
                self.extractor,
            )?;
            for (job, entry) in window_jobs.iter().zip(window_entries) {
                local.insert(job.name.clone(), entry.clone());
            }
        }

        Ok(())
    }

    /// Phase 3 — Upgrades, processed sequentially per §4.7.
    fn phase_upgrade(&self, plan: &Plan, local: &mut IndexMap) -> Result<()> {
        let fetcher = Fetcher::new(self.config);

        for upgrade in &plan.ups {
            let tree_path = self.config.trees_dir().join(format!("{}.tree", upgrade.name));
            let shadow_path = self
                .config
                .trees_dir()
                .join(format!("{}.tree.old", upgrade.name));

            if tree_path.exists() {
                std::fs::copy(&tree_path, &shadow_path)?;
            }

            let repo = self
                .config
                .repos
                .iter()
                .find(|r| r.name == upgrade.new.repo.name)
                .ok_or_else(|| SpkmError::CatalogCorrupt {
                    name: upgrade.name.clone(),
                    reason: format!("repository `{}` is not configured", upgrade.new.repo.name),
                })?;

            let attempt = self.upgrade_one(&fetcher, upgrade, repo, &tree_path, &shadow_path);

            match attempt {
                Ok(()) => {
                    local.insert(
                        upgrade.name.clone(),
                        IndexEntry::new(upgrade.new.version.clone(), upgrade.new.release),
                    );
                    index_store::remove_if_exists(&shadow_path)?;
                }
                Err(e) => {
                    tracing::warn!(package = %upgrade.name, error = %e, "upgrade failed, attempting to reinstall previous version");
                    let _ = self.upgrade_one(&fetcher, upgrade, repo, &tree_path, &shadow_path);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    fn upgrade_one(
        &self,
        fetcher: &Fetcher<'_>,
        upgrade: &crate::types::Upgrade,
        repo: &crate::config::RepoConfig,
        tree_path: &PathBuf,
        shadow_path: &PathBuf,
    ) -> Result<()> {
        let archive = fetcher.ensure_cached(&upgrade.new, repo, self.progress)?;
        let job = ExtractJob {
            name: upgrade.name.clone(),
            archive,
            root: self.config.general.root.clone(),
        };

        extract_batches(
            std::slice::from_ref(&job),
            1,
            &self.config.trees_dir(),
            self.extractor,
        )?;

        if shadow_path.exists() {
            let old_paths = read_manifest(shadow_path)?;
            let new_paths = read_manifest(tree_path)?;
            let removed: Vec<_> = old_paths
                .into_iter()
                .filter(|p| !new_paths.contains(p))
                .collect();
            remove_manifest_paths(&self.config.general.root, &removed);
        }

        Ok(())
    }

    /// Undo `commit_ceremony`'s promotion: the staged edit that was moved
    /// into `world` moves back to `world.new` (so a retried apply sees the
    /// same desired set again, per §8 scenario 6), and `world.old` (the
    /// pre-ceremony `world`, if any existed) moves back to `world`. If no
    /// `world` existed before the ceremony, `world` is simply absent again
    /// afterwards — there was nothing to roll back to.
    fn restore_world_new_from_old(&self) -> Result<()> {
        let world_path = self.config.world_path();
        let world_old_path = self.config.world_old_path();
        let world_new_path = self.config.world_new_path();

        if world_path.exists() {
            std::fs::rename(&world_path, &world_new_path)?;
        }
        if world_old_path.exists() {
            std::fs::rename(&world_old_path, &world_path)?;
        }
        Ok(())
    }
}
