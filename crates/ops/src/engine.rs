//! One sync run, from crash recovery to cleaning

use aptsync_errors::{Error, OpsError, UserFacingError};
use aptsync_events::{AppEvent, CleanEvent, EngineEvent, EventEmitter};
use aptsync_index::{IndexResolver, Resolution, ResolveOptions};
use aptsync_store::{promote_indexes, scan_local_state, Cleaner};
use aptsync_types::{EntryFailure, EntryId, SyncReport, SyncState};
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::executor::DownloadExecutor;
use crate::planner::{DownloadPlan, DownloadPlanner};
use crate::OpsCtx;

/// What a run is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Resolve, download, publish indexes, then clean
    #[default]
    Sync,
    /// Resolve from staged indexes only and clean
    CleanOnly,
}

/// Drives one run through
/// `Recovering → Resolving → Planning → Executing → Cleaning → Done`.
///
/// A failing entry only loses its own contribution. The run ends in
/// `Failed` when no entry resolves, a stop signal arrives, or a step
/// outside any single entry or task fails.
pub struct SyncEngine<'a> {
    ctx: &'a OpsCtx,
    mode: RunMode,
    state: SyncState,
    report: SyncReport,
    started: Instant,
}

impl<'a> SyncEngine<'a> {
    #[must_use]
    pub fn new(ctx: &'a OpsCtx, mode: RunMode) -> Self {
        Self {
            ctx,
            mode,
            state: SyncState::Recovering,
            report: SyncReport::new(ctx.config.settings.test),
            started: Instant::now(),
        }
    }

    fn clean_only(&self) -> bool {
        self.mode == RunMode::CleanOnly
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// Returns `NoRepositories` or `MirrorNotWritable` before any network
    /// activity. Every later problem is reflected in the report instead.
    pub async fn run(mut self) -> Result<SyncReport, Error> {
        if self.ctx.config.repositories.is_empty() {
            return Err(OpsError::NoRepositories.into());
        }
        self.ctx.layout.ensure_writable().await?;

        self.ctx.emit(AppEvent::Engine(EngineEvent::Started {
            entries: self.ctx.config.repositories.len(),
            dry_run: self.report.dry_run,
            clean_only: self.clean_only(),
        }));

        match self.drive().await {
            Ok(()) => self.advance(SyncState::Done),
            Err(Error::Cancelled) => {
                self.ctx.emit(AppEvent::Engine(EngineEvent::StopRequested));
                self.advance(SyncState::Failed);
            }
            Err(err) => {
                self.ctx.emit_error(err.user_message());
                self.advance(SyncState::Failed);
            }
        }

        self.report.duration_ms =
            u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.ctx.emit(AppEvent::Engine(EngineEvent::Finished {
            state: self.state,
            bytes_downloaded: self.report.bytes_downloaded,
            files_failed: self.report.files_failed(),
            duration: self.started.elapsed(),
        }));
        Ok(self.report)
    }

    async fn drive(&mut self) -> Result<(), Error> {
        let ctx = self.ctx;
        let settings = &ctx.config.settings;

        self.report.recovered_paths = self.ctx.locks.scan_and_recover_stale(self.ctx).await?;
        self.check_cancelled()?;

        self.advance(SyncState::Resolving);
        let resolved = self.resolve().await?;
        if resolved.iter().all(Option::is_none) {
            return Err(OpsError::NothingResolved.into());
        }
        let live: HashSet<String> = resolved
            .iter()
            .flatten()
            .flat_map(Resolution::live_paths)
            .map(str::to_string)
            .collect();

        if !self.clean_only() {
            self.advance(SyncState::Planning);
            let plan = self.plan(&resolved).await?;

            if !settings.test {
                self.advance(SyncState::Executing);
                let executor = DownloadExecutor::new(
                    Arc::clone(&self.ctx.fetcher),
                    Arc::clone(&self.ctx.locks),
                    Arc::clone(&self.ctx.resources),
                    self.ctx.layout.clone(),
                )
                .with_event_sender(self.ctx.tx.clone());
                executor.run(plan.tasks).await.fold_into(&mut self.report);
                self.check_cancelled()?;
                self.promote(&resolved).await?;
            }
        }

        if self.clean_only() || !settings.disable_clean {
            self.advance(SyncState::Cleaning);
            self.clean(&resolved, &live).await?;
        }
        Ok(())
    }

    /// Resolve every entry concurrently; position `i` holds entry `i`
    async fn resolve(&mut self) -> Result<Vec<Option<Resolution>>, Error> {
        let ctx = self.ctx;
        let entries = &ctx.config.repositories;
        let options = ResolveOptions::from_settings(&ctx.config.settings, self.clean_only());
        let resolver = IndexResolver::new(
            Arc::clone(&self.ctx.fetcher),
            Arc::clone(&self.ctx.locks),
            self.ctx.layout.clone(),
            Arc::clone(&self.ctx.resources),
            options,
        )
        .with_event_sender(self.ctx.tx.clone());

        let results = join_all(
            entries
                .iter()
                .enumerate()
                .map(|(i, entry)| resolver.resolve(EntryId(i), entry)),
        )
        .await;

        let mut resolved = Vec::with_capacity(results.len());
        let mut cancelled = false;
        for ((i, entry), result) in entries.iter().enumerate().zip(results) {
            match result {
                Ok(resolution) => resolved.push(Some(resolution)),
                Err(Error::Cancelled) => {
                    cancelled = true;
                    resolved.push(None);
                }
                Err(err) => {
                    self.report.unresolved.push(EntryFailure {
                        entry: EntryId(i),
                        description: entry.to_string(),
                        message: err.user_message().into_owned(),
                    });
                    resolved.push(None);
                }
            }
        }

        let summary = resolver.summary();
        self.report.index_bytes_downloaded = summary.bytes;
        self.report.index_files_downloaded = summary.downloaded;
        self.report.index_files_unchanged = summary.unchanged;
        self.report.failures.extend(summary.failures);

        if cancelled {
            return Err(Error::Cancelled);
        }
        Ok(resolved)
    }

    async fn plan(&mut self, resolved: &[Option<Resolution>]) -> Result<DownloadPlan, Error> {
        let artifacts: Vec<_> = resolved
            .iter()
            .flatten()
            .flat_map(|r| r.artifacts.iter().cloned())
            .collect();
        let paths: BTreeSet<String> = artifacts.iter().map(|a| a.rel_path.clone()).collect();
        let local = scan_local_state(self.ctx.layout.mirror_root(), paths.into_iter().collect())
            .await?;

        let plan = DownloadPlanner::new(self.ctx.config.settings.force_update).plan(artifacts, &local);
        for conflict in &plan.conflicts {
            self.ctx.emit_warning_with_context(
                format!(
                    "entries {} and {} disagree: {}",
                    conflict.first_owner.0, conflict.conflicting_owner.0, conflict.message
                ),
                conflict.rel_path.clone(),
            );
        }

        let estimate = DownloadExecutor::estimate(&plan.tasks);
        self.report.files_planned = estimate.files;
        self.report.bytes_planned = estimate.bytes;
        self.report.integrity_conflicts.clone_from(&plan.conflicts);

        self.ctx.emit(AppEvent::Engine(EngineEvent::PlanReady {
            tasks: plan.tasks.len(),
            to_fetch: plan.to_fetch(),
            to_skip: plan.to_skip(),
            planned_bytes: estimate.bytes,
            conflicts: plan.conflicts.len(),
        }));
        Ok(plan)
    }

    /// Publish staged index files once the artifacts they list are in place
    async fn promote(&mut self, resolved: &[Option<Resolution>]) -> Result<(), Error> {
        let paths: BTreeSet<String> = resolved
            .iter()
            .flatten()
            .flat_map(|r| r.indexes.iter().map(|d| d.rel_path.clone()))
            .collect();
        let summary = promote_indexes(&self.ctx.layout, paths.into_iter().collect()).await?;
        self.ctx.emit(AppEvent::Engine(EngineEvent::IndexesPromoted {
            files: summary.copied,
        }));
        Ok(())
    }

    /// Clean every repository root whose owners all resolved and allow it
    async fn clean(
        &mut self,
        resolved: &[Option<Resolution>],
        live: &HashSet<String>,
    ) -> Result<(), Error> {
        let ctx = self.ctx;
        let layout = &ctx.layout;
        let dry_run = ctx.config.settings.test;

        let mut roots: BTreeMap<String, Option<&'static str>> = BTreeMap::new();
        for (entry, resolution) in ctx.config.repositories.iter().zip(resolved) {
            let blocker = if !entry.clean {
                Some("cleaning disabled for this repository")
            } else if resolution.is_none() {
                Some("repository did not resolve")
            } else {
                None
            };
            let slot = roots.entry(entry.local_root()).or_insert(None);
            if slot.is_none() {
                *slot = blocker;
            }
        }

        let mut cleaner = Cleaner::new(layout.mirror_root())
            .protect(layout.skel_root())
            .protect(layout.var_root())
            .with_event_sender(self.ctx.tx.clone());
        for (root, blocker) in &roots {
            if blocker.is_some() {
                cleaner = cleaner.protect(layout.mirror_path(root));
            }
        }

        for (root, blocker) in roots {
            if let Some(reason) = blocker {
                self.ctx.emit(AppEvent::Clean(CleanEvent::Skipped {
                    root: layout.mirror_path(&root),
                    reason: reason.to_string(),
                }));
                continue;
            }
            self.check_cancelled()?;

            let cleaned = cleaner.clean(&root, live, dry_run).await?;
            if dry_run {
                self.report.files_would_clean += cleaned.removed.len();
                self.report.bytes_would_reclaim += cleaned.bytes;
            } else {
                self.report.files_cleaned += cleaned.removed.len();
                self.report.bytes_reclaimed += cleaned.bytes;
                self.report.cleaned_paths.extend(cleaned.removed);
            }
        }
        Ok(())
    }

    fn advance(&mut self, next: SyncState) {
        if !self.state.can_advance_to(next) {
            return;
        }
        self.ctx.emit(AppEvent::Engine(EngineEvent::StateChanged {
            from: self.state,
            to: next,
        }));
        self.state = next;
        self.report.state = next;
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.ctx.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
