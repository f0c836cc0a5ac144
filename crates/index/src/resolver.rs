//! From a repository entry to its index files and artifacts

use aptsync_config::Settings;
use aptsync_errors::{Error, IndexError, NetworkError, OpsError, UserFacingError};
use aptsync_events::{AppEvent, EventEmitter, EventSender, FailureContext, RepoEvent};
use aptsync_hash::ChecksumSet;
use aptsync_net::{fetch_guarded, FetchMode, FetchOutcome, FetchRequest, Fetcher, LockTracker};
use aptsync_resources::ResourceManager;
use aptsync_store::{local_state, MirrorLayout};
use aptsync_types::{
    Artifact, EntryId, FailureReason, IndexDescriptor, IndexKind, RepositoryEntry, TaskFailure,
};
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use crate::decompress::{Compression, Decompressor};
use crate::records::parse_index;
use crate::release::ReleaseFile;
use crate::selection::{plain_name, select_indexes, SelectionOptions};

/// How the resolver treats the network
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    pub selection: SelectionOptions,
    /// Re-transfer every index regardless of validators
    pub force_update: bool,
    /// Read staged copies only, fetch nothing
    pub offline: bool,
}

impl ResolveOptions {
    #[must_use]
    pub fn from_settings(settings: &Settings, offline: bool) -> Self {
        Self {
            selection: SelectionOptions {
                default_architecture: settings.architecture.clone(),
                contents: settings.contents,
                by_hash: settings.by_hash,
                languages: settings.language.clone(),
            },
            force_update: settings.force_update,
            offline,
        }
    }
}

/// Index files and artifacts of one entry
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub entry: EntryId,
    /// Staged and ready to publish
    pub indexes: Vec<IndexDescriptor>,
    /// Listed upstream but not refreshed this run; still live for cleaning
    pub stale_indexes: Vec<IndexDescriptor>,
    pub artifacts: Vec<Artifact>,
}

impl Resolution {
    /// Every relative path this entry keeps alive in the mirror
    #[must_use]
    pub fn live_paths(&self) -> impl Iterator<Item = &str> {
        self.indexes
            .iter()
            .chain(&self.stale_indexes)
            .map(|d| d.rel_path.as_str())
            .chain(self.artifacts.iter().map(|a| a.rel_path.as_str()))
    }
}

/// Index transfer totals across every entry of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexFetchSummary {
    pub downloaded: usize,
    pub unchanged: usize,
    /// Not served upstream
    pub missing: usize,
    pub bytes: u64,
    pub failures: Vec<TaskFailure>,
}

#[derive(Debug, Clone)]
enum IndexFetch {
    Available,
    Missing,
    Failed(Error),
}

/// Resolves repository entries.
///
/// Index files shared by several entries (the Release trio of one
/// distribution, say) are transferred once per run.
pub struct IndexResolver {
    fetcher: Arc<dyn Fetcher>,
    locks: Arc<LockTracker>,
    layout: MirrorLayout,
    resources: Arc<ResourceManager>,
    decompressor: Decompressor,
    options: ResolveOptions,
    fetched: DashMap<PathBuf, Arc<OnceCell<IndexFetch>>>,
    summary: Mutex<IndexFetchSummary>,
    events: Option<EventSender>,
}

impl EventEmitter for IndexResolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl IndexResolver {
    #[must_use]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        locks: Arc<LockTracker>,
        layout: MirrorLayout,
        resources: Arc<ResourceManager>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            fetcher,
            locks,
            layout,
            decompressor: Decompressor::new(Arc::clone(&resources)),
            resources,
            options,
            fetched: DashMap::new(),
            summary: Mutex::new(IndexFetchSummary::default()),
            events: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.decompressor = self.decompressor.with_event_sender(events.clone());
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Index transfer totals so far
    #[must_use]
    pub fn summary(&self) -> IndexFetchSummary {
        self.summary
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Resolve one entry.
    ///
    /// # Errors
    ///
    /// Returns `UnreachableRepository` when neither `InRelease` nor `Release`
    /// can be obtained, `MalformedRelease` when neither parses, or
    /// `Cancelled` when the run is stopping. Failures of individual index
    /// files are recorded in the summary. They fail the entry only when a
    /// Packages/Sources file has neither a usable fresh variant nor a copy
    /// staged by an earlier run (`NoParseableIndex`).
    pub async fn resolve(&self, id: EntryId, entry: &RepositoryEntry) -> Result<Resolution, Error> {
        self.emit(AppEvent::Repo(RepoEvent::ResolveStarted {
            entry: id.0,
            description: entry.to_string(),
        }));
        let result = self.resolve_entry(id, entry).await;
        match &result {
            Ok(resolution) => self.emit(AppEvent::Repo(RepoEvent::Resolved {
                entry: id.0,
                index_files: resolution.indexes.len(),
                artifacts: resolution.artifacts.len(),
            })),
            Err(Error::Cancelled) => {}
            Err(err) => self.emit(AppEvent::Repo(RepoEvent::Unreachable {
                entry: id.0,
                description: entry.to_string(),
                failure: FailureContext::from_error(err),
            })),
        }
        result
    }

    async fn resolve_entry(&self, id: EntryId, entry: &RepositoryEntry) -> Result<Resolution, Error> {
        if self.resources.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let dir = release_dir(entry);
        let trio = [
            (IndexKind::InRelease, "InRelease"),
            (IndexKind::Release, "Release"),
            (IndexKind::ReleaseSignature, "Release.gpg"),
        ]
        .map(|(kind, name)| self.descriptor(id, entry, &dir, kind, name, None, ChecksumSet::new()));

        let outcomes = join_all(trio.iter().map(|d| self.fetch_index(d))).await;
        let mut resolution = Resolution {
            entry: id,
            ..Resolution::default()
        };
        let mut problems = Vec::new();
        for (descriptor, outcome) in trio.iter().zip(outcomes) {
            match outcome? {
                IndexFetch::Available => resolution.indexes.push(descriptor.clone()),
                IndexFetch::Missing => problems.push(format!("{}: not found", descriptor.url)),
                IndexFetch::Failed(err) => {
                    problems.push(format!("{}: {}", descriptor.url, err.user_message()));
                    resolution.stale_indexes.push(descriptor.clone());
                }
            }
        }

        let release = self.read_release(&resolution.indexes, &mut problems).await;
        let Some((release_path, release)) = release else {
            return Err(IndexError::UnreachableRepository {
                uri: entry.release_base_url(),
                message: problems.join("; "),
            }
            .into());
        };
        for line in release.skipped_lines() {
            self.emit(AppEvent::Repo(RepoEvent::ReleaseLineSkipped {
                path: release_path.clone(),
                line: line.clone(),
            }));
        }
        self.emit(AppEvent::Repo(RepoEvent::ReleaseParsed {
            entry: id.0,
            path: release_path,
            files_listed: release.len(),
            by_hash: release.acquire_by_hash(),
        }));

        let selected = select_indexes(entry, &release, &self.options.selection);
        self.emit(AppEvent::Repo(RepoEvent::IndexesSelected {
            entry: id.0,
            count: selected.len(),
        }));
        let descriptors: Vec<IndexDescriptor> = selected
            .into_iter()
            .map(|s| self.descriptor(id, entry, &dir, s.kind, &s.path, Some(s.size), s.checksums))
            .collect();

        let outcomes = join_all(descriptors.iter().map(|d| self.fetch_index(d))).await;
        let mut available = Vec::new();
        let mut missing = Vec::new();
        let mut stale = Vec::new();
        for (descriptor, outcome) in descriptors.into_iter().zip(outcomes) {
            match outcome? {
                IndexFetch::Available => available.push(descriptor),
                IndexFetch::Missing => missing.push(descriptor),
                IndexFetch::Failed(_) => stale.push(descriptor),
            }
        }

        let families = group_families(&available, &stale);
        let parsed = join_all(
            families
                .iter()
                .map(|(plain_rel, family)| self.parse_family(entry, id, plain_rel, family)),
        )
        .await;
        let mut produced = Vec::new();
        for outcome in parsed {
            let (plain, artifacts) = outcome?;
            produced.extend(plain);
            resolution.artifacts.extend(artifacts);
        }

        // A listed plain file produced by decompression is published too
        for plain in produced {
            if let Some(at) = missing.iter().position(|d| d.rel_path == plain) {
                available.push(missing.swap_remove(at));
            } else if let Some(at) = stale.iter().position(|d| d.rel_path == plain) {
                available.push(stale.swap_remove(at));
            }
        }

        resolution.indexes.extend(available);
        resolution.stale_indexes.extend(stale);
        Ok(resolution)
    }

    /// First of `InRelease` and `Release` that was fetched and parses
    async fn read_release(
        &self,
        available: &[IndexDescriptor],
        problems: &mut Vec<String>,
    ) -> Option<(String, ReleaseFile)> {
        for kind in [IndexKind::InRelease, IndexKind::Release] {
            let Some(descriptor) = available.iter().find(|d| d.kind == kind) else {
                continue;
            };
            let text = match tokio::fs::read(&descriptor.local_path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    problems.push(format!("{}: {e}", descriptor.local_path.display()));
                    continue;
                }
            };
            match ReleaseFile::parse(&text, &descriptor.rel_path) {
                Ok(release) => return Some((descriptor.rel_path.clone(), release)),
                Err(err) => {
                    self.emit_warning(err.user_message());
                    problems.push(err.to_string());
                }
            }
        }
        None
    }

    /// Decompress if needed and parse one Packages/Sources family.
    ///
    /// Variants fetched this run are tried first, plain before compressed.
    /// When none of them yields a parseable file, the copies staged by an
    /// earlier run for variants that failed to transfer are used instead.
    /// Returns the plain relative path when a fresh compressed variant had to
    /// be expanded, plus the artifacts found.
    ///
    /// # Errors
    ///
    /// Returns `NoParseableIndex` when no variant can be read, so the entry
    /// is never resolved with part of its artifact list missing.
    async fn parse_family(
        &self,
        entry: &RepositoryEntry,
        id: EntryId,
        plain_rel: &str,
        family: &Family<'_>,
    ) -> Result<(Option<String>, Vec<Artifact>), Error> {
        let Some(kind) = family.fresh.iter().chain(&family.stale).next().map(|d| d.kind) else {
            return Ok((None, Vec::new()));
        };

        let mut input = self.family_input(plain_rel, &family.fresh).await?;
        if input.is_none() {
            let mut staged = Vec::new();
            for descriptor in &family.stale {
                if local_state(&descriptor.local_path).await.is_some() {
                    staged.push(*descriptor);
                }
            }
            input = self
                .family_input(plain_rel, &staged)
                .await?
                .map(|(path, _)| (path, None));
            if let Some((path, _)) = &input {
                self.emit_warning_with_context(
                    "index could not be refreshed, using the staged copy",
                    path.display().to_string(),
                );
            }
        }

        let Some((path, produced)) = input else {
            return Err(IndexError::NoParseableIndex {
                name: plain_rel.rsplit('/').next().unwrap_or(plain_rel).to_string(),
                path: plain_rel.to_string(),
            }
            .into());
        };

        let parsed = {
            let _permit = self.resources.acquire_decompression_permit().await?;
            let read_path = path.clone();
            tokio::task::spawn_blocking(move || {
                std::fs::read(&read_path)
                    .map(|bytes| parse_index(kind, &String::from_utf8_lossy(&bytes)))
            })
            .await
            .map_err(|e| OpsError::WorkerFailed {
                message: e.to_string(),
            })?
            .map_err(|e| Error::io_with_path(&e, &path))?
        };

        let shown = path.display().to_string();
        for (line, reason) in parsed.skipped {
            self.emit(AppEvent::Repo(RepoEvent::StanzaSkipped {
                path: shown.clone(),
                line,
                reason,
            }));
        }

        let root = entry.local_root();
        let artifacts = parsed
            .records
            .into_iter()
            .map(|record| Artifact {
                rel_path: format!("{root}/{}", record.path),
                url: entry.url_for(&record.path),
                size: record.size,
                checksums: record.checksums,
                owner: id,
            })
            .collect();
        Ok((produced, artifacts))
    }

    /// Plain variant if present, otherwise the first compressed one that expands
    async fn family_input(
        &self,
        plain_rel: &str,
        variants: &[&IndexDescriptor],
    ) -> Result<Option<(PathBuf, Option<String>)>, Error> {
        if let Some(plain) = variants.iter().find(|d| d.rel_path == plain_rel) {
            return Ok(Some((plain.local_path.clone(), None)));
        }
        for compression in Compression::PREFERENCE {
            let Some(variant) = variants
                .iter()
                .find(|d| Compression::from_path(&d.local_path) == Some(compression))
            else {
                continue;
            };
            match self.decompressor.ensure_plain(&variant.local_path).await {
                Ok(path) => return Ok(Some((path, Some(plain_rel.to_string())))),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    self.emit_warning_with_context(err.user_message(), variant.rel_path.clone());
                }
            }
        }
        Ok(None)
    }

    #[allow(clippy::too_many_arguments)]
    fn descriptor(
        &self,
        id: EntryId,
        entry: &RepositoryEntry,
        dir: &str,
        kind: IndexKind,
        name: &str,
        size: Option<u64>,
        checksums: ChecksumSet,
    ) -> IndexDescriptor {
        let repo_rel = join_rel(dir, name);
        let rel_path = join_rel(&entry.local_root(), &repo_rel);
        IndexDescriptor {
            kind,
            owner: id,
            url: entry.url_for(&repo_rel),
            local_path: self.layout.skel_path(&rel_path),
            rel_path,
            size,
            checksums,
        }
    }

    /// Fetch a staged index once per run, whoever asks first
    async fn fetch_index(&self, descriptor: &IndexDescriptor) -> Result<IndexFetch, Error> {
        let cell = self
            .fetched
            .entry(descriptor.local_path.clone())
            .or_default()
            .clone();
        cell.get_or_try_init(|| self.fetch_index_once(descriptor))
            .await
            .cloned()
    }

    async fn fetch_index_once(&self, descriptor: &IndexDescriptor) -> Result<IndexFetch, Error> {
        if self.options.offline {
            let present = local_state(&descriptor.local_path).await.is_some();
            return Ok(if present {
                IndexFetch::Available
            } else {
                IndexFetch::Missing
            });
        }

        let mode = self.fetch_mode(descriptor).await;
        let request = FetchRequest::new(&descriptor.url, &descriptor.local_path)
            .with_size(descriptor.size)
            .with_checksums(descriptor.checksums.clone())
            .with_mode(mode);

        let result = {
            let _permit = self.resources.acquire_download_permit().await?;
            fetch_guarded(self.fetcher.as_ref(), &self.locks, &request).await
        };

        match result {
            Ok(outcome) => {
                self.record(|s| match outcome {
                    FetchOutcome::Downloaded { bytes } => {
                        s.downloaded += 1;
                        s.bytes += bytes;
                    }
                    FetchOutcome::Unchanged => s.unchanged += 1,
                });
                Ok(IndexFetch::Available)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(err) if is_not_found(&err) => {
                // Upstream dropped it; a stale staged copy must not be published
                self.remove_stale(&descriptor.local_path).await;
                self.emit_debug(format!("index not served: {}", descriptor.url));
                self.record(|s| s.missing += 1);
                Ok(IndexFetch::Missing)
            }
            Err(err) => {
                self.emit_warning_with_context(err.user_message(), descriptor.url.clone());
                let failure = TaskFailure {
                    rel_path: descriptor.rel_path.clone(),
                    url: descriptor.url.clone(),
                    reason: FailureReason::from(&err),
                };
                self.record(|s| s.failures.push(failure));
                Ok(IndexFetch::Failed(err))
            }
        }
    }

    /// A staged copy whose size disagrees with the Release file is re-fetched in full
    async fn fetch_mode(&self, descriptor: &IndexDescriptor) -> FetchMode {
        if self.options.force_update {
            return FetchMode::Unconditional;
        }
        match (descriptor.size, local_state(&descriptor.local_path).await) {
            (Some(expected), Some(local)) if local.size != expected => FetchMode::Unconditional,
            _ => FetchMode::Conditional,
        }
    }

    async fn remove_stale(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                self.emit_debug(format!("could not remove {}: {e}", path.display()));
            }
        }
    }

    fn record(&self, update: impl FnOnce(&mut IndexFetchSummary)) {
        if let Ok(mut summary) = self.summary.lock() {
            update(&mut summary);
        }
    }
}

/// Directory of the Release files relative to the repository URI
fn release_dir(entry: &RepositoryEntry) -> String {
    let base = entry.release_base_url();
    base.strip_prefix(entry.uri.as_str())
        .unwrap_or_default()
        .trim_matches('/')
        .to_string()
}

fn join_rel(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{dir}/{name}"),
    }
}

fn is_not_found(err: &Error) -> bool {
    matches!(
        err,
        Error::Network(NetworkError::HttpError {
            status: 404 | 410,
            ..
        })
    )
}

/// Variants of one Packages/Sources file
#[derive(Debug, Default)]
struct Family<'a> {
    /// Fetched or confirmed this run
    fresh: Vec<&'a IndexDescriptor>,
    /// Failed to transfer; only an earlier staged copy may be on disk
    stale: Vec<&'a IndexDescriptor>,
}

/// Packages/Sources descriptors keyed by their plain relative path
fn group_families<'a>(
    available: &'a [IndexDescriptor],
    stale: &'a [IndexDescriptor],
) -> BTreeMap<String, Family<'a>> {
    let mut families: BTreeMap<String, Family<'a>> = BTreeMap::new();
    for descriptor in available.iter().filter(|d| d.kind.lists_artifacts()) {
        families
            .entry(plain_name(&descriptor.rel_path).to_string())
            .or_default()
            .fresh
            .push(descriptor);
    }
    for descriptor in stale.iter().filter(|d| d.kind.lists_artifacts()) {
        families
            .entry(plain_name(&descriptor.rel_path).to_string())
            .or_default()
            .stale
            .push(descriptor);
    }
    families
}
