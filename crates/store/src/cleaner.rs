//! Removal of mirrored files no index references any more

use aptsync_config::constants::PARTIAL_SUFFIX;
use aptsync_errors::{Error, OpsError, StorageError};
use aptsync_events::{AppEvent, CleanEvent, EventEmitter, EventSender};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What one root walk found or removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub root: PathBuf,
    pub dry_run: bool,
    /// Files removed, or that would be removed in a dry run
    pub removed: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub bytes: u64,
}

#[derive(Debug, Default)]
struct Candidates {
    files: Vec<(PathBuf, u64)>,
    directories: Vec<PathBuf>,
}

/// Walks repository roots under the mirror and drops unreferenced files.
///
/// Symlinks and in-flight `.partial` files are always kept. Directories left without any kept content are
/// removed after their files. Protected subtrees (lock markers, staging)
/// are left alone.
#[derive(Debug, Clone)]
pub struct Cleaner {
    mirror_root: PathBuf,
    protected: Vec<PathBuf>,
    events: Option<EventSender>,
}

impl EventEmitter for Cleaner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl Cleaner {
    #[must_use]
    pub fn new(mirror_root: impl Into<PathBuf>) -> Self {
        Self {
            mirror_root: mirror_root.into(),
            protected: Vec::new(),
            events: None,
        }
    }

    /// Leave `path` and everything below it alone
    #[must_use]
    pub fn protect(mut self, path: impl Into<PathBuf>) -> Self {
        self.protected.push(path.into());
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Clean the subtree `root_rel` of the mirror.
    ///
    /// `live` holds paths relative to the mirror root. A missing root is
    /// not an error and yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk worker fails or a removal fails.
    pub async fn clean(
        &self,
        root_rel: &str,
        live: &HashSet<String>,
        dry_run: bool,
    ) -> Result<CleanReport, Error> {
        let root = self.mirror_root.join(root_rel);
        let mut report = CleanReport {
            root: root.clone(),
            dry_run,
            ..CleanReport::default()
        };
        let is_dir = tokio::fs::symlink_metadata(&root)
            .await
            .is_ok_and(|m| m.is_dir());
        if !is_dir {
            return Ok(report);
        }

        self.emit(AppEvent::Clean(CleanEvent::Started {
            root: root.clone(),
            dry_run,
        }));

        let candidates = {
            let mirror_root = self.mirror_root.clone();
            let protected = self.protected.clone();
            let live = live.clone();
            let root = root.clone();
            tokio::task::spawn_blocking(move || find_candidates(&mirror_root, &root, &protected, &live))
                .await
                .map_err(|e| OpsError::WorkerFailed {
                    message: e.to_string(),
                })?
        };

        for (path, bytes) in candidates.files {
            if !dry_run {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(StorageError::from_io_with_path(&e, &path).into()),
                }
            }
            self.emit(AppEvent::Clean(CleanEvent::Removed {
                path: path.clone(),
                bytes,
                dry_run,
            }));
            report.bytes += bytes;
            report.removed.push(path);
        }

        for dir in candidates.directories {
            if !dry_run {
                if let Err(e) = tokio::fs::remove_dir(&dir).await {
                    // Something appeared since the walk; leave it be
                    self.emit_debug(format!("kept directory {}: {e}", dir.display()));
                    continue;
                }
                self.emit(AppEvent::Clean(CleanEvent::DirectoryRemoved { path: dir.clone() }));
            }
            report.directories.push(dir);
        }

        self.emit(AppEvent::Clean(CleanEvent::Completed {
            root,
            files: report.removed.len(),
            bytes: report.bytes,
            dry_run,
        }));
        Ok(report)
    }
}

fn relative_key(mirror_root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(mirror_root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}

fn find_candidates(
    mirror_root: &Path,
    root: &Path,
    protected: &[PathBuf],
    live: &HashSet<String>,
) -> Candidates {
    let mut candidates = Candidates::default();
    // Directories holding something that stays
    let mut required: HashSet<PathBuf> = HashSet::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name();

    for entry in walker.into_iter().filter_map(std::result::Result::ok) {
        let path = entry.path();
        if protected.iter().any(|p| path.starts_with(p)) {
            continue;
        }
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if path == root {
                continue;
            }
            if !required.contains(path) {
                candidates.directories.push(path.to_path_buf());
            }
            continue;
        }

        let keep = file_type.is_symlink()
            || is_partial(path)
            || relative_key(mirror_root, path).is_some_and(|key| live.contains(&key));
        if keep {
            mark_required(&mut required, path, root);
        } else {
            let bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            candidates.files.push((path.to_path_buf(), bytes));
        }
    }

    // A protected subtree inside the root keeps its parents
    for p in protected {
        if p.starts_with(root) {
            mark_required(&mut required, p, root);
        }
    }
    candidates
        .directories
        .retain(|dir| !required.contains(dir));
    candidates
}

fn is_partial(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PARTIAL_SUFFIX)
}

fn mark_required(required: &mut HashSet<PathBuf>, path: &Path, root: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor == root || !ancestor.starts_with(root) || !required.insert(ancestor.to_path_buf()) {
            break;
        }
    }
}
