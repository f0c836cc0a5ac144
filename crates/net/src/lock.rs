//! Crash-witness markers for in-flight transfers
//!
//! A marker file exists under the lock directory for every destination
//! being written. Markers found at startup belong to a run that died
//! mid-transfer: their destinations are purged so the next fetch is a
//! full download.

use aptsync_errors::{Error, StorageError};
use aptsync_events::{AppEvent, EventEmitter, LockEvent};
use dashmap::DashSet;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::fetcher::{FetchOutcome, FetchRequest, Fetcher};
use crate::http::partial_path;

/// File extension of marker files
pub const MARKER_EXTENSION: &str = "lock";

/// Tracks which destinations have a live marker
#[derive(Debug)]
pub struct LockTracker {
    dir: PathBuf,
    live: DashSet<PathBuf>,
    recovered: AtomicBool,
}

impl LockTracker {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            dir: dir.into(),
            live: DashSet::new(),
            recovered: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Marker path for a destination
    #[must_use]
    pub fn marker_path(&self, dest: &Path) -> PathBuf {
        let digest = Sha256::digest(dest.as_os_str().as_encoded_bytes());
        self.dir
            .join(format!("{}.{MARKER_EXTENSION}", hex::encode(digest)))
    }

    /// Number of markers held by this run
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_locked(&self, dest: &Path) -> bool {
        self.live.contains(dest)
    }

    /// Delete every marker left by a previous run together with its
    /// destination and partial file. Must complete before `acquire`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock directory cannot be created or read, or
    /// a marker or its destination cannot be removed.
    pub async fn scan_and_recover_stale(
        &self,
        events: &impl EventEmitter,
    ) -> Result<Vec<PathBuf>, Error> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &self.dir))?;

        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &self.dir))?;
        let mut markers = 0;
        let mut recovered = Vec::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &self.dir))?
        {
            let marker = entry.path();
            if marker.extension().and_then(|e| e.to_str()) != Some(MARKER_EXTENSION) {
                continue;
            }
            markers += 1;

            let (url, destination) = match fs::read_to_string(&marker).await {
                Ok(content) => parse_marker(&content),
                Err(_) => (None, None),
            };
            if let Some(dest) = &destination {
                remove_if_present(dest).await?;
                remove_if_present(&partial_path(dest)).await?;
                recovered.push(dest.clone());
            }
            remove_if_present(&marker).await?;

            events.emit(AppEvent::Lock(LockEvent::Recovered {
                marker,
                destination,
                url,
            }));
        }

        recovered.sort();
        self.recovered.store(true, Ordering::Release);
        events.emit(AppEvent::Lock(LockEvent::ScanCompleted {
            markers,
            purged: recovered.len(),
        }));
        Ok(recovered)
    }

    /// Record that `dest` is about to be written from `url`
    ///
    /// # Errors
    ///
    /// Returns `RecoveryPending` before the stale scan ran, `AlreadyLocked`
    /// when the destination already has a live marker, or an I/O error if
    /// the marker cannot be written.
    pub async fn acquire(self: &Arc<Self>, dest: &Path, url: &str) -> Result<LockToken, Error> {
        if !self.recovered.load(Ordering::Acquire) {
            return Err(StorageError::RecoveryPending.into());
        }
        if !self.live.insert(dest.to_path_buf()) {
            return Err(StorageError::AlreadyLocked {
                path: dest.display().to_string(),
            }
            .into());
        }
        // From here the token owns the in-memory entry
        let token = LockToken {
            tracker: Arc::clone(self),
            dest: dest.to_path_buf(),
            marker: self.marker_path(dest),
            released: false,
        };
        token.write_marker(url).await?;
        Ok(token)
    }

    fn forget(&self, dest: &Path) {
        self.live.remove(dest);
    }
}

/// Live marker for one destination.
///
/// `release` removes the marker. Dropping the token without releasing it
/// leaves the marker on disk so the next run purges the destination.
#[derive(Debug)]
#[must_use = "dropping a lock token abandons the destination"]
pub struct LockToken {
    tracker: Arc<LockTracker>,
    dest: PathBuf,
    marker: PathBuf,
    released: bool,
}

impl LockToken {
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.dest
    }

    #[must_use]
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    async fn write_marker(&self, url: &str) -> Result<(), Error> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.marker)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyLocked {
                        path: self.dest.display().to_string(),
                    }
                } else {
                    StorageError::LockFailed {
                        path: format!("{}: {e}", self.marker.display()),
                    }
                }
            })?;
        let content = format!("{url}\n{}\n", self.dest.display());
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &self.marker))?;
        file.flush()
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, &self.marker))?;
        Ok(())
    }

    /// Remove the marker
    ///
    /// # Errors
    ///
    /// Returns an error if the marker file cannot be deleted.
    pub async fn release(mut self) -> Result<(), Error> {
        self.released = true;
        remove_if_present(&self.marker).await
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        self.tracker.forget(&self.dest);
    }
}

/// Acquire a marker, fetch, and release the marker whatever the outcome.
///
/// If the returned future is dropped mid-transfer the marker stays behind.
///
/// # Errors
///
/// Returns lock errors from `acquire`, the fetch failure, or a failure to
/// remove the marker after a successful fetch.
pub async fn fetch_guarded(
    fetcher: &dyn Fetcher,
    locks: &Arc<LockTracker>,
    request: &FetchRequest,
) -> Result<FetchOutcome, Error> {
    let token = locks.acquire(&request.dest, &request.url).await?;
    let result = fetcher.fetch(request).await;
    let released = token.release().await;
    let outcome = result?;
    released?;
    Ok(outcome)
}

fn parse_marker(content: &str) -> (Option<String>, Option<PathBuf>) {
    let mut lines = content.lines().map(str::trim);
    let url = lines.next().filter(|l| !l.is_empty()).map(str::to_string);
    let dest = lines.next().filter(|l| !l.is_empty()).map(PathBuf::from);
    (url, dest)
}

async fn remove_if_present(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::from_io_with_path(&e, path).into()),
    }
}
