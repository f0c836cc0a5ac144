//! Plain copies of compressed index files
//!
//! Decompression is CPU-bound and runs on blocking threads gated by the
//! decompression pool, never by a download permit.

use aptsync_errors::{Error, IndexError, OpsError, StorageError};
use aptsync_events::{AppEvent, EventEmitter, EventSender, RepoEvent};
use aptsync_resources::ResourceManager;
use bzip2::read::MultiBzDecoder;
use filetime::FileTime;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xz2::read::XzDecoder;

/// Compression formats the parser can read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Gzip,
    Bzip2,
}

impl Compression {
    /// Preferred order when several variants of one index exist
    pub const PREFERENCE: [Self; 3] = [Self::Xz, Self::Gzip, Self::Bzip2];

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xz => "xz",
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
        }
    }

    /// Detect the format from a file name
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "xz" => Some(Self::Xz),
            "gz" => Some(Self::Gzip),
            "bz2" => Some(Self::Bzip2),
            _ => None,
        }
    }

    fn reader(self, file: File) -> Box<dyn Read> {
        let file = BufReader::new(file);
        match self {
            Self::Xz => Box::new(XzDecoder::new(file)),
            Self::Gzip => Box::new(MultiGzDecoder::new(file)),
            Self::Bzip2 => Box::new(MultiBzDecoder::new(file)),
        }
    }
}

/// Expands compressed indexes next to themselves
#[derive(Debug, Clone)]
pub struct Decompressor {
    resources: Arc<ResourceManager>,
    events: Option<EventSender>,
}

impl EventEmitter for Decompressor {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl Decompressor {
    #[must_use]
    pub fn new(resources: Arc<ResourceManager>) -> Self {
        Self {
            resources,
            events: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Produce the uncompressed sibling of `path` and return its location.
    ///
    /// An existing sibling whose mtime is not older than the compressed file
    /// is reused. The new sibling carries the compressed file's mtime.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCompression` for unknown suffixes, `CorruptArchive`
    /// if the stream does not decode, `Cancelled` if the run is stopping, or
    /// a storage error if the sibling cannot be written.
    pub async fn ensure_plain(&self, path: &Path) -> Result<PathBuf, Error> {
        let compression = Compression::from_path(path).ok_or_else(|| {
            IndexError::UnsupportedCompression {
                path: path.display().to_string(),
            }
        })?;
        let plain = path.with_extension("");

        let source_meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, path))?;
        let source_mtime = FileTime::from_last_modification_time(&source_meta);

        if let Ok(plain_meta) = tokio::fs::metadata(&plain).await {
            if plain_meta.is_file()
                && FileTime::from_last_modification_time(&plain_meta) >= source_mtime
            {
                self.emit_decompressed(path, &plain, true);
                return Ok(plain);
            }
        }

        let _permit = self.resources.acquire_decompression_permit().await?;
        {
            let source = path.to_path_buf();
            let target = plain.clone();
            tokio::task::spawn_blocking(move || {
                decompress_file(compression, &source, &target, source_mtime)
            })
            .await
            .map_err(|e| OpsError::WorkerFailed {
                message: e.to_string(),
            })??;
        }

        self.emit_decompressed(path, &plain, false);
        Ok(plain)
    }

    fn emit_decompressed(&self, path: &Path, plain: &Path, reused: bool) {
        self.emit(AppEvent::Repo(RepoEvent::Decompressed {
            path: path.display().to_string(),
            plain: plain.display().to_string(),
            reused,
        }));
    }
}

/// Decode `source` into `target` through a temporary sibling
fn decompress_file(
    compression: Compression,
    source: &Path,
    target: &Path,
    mtime: FileTime,
) -> Result<(), Error> {
    let parent = target.parent().ok_or_else(|| StorageError::InvalidPath {
        path: target.display().to_string(),
    })?;
    let file = File::open(source).map_err(|e| StorageError::from_io_with_path(&e, source))?;
    let mut reader = compression.reader(file);

    let mut temp = tempfile::Builder::new()
        .prefix(".aptsync-plain")
        .tempfile_in(parent)
        .map_err(|e| StorageError::from_io_with_path(&e, parent))?;
    std::io::copy(&mut reader, temp.as_file_mut()).map_err(|e| IndexError::CorruptArchive {
        path: source.display().to_string(),
        message: e.to_string(),
    })?;

    filetime::set_file_mtime(temp.path(), mtime)
        .map_err(|e| StorageError::from_io_with_path(&e, temp.path()))?;
    temp.persist(target)
        .map_err(|e| StorageError::AtomicRenameFailed {
            message: format!("{}: {}", target.display(), e.error),
        })?;
    Ok(())
}
