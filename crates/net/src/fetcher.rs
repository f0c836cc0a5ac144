//! The single-file transfer capability

use aptsync_errors::Error;
use aptsync_hash::ChecksumSet;
use async_trait::async_trait;
use std::path::PathBuf;

/// How the fetcher treats an existing destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Send the local mtime as a validator and accept "not modified"
    Conditional,
    /// Always transfer the body
    Unconditional,
}

/// One URL to one destination
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub dest: PathBuf,
    pub expected_size: Option<u64>,
    pub checksums: ChecksumSet,
    pub mode: FetchMode,
}

impl FetchRequest {
    #[must_use]
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            expected_size: None,
            checksums: ChecksumSet::new(),
            mode: FetchMode::Conditional,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.expected_size = size;
        self
    }

    #[must_use]
    pub fn with_checksums(mut self, checksums: ChecksumSet) -> Self {
        self.checksums = checksums;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.mode == FetchMode::Conditional
    }
}

/// Result of a fetch that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The destination was rewritten with this many bytes
    Downloaded { bytes: u64 },
    /// The server reported the local copy current; the file was not touched
    Unchanged,
}

impl FetchOutcome {
    #[must_use]
    pub fn bytes(self) -> u64 {
        match self {
            Self::Downloaded { bytes } => bytes,
            Self::Unchanged => 0,
        }
    }
}

/// Transfer of one URL to one destination path.
///
/// Implementations are stateless per call. `Err` carries the failure
/// reason: size or checksum mismatch, or a transport failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, Error>;
}
