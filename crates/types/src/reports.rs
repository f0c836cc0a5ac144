//! Report type definitions for sync runs

use aptsync_errors::{Error, NetworkError, UserFacingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::{EntryId, SyncState};

/// Why a download task failed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureReason {
    SizeMismatch { expected: u64, actual: u64 },
    ChecksumMismatch { expected: String, actual: String },
    Transport { message: String },
    Storage { message: String },
}

impl From<&Error> for FailureReason {
    fn from(err: &Error) -> Self {
        match err {
            Error::Network(NetworkError::SizeMismatch {
                expected, actual, ..
            }) => Self::SizeMismatch {
                expected: *expected,
                actual: *actual,
            },
            Error::Network(NetworkError::ChecksumMismatch { expected, actual }) => {
                Self::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: actual.clone(),
                }
            }
            Error::Network(other) => Self::Transport {
                message: other.user_message().into_owned(),
            },
            other => Self::Storage {
                message: other.user_message().into_owned(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected} bytes, got {actual}")
            }
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, got {actual}")
            }
            Self::Transport { message } | Self::Storage { message } => f.write_str(message),
        }
    }
}

/// A download task that did not complete
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub rel_path: String,
    pub url: String,
    pub reason: FailureReason,
}

/// A repository entry whose indexes could not be resolved
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFailure {
    pub entry: EntryId,
    pub description: String,
    pub message: String,
}

/// Two index declarations of the same destination that disagree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityConflict {
    pub rel_path: String,
    pub first_owner: EntryId,
    pub conflicting_owner: EntryId,
    pub message: String,
}

/// Aggregate outcome of one engine run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub state: SyncState,
    pub dry_run: bool,

    /// Artifact bytes transferred
    pub bytes_downloaded: u64,
    pub files_downloaded: usize,
    pub files_skipped: usize,
    pub failures: Vec<TaskFailure>,
    /// Tasks never started or abandoned after a stop signal
    pub files_cancelled: usize,

    pub index_bytes_downloaded: u64,
    pub index_files_downloaded: usize,
    pub index_files_unchanged: usize,

    /// Dry-run estimate
    pub bytes_planned: u64,
    pub files_planned: usize,

    pub files_cleaned: usize,
    pub bytes_reclaimed: u64,
    pub files_would_clean: usize,
    pub bytes_would_reclaim: u64,
    pub cleaned_paths: Vec<PathBuf>,

    pub recovered_paths: Vec<PathBuf>,
    pub unresolved: Vec<EntryFailure>,
    pub integrity_conflicts: Vec<IntegrityConflict>,
    pub duration_ms: u64,
}

impl SyncReport {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Total files that failed in this run
    #[must_use]
    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether the run should exit successfully
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == SyncState::Done
            && self.unresolved.is_empty()
            && (self.dry_run || self.failures.is_empty())
    }
}
