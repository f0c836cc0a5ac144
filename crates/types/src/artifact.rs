//! Mirrorable files and the per-file download decision

use aptsync_hash::ChecksumSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

use crate::EntryId;

/// One file referenced by a parsed Packages or Sources index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path relative to the mirror root, including the sanitised repository URI
    pub rel_path: String,
    pub url: String,
    pub size: u64,
    pub checksums: ChecksumSet,
    pub owner: EntryId,
}

/// What is on disk at an artifact's destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFileState {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Why a task must transfer bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FetchReason {
    Absent,
    SizeMismatch { local: u64, expected: u64 },
    Forced,
}

impl fmt::Display for FetchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::SizeMismatch { local, expected } => {
                write!(f, "size mismatch (local {local}, expected {expected})")
            }
            Self::Forced => write!(f, "forced"),
        }
    }
}

/// Planner verdict for one destination.
///
/// `Skip` is optimistic: the executor still asks the fetcher for a
/// conditional transfer, which may turn up new bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision")]
pub enum DownloadDecision {
    Fetch(FetchReason),
    Skip,
}

impl DownloadDecision {
    #[must_use]
    pub fn is_fetch(self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// Unit of work for the download executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub artifact: Artifact,
    pub decision: DownloadDecision,
}

impl DownloadTask {
    /// Bytes this task would move if executed
    #[must_use]
    pub fn planned_bytes(&self) -> u64 {
        if self.decision.is_fetch() {
            self.artifact.size
        } else {
            0
        }
    }
}
