use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Obsolete-file removal events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CleanEvent {
    /// Walk of one repository root started
    Started { root: PathBuf, dry_run: bool },

    /// A file is no longer referenced
    Removed {
        path: PathBuf,
        bytes: u64,
        dry_run: bool,
    },

    /// An emptied directory was removed
    DirectoryRemoved { path: PathBuf },

    /// A root was not cleaned
    Skipped { root: PathBuf, reason: String },

    /// Walk of one repository root finished
    Completed {
        root: PathBuf,
        files: usize,
        bytes: u64,
        dry_run: bool,
    },
}
