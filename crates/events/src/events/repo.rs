use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Repository resolution and index parsing events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RepoEvent {
    /// Resolution of one entry started
    ResolveStarted { entry: usize, description: String },

    /// Release file parsed
    ReleaseParsed {
        entry: usize,
        path: String,
        files_listed: usize,
        by_hash: bool,
    },

    /// Index files selected for download
    IndexesSelected { entry: usize, count: usize },

    /// A line of a Release checksum section had the wrong shape
    ReleaseLineSkipped { path: String, line: String },

    /// A Packages/Sources stanza lacked required fields and was skipped
    StanzaSkipped {
        path: String,
        line: usize,
        reason: String,
    },

    /// Compressed index expanded to its plain sibling
    Decompressed {
        path: String,
        plain: String,
        reused: bool,
    },

    /// Resolution of one entry finished
    Resolved {
        entry: usize,
        index_files: usize,
        artifacts: usize,
    },

    /// Entry skipped for this run
    Unreachable {
        entry: usize,
        description: String,
        failure: FailureContext,
    },
}
