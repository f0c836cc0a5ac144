use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::FailureContext;

/// Per-file transfer events, for both index files and artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    /// Executor accepted a batch of tasks
    BatchStarted {
        tasks: usize,
        to_fetch: usize,
        planned_bytes: u64,
        concurrency: usize,
    },

    /// Transfer started
    Started {
        url: String,
        rel_path: String,
        expected_size: Option<u64>,
        conditional: bool,
    },

    /// Transfer finished and the file is in place
    Completed {
        url: String,
        rel_path: String,
        bytes: u64,
        elapsed: Duration,
    },

    /// Server reported the local copy is current
    Unchanged { url: String, rel_path: String },

    /// Transfer failed; the task is retried on the next run
    Failed {
        url: String,
        rel_path: String,
        failure: FailureContext,
    },

    /// Transient failure inside one fetch, retrying
    Retrying {
        url: String,
        attempt: u32,
        max_attempts: u32,
        reason: String,
        backoff_delay: Duration,
    },

    /// In-flight transfer dropped after a stop signal; its lock marker stays
    Abandoned { url: String, rel_path: String },

    /// Executor finished draining the batch
    BatchCompleted {
        downloaded: usize,
        unchanged: usize,
        failed: usize,
        cancelled: usize,
        bytes: u64,
    },
}
