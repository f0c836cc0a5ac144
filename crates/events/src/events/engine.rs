use aptsync_types::SyncState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Run started
    Started {
        entries: usize,
        dry_run: bool,
        clean_only: bool,
    },

    /// State machine moved on
    StateChanged { from: SyncState, to: SyncState },

    /// Planner produced the work list
    PlanReady {
        tasks: usize,
        to_fetch: usize,
        to_skip: usize,
        planned_bytes: u64,
        conflicts: usize,
    },

    /// Index files moved from the staging tree into the mirror
    IndexesPromoted { files: usize },

    /// Stop signal received
    StopRequested,

    /// Run finished
    Finished {
        state: SyncState,
        bytes_downloaded: u64,
        files_failed: usize,
        duration: Duration,
    },
}
