use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Crash-witness marker events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LockEvent {
    /// A marker from an interrupted run was found and its destination purged
    Recovered {
        marker: PathBuf,
        destination: Option<PathBuf>,
        url: Option<String>,
    },

    /// Startup scan finished
    ScanCompleted { markers: usize, purged: usize },
}
