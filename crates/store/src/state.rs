//! Snapshot of what is already mirrored

use aptsync_errors::{Error, OpsError};
use aptsync_types::LocalFileState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Size and mtime of a regular file, `None` when absent
pub async fn local_state(path: &Path) -> Option<LocalFileState> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.is_file().then(|| LocalFileState {
        size: meta.len(),
        modified: meta.modified().ok(),
    })
}

/// Stat every relative path under `root`; absent files are left out.
///
/// # Errors
///
/// Returns an error only if the blocking worker panics.
pub async fn scan_local_state(
    root: &Path,
    rel_paths: Vec<String>,
) -> Result<HashMap<String, LocalFileState>, Error> {
    let root: PathBuf = root.to_path_buf();
    tokio::task::spawn_blocking(move || {
        rel_paths
            .into_iter()
            .filter_map(|rel| {
                let meta = std::fs::metadata(root.join(&rel)).ok()?;
                meta.is_file().then(|| {
                    let state = LocalFileState {
                        size: meta.len(),
                        modified: meta.modified().ok(),
                    };
                    (rel, state)
                })
            })
            .collect()
    })
    .await
    .map_err(|e| {
        OpsError::WorkerFailed {
            message: e.to_string(),
        }
        .into()
    })
}
