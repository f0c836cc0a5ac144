//! Publishing staged index files into the mirror

use aptsync_errors::{Error, OpsError, StorageError};
use filetime::FileTime;
use std::path::Path;

use crate::MirrorLayout;

/// Outcome of one promotion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromoteSummary {
    pub copied: usize,
    pub unchanged: usize,
    /// Listed but never staged, e.g. an optional index the server lacks
    pub missing: usize,
}

/// Copy staged index files from `skel` into `mirror`.
///
/// Each file is written to a temporary sibling and renamed into place with
/// the staged mtime, so readers of the mirror never see a half-written index.
///
/// # Errors
///
/// Returns an error if a copy, rename or mtime update fails.
pub async fn promote_indexes(
    layout: &MirrorLayout,
    rel_paths: Vec<String>,
) -> Result<PromoteSummary, Error> {
    let layout = layout.clone();
    tokio::task::spawn_blocking(move || {
        let mut summary = PromoteSummary::default();
        for rel in &rel_paths {
            let src = layout.skel_path(rel);
            let dest = layout.mirror_path(rel);
            let Ok(src_meta) = std::fs::metadata(&src) else {
                summary.missing += 1;
                continue;
            };
            if !src_meta.is_file() {
                summary.missing += 1;
                continue;
            }
            let src_mtime = FileTime::from_last_modification_time(&src_meta);
            if let Ok(dest_meta) = std::fs::metadata(&dest) {
                if dest_meta.len() == src_meta.len()
                    && FileTime::from_last_modification_time(&dest_meta) == src_mtime
                {
                    summary.unchanged += 1;
                    continue;
                }
            }
            copy_atomic(&src, &dest, src_mtime)?;
            summary.copied += 1;
        }
        Ok(summary)
    })
    .await
    .map_err(|e| OpsError::WorkerFailed {
        message: e.to_string(),
    })?
}

fn copy_atomic(src: &Path, dest: &Path, mtime: FileTime) -> Result<(), Error> {
    let parent = dest.parent().ok_or_else(|| StorageError::InvalidPath {
        path: dest.display().to_string(),
    })?;
    std::fs::create_dir_all(parent).map_err(|e| StorageError::from_io_with_path(&e, parent))?;

    let temp = tempfile::Builder::new()
        .prefix(".aptsync-promote")
        .tempfile_in(parent)
        .map_err(|e| StorageError::from_io_with_path(&e, parent))?;
    std::fs::copy(src, temp.path()).map_err(|e| StorageError::from_io_with_path(&e, src))?;
    filetime::set_file_mtime(temp.path(), mtime)
        .map_err(|e| StorageError::from_io_with_path(&e, temp.path()))?;
    temp.persist(dest)
        .map_err(|e| StorageError::AtomicRenameFailed {
            message: format!("{}: {}", dest.display(), e.error),
        })?;
    Ok(())
}
