//! On-disk layout of one mirror

use aptsync_config::Settings;
use aptsync_errors::{Error, OpsError};
use std::path::{Path, PathBuf};

/// Mirror, staging and working directories.
///
/// Index files land in `skel` during resolution and move to `mirror` once
/// the artifacts they reference are in place. `var` holds lock markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    mirror: PathBuf,
    skel: PathBuf,
    var: PathBuf,
    lock: PathBuf,
}

impl MirrorLayout {
    #[must_use]
    pub fn new(mirror: impl Into<PathBuf>, skel: impl Into<PathBuf>, var: impl Into<PathBuf>) -> Self {
        let var = var.into();
        Self {
            mirror: mirror.into(),
            skel: skel.into(),
            lock: var.join(aptsync_config::constants::LOCK_DIR),
            var,
        }
    }

    /// `mirror/`, `skel/` and `var/` under one root
    #[must_use]
    pub fn under(root: &Path) -> Self {
        use aptsync_config::constants::{MIRROR_DIR, SKEL_DIR, VAR_DIR};
        Self::new(root.join(MIRROR_DIR), root.join(SKEL_DIR), root.join(VAR_DIR))
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            mirror: settings.mirror_dir(),
            skel: settings.skel_dir(),
            var: settings.var_dir(),
            lock: settings.lock_dir(),
        }
    }

    #[must_use]
    pub fn mirror_root(&self) -> &Path {
        &self.mirror
    }

    #[must_use]
    pub fn skel_root(&self) -> &Path {
        &self.skel
    }

    #[must_use]
    pub fn var_root(&self) -> &Path {
        &self.var
    }

    #[must_use]
    pub fn lock_dir(&self) -> &Path {
        &self.lock
    }

    /// Absolute mirror path of a relative path
    #[must_use]
    pub fn mirror_path(&self, rel: &str) -> PathBuf {
        self.mirror.join(rel.trim_start_matches('/'))
    }

    /// Absolute staging path of a relative path
    #[must_use]
    pub fn skel_path(&self, rel: &str) -> PathBuf {
        self.skel.join(rel.trim_start_matches('/'))
    }

    /// Create every directory and prove the mirror root accepts writes
    ///
    /// # Errors
    ///
    /// Returns `MirrorNotWritable` if a directory cannot be created or a
    /// scratch file cannot be written under it.
    pub async fn ensure_writable(&self) -> Result<(), Error> {
        for dir in [&self.mirror, &self.skel, &self.var, &self.lock] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| not_writable(dir, &e))?;
        }
        for dir in [&self.mirror, &self.skel, &self.var] {
            let dir = dir.clone();
            tokio::task::spawn_blocking(move || {
                tempfile::Builder::new()
                    .prefix(".aptsync-write-check")
                    .tempfile_in(&dir)
                    .map(drop)
                    .map_err(|e| not_writable(&dir, &e))
            })
            .await
            .map_err(|e| OpsError::WorkerFailed {
                message: e.to_string(),
            })??;
        }
        Ok(())
    }
}

fn not_writable(path: &Path, err: &std::io::Error) -> Error {
    OpsError::MirrorNotWritable {
        path: path.display().to_string(),
        message: err.to_string(),
    }
    .into()
}
