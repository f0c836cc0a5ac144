//! Mirror directory setup and first-run initialization

use crate::error::CliError;
use aptsync_config::MirrorConfig;
use aptsync_store::MirrorLayout;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prepares the directory layout before the engine runs
pub struct SystemSetup {
    layout: MirrorLayout,
}

impl SystemSetup {
    pub fn new(config: &MirrorConfig) -> Self {
        Self {
            layout: MirrorLayout::from_settings(&config.settings),
        }
    }

    /// Create `mirror/`, `skel/` and `var/` and check they are writable
    pub async fn initialize(&self) -> Result<(), CliError> {
        info!("Preparing mirror directories");
        self.layout
            .ensure_writable()
            .await
            .map_err(|e| CliError::Setup(format!("{}: {e}", self.layout.mirror_root().display())))?;
        debug!(
            mirror = %self.layout.mirror_root().display(),
            skel = %self.layout.skel_root().display(),
            var = %self.layout.var_root().display(),
            "mirror directories ready"
        );
        Ok(())
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    /// Write the commented default mirror list; returns where it went
    pub async fn write_default_config(path: Option<&Path>) -> Result<PathBuf, CliError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => MirrorConfig::default_path()?,
        };
        MirrorConfig::write_default(&path).await?;
        info!(path = %path.display(), "wrote default mirror list");
        Ok(path)
    }
}
