//! Test environment wiring a mirror root to a real engine run

use aptsync_config::{MirrorConfig, Settings};
use aptsync_events::AppEvent;
use aptsync_net::MARKER_EXTENSION;
use aptsync_ops::OpsContextBuilder;
use aptsync_store::MirrorLayout;
use aptsync_types::{RepositoryEntry, SyncReport};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary mirror root plus the configuration every run starts from
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config: MirrorConfig,
}

/// What one run produced
pub struct RunOutcome {
    pub report: SyncReport,
    pub events: Vec<AppEvent>,
}

impl TestEnvironment {
    pub fn new(repositories: Vec<RepositoryEntry>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings {
            root_path: temp_dir.path().join("mirror-root"),
            architecture: "amd64".to_string(),
            threads: 2,
            decompress_threads: 2,
            retries: 0,
            timeout_secs: 5,
            ..Settings::default()
        };
        Self {
            temp_dir,
            config: MirrorConfig {
                settings,
                repositories,
            },
        }
    }

    pub fn layout(&self) -> MirrorLayout {
        MirrorLayout::from_settings(&self.config.settings)
    }

    pub fn mirror_file(&self, rel: &str) -> PathBuf {
        self.layout().mirror_path(rel)
    }

    /// Put a file into the mirror tree as if an earlier run had left it
    pub fn plant(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.mirror_file(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    pub async fn sync(&self) -> RunOutcome {
        self.sync_with(|_| {}).await
    }

    /// Sync with adjusted settings for this run only
    pub async fn sync_with(&self, adjust: impl FnOnce(&mut Settings)) -> RunOutcome {
        let mut config = self.config.clone();
        adjust(&mut config.settings);
        self.run(config, false).await
    }

    pub async fn clean(&self) -> RunOutcome {
        self.run(self.config.clone(), true).await
    }

    async fn run(&self, config: MirrorConfig, clean_only: bool) -> RunOutcome {
        let (tx, mut rx) = aptsync_events::channel();
        let ctx = OpsContextBuilder::new()
            .with_config(config)
            .with_event_sender(tx)
            .build()
            .unwrap();

        let report = if clean_only {
            aptsync_ops::clean(&ctx).await.unwrap()
        } else {
            aptsync_ops::sync(&ctx).await.unwrap()
        };

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        RunOutcome { report, events }
    }

    /// Marker files currently in the lock directory
    pub fn markers(&self) -> usize {
        count_markers(self.layout().lock_dir())
    }
}

fn count_markers(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| {
                    e.path().extension().and_then(|x| x.to_str()) == Some(MARKER_EXTENSION)
                })
                .count()
        })
        .unwrap_or(0)
}
