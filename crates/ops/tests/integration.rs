//! Integration tests for ops crate

#[cfg(test)]
mod tests {
    use aptsync_config::{MirrorConfig, Settings};
    use aptsync_errors::{Error, NetworkError, OpsError};
    use aptsync_events::EventSender;
    use aptsync_hash::{Checksum, ChecksumAlgorithm, ChecksumSet};
    use aptsync_net::{FetchMode, FetchOutcome, FetchRequest, Fetcher, LockTracker};
    use aptsync_ops::*;
    use aptsync_resources::{ResourceLimits, ResourceManager};
    use aptsync_store::MirrorLayout;
    use aptsync_types::{
        Artifact, DownloadDecision, DownloadTask, EntryId, FetchReason, RepositoryEntry,
        SourceKind, SyncState,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;
    use tokio::sync::Notify;

    const NO_EVENTS: Option<EventSender> = None;
    const BASE: &str = "http://mirror.test/ubuntu";

    /// Serves files from memory and records every request
    #[derive(Default)]
    struct MapFetcher {
        files: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<(String, FetchMode)>>,
    }

    impl MapFetcher {
        fn with(mut self, url: &str, content: &[u8]) -> Self {
            self.files.insert(url.to_string(), content.to_vec());
            self
        }

        fn count(&self, url: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == url)
                .count()
        }

        fn modes(&self, url: &str) -> Vec<FetchMode> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| u == url)
                .map(|(_, m)| *m)
                .collect()
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, Error> {
            self.requests
                .lock()
                .unwrap()
                .push((request.url.clone(), request.mode));
            let Some(content) = self.files.get(&request.url) else {
                return Err(NetworkError::HttpError {
                    status: 404,
                    message: "Not Found".into(),
                }
                .into());
            };
            if request.is_conditional() {
                if let Ok(meta) = std::fs::metadata(&request.dest) {
                    if meta.len() == content.len() as u64 {
                        return Ok(FetchOutcome::Unchanged);
                    }
                }
            }
            if let Some(expected) = request.expected_size {
                if expected != content.len() as u64 {
                    return Err(NetworkError::SizeMismatch {
                        url: request.url.clone(),
                        expected,
                        actual: content.len() as u64,
                    }
                    .into());
                }
            }
            std::fs::create_dir_all(request.dest.parent().unwrap()).unwrap();
            std::fs::write(&request.dest, content).unwrap();
            Ok(FetchOutcome::Downloaded {
                bytes: content.len() as u64,
            })
        }
    }

    /// Signals once a transfer started, then never finishes
    struct StuckFetcher {
        started: Arc<Notify>,
    }

    #[async_trait]
    impl Fetcher for StuckFetcher {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchOutcome, Error> {
            self.started.notify_one();
            std::future::pending().await
        }
    }

    fn sha256(content: &[u8]) -> ChecksumSet {
        std::iter::once(Checksum::from_data(ChecksumAlgorithm::Sha256, content)).collect()
    }

    fn task(rel: &str, content: &[u8], decision: DownloadDecision) -> DownloadTask {
        DownloadTask {
            artifact: Artifact {
                rel_path: rel.to_string(),
                url: format!("http://mirror.test/{rel}"),
                size: content.len() as u64,
                checksums: sha256(content),
                owner: EntryId(0),
            },
            decision,
        }
    }

    fn markers(dir: &Path) -> usize {
        std::fs::read_dir(dir).map_or(0, Iterator::count)
    }

    async fn executor(
        root: &Path,
        fetcher: Arc<dyn Fetcher>,
        limits: ResourceLimits,
    ) -> (DownloadExecutor, MirrorLayout, Arc<ResourceManager>) {
        let layout = MirrorLayout::under(root);
        let locks = LockTracker::new(layout.lock_dir());
        locks.scan_and_recover_stale(&NO_EVENTS).await.unwrap();
        let resources = Arc::new(ResourceManager::new(limits));
        let executor =
            DownloadExecutor::new(fetcher, locks, Arc::clone(&resources), layout.clone());
        (executor, layout, resources)
    }

    #[tokio::test]
    async fn test_executor_downloads_and_releases_markers() {
        let fetcher = Arc::new(
            MapFetcher::default()
                .with("http://mirror.test/host/pool/a.deb", b"aaaa")
                .with("http://mirror.test/host/pool/b.deb", b"bb")
                .with("http://mirror.test/host/pool/c.deb", b"c"),
        );
        let temp = tempdir().unwrap();
        let (executor, layout, _) =
            executor(temp.path(), fetcher.clone(), ResourceLimits::for_testing()).await;

        let summary = executor
            .run(vec![
                task("host/pool/a.deb", b"aaaa", DownloadDecision::Fetch(FetchReason::Absent)),
                task("host/pool/b.deb", b"bb", DownloadDecision::Fetch(FetchReason::Absent)),
                task("host/pool/c.deb", b"c", DownloadDecision::Fetch(FetchReason::Absent)),
            ])
            .await;

        assert_eq!(summary.downloaded, 3);
        assert_eq!(summary.bytes, 7);
        assert!(summary.failures.is_empty());
        assert_eq!(
            std::fs::read(layout.mirror_path("host/pool/a.deb")).unwrap(),
            b"aaaa"
        );
        assert_eq!(markers(layout.lock_dir()), 0);
        assert_eq!(
            fetcher.modes("http://mirror.test/host/pool/a.deb"),
            vec![FetchMode::Unconditional]
        );
    }

    #[tokio::test]
    async fn test_executor_skip_is_conditional_and_failures_are_isolated() {
        let fetcher = Arc::new(
            MapFetcher::default()
                .with("http://mirror.test/host/pool/a.deb", b"aaaa")
                .with("http://mirror.test/host/pool/short.deb", b"xy"),
        );
        let temp = tempdir().unwrap();
        let (executor, layout, _) =
            executor(temp.path(), fetcher.clone(), ResourceLimits::for_testing()).await;

        let existing = layout.mirror_path("host/pool/a.deb");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"aaaa").unwrap();

        // Upstream serves two bytes where three were declared
        let short = task(
            "host/pool/short.deb",
            b"xyz",
            DownloadDecision::Fetch(FetchReason::Absent),
        );

        let summary = executor
            .run(vec![
                task("host/pool/a.deb", b"aaaa", DownloadDecision::Skip),
                short,
                task("host/pool/gone.deb", b"g", DownloadDecision::Fetch(FetchReason::Absent)),
            ])
            .await;

        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(
            fetcher.modes("http://mirror.test/host/pool/a.deb"),
            vec![FetchMode::Conditional]
        );
        assert_eq!(markers(layout.lock_dir()), 0);
    }

    #[tokio::test]
    async fn test_stop_signal_abandons_in_flight_and_keeps_marker() {
        let started = Arc::new(Notify::new());
        let fetcher = Arc::new(StuckFetcher {
            started: Arc::clone(&started),
        });
        let temp = tempdir().unwrap();
        let (executor, layout, resources) =
            executor(temp.path(), fetcher, ResourceLimits::new(1, 1)).await;

        let tasks = vec![
            task("host/pool/a.deb", b"a", DownloadDecision::Fetch(FetchReason::Absent)),
            task("host/pool/b.deb", b"b", DownloadDecision::Fetch(FetchReason::Absent)),
            task("host/pool/c.deb", b"c", DownloadDecision::Fetch(FetchReason::Absent)),
        ];
        let run = tokio::spawn(async move { executor.run(tasks).await });

        started.notified().await;
        resources.cancel();
        let summary = run.await.unwrap();

        assert_eq!(summary.cancelled, 3);
        assert_eq!(summary.downloaded, 0);
        assert_eq!(markers(layout.lock_dir()), 1);
    }

    fn packages_text() -> String {
        let digest = Checksum::from_data(ChecksumAlgorithm::Sha256, b"a1a1")
            .to_hex()
            .to_string();
        format!("Package: a1\nFilename: pool/main/a/a1.deb\nSize: 4\nSHA256: {digest}\n")
    }

    fn release_text(packages: &str) -> String {
        let digest = Checksum::from_data(ChecksumAlgorithm::Sha256, packages.as_bytes())
            .to_hex()
            .to_string();
        format!(
            "Suite: focal\nSHA256:\n {digest} {} main/binary-amd64/Packages\n",
            packages.len()
        )
    }

    fn repository() -> MapFetcher {
        let packages = packages_text();
        MapFetcher::default()
            .with(
                &format!("{BASE}/dists/focal/Release"),
                release_text(&packages).as_bytes(),
            )
            .with(
                &format!("{BASE}/dists/focal/main/binary-amd64/Packages"),
                packages.as_bytes(),
            )
            .with(&format!("{BASE}/pool/main/a/a1.deb"), b"a1a1")
    }

    fn context(root: &Path, settings: Settings, fetcher: Arc<dyn Fetcher>) -> OpsCtx {
        let (tx, _rx) = aptsync_events::channel();
        let entry = RepositoryEntry::new(SourceKind::Binary, BASE, "focal", vec!["main".into()])
            .with_architectures(vec!["amd64".into()]);
        OpsContextBuilder::new()
            .with_config(MirrorConfig {
                settings,
                repositories: vec![entry],
            })
            .with_layout(MirrorLayout::under(root))
            .with_fetcher(fetcher)
            .with_resources(Arc::new(ResourceManager::new(ResourceLimits::for_testing())))
            .with_event_sender(tx)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_sync_then_publish_indexes() {
        let temp = tempdir().unwrap();
        let fetcher = Arc::new(repository());
        let ctx = context(temp.path(), Settings::default(), fetcher.clone());

        let report = sync(&ctx).await.unwrap();

        assert_eq!(report.state, SyncState::Done);
        assert!(report.is_success());
        assert_eq!(report.files_downloaded, 1);
        assert_eq!(report.bytes_downloaded, 4);
        assert_eq!(report.files_planned, 1);
        assert_eq!(report.index_files_downloaded, 2);

        let root = "mirror.test/ubuntu";
        let deb = ctx.layout.mirror_path(&format!("{root}/pool/main/a/a1.deb"));
        assert_eq!(std::fs::read(deb).unwrap(), b"a1a1");
        let published = ctx
            .layout
            .mirror_path(&format!("{root}/dists/focal/main/binary-amd64/Packages"));
        assert_eq!(std::fs::read_to_string(published).unwrap(), packages_text());
    }

    #[tokio::test]
    async fn test_test_mode_fetches_no_artifacts() {
        let temp = tempdir().unwrap();
        let fetcher = Arc::new(repository());
        let settings = Settings {
            test: true,
            ..Settings::default()
        };
        let ctx = context(temp.path(), settings, fetcher.clone());

        let report = sync(&ctx).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(report.state, SyncState::Done);
        assert_eq!(report.bytes_planned, 4);
        assert_eq!(report.bytes_downloaded, 0);
        assert_eq!(fetcher.count(&format!("{BASE}/pool/main/a/a1.deb")), 0);
        let published = ctx
            .layout
            .mirror_path("mirror.test/ubuntu/dists/focal/Release");
        assert!(!published.exists());
    }

    #[tokio::test]
    async fn test_unreachable_repository_fails_the_run() {
        let temp = tempdir().unwrap();
        let ctx = context(temp.path(), Settings::default(), Arc::new(MapFetcher::default()));

        let report = sync(&ctx).await.unwrap();

        assert_eq!(report.state, SyncState::Failed);
        assert_eq!(report.unresolved.len(), 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_no_repositories_is_fatal() {
        let temp = tempdir().unwrap();
        let (tx, _rx) = aptsync_events::channel();
        let ctx = OpsContextBuilder::new()
            .with_config(MirrorConfig::default())
            .with_layout(MirrorLayout::under(temp.path()))
            .with_fetcher(Arc::new(MapFetcher::default()))
            .with_event_sender(tx)
            .build()
            .unwrap();

        let err = sync(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::Ops(OpsError::NoRepositories)));
    }

    #[test]
    fn test_builder_requires_config() {
        let err = OpsContextBuilder::new().build().err().unwrap();
        assert!(matches!(
            err,
            Error::Ops(OpsError::MissingComponent { .. })
        ));
    }
}
