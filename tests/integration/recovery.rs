//! Restart after a run died mid-transfer

use crate::common::{MockRepository, TestEnvironment};
use aptsync_events::{AppEvent, EventSender, LockEvent};
use aptsync_net::{partial_path, LockTracker};
use httpmock::prelude::*;

const NO_EVENTS: Option<EventSender> = None;

/// Leave a marker for `rel` exactly as a killed run would
async fn abandon_transfer(env: &TestEnvironment, rel: &str, url: &str) {
    let layout = env.layout();
    let locks = LockTracker::new(layout.lock_dir());
    locks.scan_and_recover_stale(&NO_EVENTS).await.unwrap();
    let token = locks.acquire(&layout.mirror_path(rel), url).await.unwrap();
    drop(token);
}

#[tokio::test]
async fn test_interrupted_download_is_refetched_in_full() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    let published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    env.sync().await;

    // Full-size file on disk, but its transfer never finished
    let rel = repo.mirror_rel("a1");
    abandon_transfer(&env, &rel, &server.url(repo.package_path("a1"))).await;
    assert_eq!(env.markers(), 1);

    let outcome = env.sync().await;
    let report = &outcome.report;

    assert!(report.is_success());
    assert_eq!(report.recovered_paths, vec![env.mirror_file(&rel)]);
    assert_eq!(report.bytes_downloaded, 1000);
    assert_eq!(report.files_downloaded, 1);
    published.debs["a1"].assert_hits(2);
    assert_eq!(env.markers(), 0);
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::Lock(LockEvent::Recovered { .. }))));
}

#[tokio::test]
async fn test_recovery_purges_partial_files() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 100);
    repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);

    let rel = repo.mirror_rel("a1");
    let partial = partial_path(&env.mirror_file(&rel));
    std::fs::create_dir_all(partial.parent().unwrap()).unwrap();
    std::fs::write(&partial, b"half").unwrap();
    abandon_transfer(&env, &rel, &server.url(repo.package_path("a1"))).await;

    let report = env.sync().await.report;

    assert!(report.is_success());
    assert!(!partial.exists());
    assert_eq!(
        std::fs::read(env.mirror_file(&rel)).unwrap(),
        repo.package("a1").content
    );
}

#[tokio::test]
async fn test_clean_run_leaves_no_markers() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian")
        .with_package("a1", 10)
        .with_package("b2", 20)
        .with_truncated_package("c3", 30);
    repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);

    let report = env.sync().await.report;

    assert_eq!(report.files_downloaded, 2);
    assert_eq!(report.files_failed(), 1);
    assert!(report.recovered_paths.is_empty());
    assert_eq!(env.markers(), 0);
}
