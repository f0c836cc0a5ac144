//! Download behaviour across first and repeated runs

use crate::common::{MockRepository, TestEnvironment};
use aptsync_types::SyncState;
use httpmock::prelude::*;

#[tokio::test]
async fn test_first_sync_fetches_every_package() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    let published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);

    let outcome = env.sync().await;
    let report = &outcome.report;

    assert_eq!(report.state, SyncState::Done);
    assert!(report.is_success());
    assert_eq!(report.bytes_downloaded, 1000);
    assert_eq!(report.files_downloaded, 1);
    assert_eq!(report.files_failed(), 0);
    published.debs["a1"].assert_hits(1);

    let local = std::fs::read(env.mirror_file(&repo.mirror_rel("a1"))).unwrap();
    assert_eq!(local, repo.package("a1").content);
    assert_eq!(
        std::fs::read_to_string(env.mirror_file(&repo.packages_rel())).unwrap(),
        repo.packages_text()
    );
    assert_eq!(env.markers(), 0);
}

#[tokio::test]
async fn test_compressed_index_is_expanded_and_published() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian")
        .with_package("a1", 300)
        .with_package("b2", 200)
        .with_gzip_index();
    let published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);

    let report = env.sync().await.report;

    assert!(report.is_success());
    assert_eq!(report.files_downloaded, 2);
    assert_eq!(report.bytes_downloaded, 500);
    published.index.assert_hits(1);
    assert!(env.mirror_file(&repo.packages_rel()).is_file());
    assert!(env
        .mirror_file(&format!("{}.gz", repo.packages_rel()))
        .is_file());
}

#[tokio::test]
async fn test_not_modified_package_moves_no_bytes() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    let mut published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    assert_eq!(env.sync().await.report.bytes_downloaded, 1000);

    published.debs.get_mut("a1").unwrap().delete();
    let not_modified = repo.serve_not_modified("a1");

    let report = env.sync().await.report;
    assert!(report.is_success());
    assert_eq!(report.bytes_downloaded, 0);
    assert_eq!(report.files_skipped, 1);
    not_modified.assert_hits(1);
}

#[tokio::test]
async fn test_force_update_refetches_present_files() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    let published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    env.sync().await;

    let report = env.sync_with(|s| s.force_update = true).await.report;

    assert!(report.is_success());
    assert_eq!(report.bytes_downloaded, 1000);
    assert_eq!(report.files_downloaded, 1);
    published.debs["a1"].assert_hits(2);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian")
        .with_package("a1", 1000)
        .with_package("c3", 64);
    repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    env.sync().await;
    let before = std::fs::read(env.mirror_file(&repo.mirror_rel("a1"))).unwrap();

    let report = env.sync().await.report;

    assert!(report.is_success());
    assert_eq!(report.bytes_downloaded, 0);
    assert_eq!(report.files_skipped, 2);
    assert_eq!(report.files_cleaned, 0);
    assert_eq!(
        std::fs::read(env.mirror_file(&repo.mirror_rel("a1"))).unwrap(),
        before
    );
}

#[tokio::test]
async fn test_shared_package_is_fetched_once() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    let published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry(), repo.entry()]);

    let report = env.sync().await.report;

    assert!(report.is_success());
    assert_eq!(report.files_planned, 1);
    assert_eq!(report.files_downloaded, 1);
    assert!(report.integrity_conflicts.is_empty());
    published.debs["a1"].assert_hits(1);
}

#[tokio::test]
async fn test_truncated_package_fails_only_itself() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian")
        .with_package("a1", 100)
        .with_truncated_package("b2", 100);
    repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);

    let report = env.sync().await.report;

    assert_eq!(report.state, SyncState::Done);
    assert!(!report.is_success());
    assert_eq!(report.files_downloaded, 1);
    assert_eq!(report.files_failed(), 1);
    assert_eq!(report.failures[0].rel_path, repo.mirror_rel("b2"));
    assert!(!env.mirror_file(&repo.mirror_rel("b2")).exists());
    assert_eq!(env.markers(), 0);
}

#[tokio::test]
async fn test_unreachable_entry_does_not_block_others() {
    let server = MockServer::start();
    let good = MockRepository::new(&server, "/debian").with_package("a1", 10);
    good.publish();
    let missing = MockRepository::new(&server, "/gone");
    let env = TestEnvironment::new(vec![good.entry(), missing.entry()]);
    let stale = env.plant(
        &format!("{}/pool/main/s/stale.deb", missing.entry().local_root()),
        b"old",
    );

    let report = env.sync().await.report;

    assert_eq!(report.state, SyncState::Done);
    assert!(!report.is_success());
    assert_eq!(report.unresolved.len(), 1);
    assert_eq!(report.files_downloaded, 1);
    assert!(stale.exists());
}

#[tokio::test]
async fn test_dry_run_reports_without_downloading() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian")
        .with_package("a1", 1000)
        .with_package("b2", 24);
    let published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);

    let report = env.sync_with(|s| s.test = true).await.report;

    assert!(report.dry_run);
    assert!(report.is_success());
    assert_eq!(report.files_planned, 2);
    assert_eq!(report.bytes_planned, 1024);
    assert_eq!(report.bytes_downloaded, 0);
    published.debs["a1"].assert_hits(0);
    assert!(!env.mirror_file(&repo.packages_rel()).exists());
}
