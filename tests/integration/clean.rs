//! Removal of files no index references any more

use crate::common::{MockRepository, TestEnvironment};
use aptsync_events::{AppEvent, CleanEvent};
use httpmock::prelude::*;

#[tokio::test]
async fn test_obsolete_package_is_removed() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    let old = env.plant(
        &format!("{}/pool/main/b/old.deb", repo.entry().local_root()),
        &[0u8; 10],
    );

    let report = env.sync().await.report;

    assert!(report.is_success());
    assert!(!old.exists());
    assert_eq!(report.files_cleaned, 1);
    assert_eq!(report.bytes_reclaimed, 10);
    assert_eq!(report.cleaned_paths, vec![old.clone()]);
    // Emptied directories go with it
    assert!(!old.parent().unwrap().exists());
    assert!(env.mirror_file(&repo.mirror_rel("a1")).is_file());
}

#[tokio::test]
async fn test_dry_run_clean_matches_real_clean() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    let root = repo.entry().local_root();
    let old = env.plant(&format!("{root}/pool/main/b/old.deb"), &[1u8; 40]);
    let orphan = env.plant(&format!("{root}/dists/oldstable/Release"), &[2u8; 7]);

    let dry = env.sync_with(|s| s.test = true).await.report;
    assert!(old.exists());
    assert!(orphan.exists());
    assert_eq!(dry.files_cleaned, 0);

    let real = env.sync().await.report;
    assert!(!old.exists());
    assert!(!orphan.exists());
    assert_eq!(dry.files_would_clean, real.files_cleaned);
    assert_eq!(dry.bytes_would_reclaim, real.bytes_reclaimed);
    assert_eq!(real.files_cleaned, 2);
    assert_eq!(real.bytes_reclaimed, 47);
}

#[tokio::test]
async fn test_clean_only_works_from_staged_indexes() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    let published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    env.sync().await;
    published.release.assert_hits(1);

    let old = env.plant(
        &format!("{}/pool/main/b/old.deb", repo.entry().local_root()),
        b"stale",
    );
    let report = env.clean().await.report;

    assert!(report.is_success());
    assert_eq!(report.files_cleaned, 1);
    assert_eq!(report.files_downloaded, 0);
    assert!(!old.exists());
    assert!(env.mirror_file(&repo.mirror_rel("a1")).is_file());
    published.release.assert_hits(1);
    published.debs["a1"].assert_hits(1);
}

#[tokio::test]
async fn test_clean_can_be_disabled_per_repository() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 10);
    repo.publish();
    let mut entry = repo.entry();
    entry.clean = false;
    let env = TestEnvironment::new(vec![entry]);
    let old = env.plant(
        &format!("{}/pool/main/b/old.deb", repo.entry().local_root()),
        b"keep me",
    );

    let outcome = env.sync().await;

    assert!(outcome.report.is_success());
    assert!(old.exists());
    assert_eq!(outcome.report.files_cleaned, 0);
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::Clean(CleanEvent::Skipped { .. }))));
}

#[tokio::test]
async fn test_disable_clean_setting_skips_the_phase() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 10);
    repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    let old = env.plant(
        &format!("{}/pool/main/b/old.deb", repo.entry().local_root()),
        b"keep me",
    );

    let report = env.sync_with(|s| s.disable_clean = true).await.report;

    assert!(report.is_success());
    assert!(old.exists());
    assert_eq!(report.files_cleaned, 0);
}

#[tokio::test]
async fn test_index_server_error_keeps_pool() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian").with_package("a1", 1000);
    let mut published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    assert!(env.sync().await.report.is_success());

    published.index.delete();
    let failing = server.mock(|when, then| {
        when.method(GET)
            .path(format!("{}/dists/stable/main/binary-amd64/Packages", repo.path));
        then.status(500);
    });
    let old = env.plant(
        &format!("{}/pool/main/b/old.deb", repo.entry().local_root()),
        b"stale",
    );

    let report = env.sync().await.report;

    failing.assert_hits(1);
    assert!(!report.is_success());
    assert!(report.unresolved.is_empty());
    assert_eq!(report.failures.len(), 1);
    // The staged index still lists a1, so only the unlisted file goes
    assert!(env.mirror_file(&repo.mirror_rel("a1")).is_file());
    assert!(env.mirror_file(&repo.packages_rel()).is_file());
    assert!(!old.exists());
    assert_eq!(report.files_cleaned, 1);
}

#[tokio::test]
async fn test_corrupt_compressed_index_keeps_pool() {
    let server = MockServer::start();
    let repo = MockRepository::new(&server, "/debian")
        .with_package("a1", 1000)
        .with_gzip_index();
    let mut published = repo.publish();
    let env = TestEnvironment::new(vec![repo.entry()]);
    assert!(env.sync().await.report.is_success());

    published.release.delete();
    published.index.delete();
    let (_release, corrupt) = repo.serve_corrupt_gzip_index();
    let old = env.plant(
        &format!("{}/pool/main/b/old.deb", repo.entry().local_root()),
        b"stale",
    );

    let outcome = env.sync().await;

    corrupt.assert_hits(1);
    assert_eq!(outcome.report.unresolved.len(), 1);
    assert_eq!(outcome.report.files_cleaned, 0);
    assert!(env.mirror_file(&repo.mirror_rel("a1")).is_file());
    assert!(env.mirror_file(&repo.packages_rel()).is_file());
    assert!(old.exists());
    assert!(outcome
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::Clean(CleanEvent::Skipped { .. }))));
}
