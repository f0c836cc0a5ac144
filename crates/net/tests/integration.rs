//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use aptsync_errors::{Error, NetworkError};
    use aptsync_events::EventSender;
    use aptsync_hash::{Checksum, ChecksumAlgorithm, ChecksumSet};
    use aptsync_net::*;
    use filetime::FileTime;
    use httpmock::prelude::*;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    const NO_EVENTS: Option<EventSender> = None;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::from_config(NetConfig {
            retry: RetryConfig::immediate(2),
            ..NetConfig::default()
        })
        .unwrap()
    }

    fn sha256(content: &[u8]) -> ChecksumSet {
        std::iter::once(Checksum::from_data(ChecksumAlgorithm::Sha256, content)).collect()
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        filetime::set_file_mtime(path, FileTime::from_system_time(time)).unwrap();
    }

    fn epoch_plus(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn test_download_sets_mtime_and_verifies() {
        let server = MockServer::start();
        let content = vec![7u8; 1000];
        let modified = epoch_plus(1_600_000_000);
        let mock = server.mock(|when, then| {
            when.method(GET).path("/pool/main/a/a1.deb");
            then.status(200)
                .header("Last-Modified", http_date(modified))
                .body(&content);
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("pool/main/a/a1.deb");
        let request = FetchRequest::new(server.url("/pool/main/a/a1.deb"), &dest)
            .with_size(Some(1000))
            .with_checksums(sha256(&content));

        let outcome = fetcher().fetch(&request).await.unwrap();

        mock.assert();
        assert_eq!(outcome, FetchOutcome::Downloaded { bytes: 1000 });
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
        let mtime = std::fs::metadata(&dest).unwrap().modified().unwrap();
        assert_eq!(mtime, modified);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_not_modified_leaves_file_untouched() {
        let server = MockServer::start();
        let temp = tempdir().unwrap();
        let dest = temp.path().join("a1.deb");
        std::fs::write(&dest, vec![1u8; 1000]).unwrap();
        let modified = epoch_plus(1_600_000_000);
        set_mtime(&dest, modified);

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/a1.deb")
                .header("if-modified-since", http_date(modified));
            then.status(304);
        });

        let request = FetchRequest::new(server.url("/a1.deb"), &dest).with_size(Some(1000));
        let outcome = fetcher().fetch(&request).await.unwrap();

        mock.assert();
        assert_eq!(outcome, FetchOutcome::Unchanged);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![1u8; 1000]);
    }

    #[tokio::test]
    async fn test_unconditional_mode_skips_validator() {
        let server = MockServer::start();
        let temp = tempdir().unwrap();
        let dest = temp.path().join("a1.deb");
        std::fs::write(&dest, b"old").unwrap();

        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/a1.deb")
                .matches(|req: &HttpMockRequest| {
                    req.headers.as_ref().map_or(true, |headers| {
                        !headers
                            .iter()
                            .any(|(name, _)| name.eq_ignore_ascii_case("if-modified-since"))
                    })
                });
            then.status(200).body("fresh");
        });

        let request = FetchRequest::new(server.url("/a1.deb"), &dest).with_mode(FetchMode::Unconditional);
        let outcome = fetcher().fetch(&request).await.unwrap();

        mock.assert();
        assert_eq!(outcome, FetchOutcome::Downloaded { bytes: 5 });
        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_server_ignoring_validator_counts_as_unchanged() {
        let server = MockServer::start();
        let temp = tempdir().unwrap();
        let dest = temp.path().join("Release");
        std::fs::write(&dest, b"same body").unwrap();
        set_mtime(&dest, epoch_plus(1_700_000_000));

        server.mock(|when, then| {
            when.method(GET).path("/Release");
            then.status(200)
                .header("Last-Modified", http_date(epoch_plus(1_600_000_000)))
                .body("same body");
        });

        let request = FetchRequest::new(server.url("/Release"), &dest);
        let outcome = fetcher().fetch(&request).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_size_mismatch_keeps_no_partial() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/short.deb");
            then.status(200).body("only ten b");
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("short.deb");
        let request = FetchRequest::new(server.url("/short.deb"), &dest).with_size(Some(1000));
        let err = fetcher().fetch(&request).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Network(NetworkError::SizeMismatch {
                expected: 1000,
                actual: 10,
                ..
            })
        ));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/bad.deb");
            then.status(200).body("tampered");
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("bad.deb");
        let request = FetchRequest::new(server.url("/bad.deb"), &dest)
            .with_size(Some(8))
            .with_checksums(sha256(b"original"));
        let err = fetcher().fetch(&request).await.unwrap_err();

        assert!(err.is_integrity_failure());
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_every_declared_digest_must_match() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/mixed.deb");
            then.status(200).body("package body");
        });

        let temp = tempdir().unwrap();
        let dest = temp.path().join("mixed.deb");
        let declared: ChecksumSet = [
            Checksum::from_data(ChecksumAlgorithm::Md5, b"something else"),
            Checksum::from_data(ChecksumAlgorithm::Sha256, b"package body"),
        ]
        .into_iter()
        .collect();
        let request = FetchRequest::new(server.url("/mixed.deb"), &dest)
            .with_size(Some(12))
            .with_checksums(declared);
        let err = fetcher().fetch(&request).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Network(NetworkError::ChecksumMismatch { .. })
        ));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        });

        let temp = tempdir().unwrap();
        let request = FetchRequest::new(server.url("/missing"), temp.path().join("missing"));
        let err = fetcher().fetch(&request).await.unwrap_err();

        assert_eq!(mock.hits(), 1);
        assert!(matches!(
            err,
            Error::Network(NetworkError::HttpError { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503);
        });

        let temp = tempdir().unwrap();
        let request = FetchRequest::new(server.url("/flaky"), temp.path().join("flaky"));
        let (tx, mut rx) = aptsync_events::channel();
        let fetcher = fetcher().with_event_sender(tx);
        assert!(fetcher.fetch(&request).await.is_err());

        assert_eq!(mock.hits(), 3);
        let mut retries = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(
                event,
                aptsync_events::AppEvent::Download(aptsync_events::DownloadEvent::Retrying { .. })
            ) {
                retries += 1;
            }
        }
        assert_eq!(retries, 2);
    }

    #[tokio::test]
    async fn test_credentials_sent_without_challenge() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/private/a.deb")
                .header("authorization", "Basic dXNlcjpwdw==");
            then.status(200).body("secret");
        });

        let url = server
            .url("/private/a.deb")
            .replacen("http://", "http://user:pw@", 1);
        let temp = tempdir().unwrap();
        let fetcher = HttpFetcher::from_config(NetConfig {
            auth_no_challenge: true,
            retry: RetryConfig::immediate(0),
            ..NetConfig::default()
        })
        .unwrap();
        let request = FetchRequest::new(url, temp.path().join("a.deb"));
        let outcome = fetcher.fetch(&request).await.unwrap();

        mock.assert();
        assert_eq!(outcome.bytes(), 6);
    }

    #[tokio::test]
    async fn test_guarded_fetch_releases_marker() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/ok");
            then.status(200).body("ok");
        });
        server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        });

        let temp = tempdir().unwrap();
        let locks = LockTracker::new(temp.path().join("var/lock"));
        locks.scan_and_recover_stale(&NO_EVENTS).await.unwrap();
        let fetcher = fetcher();

        let ok = FetchRequest::new(server.url("/ok"), temp.path().join("ok"));
        fetch_guarded(&fetcher, &locks, &ok).await.unwrap();
        assert!(!locks.marker_path(&ok.dest).exists());

        let gone = FetchRequest::new(server.url("/gone"), temp.path().join("gone"));
        assert!(fetch_guarded(&fetcher, &locks, &gone).await.is_err());
        assert!(!locks.marker_path(&gone.dest).exists());
        assert_eq!(locks.live_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_marker_purges_destination() {
        let temp = tempdir().unwrap();
        let dest = temp.path().join("mirror/pool/a.deb");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"half").unwrap();
        std::fs::write(partial_path(&dest), b"half").unwrap();

        let lock_dir = temp.path().join("var/lock");
        {
            let crashed = LockTracker::new(&lock_dir);
            crashed.scan_and_recover_stale(&NO_EVENTS).await.unwrap();
            let token = crashed.acquire(&dest, "http://h/pool/a.deb").await.unwrap();
            // Simulated crash: the token is never released
            drop(token);
        }

        let (tx, mut rx) = aptsync_events::channel();
        let fresh = LockTracker::new(&lock_dir);
        let recovered = fresh.scan_and_recover_stale(&tx).await.unwrap();

        assert_eq!(recovered, vec![dest.clone()]);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
        assert_eq!(std::fs::read_dir(&lock_dir).unwrap().count(), 0);

        let mut saw_recovered = false;
        while let Ok(event) = rx.try_recv() {
            if let aptsync_events::AppEvent::Lock(aptsync_events::LockEvent::Recovered {
                url, ..
            }) = event
            {
                assert_eq!(url.as_deref(), Some("http://h/pool/a.deb"));
                saw_recovered = true;
            }
        }
        assert!(saw_recovered);
    }
}
