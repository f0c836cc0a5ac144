//! Integration tests for error types

#[cfg(test)]
mod tests {
    use aptsync_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://deb.example.test".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::DiskFull {
            path: "/srv/mirror".into(),
        };
        assert_eq!(err.to_string(), "no space left for /srv/mirror");
    }

    #[test]
    fn test_error_clone() {
        let err = IndexError::UnreachableRepository {
            uri: "http://deb.example.test/debian".into(),
            message: "404".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err = StorageError::from_io_with_path(&io_err, std::path::Path::new("/x"));
        assert!(matches!(storage_err, StorageError::PermissionDenied { .. }));

        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::NotFound,
                ..
            }
        ));
    }

    #[test]
    fn test_integrity_failures() {
        let err: Error = NetworkError::SizeMismatch {
            url: "http://h/a.deb".into(),
            expected: 10,
            actual: 9,
        }
        .into();
        assert!(err.is_integrity_failure());
        assert_eq!(err.user_code(), Some("network.size_mismatch"));

        let err: Error = NetworkError::Timeout { url: "u".into() }.into();
        assert!(!err.is_integrity_failure());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_user_facing_codes() {
        let err: Error = OpsError::NoRepositories.into();
        assert_eq!(err.user_code(), Some("ops.no_repositories"));
        assert!(err.user_hint().is_some());

        let err: Error = ConfigError::InvalidLine {
            line: 3,
            message: "missing URI".into(),
        }
        .into();
        assert_eq!(err.to_string(), "config error: line 3: missing URI");
        assert_eq!(err.user_code(), Some("config.invalid_line"));

        let err = NetworkError::HttpError {
            status: 503,
            message: "busy".into(),
        };
        assert!(err.is_retryable());
        let err = NetworkError::HttpError {
            status: 404,
            message: "missing".into(),
        };
        assert!(!err.is_retryable());
    }
}
