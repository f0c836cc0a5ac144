//! Storage and filesystem-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("no space left for {path}")]
    DiskFull { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("file does not match its digest: {message}")]
    CorruptedData { message: String },

    #[error("invalid path: {path}")]
    InvalidPath { path: String },

    #[error("destination already locked: {path}")]
    AlreadyLocked { path: String },

    #[error("lock acquisition failed: {path}")]
    LockFailed { path: String },

    #[error("stale lock recovery has not run yet")]
    RecoveryPending,

    #[error("could not move file into place: {message}")]
    AtomicRenameFailed { message: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
        }
    }
}

impl StorageError {
    /// Classify an `io::Error` raised while touching `path`
    #[must_use]
    pub fn from_io_with_path(err: &std::io::Error, path: &std::path::Path) -> Self {
        use std::io::ErrorKind;

        let shown = path.display().to_string();
        match err.kind() {
            ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied { path: shown }
            }
            ErrorKind::NotFound => Self::PathNotFound { path: shown },
            ErrorKind::AlreadyExists => Self::AlreadyExists { path: shown },
            ErrorKind::StorageFull | ErrorKind::QuotaExceeded => Self::DiskFull { path: shown },
            _ => Self::IoError {
                message: format!("{shown}: {err}"),
            },
        }
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DiskFull { .. } => Some("Free up disk space under the mirror root and retry."),
            Self::PermissionDenied { .. } => {
                Some("Adjust filesystem permissions on the mirror root and retry.")
            }
            Self::AlreadyLocked { .. } | Self::LockFailed { .. } => {
                Some("Make sure no other aptsync run uses the same var directory.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::LockFailed { .. } | Self::IoError { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::DiskFull { .. } => "storage.disk_full",
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::PathNotFound { .. } => "storage.path_not_found",
            Self::AlreadyExists { .. } => "storage.already_exists",
            Self::IoError { .. } => "storage.io_error",
            Self::CorruptedData { .. } => "storage.corrupted_data",
            Self::InvalidPath { .. } => "storage.invalid_path",
            Self::AlreadyLocked { .. } => "storage.already_locked",
            Self::LockFailed { .. } => "storage.lock_failed",
            Self::RecoveryPending => "storage.recovery_pending",
            Self::AtomicRenameFailed { .. } => "storage.atomic_rename_failed",
        };
        Some(code)
    }
}
