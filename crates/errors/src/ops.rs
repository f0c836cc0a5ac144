//! Operation orchestration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum OpsError {
    #[error("no repository entries configured")]
    NoRepositories,

    #[error("no repository entry could be resolved")]
    NothingResolved,

    #[error("mirror root is not writable: {path}: {message}")]
    MirrorNotWritable { path: String, message: String },

    #[error("destination {path} is referenced with conflicting metadata: {message}")]
    IntegrityConflict { path: String, message: String },

    #[error("missing component: {component}")]
    MissingComponent { component: String },

    #[error("worker task failed: {message}")]
    WorkerFailed { message: String },
}

impl UserFacingError for OpsError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NoRepositories => Some("Add at least one `deb` or `deb-src` line to the config."),
            Self::NothingResolved => {
                Some("Every repository failed to resolve; check network access and URIs.")
            }
            Self::MirrorNotWritable { .. } => {
                Some("Set rootPath to a writable directory or fix its permissions.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::NothingResolved)
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NoRepositories => "ops.no_repositories",
            Self::NothingResolved => "ops.nothing_resolved",
            Self::MirrorNotWritable { .. } => "ops.mirror_not_writable",
            Self::IntegrityConflict { .. } => "ops.integrity_conflict",
            Self::MissingComponent { .. } => "ops.missing_component",
            Self::WorkerFailed { .. } => "ops.worker_failed",
        };
        Some(code)
    }
}
