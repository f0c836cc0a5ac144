use serde::{Deserialize, Serialize};

use aptsync_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod clean;
pub mod download;
pub mod engine;
pub mod general;
pub mod lock;
pub mod repo;

pub use clean::*;
pub use download::*;
pub use engine::*;
pub use general::*;
pub use lock::*;
pub use repo::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Free-form warnings, errors and debug notes
    General(GeneralEvent),

    /// Orchestrator state transitions and summaries
    Engine(EngineEvent),

    /// Repository resolution and index parsing
    Repo(RepoEvent),

    /// File transfers
    Download(DownloadEvent),

    /// Crash-witness markers
    Lock(LockEvent),

    /// Obsolete-file removal
    Clean(CleanEvent),
}

impl AppEvent {
    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Download(DownloadEvent::Failed { .. })
            | Self::Repo(RepoEvent::Unreachable { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Repo(RepoEvent::StanzaSkipped { .. } | RepoEvent::ReleaseLineSkipped { .. })
            | Self::Download(DownloadEvent::Retrying { .. } | DownloadEvent::Abandoned { .. })
            | Self::Lock(LockEvent::Recovered { .. })
            | Self::Engine(EngineEvent::StopRequested) => Level::WARN,

            Self::General(GeneralEvent::Debug { .. })
            | Self::Download(
                DownloadEvent::Started { .. }
                | DownloadEvent::Completed { .. }
                | DownloadEvent::Unchanged { .. },
            )
            | Self::Repo(RepoEvent::Decompressed { .. })
            | Self::Clean(CleanEvent::DirectoryRemoved { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "aptsync::events::general",
            Self::Engine(_) => "aptsync::events::engine",
            Self::Repo(_) => "aptsync::events::repo",
            Self::Download(_) => "aptsync::events::download",
            Self::Lock(_) => "aptsync::events::lock",
            Self::Clean(_) => "aptsync::events::clean",
        }
    }
}
