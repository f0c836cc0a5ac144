//! Repository index error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum IndexError {
    #[error("repository unreachable: {uri}: {message}")]
    UnreachableRepository { uri: String, message: String },

    #[error("malformed release file {path}: {message}")]
    MalformedRelease { path: String, message: String },

    #[error("corrupt archive {path}: {message}")]
    CorruptArchive { path: String, message: String },

    #[error("unsupported compression for {path}")]
    UnsupportedCompression { path: String },

    #[error("no parseable variant of {name} in {path}")]
    NoParseableIndex { name: String, path: String },
}

impl UserFacingError for IndexError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnreachableRepository { .. } => Some(
                "Check the repository URI, distribution name and network access to the mirror.",
            ),
            Self::CorruptArchive { .. } => {
                Some("The compressed index is damaged; the next run downloads it again.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UnreachableRepository { .. } | Self::CorruptArchive { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnreachableRepository { .. } => "index.unreachable_repository",
            Self::MalformedRelease { .. } => "index.malformed_release",
            Self::CorruptArchive { .. } => "index.corrupt_archive",
            Self::UnsupportedCompression { .. } => "index.unsupported_compression",
            Self::NoParseableIndex { .. } => "index.no_parseable_index",
        };
        Some(code)
    }
}
