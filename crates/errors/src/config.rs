//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("line {line}: {message}")]
    InvalidLine { line: usize, message: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("unknown setting: {name}")]
    UnknownSetting { name: String },

    #[error("failed to write config to {path}: {error}")]
    WriteError { path: String, error: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Pass --conf <path> or run `aptsync init` to create a mirror list.")
            }
            Self::InvalidLine { .. } => Some(
                "Repository lines look like `deb [arch=amd64] http://host/debian bookworm main`.",
            ),
            Self::UnknownSetting { .. } => {
                Some("Remove the setting or check its spelling against the documented options.")
            }
            Self::InvalidValue { .. } | Self::Invalid { .. } | Self::ParseError { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
            Self::WriteError { .. } => Some("Ensure the config path is writable and retry."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::Invalid { .. } => "config.invalid",
            Self::ParseError { .. } => "config.parse_error",
            Self::InvalidLine { .. } => "config.invalid_line",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::UnknownSetting { .. } => "config.unknown_setting",
            Self::WriteError { .. } => "config.write_error",
        };
        Some(code)
    }
}
