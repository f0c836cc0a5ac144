#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for aptsync
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - The mirror list (`aptsync.conf`) or its TOML equivalent
//! - Environment variables
//! - CLI flags (applied by the binary)

pub mod constants;
pub mod mirror_list;
pub mod settings;

pub use mirror_list::{parse_directive, parse_mirror_list, Directive, DEFAULT_MIRROR_LIST};
pub use settings::{LogLevel, Settings};

use aptsync_errors::{ConfigError, Error};
use aptsync_types::{RepositoryEntry, SourceKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use constants::{CONFIG_FILE, DEFAULT_ROOT_DIR, ENV_PREFIX};

/// Settings plus the ordered repository entries of one mirror
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

impl MirrorConfig {
    /// Get the default mirror list path (`~/aptsync/aptsync.conf`)
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let home = dirs::home_dir().ok_or_else(|| ConfigError::NotFound {
            path: "home directory".to_string(),
        })?;
        Ok(home.join(DEFAULT_ROOT_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from file
    ///
    /// Files ending in `.toml` are read as TOML; anything else is parsed as a
    /// mirror list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// validation.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let config = if is_toml {
            Self::from_toml(&contents)?
        } else {
            Self::from_mirror_list(&contents)?
        };
        tracing::debug!(
            path = %path.display(),
            repositories = config.repositories.len(),
            "loaded mirror configuration"
        );
        Ok(config)
    }

    /// Load configuration from an optional path or use the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load_from_file(&Self::default_path()?).await,
        }
    }

    /// Parse mirror-list text
    ///
    /// # Errors
    ///
    /// Returns an error for malformed lines or invalid settings.
    pub fn from_mirror_list(text: &str) -> Result<Self, Error> {
        let (settings, repositories) = parse_mirror_list(text, Settings::default())?;
        settings.validate()?;
        Ok(Self {
            settings,
            repositories,
        })
    }

    /// Parse the TOML form
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let mut config: Self = toml::from_str(text).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;
        for entry in &mut config.repositories {
            entry.uri = entry.uri.trim_end_matches('/').to_string();
            if entry.architectures.is_empty() && entry.kind == SourceKind::Binary {
                entry.architectures.push(config.settings.architecture.clone());
            }
        }
        config.settings.validate()?;
        Ok(config)
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        self.merge_vars(|name| std::env::var(format!("{ENV_PREFIX}{name}")).ok())
    }

    fn merge_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        const OVERRIDES: [(&str, &str); 5] = [
            ("ROOT", "rootPath"),
            ("THREADS", "threads"),
            ("LIMIT_RATE", "limitRate"),
            ("FORCE_UPDATE", "forceUpdate"),
            ("TEST", "test"),
        ];

        for (var, setting) in OVERRIDES {
            if let Some(value) = lookup(var) {
                self.settings
                    .apply(setting, &value)
                    .map_err(|_| ConfigError::InvalidValue {
                        field: format!("{ENV_PREFIX}{var}"),
                        value,
                    })?;
            }
        }
        Ok(())
    }

    /// Write the default mirror list to `path`, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if the file already exists or cannot be written.
    pub async fn write_default(path: &Path) -> Result<(), Error> {
        if fs::try_exists(path).await.unwrap_or(false) {
            return Err(ConfigError::WriteError {
                path: path.display().to_string(),
                error: "file already exists".to_string(),
            }
            .into());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::WriteError {
                    path: parent.display().to_string(),
                    error: e.to_string(),
                })?;
        }
        fs::write(path, DEFAULT_MIRROR_LIST)
            .await
            .map_err(|e| ConfigError::WriteError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
        Ok(())
    }
}
