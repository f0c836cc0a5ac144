//! Resolved engine settings and their defaults

use aptsync_errors::{ConfigError, Error};
use aptsync_types::parse_rate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{DEFAULT_ROOT_DIR, LOCK_DIR, MIRROR_DIR, SKEL_DIR, VAR_DIR};

/// Verbosity requested by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(ConfigError::InvalidValue {
                field: "logLevel".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// Settings consumed by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Used for entries that declare no `[arch=...]`
    #[serde(default = "default_architecture")]
    pub architecture: String,
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,
    #[serde(default)]
    pub mirror_path: Option<PathBuf>,
    #[serde(default)]
    pub skel_path: Option<PathBuf>,
    #[serde(default)]
    pub var_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub contents: bool,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_threads")]
    pub decompress_threads: usize,
    #[serde(default)]
    pub auth_no_challenge: bool,
    #[serde(default)]
    pub no_check_certificate: bool,
    #[serde(default)]
    pub unlink: bool,
    #[serde(default)]
    pub use_proxy: bool,
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
    #[serde(default)]
    pub proxy_user: Option<String>,
    #[serde(default)]
    pub proxy_pass: Option<String>,
    #[serde(default)]
    pub certificate: Option<PathBuf>,
    #[serde(default)]
    pub ca_certificate: Option<PathBuf>,
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// Per-worker transfer cap, wget syntax
    #[serde(default = "default_limit_rate")]
    pub limit_rate: String,
    #[serde(default = "default_language")]
    pub language: Vec<String>,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub test: bool,
    #[serde(default)]
    pub by_hash: bool,
    #[serde(default)]
    pub disable_clean: bool,
    #[serde(default)]
    pub disable_progress: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            architecture: default_architecture(),
            root_path: default_root_path(),
            mirror_path: None,
            skel_path: None,
            var_path: None,
            contents: true,
            threads: default_threads(),
            decompress_threads: default_threads(),
            auth_no_challenge: false,
            no_check_certificate: false,
            unlink: false,
            use_proxy: false,
            http_proxy: None,
            https_proxy: None,
            proxy_user: None,
            proxy_pass: None,
            certificate: None,
            ca_certificate: None,
            private_key: None,
            limit_rate: default_limit_rate(),
            language: default_language(),
            force_update: false,
            log_level: LogLevel::Info,
            test: false,
            by_hash: false,
            disable_clean: false,
            disable_progress: false,
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

impl Settings {
    /// Apply a `set <name> = <value>` directive
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names or values that do not parse.
    pub fn apply(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let value = unquote(value.trim());
        match name.trim().to_ascii_lowercase().as_str() {
            "architecture" => self.architecture = value.to_string(),
            "rootpath" => self.root_path = PathBuf::from(value),
            "mirrorpath" => self.mirror_path = Some(PathBuf::from(value)),
            "skelpath" => self.skel_path = Some(PathBuf::from(value)),
            "varpath" => self.var_path = Some(PathBuf::from(value)),
            "contents" => self.contents = parse_bool(name, value)?,
            "threads" => self.threads = parse_count(name, value)?,
            "decompressthreads" => self.decompress_threads = parse_count(name, value)?,
            "authnochallenge" => self.auth_no_challenge = parse_bool(name, value)?,
            "nocheckcertificate" => self.no_check_certificate = parse_bool(name, value)?,
            "unlink" => self.unlink = parse_bool(name, value)?,
            "useproxy" => self.use_proxy = parse_bool(name, value)?,
            "httpproxy" => self.http_proxy = non_empty(value),
            "httpsproxy" => self.https_proxy = non_empty(value),
            "proxyuser" => self.proxy_user = non_empty(value),
            "proxypass" => self.proxy_pass = non_empty(value),
            "certificate" => self.certificate = non_empty(value).map(PathBuf::from),
            "cacertificate" => self.ca_certificate = non_empty(value).map(PathBuf::from),
            "privatekey" => self.private_key = non_empty(value).map(PathBuf::from),
            "limitrate" => {
                if parse_rate(value).is_none() {
                    return Err(invalid(name, value).into());
                }
                self.limit_rate = value.to_string();
            }
            "language" => {
                self.language = dedup(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
            "forceupdate" => self.force_update = parse_bool(name, value)?,
            "loglevel" => self.log_level = value.parse()?,
            "test" => self.test = parse_bool(name, value)?,
            "byhash" => self.by_hash = parse_bool(name, value)?,
            "disableclean" => self.disable_clean = parse_bool(name, value)?,
            "disableprogress" => self.disable_progress = parse_bool(name, value)?,
            "timeoutsecs" => {
                self.timeout_secs = value.parse().map_err(|_| invalid(name, value))?;
            }
            "retries" => self.retries = value.parse().map_err(|_| invalid(name, value))?,
            _ => {
                return Err(ConfigError::UnknownSetting {
                    name: name.trim().to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// Check cross-field consistency
    ///
    /// # Errors
    ///
    /// Returns an error when a value is out of range or TLS material is incomplete.
    pub fn validate(&self) -> Result<(), Error> {
        if self.threads == 0 {
            return Err(invalid("threads", "0").into());
        }
        if self.decompress_threads == 0 {
            return Err(invalid("decompressThreads", "0").into());
        }
        if parse_rate(&self.limit_rate).is_none() {
            return Err(invalid("limitRate", &self.limit_rate).into());
        }
        if self.private_key.is_some() && self.certificate.is_none() {
            return Err(ConfigError::Invalid {
                message: "privateKey requires certificate".to_string(),
            }
            .into());
        }
        if self.proxy_pass.is_some() && self.proxy_user.is_none() {
            return Err(ConfigError::Invalid {
                message: "proxyPass requires proxyUser".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Transfer cap in bytes per second per worker; `None` when unlimited
    #[must_use]
    pub fn limit_rate_bytes(&self) -> Option<u64> {
        parse_rate(&self.limit_rate).filter(|rate| *rate > 0)
    }

    #[must_use]
    pub fn mirror_dir(&self) -> PathBuf {
        self.mirror_path
            .clone()
            .unwrap_or_else(|| self.root_path.join(MIRROR_DIR))
    }

    #[must_use]
    pub fn skel_dir(&self) -> PathBuf {
        self.skel_path
            .clone()
            .unwrap_or_else(|| self.root_path.join(SKEL_DIR))
    }

    #[must_use]
    pub fn var_dir(&self) -> PathBuf {
        self.var_path
            .clone()
            .unwrap_or_else(|| self.root_path.join(VAR_DIR))
    }

    /// Directory holding in-flight download markers
    #[must_use]
    pub fn lock_dir(&self) -> PathBuf {
        self.var_dir().join(LOCK_DIR)
    }
}

pub(crate) fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(field, value)),
    }
}

fn parse_count(field: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(field, value)),
    }
}

fn invalid(field: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Debian name of the host architecture
fn default_architecture() -> String {
    debian_arch(std::env::consts::ARCH).to_string()
}

pub(crate) fn debian_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "powerpc64" => "ppc64el",
        "riscv64" => "riscv64",
        "s390x" => "s390x",
        other => other,
    }
}

fn default_root_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_ROOT_DIR)
}

fn default_true() -> bool {
    true
}

fn default_threads() -> usize {
    num_cpus::get().max(1)
}

fn default_limit_rate() -> String {
    "500m".to_string()
}

fn default_language() -> Vec<String> {
    languages_from_locale(std::env::var("LANG").ok().as_deref())
}

/// `en_GB.UTF-8` becomes `["en"]`; unset or `C`/`POSIX` locales fall back to English
pub(crate) fn languages_from_locale(locale: Option<&str>) -> Vec<String> {
    let lang = locale
        .map(|l| l.split(['_', '.', '@']).next().unwrap_or(l).trim())
        .filter(|l| !l.is_empty() && *l != "C" && *l != "POSIX")
        .unwrap_or("en");
    vec![lang.to_string()]
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    5
}
