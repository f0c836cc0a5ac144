//! HTTP client with proxy, TLS and retry configuration

use aptsync_config::Settings;
use aptsync_errors::{Error, NetworkError};
use aptsync_events::{AppEvent, DownloadEvent, EventEmitter};
use reqwest::{Certificate, Client, Identity, Proxy};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{calculate_backoff_delay, is_transient, RetryConfig};

/// Proxy settings passed through from the mirror config
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
}

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Connect timeout, and the longest wait for the next body chunk
    pub timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub retry: RetryConfig,
    pub user_agent: String,
    /// Send credentials from the URL before the server asks for them
    pub auth_no_challenge: bool,
    pub no_check_certificate: bool,
    /// Remove the destination before moving the new file into place
    pub unlink: bool,
    pub proxy: Option<ProxyConfig>,
    pub certificate: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
    pub ca_certificate: Option<PathBuf>,
    /// Bytes per second per worker
    pub limit_rate: Option<u64>,
    pub workers: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 16,
            retry: RetryConfig::default(),
            user_agent: format!("aptsync/{}", env!("CARGO_PKG_VERSION")),
            auth_no_challenge: false,
            no_check_certificate: false,
            unlink: false,
            proxy: None,
            certificate: None,
            private_key: None,
            ca_certificate: None,
            limit_rate: None,
            workers: 1,
        }
    }
}

impl NetConfig {
    /// Derive the transport configuration from mirror settings
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let proxy = settings.use_proxy.then(|| ProxyConfig {
            http: settings.http_proxy.clone(),
            https: settings.https_proxy.clone(),
            user: settings.proxy_user.clone(),
            pass: settings.proxy_pass.clone(),
        });
        Self {
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
            pool_max_idle_per_host: settings.threads.max(1),
            retry: RetryConfig::default().with_max_retries(settings.retries),
            auth_no_challenge: settings.auth_no_challenge,
            no_check_certificate: settings.no_check_certificate,
            unlink: settings.unlink,
            proxy,
            certificate: settings.certificate.clone(),
            private_key: settings.private_key.clone(),
            ca_certificate: settings.ca_certificate.clone(),
            limit_rate: settings.limit_rate_bytes(),
            workers: settings.threads.max(1),
            ..Self::default()
        }
    }
}

/// HTTP client wrapper with retry logic
#[derive(Clone, Debug)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if TLS material cannot be read or parsed, a proxy URL
    /// is invalid, or the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .connect_timeout(config.timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.no_check_certificate);

        match &config.proxy {
            Some(proxy) => {
                if let Some(http) = &proxy.http {
                    builder = builder.proxy(build_proxy(Proxy::http(http), proxy)?);
                }
                if let Some(https) = &proxy.https {
                    builder = builder.proxy(build_proxy(Proxy::https(https), proxy)?);
                }
            }
            None => builder = builder.no_proxy(),
        }

        if let Some(ca) = &config.ca_certificate {
            let pem = read_pem(ca)?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| NetworkError::TlsError(format!("{}: {e}", ca.display())))?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(cert) = &config.certificate {
            let mut pem = read_pem(cert)?;
            if let Some(key) = &config.private_key {
                pem.push(b'\n');
                pem.extend(read_pem(key)?);
            }
            let identity = Identity::from_pem(&pem)
                .map_err(|e| NetworkError::TlsError(format!("{}: {e}", cert.display())))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| NetworkError::TlsError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Create with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created with default settings.
    pub fn with_defaults() -> Result<Self, Error> {
        Self::new(NetConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Get the underlying reqwest client
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Run `op` until it succeeds, fails permanently, or the retry budget is spent
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first
    /// non-transient error.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        url: &str,
        events: &impl EventEmitter,
        mut op: F,
    ) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.config.retry.max_retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_transient(&err) => {
                    let backoff_delay = calculate_backoff_delay(&self.config.retry, attempt);
                    events.emit(AppEvent::Download(DownloadEvent::Retrying {
                        url: url.to_string(),
                        attempt,
                        max_attempts,
                        reason: err.to_string(),
                        backoff_delay,
                    }));
                    tokio::time::sleep(backoff_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn build_proxy(proxy: reqwest::Result<Proxy>, config: &ProxyConfig) -> Result<Proxy, Error> {
    let proxy = proxy.map_err(|e| NetworkError::ProxyError(e.to_string()))?;
    Ok(match &config.user {
        Some(user) => proxy.basic_auth(user, config.pass.as_deref().unwrap_or_default()),
        None => proxy,
    })
}

fn read_pem(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path)
        .map_err(|e| NetworkError::TlsError(format!("cannot read {}: {e}", path.display())).into())
}

/// Map a reqwest failure onto the transport taxonomy
pub(crate) fn map_reqwest_error(err: &reqwest::Error, url: &str) -> Error {
    if err.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
        .into()
    } else if err.is_connect() {
        NetworkError::ConnectionRefused(format!("{url}: {err}")).into()
    } else if err.is_builder() {
        NetworkError::InvalidUrl(format!("{url}: {err}")).into()
    } else {
        NetworkError::DownloadFailed(format!("{url}: {err}")).into()
    }
}
