//! Conditional HTTP transfers into the mirror tree

use aptsync_errors::{Error, NetworkError, StorageError};
use aptsync_events::EventSender;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use futures::StreamExt;
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::client::{map_reqwest_error, NetClient, NetConfig};
use crate::fetcher::{FetchOutcome, FetchRequest, Fetcher};
use crate::throttle::RateLimiter;
use crate::validation::{take_credentials, validate_response, validate_url};

pub use aptsync_config::constants::PARTIAL_SUFFIX;

/// Path of the in-progress copy of `dest`
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Format a timestamp as an HTTP date
#[must_use]
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Parse an HTTP date header value
#[must_use]
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(SystemTime::from)
}

#[derive(Debug, Clone, Copy)]
struct LocalCopy {
    size: u64,
    modified: SystemTime,
}

async fn local_copy(path: &Path) -> Option<LocalCopy> {
    let meta = fs::metadata(path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    Some(LocalCopy {
        size: meta.len(),
        modified: meta.modified().ok()?,
    })
}

fn last_modified(response: &Response) -> Option<SystemTime> {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date)
}

/// A server that ignores `If-Modified-Since` still proves freshness
/// through `Last-Modified` and `Content-Length`.
fn server_copy_matches(response: &Response, local: LocalCopy) -> bool {
    match (last_modified(response), response.content_length()) {
        (Some(remote), Some(length)) => remote <= local.modified && length == local.size,
        _ => false,
    }
}

/// `Fetcher` backed by reqwest
pub struct HttpFetcher {
    client: NetClient,
    limiter: Option<Arc<RateLimiter>>,
    events: Option<EventSender>,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self {
            client,
            limiter: None,
            events: None,
        }
    }

    /// Build the client and the shared rate limiter from one configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: NetConfig) -> Result<Self, Error> {
        let limiter = RateLimiter::from_rate(config.limit_rate, config.workers).map(Arc::new);
        let client = NetClient::new(config)?;
        Ok(Self {
            client,
            limiter,
            events: None,
        })
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn client(&self) -> &NetClient {
        &self.client
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, Error> {
        let response = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, url))?;
        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            validate_response(status)?;
        }
        Ok(response)
    }

    async fn transfer_once(&self, request: &FetchRequest, url: &Url) -> Result<FetchOutcome, Error> {
        let mut target = url.clone();
        let credentials = take_credentials(&mut target);
        let local = if request.is_conditional() {
            local_copy(&request.dest).await
        } else {
            None
        };

        let build = |with_auth: bool| {
            let mut builder = self.client.inner().get(target.clone());
            if let Some(local) = local {
                builder = builder.header(IF_MODIFIED_SINCE, http_date(local.modified));
            }
            if with_auth {
                if let Some((user, pass)) = &credentials {
                    builder = builder.basic_auth(user, pass.as_ref());
                }
            }
            builder
        };

        let preemptive = self.client.config().auth_no_challenge;
        let mut response = self.send(build(preemptive), &request.url).await?;
        if response.status() == StatusCode::UNAUTHORIZED && credentials.is_some() && !preemptive {
            response = self.send(build(true), &request.url).await?;
        }

        if response.status() == StatusCode::NOT_MODIFIED && local.is_some() {
            return Ok(FetchOutcome::Unchanged);
        }
        validate_response(response.status())?;
        if let Some(local) = local {
            if server_copy_matches(&response, local) {
                return Ok(FetchOutcome::Unchanged);
            }
        }

        if let (Some(expected), Some(announced)) = (request.expected_size, response.content_length())
        {
            if expected != announced {
                return Err(NetworkError::SizeMismatch {
                    url: request.url.clone(),
                    expected,
                    actual: announced,
                }
                .into());
            }
        }

        let modified = last_modified(&response);
        let partial = partial_path(&request.dest);
        let written = match self.stream_to(&partial, request, response).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&partial).await;
                return Err(err);
            }
        };
        self.move_into_place(&partial, &request.dest, modified).await?;
        Ok(FetchOutcome::Downloaded { bytes: written })
    }

    async fn stream_to(
        &self,
        partial: &Path,
        request: &FetchRequest,
        response: Response,
    ) -> Result<u64, Error> {
        if let Some(parent) = partial.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io_with_path(&e, parent))?;
        }
        let mut file = File::create(partial)
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, partial))?;

        let mut hasher = request.checksums.hasher();
        let chunk_timeout = self.client.config().timeout;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        loop {
            match tokio::time::timeout(chunk_timeout, stream.next()).await {
                Ok(Some(chunk)) => {
                    let chunk = chunk.map_err(|e| map_reqwest_error(&e, &request.url))?;
                    hasher.update(&chunk);
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| StorageError::from_io_with_path(&e, partial))?;
                    written += chunk.len() as u64;
                    if let Some(limiter) = &self.limiter {
                        limiter.consume(chunk.len()).await;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    return Err(NetworkError::Timeout {
                        url: request.url.clone(),
                    }
                    .into());
                }
            }
        }

        file.flush()
            .await
            .map_err(|e| StorageError::from_io_with_path(&e, partial))?;
        drop(file);

        if let Some(expected) = request.expected_size {
            if expected != written {
                return Err(NetworkError::SizeMismatch {
                    url: request.url.clone(),
                    expected,
                    actual: written,
                }
                .into());
            }
        }
        request.checksums.verify(&hasher.finalize())?;
        Ok(written)
    }

    async fn move_into_place(
        &self,
        partial: &Path,
        dest: &Path,
        modified: Option<SystemTime>,
    ) -> Result<(), Error> {
        if self.client.config().unlink {
            match fs::remove_file(dest).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StorageError::from_io_with_path(&e, dest).into()),
            }
        }
        fs::rename(partial, dest)
            .await
            .map_err(|e| StorageError::AtomicRenameFailed {
                message: format!("{} -> {}: {e}", partial.display(), dest.display()),
            })?;
        if let Some(modified) = modified {
            filetime::set_file_mtime(dest, FileTime::from_system_time(modified))
                .map_err(|e| Error::io_with_path(&e, dest))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, Error> {
        let url = validate_url(&request.url)?;
        self.client
            .execute_with_retry(&request.url, &self.events, || {
                self.transfer_once(request, &url)
            })
            .await
    }
}
