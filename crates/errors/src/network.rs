//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("size mismatch for {url}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("SSL/TLS error: {0}")]
    TlsError(String),

    #[error("proxy configuration error: {0}")]
    ProxyError(String),

    #[error("network unavailable")]
    NetworkUnavailable,
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::NetworkUnavailable => {
                Some("Check the network connection and rerun the sync.")
            }
            Self::ConnectionRefused(_) => Some("Verify the mirror URI and proxy settings."),
            Self::TlsError(_) => Some(
                "Check certificate, caCertificate and privateKey, or set noCheckCertificate.",
            ),
            Self::ProxyError(_) => Some("Check httpProxy, httpsProxy, proxyUser and proxyPass."),
            Self::SizeMismatch { .. } | Self::ChecksumMismatch { .. } => {
                Some("The upstream file changed or is corrupt; the next run fetches it again.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::DownloadFailed(_)
            | Self::ConnectionRefused(_)
            | Self::NetworkUnavailable => true,
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Timeout { .. } => "network.timeout",
            Self::DownloadFailed(_) => "network.download_failed",
            Self::ConnectionRefused(_) => "network.connection_refused",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::HttpError { .. } => "network.http_error",
            Self::SizeMismatch { .. } => "network.size_mismatch",
            Self::ChecksumMismatch { .. } => "network.checksum_mismatch",
            Self::TlsError(_) => "network.tls_error",
            Self::ProxyError(_) => "network.proxy_error",
            Self::NetworkUnavailable => "network.unavailable",
        };
        Some(code)
    }
}
