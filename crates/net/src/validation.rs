//! URL validation and HTTP response validation for fetches

use aptsync_errors::{Error, NetworkError};
use reqwest::StatusCode;
use url::Url;

/// Parse the URL and check for supported protocols
pub(crate) fn validate_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(NetworkError::InvalidUrl(format!("unsupported scheme {scheme}: {url}")).into()),
    }
}

/// Split credentials embedded in the URL from the URL itself
pub(crate) fn take_credentials(url: &mut Url) -> Option<(String, Option<String>)> {
    if url.username().is_empty() {
        return None;
    }
    let user = url.username().to_string();
    let pass = url.password().map(str::to_string);
    // Infallible for http(s) URLs with a host
    let _ = url.set_username("");
    let _ = url.set_password(None);
    Some((user, pass))
}

/// Status handling shared by every fetch
pub(crate) fn validate_response(status: StatusCode) -> Result<(), Error> {
    if status.is_success() {
        return Ok(());
    }
    Err(NetworkError::HttpError {
        status: status.as_u16(),
        message: status
            .canonical_reason()
            .map_or_else(|| status.to_string(), str::to_string),
    }
    .into())
}
