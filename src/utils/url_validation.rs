//! Validation of configured endpoint URLs.
//!
//! Every outbound HTTP collaborator (token endpoint, signaling endpoint,
//! OpenAI REST base) is configured as a URL. These are checked once at
//! startup so a typo fails fast instead of on the first `start()`.

use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Parse `raw` and require an `http`/`https` scheme and a host.
pub fn validate_endpoint_url(raw: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }
    Ok(url)
}

/// Join `path` onto a base URL, tolerating a trailing slash on either side.
pub fn join_path(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
