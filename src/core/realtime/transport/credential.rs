//! Short-lived credential used to authenticate the signaling exchange.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

const TOKEN_TIMEOUT: Duration = Duration::from_secs(15);

/// Opaque bearer token minted by the trusted token endpoint.
#[derive(Clone)]
pub struct EphemeralCredential {
    value: Zeroizing<String>,
    /// Unix time after which the token is rejected, when reported
    pub expires_at: Option<i64>,
}

impl EphemeralCredential {
    pub fn new(value: impl Into<String>, expires_at: Option<i64>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
            expires_at,
        }
    }

    pub fn secret(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for EphemeralCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralCredential")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of [`EphemeralCredential`]s, consulted once per session start.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> RealtimeResult<EphemeralCredential>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    client_secret: ClientSecret,
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Fetches the credential with an HTTP GET against the token endpoint.
///
/// The endpoint answers with `{"client_secret": {"value": "...", "expires_at": ...}}`.
#[derive(Debug, Clone)]
pub struct HttpCredentialProvider {
    http_client: reqwest::Client,
    url: String,
}

impl HttpCredentialProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http_client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http_client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for HttpCredentialProvider {
    async fn fetch(&self) -> RealtimeResult<EphemeralCredential> {
        debug!("Fetching session credential from {}", self.url);
        let response = self
            .http_client
            .get(&self.url)
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .map_err(|e| RealtimeError::Credential(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RealtimeError::Credential(format!(
                "token endpoint returned {status}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RealtimeError::Credential(format!("malformed token response: {e}")))?;

        if body.client_secret.value.trim().is_empty() {
            return Err(RealtimeError::Credential(
                "token response has an empty client secret".to_string(),
            ));
        }

        Ok(EphemeralCredential::new(
            body.client_secret.value,
            body.client_secret.expires_at,
        ))
    }
}
