//! SDP offer/answer exchange with the realtime endpoint.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::credential::EphemeralCredential;
use crate::core::realtime::base::{RealtimeError, RealtimeResult};
use crate::core::realtime::openai::{
    DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, SDP_CONTENT_TYPE, signaling_url,
};
use crate::utils::describe_failure;

const SIGNALING_TIMEOUT: Duration = Duration::from_secs(20);

/// One synchronous offer/answer round trip.
#[async_trait]
pub trait SignalingClient: Send + Sync {
    /// Send the local offer SDP and return the remote answer SDP.
    async fn exchange(
        &self,
        credential: &EphemeralCredential,
        offer_sdp: &str,
    ) -> RealtimeResult<String>;
}

/// POSTs the offer as `application/sdp` to `{endpoint}?model={model}`.
#[derive(Debug, Clone)]
pub struct HttpSignalingClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl Default for HttpSignalingClient {
    fn default() -> Self {
        Self::new(OPENAI_REALTIME_URL, DEFAULT_REALTIME_MODEL)
    }
}

impl HttpSignalingClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, model)
    }

    pub fn with_client(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SignalingClient for HttpSignalingClient {
    async fn exchange(
        &self,
        credential: &EphemeralCredential,
        offer_sdp: &str,
    ) -> RealtimeResult<String> {
        let url = signaling_url(&self.endpoint, &self.model)
            .map_err(|e| RealtimeError::Negotiation(format!("invalid signaling URL: {e}")))?;

        debug!("Posting SDP offer ({} bytes) to {}", offer_sdp.len(), url);
        let response = self
            .http_client
            .post(url)
            .bearer_auth(credential.secret())
            .header(reqwest::header::CONTENT_TYPE, SDP_CONTENT_TYPE)
            .timeout(SIGNALING_TIMEOUT)
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| RealtimeError::Negotiation(format!("signaling request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RealtimeError::Negotiation(format!("failed to read answer: {e}")))?;

        if !status.is_success() {
            return Err(RealtimeError::Negotiation(format!(
                "offer rejected: {}",
                describe_failure(status, &body)
            )));
        }
        if body.trim().is_empty() {
            return Err(RealtimeError::Negotiation(
                "remote endpoint returned an empty answer".to_string(),
            ));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OFFER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\n";
    const ANSWER: &str = "v=0\r\no=- 3 4 IN IP4 10.0.0.1\r\ns=-\r\n";

    #[tokio::test]
    async fn test_exchange_posts_offer_and_returns_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/realtime"))
            .and(query_param("model", "gpt-4o-realtime-preview-2024-12-17"))
            .and(header("authorization", "Bearer ek_test"))
            .and(header("content-type", "application/sdp"))
            .and(body_string(OFFER))
            .respond_with(ResponseTemplate::new(201).set_body_string(ANSWER))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpSignalingClient::new(
            format!("{}/v1/realtime", server.uri()),
            DEFAULT_REALTIME_MODEL,
        );
        let answer = client
            .exchange(&EphemeralCredential::new("ek_test", None), OFFER)
            .await
            .unwrap();
        assert_eq!(answer, ANSWER);
    }

    #[tokio::test]
    async fn test_exchange_rejected_offer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("{\"error\":{\"message\":\"Invalid SDP\",\"type\":\"invalid_request_error\"}}"))
            .mount(&server)
            .await;

        let client = HttpSignalingClient::new(server.uri(), DEFAULT_REALTIME_MODEL);
        let err = client
            .exchange(&EphemeralCredential::new("ek_test", None), OFFER)
            .await
            .unwrap_err();
        assert!(matches!(err, RealtimeError::Negotiation(ref m) if m.contains("Invalid SDP")));
    }

    #[tokio::test]
    async fn test_exchange_empty_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = HttpSignalingClient::new(server.uri(), DEFAULT_REALTIME_MODEL);
        assert!(matches!(
            client
                .exchange(&EphemeralCredential::new("ek_test", None), OFFER)
                .await,
            Err(RealtimeError::Negotiation(_))
        ));
    }
}
