use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::Json};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::state::AppState;
use crate::utils::{describe_failure, join_path};

const SESSIONS_PATH: &str = "realtime/sessions";
const TOKEN_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'static str>,
}

/// Mint an ephemeral realtime credential.
///
/// `GET /token`. Calls `POST {api_base}/realtime/sessions` with the server's API key and
/// relays the upstream JSON, whose `client_secret.value` the negotiator uses
/// as its bearer token.
pub async fn mint_token(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let api_key = state
        .config
        .openai_api_key
        .as_deref()
        .ok_or_else(|| AppError::Unavailable("OPENAI_API_KEY is not configured".to_string()))?;

    let request = SessionRequest {
        model: &state.config.realtime_model,
        voice: state.config.realtime_voice.map(|v| v.as_str()),
    };

    debug!("Requesting realtime session for model {}", request.model);
    let response = state
        .http_client
        .post(join_path(&state.config.openai_api_base, SESSIONS_PATH))
        .bearer_auth(api_key)
        .timeout(TOKEN_TIMEOUT)
        .json(&request)
        .send()
        .await
        .map_err(|e| AppError::Upstream(format!("Token request failed: {e}")))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::Upstream(format!("Failed to read token response: {e}")))?;
    if !status.is_success() {
        return Err(AppError::Upstream(describe_failure(status, &body)));
    }

    let session: Value = serde_json::from_str(&body)
        .map_err(|e| AppError::Upstream(format!("Invalid token response: {e}")))?;
    info!("Minted ephemeral realtime credential");
    Ok(Json(session))
}
