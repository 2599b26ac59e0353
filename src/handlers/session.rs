use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::realtime::SessionState;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Inbound events decoded and logged since the server started
    pub inbound_processed: u64,
    pub tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SentEvent {
    pub event_id: String,
}

fn status_of(state: &AppState) -> SessionStatus {
    let controller = &state.controller;
    SessionStatus {
        state: controller.state(),
        inbound_processed: controller.inbound_processed(),
        tools: controller.tools().iter().map(|t| t.name.clone()).collect(),
    }
}

/// `GET /session`
pub async fn session_status(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    Json(status_of(&state))
}

/// `POST /session/start`: negotiate a new session.
pub async fn start_session(State(state): State<Arc<AppState>>) -> AppResult<Json<SessionStatus>> {
    state.controller.start().await?;
    Ok(Json(status_of(&state)))
}

/// `POST /session/stop`: tear the session down. Always succeeds.
pub async fn stop_session(State(state): State<Arc<AppState>>) -> Json<SessionStatus> {
    state.controller.stop().await;
    Json(status_of(&state))
}

/// `POST /session/text`: send a user message and request a response.
pub async fn send_text(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TextRequest>,
) -> AppResult<Json<SessionStatus>> {
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".to_string()));
    }
    state.controller.send_text(&request.text).await?;
    Ok(Json(status_of(&state)))
}

/// `POST /session/event`: send an arbitrary client event.
pub async fn send_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Value>,
) -> AppResult<Json<SentEvent>> {
    let raw = serde_json::to_string(&event)
        .map_err(|e| AppError::BadRequest(format!("Unserializable event: {e}")))?;
    let event_id = state.controller.send_raw(&raw).await?;
    Ok(Json(SentEvent { event_id }))
}
