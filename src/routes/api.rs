use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, events, session, token};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/token", get(token::mint_token))
        .route("/session", get(session::session_status))
        .route("/session/start", post(session::start_session))
        .route("/session/stop", post(session::stop_session))
        .route("/session/text", post(session::send_text))
        .route("/session/event", post(session::send_event))
        .route("/events", get(events::list_events))
        .layer(TraceLayer::new_for_http())
}
