use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;

use crate::core::realtime::LogEntryView;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// `display` (default) thins delta events, `all` returns every entry
    pub view: Option<String>,
}

/// `GET /events`: the event log, most recent first.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> AppResult<Json<Vec<LogEntryView>>> {
    let thinned = match query.view.as_deref() {
        None | Some("display") => true,
        Some("all") => false,
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "Unknown view '{other}'. Expected 'display' or 'all'"
            )));
        }
    };
    Ok(Json(state.controller.entry_views(thinned)))
}
