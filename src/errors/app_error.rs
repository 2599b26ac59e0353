use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::core::realtime::RealtimeError;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A server-side prerequisite (such as the API key) is not configured
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// An upstream API call failed
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Realtime(e) => match e {
                RealtimeError::AlreadyStarting
                | RealtimeError::AlreadyActive
                | RealtimeError::ChannelNotOpen
                | RealtimeError::Cancelled => StatusCode::CONFLICT,
                RealtimeError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
                RealtimeError::Credential(_)
                | RealtimeError::MediaAccess(_)
                | RealtimeError::Negotiation(_) => StatusCode::BAD_GATEWAY,
                RealtimeError::Transport(_) | RealtimeError::Serialization(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Realtime(e) => match e {
                RealtimeError::Credential(_) => "CREDENTIAL_ERROR",
                RealtimeError::MediaAccess(_) => "MEDIA_ACCESS_ERROR",
                RealtimeError::Negotiation(_) => "NEGOTIATION_ERROR",
                RealtimeError::AlreadyStarting => "ALREADY_STARTING",
                RealtimeError::AlreadyActive => "ALREADY_ACTIVE",
                RealtimeError::Cancelled => "CANCELLED",
                RealtimeError::ChannelNotOpen => "CHANNEL_NOT_OPEN",
                RealtimeError::MalformedEvent(_) => "MALFORMED_EVENT",
                RealtimeError::Transport(_) => "TRANSPORT_ERROR",
                RealtimeError::Serialization(_) => "SERIALIZATION_ERROR",
            },
            Self::BadRequest(_) => "INVALID_REQUEST",
            Self::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }
        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
