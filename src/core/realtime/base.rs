//! Shared error and state types for realtime sessions.
//!
//! Everything that crosses a component boundary in [`crate::core::realtime`]
//! (negotiator, codec, controller) reports failures through [`RealtimeError`].
//! Tool handler failures are deliberately *not* part of this enum: they are
//! reported to the remote endpoint as function-call output, never to the local
//! caller (see [`crate::core::tools::ToolError`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while establishing or driving a realtime session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The short-lived credential could not be obtained or was malformed
    #[error("Credential error: {0}")]
    Credential(String),

    /// The local audio track could not be opened
    #[error("Media access error: {0}")]
    MediaAccess(String),

    /// The offer/answer exchange failed or the peer connection could not be built
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// `start()` was called while a previous `start()` is still negotiating
    #[error("Session is already starting")]
    AlreadyStarting,

    /// `start()` was called while a session is active or closing
    #[error("Session is already active")]
    AlreadyActive,

    /// The session was stopped before negotiation completed
    #[error("Session start was cancelled by stop()")]
    Cancelled,

    /// `send()` was called while the session is not active or the channel is not open
    #[error("Data channel is not open")]
    ChannelNotOpen,

    /// An inbound message could not be decoded into a protocol event
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The data channel rejected a write or a teardown step failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// An outbound event could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl RealtimeError {
    /// Whether this error ends the session attempt (as opposed to a per-call
    /// or per-message failure the session survives).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Credential(_) | Self::MediaAccess(_) | Self::Negotiation(_)
        )
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of the session owned by a
/// [`SessionController`](super::session::SessionController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session has been started yet
    #[default]
    Idle,
    /// Negotiation in progress, or negotiated and waiting for the channel to open
    Connecting,
    /// Channel open and bootstrap issued
    Active,
    /// Teardown in progress
    Closing,
    /// Session ended; a new `start()` builds a fresh one
    Closed,
}

impl SessionState {
    /// Whether a call to `start()` may begin a new session from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Event Direction
// =============================================================================

/// Prefix the remote endpoint puts on every event id it assigns.
pub const SERVER_EVENT_ID_PREFIX: &str = "event_";

/// Which side of the data channel produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Client,
    Server,
}

impl Direction {
    /// Derive the direction from an event id.
    ///
    /// Client ids are anything without the server prefix. Events carrying no
    /// id at all can only have come from the server, since the codec assigns
    /// one to every outbound event.
    pub fn from_event_id(event_id: Option<&str>) -> Self {
        match event_id {
            Some(id) if !id.starts_with(SERVER_EVENT_ID_PREFIX) => Self::Client,
            _ => Self::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
