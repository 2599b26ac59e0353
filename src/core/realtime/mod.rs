//! Realtime voice session over a WebRTC data channel.
//!
//! # Architecture
//!
//! - [`transport`] negotiates the peer connection (credential fetch, SDP
//!   offer/answer) and exposes the data channel as a stream of
//!   [`ChannelEvent`]s
//! - [`EventCodec`] turns wire JSON into [`ProtocolEvent`]s and back
//! - [`SessionController`] runs the lifecycle state machine, the bootstrap
//!   sequence and tool dispatch
//! - [`EventLog`] keeps the capped, most-recent-first record of traffic
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ambit_realtime::core::realtime::{
//!     HttpCredentialProvider, HttpSignalingClient, SessionController, WebRtcNegotiator,
//! };
//!
//! let negotiator = WebRtcNegotiator::new(
//!     Arc::new(HttpCredentialProvider::new("http://localhost:3001/token")),
//!     Arc::new(HttpSignalingClient::default()),
//! );
//! let controller = SessionController::builder(Arc::new(negotiator)).build();
//! controller.start().await?;
//! controller.send_text("What do you see?").await?;
//! ```

mod base;
mod codec;
mod event_log;
pub mod openai;
mod session;
pub mod transport;

pub use base::{
    Direction, RealtimeError, RealtimeResult, SERVER_EVENT_ID_PREFIX, SessionState,
};
pub use codec::{EventCodec, IdGenerator, ProtocolEvent, SequentialIdGenerator, UuidGenerator};
pub use event_log::{DEFAULT_LOG_CAPACITY, EventLog, LogEntry, LogEntryView};
pub use openai::{EventPayload, OpenAIRealtimeVoice};
pub use session::{SessionController, SessionControllerBuilder};
pub use transport::{
    ChannelEvent, ChannelState, Connection, DataChannel, HttpCredentialProvider,
    HttpSignalingClient, Negotiator, PeerConfig, PeerLink, WebRtcNegotiator,
};
