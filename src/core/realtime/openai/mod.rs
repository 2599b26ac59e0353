//! OpenAI Realtime protocol definitions.
//!
//! The session talks to OpenAI's realtime model over WebRTC: audio travels on
//! a media track and JSON events on the `oai-events` data channel. This module
//! only holds the event shapes and endpoint constants; the transport lives in
//! [`crate::core::realtime::transport`].

mod config;
mod messages;

pub use config::{
    DATA_CHANNEL_LABEL, DEFAULT_REALTIME_MODEL, DEFAULT_STUN_SERVER, OPENAI_API_BASE,
    OPENAI_REALTIME_URL, OpenAIRealtimeVoice, SDP_CONTENT_TYPE, TOOL_CHOICE_AUTO, signaling_url,
};
pub use messages::{
    ApiError, ContentPart, ConversationItem, DELTA_SUFFIX, EventPayload, ITEM_FUNCTION_CALL,
    ITEM_FUNCTION_CALL_OUTPUT, InputAudioTranscription, ROLE_SYSTEM, ROLE_USER, ResponseConfig,
    ResponseInfo, SessionConfig, ToolDef,
};
