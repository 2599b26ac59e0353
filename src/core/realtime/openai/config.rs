//! Endpoint and session constants for the OpenAI Realtime WebRTC API.

use serde::{Deserialize, Serialize};

/// Base URL of the OpenAI REST API.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// WebRTC signaling endpoint; the SDP offer is POSTed here.
pub const OPENAI_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// Label of the data channel that carries protocol events.
pub const DATA_CHANNEL_LABEL: &str = "oai-events";

/// Tool-selection policy sent during bootstrap.
pub const TOOL_CHOICE_AUTO: &str = "auto";

/// Content type of the signaling request and response bodies.
pub const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Default STUN server used for ICE gathering.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "ash" => Some(Self::Ash),
            "ballad" => Some(Self::Ballad),
            "coral" => Some(Self::Coral),
            "echo" => Some(Self::Echo),
            "sage" => Some(Self::Sage),
            "shimmer" => Some(Self::Shimmer),
            "verse" => Some(Self::Verse),
            _ => None,
        }
    }

    /// Get all available voices.
    pub fn all() -> &'static [OpenAIRealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Signaling URL for a given model: `{base}?model={model}`.
pub fn signaling_url(base: &str, model: &str) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(base)?;
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}
