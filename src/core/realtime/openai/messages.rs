//! Realtime data-channel event payloads.
//!
//! Every message on the `oai-events` data channel is a JSON object with a
//! `type` tag. The kinds this crate acts on are modelled as variants of
//! [`EventPayload`]; everything else (audio/text deltas, transcription events,
//! rate-limit updates, ...) is carried through untouched as
//! [`EventPayload::Unknown`] so it can still be logged and re-serialized.
//!
//! # Protocol Overview
//!
//! Client events used by the session bootstrap and tool dispatch:
//! - session.update - Advertise tools and the tool-choice policy
//! - conversation.item.create - Persona instruction, user text, function-call output
//! - response.create - Ask the model to (re)start generating
//! - response.cancel - Cancel the current response
//!
//! Server events with typed bodies:
//! - session.created / session.updated - Session snapshot (kept as raw JSON)
//! - response.done - Finished response, including any `function_call` output items
//! - error - Error reported by the remote endpoint

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role used for the persona instruction injected during bootstrap.
pub const ROLE_SYSTEM: &str = "system";

/// Role used for text typed by the local user.
pub const ROLE_USER: &str = "user";

/// Conversation item type of a model-issued tool call.
pub const ITEM_FUNCTION_CALL: &str = "function_call";

/// Conversation item type of a tool result sent back to the model.
pub const ITEM_FUNCTION_CALL_OUTPUT: &str = "function_call_output";

/// Suffix shared by every incremental/streaming event type.
pub const DELTA_SUFFIX: &str = "delta";

// =============================================================================
// Session Configuration
// =============================================================================

/// Session fields sent with `session.update`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Tool definitions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,

    /// Tool choice strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,

    /// Temperature for response generation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Turn detection, audio formats and any other session field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tool definition as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// Tool type (always "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Function description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Function parameters JSON schema
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
///
/// Fields the crate does not interpret are kept in `extra` so server items
/// survive a decode/encode cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Item ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Item type (message, function_call, function_call_output)
    #[serde(rename = "type")]
    pub item_type: String,
    /// Item status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Item role (user, assistant, system)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    /// Call ID for function call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Function name for function call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Function arguments for function call (JSON text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Function output for function call result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationItem {
    /// A message item with a single `input_text` part.
    pub fn text_message(role: &str, text: impl Into<String>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some(role.to_string()),
            content: Some(vec![ContentPart::input_text(text)]),
            ..Default::default()
        }
    }

    /// A tool result correlated to the call that requested it.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: ITEM_FUNCTION_CALL_OUTPUT.to_string(),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn is_function_call(&self) -> bool {
        self.item_type == ITEM_FUNCTION_CALL
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Content type (input_text, input_audio, text, audio)
    #[serde(rename = "type")]
    pub content_type: String,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Transcript of audio content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentPart {
    pub fn input_text(text: impl Into<String>) -> Self {
        Self {
            content_type: "input_text".to_string(),
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Responses and Errors
// =============================================================================

/// Response configuration for `response.create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Response modalities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// Per-response instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Finished response as carried by `response.done`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub output: Vec<ConversationItem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error details from an `error` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Id of the client event that caused the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Event Payload
// =============================================================================

/// Body of a protocol event, keyed by its `type` tag.
///
/// `event_id` and the local `timestamp` live on
/// [`ProtocolEvent`](crate::core::realtime::ProtocolEvent), not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        session: SessionConfig,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Create a conversation item
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        item: ConversationItem,
        /// Previous item ID to insert after
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Cancel the current response
    #[serde(rename = "response.cancel")]
    ResponseCancel {
        /// Response to cancel; the in-progress one when absent
        #[serde(skip_serializing_if = "Option::is_none")]
        response_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Error reported by the remote endpoint
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated { session: Value },

    #[serde(rename = "session.updated")]
    SessionUpdated { session: Value },

    /// Response complete
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseInfo },

    /// Any other event kind, kept verbatim
    #[serde(skip)]
    Unknown {
        kind: String,
        fields: Map<String, Value>,
    },
}

impl EventPayload {
    /// Type tags that decode into a typed variant.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "session.update",
        "conversation.item.create",
        "response.create",
        "response.cancel",
        "error",
        "session.created",
        "session.updated",
        "response.done",
    ];

    /// The `type` tag of this payload.
    pub fn kind(&self) -> &str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate { .. } => "response.create",
            Self::ResponseCancel { .. } => "response.cancel",
            Self::Error { .. } => "error",
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::ResponseDone { .. } => "response.done",
            Self::Unknown { kind, .. } => kind,
        }
    }

    pub fn is_known_type(kind: &str) -> bool {
        Self::KNOWN_TYPES.contains(&kind)
    }

    /// Tool registration with the given tool-selection policy.
    pub fn session_update(tools: Vec<ToolDef>, tool_choice: &str) -> Self {
        Self::SessionUpdate {
            session: SessionConfig {
                tools: Some(tools),
                tool_choice: Some(tool_choice.to_string()),
                ..Default::default()
            },
            extra: Map::new(),
        }
    }

    /// A `conversation.item.create` carrying one text message.
    pub fn text_message(role: &str, text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::text_message(role, text),
            previous_item_id: None,
            extra: Map::new(),
        }
    }

    /// A `conversation.item.create` carrying a tool result.
    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem::function_call_output(call_id, output),
            previous_item_id: None,
            extra: Map::new(),
        }
    }

    /// A bodiless `response.create`.
    pub fn response_create() -> Self {
        Self::ResponseCreate {
            response: None,
            extra: Map::new(),
        }
    }

    /// Cancel whatever response is in progress.
    pub fn response_cancel() -> Self {
        Self::ResponseCancel {
            response_id: None,
            extra: Map::new(),
        }
    }

    /// Serialize to a JSON object including the `type` tag.
    pub fn to_json_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        if let Self::Unknown { kind, fields } = self {
            let mut map = fields.clone();
            map.insert("type".to_string(), Value::String(kind.clone()));
            return Ok(map);
        }
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "event payload serialized to a non-object: {other}"
            ))),
        }
    }
}
