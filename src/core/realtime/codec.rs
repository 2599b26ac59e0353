//! Wire encoding for data-channel events.
//!
//! Outbound events always leave with an `event_id` and never with a
//! `timestamp`; the timestamp is a local annotation owned by whoever observed
//! the event. Decoding never invents a timestamp either.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

use super::base::{Direction, RealtimeError, RealtimeResult};
use super::openai::{DELTA_SUFFIX, EventPayload};
use crate::core::tools::ToolInvocation;

// =============================================================================
// Protocol Event
// =============================================================================

/// One event exchanged over the data channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolEvent {
    /// Client-generated for outbound events, server-assigned (`event_...`) for inbound
    pub event_id: Option<String>,
    pub payload: EventPayload,
    /// Local observation time; never transmitted
    pub timestamp: Option<OffsetDateTime>,
}

impl ProtocolEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            event_id: None,
            payload,
            timestamp: None,
        }
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// The `type` tag.
    pub fn event_type(&self) -> &str {
        self.payload.kind()
    }

    pub fn direction(&self) -> Direction {
        Direction::from_event_id(self.event_id.as_deref())
    }

    /// Whether this is an incremental/streaming update.
    pub fn is_delta(&self) -> bool {
        self.event_type().ends_with(DELTA_SUFFIX)
    }

    /// The wire representation: payload fields, `type` and `event_id`.
    /// `timestamp` is never included.
    pub fn to_wire_value(&self) -> RealtimeResult<Value> {
        let mut map = self
            .payload
            .to_json_map()
            .map_err(|e| RealtimeError::Serialization(e.to_string()))?;
        if let Some(event_id) = &self.event_id {
            map.insert("event_id".to_string(), Value::String(event_id.clone()));
        }
        Ok(Value::Object(map))
    }

    /// Tool calls requested by this event.
    ///
    /// Only a server `response.done` carries them: each output item of type
    /// `function_call` with both a name and a call id becomes one invocation.
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        let EventPayload::ResponseDone { response } = &self.payload else {
            return Vec::new();
        };
        response
            .output
            .iter()
            .filter(|item| item.is_function_call())
            .filter_map(|item| {
                Some(ToolInvocation {
                    call_id: item.call_id.clone()?,
                    name: item.name.clone()?,
                    arguments: item.arguments.clone().unwrap_or_default(),
                })
            })
            .collect()
    }
}

// =============================================================================
// Id Generation
// =============================================================================

/// Source of unique ids for outbound events.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random UUID v4 ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `{prefix}_{n}` ids, starting at 1.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// A prefix starting with `event_` is rewritten to `client_event_...`
    /// so generated ids never read as server-assigned.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if prefix.starts_with(super::base::SERVER_EVENT_ID_PREFIX) {
            prefix = format!("client_{prefix}");
        }
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}_{n}", self.prefix)
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Encodes and decodes [`ProtocolEvent`]s.
#[derive(Clone)]
pub struct EventCodec {
    ids: Arc<dyn IdGenerator>,
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new(Arc::new(UuidGenerator))
    }
}

impl std::fmt::Debug for EventCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCodec").finish_non_exhaustive()
    }
}

impl EventCodec {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Serialize `event` for the wire, assigning an `event_id` in place if it
    /// has none.
    pub fn encode(&self, event: &mut ProtocolEvent) -> RealtimeResult<String> {
        if event.event_id.is_none() {
            event.event_id = Some(self.ids.next_id());
        }
        let value = event.to_wire_value()?;
        serde_json::to_string(&value).map_err(|e| RealtimeError::Serialization(e.to_string()))
    }

    /// Parse one wire message.
    ///
    /// Fails with [`RealtimeError::MalformedEvent`] when the message is not a
    /// JSON object with a string `type`, or when a known type has an invalid
    /// body. Unknown types decode into [`EventPayload::Unknown`]. A
    /// `timestamp` that is not RFC 3339 is dropped rather than rejected.
    pub fn decode(&self, raw: &str) -> RealtimeResult<ProtocolEvent> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| RealtimeError::MalformedEvent(format!("invalid JSON: {e}")))?;
        let Value::Object(mut map) = value else {
            return Err(RealtimeError::MalformedEvent(
                "event is not a JSON object".to_string(),
            ));
        };

        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => {
                return Err(RealtimeError::MalformedEvent(
                    "event type is not a string".to_string(),
                ));
            }
            None => {
                return Err(RealtimeError::MalformedEvent(
                    "event has no type".to_string(),
                ));
            }
        };

        let event_id = match map.remove("event_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(_) => {
                return Err(RealtimeError::MalformedEvent(format!(
                    "{kind}: event_id is not a string"
                )));
            }
        };
        let timestamp = take_timestamp(&mut map, &kind);

        let payload = if EventPayload::is_known_type(&kind) {
            serde_json::from_value(Value::Object(map))
                .map_err(|e| RealtimeError::MalformedEvent(format!("{kind}: {e}")))?
        } else {
            map.remove("type");
            EventPayload::Unknown { kind, fields: map }
        };

        Ok(ProtocolEvent {
            event_id,
            payload,
            timestamp,
        })
    }
}

/// Remove a `timestamp` field, keeping it only if it is RFC 3339.
///
/// Any other value is treated as absent so the observer stamps the event
/// itself.
fn take_timestamp(map: &mut Map<String, Value>, kind: &str) -> Option<OffsetDateTime> {
    match map.remove("timestamp") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => match OffsetDateTime::parse(&s, &Rfc3339) {
            Ok(timestamp) => Some(timestamp),
            Err(e) => {
                debug!(event_type = %kind, timestamp = %s, "Ignoring unparseable timestamp: {}", e);
                None
            }
        },
        Some(other) => {
            debug!(event_type = %kind, timestamp = %other, "Ignoring non-string timestamp");
            None
        }
    }
}
