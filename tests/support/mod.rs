//! Shared fakes for the integration tests.
//!
//! A [`FakeNegotiator`] hands out connections built from a [`FakeChannel`] and
//! a [`RecordingPeer`]; the test drives the channel through the returned
//! [`ChannelDriver`].

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use ambit_realtime::core::realtime::transport::{ChannelEvent, ChannelState, DataChannel, PeerLink};
use ambit_realtime::core::realtime::{
    Connection, EventCodec, Negotiator, RealtimeError, RealtimeResult, SequentialIdGenerator,
    SessionController,
};
use ambit_realtime::core::tools::{
    ToolDefinition, ToolError, ToolHandler, ToolOutput, ToolRegistry, ToolResult,
};

// =============================================================================
// Transport fakes
// =============================================================================

/// In-memory data channel recording every transmitted payload.
pub struct FakeChannel {
    state: Mutex<ChannelState>,
    sent: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState::Connecting),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
    }

    /// Raw payloads in transmission order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Parsed payloads in transmission order.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("sent payload is JSON"))
            .collect()
    }

    pub fn sent_types(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl DataChannel for FakeChannel {
    fn label(&self) -> &str {
        "oai-events"
    }

    fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    async fn send_text(&self, payload: &str) -> RealtimeResult<()> {
        if *self.state.lock() != ChannelState::Open {
            return Err(RealtimeError::Transport("channel is not open".into()));
        }
        self.sent.lock().push(payload.to_string());
        Ok(())
    }

    async fn close(&self) -> RealtimeResult<()> {
        *self.state.lock() = ChannelState::Closed;
        Ok(())
    }
}

/// Peer link that records teardown steps.
#[derive(Default)]
pub struct RecordingPeer {
    steps: Mutex<Vec<&'static str>>,
}

impl RecordingPeer {
    pub fn steps(&self) -> Vec<&'static str> {
        self.steps.lock().clone()
    }
}

#[async_trait]
impl PeerLink for RecordingPeer {
    async fn stop_senders(&self) -> RealtimeResult<()> {
        self.steps.lock().push("stop_senders");
        Ok(())
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.steps.lock().push("close");
        Ok(())
    }
}

/// Test-side handle on one negotiated connection.
pub struct ChannelDriver {
    pub channel: Arc<FakeChannel>,
    pub peer: Arc<RecordingPeer>,
    pub events: mpsc::Sender<ChannelEvent>,
}

impl ChannelDriver {
    /// Mark the channel ready and deliver the open event.
    pub async fn open(&self) {
        self.channel.set_state(ChannelState::Open);
        self.events
            .send(ChannelEvent::Open)
            .await
            .expect("session pump is running");
    }

    /// Deliver one inbound server message.
    pub async fn receive(&self, message: Value) {
        self.receive_raw(message.to_string()).await;
    }

    pub async fn receive_raw(&self, raw: impl Into<String>) {
        self.events
            .send(ChannelEvent::Message(raw.into()))
            .await
            .expect("session pump is running");
    }

    /// Simulate the remote side closing the channel.
    pub async fn remote_close(&self) {
        self.channel.set_state(ChannelState::Closed);
        let _ = self.events.send(ChannelEvent::Close).await;
    }
}

/// Negotiator handing out queued connections.
///
/// With [`FakeNegotiator::gated`] every `connect()` waits for
/// [`FakeNegotiator::release`] before returning.
#[derive(Default)]
pub struct FakeNegotiator {
    queue: Mutex<VecDeque<RealtimeResult<Connection>>>,
    gate: Option<Arc<Notify>>,
    pub attempts: Mutex<u32>,
}

impl FakeNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::default()
        }
    }

    /// Queue a connection and return its driver.
    pub fn push_connection(&self) -> ChannelDriver {
        let channel = Arc::new(FakeChannel::new());
        let peer = Arc::new(RecordingPeer::default());
        let (tx, rx) = mpsc::channel(64);
        let connection = Connection::new(channel.clone(), peer.clone(), rx);
        self.queue.lock().push_back(Ok(connection));
        ChannelDriver {
            channel,
            peer,
            events: tx,
        }
    }

    /// Queue a negotiation failure.
    pub fn push_failure(&self, error: RealtimeError) {
        self.queue.lock().push_back(Err(error));
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl Negotiator for FakeNegotiator {
    async fn connect(&self) -> RealtimeResult<Connection> {
        *self.attempts.lock() += 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RealtimeError::Negotiation("no connection queued".into())))
    }
}

// =============================================================================
// Tool fakes
// =============================================================================

/// Echoes its `text` argument.
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("echo", "Repeat the given text").with_parameters(json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
        }))
    }

    async fn call(&self, arguments: Value) -> ToolResult<ToolOutput> {
        let text = arguments["text"].as_str().unwrap_or_default();
        Ok(ToolOutput::Text(text.to_string()))
    }
}

/// Always fails with a backend error.
pub struct BrokenTool;

#[async_trait]
impl ToolHandler for BrokenTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("broken", "Never works")
    }

    async fn call(&self, _arguments: Value) -> ToolResult<ToolOutput> {
        Err(ToolError::Backend("vision service down".into()))
    }
}

/// Suspends until released, then returns `"done"`.
pub struct SlowTool(pub Arc<Notify>);

#[async_trait]
impl ToolHandler for SlowTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slow", "Takes its time")
    }

    async fn call(&self, _arguments: Value) -> ToolResult<ToolOutput> {
        self.0.notified().await;
        Ok(ToolOutput::Text("done".into()))
    }
}

pub fn test_registry(slow_gate: Arc<Notify>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool)).expect("unique name");
    registry.register(Arc::new(BrokenTool)).expect("unique name");
    registry
        .register(Arc::new(SlowTool(slow_gate)))
        .expect("unique name");
    Arc::new(registry)
}

/// Controller with deterministic `evt_{n}` ids and the test tools.
pub fn controller(negotiator: Arc<FakeNegotiator>, slow_gate: Arc<Notify>) -> SessionController {
    SessionController::builder(negotiator)
        .codec(EventCodec::new(Arc::new(SequentialIdGenerator::new("evt"))))
        .tools(test_registry(slow_gate))
        .instructions("You are Ambit.")
        .build()
}

// =============================================================================
// Server event builders
// =============================================================================

/// `response.done` carrying one function call.
pub fn function_call_done(event_id: &str, call_id: &str, name: &str, arguments: &str) -> Value {
    json!({
        "type": "response.done",
        "event_id": event_id,
        "response": {
            "id": "resp_1",
            "status": "completed",
            "output": [{
                "type": "function_call",
                "call_id": call_id,
                "name": name,
                "arguments": arguments,
            }],
        },
    })
}

pub fn text_delta(event_id: &str, delta: &str) -> Value {
    json!({
        "type": "response.text.delta",
        "event_id": event_id,
        "delta": delta,
    })
}

// =============================================================================
// Waiting
// =============================================================================

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
