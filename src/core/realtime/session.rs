//! Session lifecycle: negotiation, bootstrap, outbound sends, inbound pump.
//!
//! A [`SessionController`] owns at most one live session at a time. Each
//! `start()` bumps a generation counter; tool results and channel events that
//! belong to an older generation are discarded instead of leaking into the
//! current session.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::base::{Direction, RealtimeError, RealtimeResult, SessionState};
use super::codec::{EventCodec, ProtocolEvent};
use super::event_log::{DEFAULT_LOG_CAPACITY, EventLog, LogEntry, LogEntryView};
use super::openai::{EventPayload, OpenAIRealtimeVoice, ROLE_SYSTEM, ROLE_USER, TOOL_CHOICE_AUTO};
use super::transport::{ChannelEvent, ChannelEventReceiver, ChannelState, Connection, Negotiator};
use crate::core::persona;
use crate::core::tools::{ToolDefinition, ToolDispatcher, ToolInvocation, ToolRegistry};

#[derive(Debug, Default)]
struct Session {
    generation: u64,
    state: SessionState,
    connection: Option<Arc<Connection>>,
    pump: Option<JoinHandle<()>>,
    /// Call ids already handed to the dispatcher in this generation
    dispatched: HashSet<String>,
}

struct Inner {
    negotiator: Arc<dyn Negotiator>,
    codec: EventCodec,
    dispatcher: ToolDispatcher,
    instructions: String,
    voice: Option<OpenAIRealtimeVoice>,
    session: Mutex<Session>,
    log: RwLock<EventLog>,
    /// Serializes every outbound send
    outbound: tokio::sync::Mutex<()>,
    processed: AtomicU64,
    state_tx: watch::Sender<SessionState>,
}

/// Drives one realtime session at a time. Cheap to clone.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state())
            .field("tools", &self.inner.dispatcher.registry().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

pub struct SessionControllerBuilder {
    negotiator: Arc<dyn Negotiator>,
    registry: Arc<ToolRegistry>,
    codec: EventCodec,
    instructions: String,
    voice: Option<OpenAIRealtimeVoice>,
    log_capacity: usize,
}

impl SessionControllerBuilder {
    pub fn tools(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn codec(mut self, codec: EventCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Persona text sent as the system message during bootstrap.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn voice(mut self, voice: Option<OpenAIRealtimeVoice>) -> Self {
        self.voice = voice;
        self
    }

    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn build(self) -> SessionController {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        SessionController {
            inner: Arc::new(Inner {
                negotiator: self.negotiator,
                codec: self.codec,
                dispatcher: ToolDispatcher::new(self.registry),
                instructions: self.instructions,
                voice: self.voice,
                session: Mutex::new(Session::default()),
                log: RwLock::new(EventLog::with_capacity(self.log_capacity)),
                outbound: tokio::sync::Mutex::new(()),
                processed: AtomicU64::new(0),
                state_tx,
            }),
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

impl SessionController {
    pub fn builder(negotiator: Arc<dyn Negotiator>) -> SessionControllerBuilder {
        SessionControllerBuilder {
            negotiator,
            registry: Arc::new(ToolRegistry::new()),
            codec: EventCodec::default(),
            instructions: persona::SYSTEM_PROMPT.trim().to_string(),
            voice: None,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }

    /// Negotiate a new session.
    ///
    /// Returns once the connection is negotiated; the session turns Active
    /// (and bootstraps) when the data channel opens.
    pub async fn start(&self) -> RealtimeResult<()> {
        let inner = &self.inner;
        let generation = {
            let mut session = inner.session.lock();
            match session.state {
                SessionState::Connecting => return Err(RealtimeError::AlreadyStarting),
                SessionState::Active | SessionState::Closing => {
                    return Err(RealtimeError::AlreadyActive);
                }
                SessionState::Idle | SessionState::Closed => {}
            }
            session.generation += 1;
            session.dispatched.clear();
            inner.set_state(&mut session, SessionState::Connecting);
            session.generation
        };
        info!("Starting realtime session (generation {})", generation);

        let mut connection = match inner.negotiator.connect().await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to start realtime session: {}", e);
                let mut session = inner.session.lock();
                if session.generation == generation && session.state == SessionState::Connecting {
                    inner.set_state(&mut session, SessionState::Closed);
                }
                return Err(e);
            }
        };

        let Some(events) = connection.take_events() else {
            connection.disconnect().await;
            let mut session = inner.session.lock();
            if session.generation == generation && session.state == SessionState::Connecting {
                inner.set_state(&mut session, SessionState::Closed);
            }
            return Err(RealtimeError::Negotiation(
                "connection has no event stream".to_string(),
            ));
        };
        let connection = Arc::new(connection);

        {
            let mut session = inner.session.lock();
            if session.generation == generation && session.state == SessionState::Connecting {
                session.connection = Some(connection.clone());
                session.pump = Some(tokio::spawn(Inner::pump(
                    self.inner.clone(),
                    generation,
                    events,
                )));
                debug!("Negotiated, waiting for data channel to open");
                return Ok(());
            }
        }

        info!("Session stopped during negotiation, discarding connection");
        connection.disconnect().await;
        Err(RealtimeError::Cancelled)
    }

    /// Tear down the current session. No-op when nothing is running.
    ///
    /// In-flight tool handlers are not awaited; their results are discarded.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let (generation, connection, pump) = {
            let mut session = inner.session.lock();
            match session.state {
                SessionState::Idle | SessionState::Closed | SessionState::Closing => {
                    debug!("stop() with no running session ({})", session.state);
                    return;
                }
                SessionState::Connecting | SessionState::Active => {}
            }
            inner.set_state(&mut session, SessionState::Closing);
            (
                session.generation,
                session.connection.take(),
                session.pump.take(),
            )
        };

        if let Some(pump) = pump {
            pump.abort();
        }
        if let Some(connection) = connection {
            connection.disconnect().await;
        }

        let mut session = inner.session.lock();
        if session.generation == generation && session.state == SessionState::Closing {
            inner.set_state(&mut session, SessionState::Closed);
        }
        info!("Realtime session stopped (generation {})", generation);
    }

    /// Send one client event. Returns the assigned `event_id`.
    ///
    /// Fails with [`RealtimeError::ChannelNotOpen`] unless the session is
    /// Active and the channel open; nothing is transmitted or logged then.
    pub async fn send(&self, event: ProtocolEvent) -> RealtimeResult<String> {
        let _outbound = self.inner.outbound.lock().await;
        self.inner.send_locked(None, event).await
    }

    /// Send a user text message followed by a response request.
    ///
    /// The second send is attempted even if the first fails; the first error
    /// is returned.
    pub async fn send_text(&self, text: &str) -> RealtimeResult<()> {
        let message = self
            .send(ProtocolEvent::new(EventPayload::text_message(ROLE_USER, text)))
            .await;
        let response = self
            .send(ProtocolEvent::new(EventPayload::response_create()))
            .await;
        message.and(response).map(|_| ())
    }

    /// Decode a caller-supplied client event and send it.
    pub async fn send_raw(&self, raw: &str) -> RealtimeResult<String> {
        let mut event = self.inner.codec.decode(raw)?;
        // A server-style id would make the entry read as inbound.
        if event.direction() == Direction::Server {
            event.event_id = None;
        }
        event.timestamp = None;
        self.send(event).await
    }

    pub fn state(&self) -> SessionState {
        self.inner.session.lock().state
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Number of inbound events decoded and logged since creation.
    pub fn inbound_processed(&self) -> u64 {
        self.inner.processed.load(Ordering::Acquire)
    }

    /// Full log, most recent first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.log.read().entries().cloned().collect()
    }

    /// Log with delta thinning applied, most recent first.
    pub fn display_entries(&self) -> Vec<LogEntry> {
        self.inner.log.read().display().into_iter().cloned().collect()
    }

    /// Serializable log views for the observation surface.
    pub fn entry_views(&self, thinned: bool) -> Vec<LogEntryView> {
        let log = self.inner.log.read();
        if thinned {
            log.display().into_iter().map(LogEntry::to_view).collect()
        } else {
            log.entries().map(LogEntry::to_view).collect()
        }
    }

    pub fn tools(&self) -> &[ToolDefinition] {
        self.inner.dispatcher.registry().definitions()
    }
}

// =============================================================================
// Session actor
// =============================================================================

impl Inner {
    fn set_state(&self, session: &mut Session, state: SessionState) {
        if session.state != state {
            debug!("Session state {} -> {}", session.state, state);
            session.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn is_current(&self, generation: u64, state: SessionState) -> bool {
        let session = self.session.lock();
        session.generation == generation && session.state == state
    }

    /// Consume channel events for one generation until the channel closes.
    async fn pump(self: Arc<Self>, generation: u64, mut events: ChannelEventReceiver) {
        while let Some(event) = events.recv().await {
            match event {
                ChannelEvent::Open => self.on_open(generation).await,
                ChannelEvent::Message(raw) => self.on_message(generation, &raw),
                ChannelEvent::Close => break,
            }
        }
        self.teardown(generation).await;
    }

    async fn on_open(&self, generation: u64) {
        let _outbound = self.outbound.lock().await;
        {
            let mut session = self.session.lock();
            if session.generation != generation || session.state != SessionState::Connecting {
                debug!("Ignoring channel open for a stale session");
                return;
            }
            self.set_state(&mut session, SessionState::Active);
        }
        self.log.write().clear();
        info!("Realtime session active (generation {})", generation);

        for event in self.bootstrap_events() {
            let kind = event.event_type().to_string();
            if let Err(e) = self.send_locked(Some(generation), event).await {
                warn!("Bootstrap send of {} failed: {}", kind, e);
            }
        }
    }

    /// Tool registration, persona message, initial response request.
    fn bootstrap_events(&self) -> [ProtocolEvent; 3] {
        let tools = self
            .dispatcher
            .registry()
            .definitions()
            .iter()
            .map(ToolDefinition::to_wire)
            .collect();
        let mut update = EventPayload::session_update(tools, TOOL_CHOICE_AUTO);
        if let (Some(voice), EventPayload::SessionUpdate { session, .. }) = (self.voice, &mut update) {
            session.voice = Some(voice.as_str().to_string());
        }
        [
            ProtocolEvent::new(update),
            ProtocolEvent::new(EventPayload::text_message(
                ROLE_SYSTEM,
                self.instructions.clone(),
            )),
            ProtocolEvent::new(EventPayload::response_create()),
        ]
    }

    fn on_message(self: &Arc<Self>, generation: u64, raw: &str) {
        let mut event = match self.codec.decode(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping inbound message: {}", e);
                return;
            }
        };
        let timestamp = *event.timestamp.get_or_insert_with(OffsetDateTime::now_utc);
        let invocations = event.tool_invocations();
        debug!("Received {}", event.event_type());

        self.processed.fetch_add(1, Ordering::AcqRel);
        self.log.write().append(event, timestamp);

        for invocation in invocations {
            let fresh = {
                let mut session = self.session.lock();
                session.generation == generation
                    && session.dispatched.insert(invocation.call_id.clone())
            };
            if !fresh {
                debug!("Skipping already dispatched call {}", invocation.call_id);
                continue;
            }
            let inner = self.clone();
            tokio::spawn(async move { inner.complete_tool(generation, invocation).await });
        }
    }

    async fn complete_tool(&self, generation: u64, invocation: ToolInvocation) {
        let outcome = self.dispatcher.dispatch(invocation).await;
        let call_id = outcome.call_id.clone();

        let _outbound = self.outbound.lock().await;
        if !self.is_current(generation, SessionState::Active) {
            debug!(
                "Discarding result of {} (call {}): session no longer active",
                outcome.name, call_id
            );
            return;
        }
        for event in outcome.into_events() {
            if let Err(e) = self.send_locked(Some(generation), event).await {
                warn!("Failed to send tool result for call {}: {}", call_id, e);
            }
        }
    }

    /// Remote side closed the channel.
    async fn teardown(&self, generation: u64) {
        let connection = {
            let mut session = self.session.lock();
            if session.generation != generation
                || matches!(session.state, SessionState::Closing | SessionState::Closed)
            {
                return;
            }
            self.set_state(&mut session, SessionState::Closing);
            session.pump.take();
            session.connection.take()
        };
        info!("Data channel closed, tearing down session");
        if let Some(connection) = connection {
            connection.disconnect().await;
        }
        let mut session = self.session.lock();
        if session.generation == generation && session.state == SessionState::Closing {
            self.set_state(&mut session, SessionState::Closed);
        }
    }

    /// Encode, transmit and log `event`. Caller holds the outbound lock.
    async fn send_locked(
        &self,
        generation: Option<u64>,
        mut event: ProtocolEvent,
    ) -> RealtimeResult<String> {
        let channel = {
            let session = self.session.lock();
            let current = generation.is_none_or(|g| g == session.generation);
            match (&session.connection, session.state) {
                (Some(connection), SessionState::Active) if current => Some(connection.channel()),
                _ => None,
            }
        };
        let Some(channel) = channel.filter(|c| c.state() == ChannelState::Open) else {
            warn!(
                "Dropping {}: data channel is not open",
                event.event_type()
            );
            return Err(RealtimeError::ChannelNotOpen);
        };

        let wire = self.codec.encode(&mut event)?;
        channel.send_text(&wire).await?;

        let timestamp = OffsetDateTime::now_utc();
        event.timestamp = Some(timestamp);
        let event_id = event.event_id.clone().unwrap_or_default();
        debug!("Sent {} ({})", event.event_type(), event_id);
        self.log.write().append(event, timestamp);
        Ok(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::codec::SequentialIdGenerator;
    use crate::core::realtime::transport::{DataChannel, PeerLink};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct MemoryChannel {
        open: std::sync::atomic::AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataChannel for MemoryChannel {
        fn label(&self) -> &str {
            "oai-events"
        }

        fn state(&self) -> ChannelState {
            if self.open.load(Ordering::SeqCst) {
                ChannelState::Open
            } else {
                ChannelState::Closed
            }
        }

        async fn send_text(&self, payload: &str) -> RealtimeResult<()> {
            self.sent.lock().push(payload.to_string());
            Ok(())
        }

        async fn close(&self) -> RealtimeResult<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NoopPeer;

    #[async_trait]
    impl PeerLink for NoopPeer {
        async fn stop_senders(&self) -> RealtimeResult<()> {
            Ok(())
        }

        async fn close(&self) -> RealtimeResult<()> {
            Ok(())
        }
    }

    /// Hands out one pre-built connection.
    struct OneShot(Mutex<Option<Connection>>);

    #[async_trait]
    impl Negotiator for OneShot {
        async fn connect(&self) -> RealtimeResult<Connection> {
            self.0
                .lock()
                .take()
                .ok_or_else(|| RealtimeError::Negotiation("no connection".into()))
        }
    }

    fn harness() -> (SessionController, Arc<MemoryChannel>, mpsc::Sender<ChannelEvent>) {
        let channel = Arc::new(MemoryChannel::default());
        let (tx, rx) = mpsc::channel(16);
        let connection = Connection::new(channel.clone(), Arc::new(NoopPeer), rx);
        let negotiator = Arc::new(OneShot(Mutex::new(Some(connection))));
        let controller = SessionController::builder(negotiator)
            .codec(EventCodec::new(Arc::new(SequentialIdGenerator::new("evt"))))
            .instructions("Be Ambit.")
            .build();
        (controller, channel, tx)
    }

    async fn open(
        controller: &SessionController,
        channel: &MemoryChannel,
        tx: &mpsc::Sender<ChannelEvent>,
    ) {
        let mut states = controller.subscribe_state();
        channel.open.store(true, Ordering::SeqCst);
        tx.send(ChannelEvent::Open).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SessionState::Active),
        )
        .await
        .unwrap()
        .unwrap();
        // Bootstrap runs under the outbound lock; taking it waits for it.
        drop(controller.inner.outbound.lock().await);
    }

    #[tokio::test]
    async fn test_start_then_open_bootstraps_in_order() {
        let (controller, channel, tx) = harness();
        controller.start().await.unwrap();
        assert_eq!(controller.state(), SessionState::Connecting);

        open(&controller, &channel, &tx).await;

        let sent = channel.sent.lock().clone();
        let kinds: Vec<String> = sent
            .iter()
            .map(|raw| {
                let value: serde_json::Value = serde_json::from_str(raw).unwrap();
                value["type"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["session.update", "conversation.item.create", "response.create"]
        );
        assert!(sent[1].contains("Be Ambit."));
        assert!(sent.iter().all(|raw| !raw.contains("timestamp")));
        assert!(controller.entries().iter().all(|e| e.event.timestamp.is_some()));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (controller, channel, tx) = harness();
        controller.start().await.unwrap();
        assert!(matches!(
            controller.start().await,
            Err(RealtimeError::AlreadyStarting)
        ));
        open(&controller, &channel, &tx).await;
        assert!(matches!(
            controller.start().await,
            Err(RealtimeError::AlreadyActive)
        ));
    }

    #[tokio::test]
    async fn test_send_before_open_is_dropped() {
        let (controller, channel, _tx) = harness();
        controller.start().await.unwrap();

        let result = controller
            .send(ProtocolEvent::new(EventPayload::response_create()))
            .await;
        assert!(matches!(result, Err(RealtimeError::ChannelNotOpen)));
        assert!(channel.sent.lock().is_empty());
        assert!(controller.entries().is_empty());
    }

    #[tokio::test]
    async fn test_send_raw_assigns_client_id() {
        let (controller, channel, tx) = harness();
        controller.start().await.unwrap();
        open(&controller, &channel, &tx).await;

        let id = controller
            .send_raw(r#"{"type":"response.cancel","event_id":"event_forged"}"#)
            .await
            .unwrap();
        assert_eq!(id, "evt_4");
        assert_eq!(controller.entries()[0].direction, Direction::Client);
    }

    #[tokio::test]
    async fn test_remote_close_ends_session() {
        let (controller, channel, tx) = harness();
        controller.start().await.unwrap();
        open(&controller, &channel, &tx).await;

        let mut states = controller.subscribe_state();
        tx.send(ChannelEvent::Close).await.unwrap();
        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| *s == SessionState::Closed),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!channel.open.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let (controller, _channel, _tx) = harness();
        controller.stop().await;
        assert_eq!(controller.state(), SessionState::Idle);
    }
}
