//! Peer connection to the realtime endpoint.
//!
//! A [`Negotiator`] performs the credential fetch and SDP offer/answer
//! exchange and hands back a [`Connection`]. The controller only ever sees
//! the connection's [`DataChannel`] and its stream of [`ChannelEvent`]s; the
//! peer connection and media senders stay behind [`PeerLink`] until
//! [`Connection::disconnect`] tears them down.

mod credential;
mod peer;
mod signaling;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::base::RealtimeResult;

pub use credential::{CredentialProvider, EphemeralCredential, HttpCredentialProvider};
pub use peer::{
    AudioSink, AudioSource, DrainingAudioSink, OpusTrackSource, PeerConfig, WebRtcNegotiator,
};
pub use signaling::{HttpSignalingClient, SignalingClient};

/// Capacity of the channel-event queue between the transport and the session.
pub const CHANNEL_EVENT_CAPACITY: usize = 256;

/// Readiness of a data channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Something that happened on the data channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Open,
    Message(String),
    Close,
}

/// Sender half handed to the transport's channel callbacks.
pub type ChannelEventSender = mpsc::Sender<ChannelEvent>;
/// Receiver half consumed by the session's event pump.
pub type ChannelEventReceiver = mpsc::Receiver<ChannelEvent>;

/// The data channel carrying protocol events.
#[async_trait]
pub trait DataChannel: Send + Sync {
    fn label(&self) -> &str;

    fn state(&self) -> ChannelState;

    /// Transmit one text message.
    async fn send_text(&self, payload: &str) -> RealtimeResult<()>;

    async fn close(&self) -> RealtimeResult<()>;
}

/// Everything on the connection besides the data channel.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Stop every local media sender.
    async fn stop_senders(&self) -> RealtimeResult<()>;

    /// Close the peer connection itself.
    async fn close(&self) -> RealtimeResult<()>;
}

/// Establishes connections. Invoked once per session start.
#[async_trait]
pub trait Negotiator: Send + Sync {
    async fn connect(&self) -> RealtimeResult<Connection>;
}

/// A negotiated connection: one data channel plus the peer it lives on.
pub struct Connection {
    channel: Arc<dyn DataChannel>,
    peer: Arc<dyn PeerLink>,
    events: Option<ChannelEventReceiver>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("label", &self.channel.label())
            .field("state", &self.channel.state())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl Connection {
    pub fn new(
        channel: Arc<dyn DataChannel>,
        peer: Arc<dyn PeerLink>,
        events: ChannelEventReceiver,
    ) -> Self {
        Self {
            channel,
            peer,
            events: Some(events),
            closed: AtomicBool::new(false),
        }
    }

    pub fn channel(&self) -> Arc<dyn DataChannel> {
        self.channel.clone()
    }

    /// Take the channel-event stream. Only the first call returns it.
    pub fn take_events(&mut self) -> Option<ChannelEventReceiver> {
        self.events.take()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the data channel, stop the media senders, then close the peer.
    ///
    /// Idempotent. A failing step is logged and does not skip the later ones.
    pub async fn disconnect(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Connection already disconnected");
            return;
        }
        if let Err(e) = self.channel.close().await {
            warn!("Failed to close data channel: {}", e);
        }
        if let Err(e) = self.peer.stop_senders().await {
            warn!("Failed to stop media senders: {}", e);
        }
        if let Err(e) = self.peer.close().await {
            warn!("Failed to close peer connection: {}", e);
        }
        debug!("Connection disconnected");
    }
}
