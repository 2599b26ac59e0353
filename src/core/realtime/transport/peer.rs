//! WebRTC negotiation against the realtime endpoint.
//!
//! The local side always makes the offer. ICE gathering completes before the
//! offer is posted since the signaling exchange carries no trickle candidates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use super::credential::CredentialProvider;
use super::signaling::SignalingClient;
use super::{
    CHANNEL_EVENT_CAPACITY, ChannelEvent, ChannelEventSender, ChannelState, Connection,
    DataChannel, Negotiator, PeerLink,
};
use crate::core::realtime::base::{RealtimeError, RealtimeResult};
use crate::core::realtime::openai::{DATA_CHANNEL_LABEL, DEFAULT_STUN_SERVER};

const DEFAULT_GATHERING_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Media
// =============================================================================

/// Provides the local audio track sent to the remote peer.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Acquire a track. Failure aborts negotiation with `MediaAccess`.
    async fn open(&self) -> RealtimeResult<Arc<dyn TrackLocal + Send + Sync>>;
}

/// Receives the remote audio track once it arrives.
pub trait AudioSink: Send + Sync {
    fn attach(&self, track: Arc<TrackRemote>);
}

/// A fresh Opus sample track per session. Samples are written by whoever
/// holds the track; nothing written means the peer hears silence.
#[derive(Debug, Clone)]
pub struct OpusTrackSource {
    stream_id: String,
}

impl Default for OpusTrackSource {
    fn default() -> Self {
        Self {
            stream_id: "ambit".to_string(),
        }
    }
}

impl OpusTrackSource {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

#[async_trait]
impl AudioSource for OpusTrackSource {
    async fn open(&self) -> RealtimeResult<Arc<dyn TrackLocal + Send + Sync>> {
        let track = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                ..Default::default()
            },
            "audio".to_owned(),
            self.stream_id.clone(),
        );
        Ok(Arc::new(track))
    }
}

/// Reads and discards remote RTP until the track ends.
#[derive(Debug, Default, Clone)]
pub struct DrainingAudioSink;

impl AudioSink for DrainingAudioSink {
    fn attach(&self, track: Arc<TrackRemote>) {
        tokio::spawn(async move {
            let mut packets: u64 = 0;
            while track.read_rtp().await.is_ok() {
                packets += 1;
            }
            debug!("Remote audio track ended after {} packets", packets);
        });
    }
}

// =============================================================================
// Negotiator
// =============================================================================

#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub data_channel_label: String,
    pub ice_servers: Vec<String>,
    /// Upper bound on ICE gathering; the offer is sent with whatever was gathered
    pub ice_gathering_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            data_channel_label: DATA_CHANNEL_LABEL.to_string(),
            ice_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            ice_gathering_timeout: DEFAULT_GATHERING_TIMEOUT,
        }
    }
}

/// Builds a WebRTC peer connection with one audio track and one data channel.
pub struct WebRtcNegotiator {
    credentials: Arc<dyn CredentialProvider>,
    signaling: Arc<dyn SignalingClient>,
    audio_source: Arc<dyn AudioSource>,
    audio_sink: Arc<dyn AudioSink>,
    config: PeerConfig,
}

impl WebRtcNegotiator {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        signaling: Arc<dyn SignalingClient>,
    ) -> Self {
        Self {
            credentials,
            signaling,
            audio_source: Arc::new(OpusTrackSource::default()),
            audio_sink: Arc::new(DrainingAudioSink),
            config: PeerConfig::default(),
        }
    }

    pub fn with_audio_source(mut self, source: Arc<dyn AudioSource>) -> Self {
        self.audio_source = source;
        self
    }

    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = sink;
        self
    }

    pub fn with_config(mut self, config: PeerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    async fn build_peer(&self) -> RealtimeResult<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(negotiation)?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(negotiation)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = self
            .config
            .ice_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = api
            .new_peer_connection(rtc_config)
            .await
            .map_err(negotiation)?;
        Ok(Arc::new(pc))
    }

    /// Everything after the peer exists. The caller closes the peer on error.
    async fn negotiate(
        &self,
        pc: &Arc<RTCPeerConnection>,
        track: Arc<dyn TrackLocal + Send + Sync>,
        credential: &super::EphemeralCredential,
        events: ChannelEventSender,
    ) -> RealtimeResult<Arc<RTCDataChannel>> {
        let sink = self.audio_sink.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let sink = sink.clone();
            Box::pin(async move {
                if track.kind() == RTPCodecType::Audio {
                    info!(
                        codec = %track.codec().capability.mime_type,
                        "Remote audio track received"
                    );
                    sink.attach(track);
                }
            })
        }));

        pc.add_track(track).await.map_err(|e| {
            RealtimeError::MediaAccess(format!("failed to attach local audio: {e}"))
        })?;

        let dc = pc
            .create_data_channel(&self.config.data_channel_label, None)
            .await
            .map_err(negotiation)?;
        wire_channel_events(&dc, events);

        let offer = pc.create_offer(None).await.map_err(negotiation)?;
        let mut gathering = pc.gathering_complete_promise().await;
        pc.set_local_description(offer).await.map_err(negotiation)?;

        if tokio::time::timeout(self.config.ice_gathering_timeout, gathering.recv())
            .await
            .is_err()
        {
            warn!(
                "ICE gathering did not complete within {:?}, sending partial offer",
                self.config.ice_gathering_timeout
            );
        }

        let local = pc.local_description().await.ok_or_else(|| {
            RealtimeError::Negotiation("local description missing after offer".to_string())
        })?;

        let answer_sdp = self.signaling.exchange(credential, &local.sdp).await?;
        let answer = RTCSessionDescription::answer(answer_sdp)
            .map_err(|e| RealtimeError::Negotiation(format!("invalid answer SDP: {e}")))?;
        pc.set_remote_description(answer)
            .await
            .map_err(|e| RealtimeError::Negotiation(format!("answer rejected: {e}")))?;

        Ok(dc)
    }
}

#[async_trait]
impl Negotiator for WebRtcNegotiator {
    async fn connect(&self) -> RealtimeResult<Connection> {
        let credential = self.credentials.fetch().await?;
        let track = self.audio_source.open().await?;
        let pc = self.build_peer().await?;

        let (tx, rx) = mpsc::channel(CHANNEL_EVENT_CAPACITY);
        match self.negotiate(&pc, track, &credential, tx).await {
            Ok(dc) => {
                info!(
                    "Negotiated peer connection with data channel '{}'",
                    dc.label()
                );
                Ok(Connection::new(
                    Arc::new(WebRtcDataChannel::new(dc)),
                    Arc::new(WebRtcPeer { pc }),
                    rx,
                ))
            }
            Err(e) => {
                warn!("Negotiation failed: {}", e);
                if let Err(close_err) = pc.close().await {
                    debug!("Failed to close abandoned peer: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

fn negotiation(e: webrtc::Error) -> RealtimeError {
    RealtimeError::Negotiation(e.to_string())
}

fn wire_channel_events(dc: &Arc<RTCDataChannel>, events: ChannelEventSender) {
    let tx = events.clone();
    dc.on_open(Box::new(move || {
        Box::pin(async move {
            debug!("Data channel open");
            let _ = tx.send(ChannelEvent::Open).await;
        })
    }));

    let tx = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx.clone();
        Box::pin(async move {
            if !msg.is_string {
                debug!("Ignoring binary data channel message ({} bytes)", msg.data.len());
                return;
            }
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => {
                    let _ = tx.send(ChannelEvent::Message(text)).await;
                }
                Err(e) => warn!("Dropping non-UTF-8 data channel message: {}", e),
            }
        })
    }));

    dc.on_close(Box::new(move || {
        let tx = events.clone();
        Box::pin(async move {
            debug!("Data channel closed");
            let _ = tx.send(ChannelEvent::Close).await;
        })
    }));
}

// =============================================================================
// Connection halves
// =============================================================================

struct WebRtcDataChannel {
    inner: Arc<RTCDataChannel>,
    label: String,
}

impl WebRtcDataChannel {
    fn new(inner: Arc<RTCDataChannel>) -> Self {
        let label = inner.label().to_string();
        Self { inner, label }
    }
}

impl From<RTCDataChannelState> for ChannelState {
    fn from(state: RTCDataChannelState) -> Self {
        match state {
            RTCDataChannelState::Open => ChannelState::Open,
            RTCDataChannelState::Closing => ChannelState::Closing,
            RTCDataChannelState::Closed => ChannelState::Closed,
            _ => ChannelState::Connecting,
        }
    }
}

#[async_trait]
impl DataChannel for WebRtcDataChannel {
    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> ChannelState {
        self.inner.ready_state().into()
    }

    async fn send_text(&self, payload: &str) -> RealtimeResult<()> {
        self.inner
            .send_text(payload.to_string())
            .await
            .map(|_| ())
            .map_err(|e| RealtimeError::Transport(e.to_string()))
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.inner
            .close()
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))
    }
}

/// Run `stop` on every item even when some fail, returning the first failure.
async fn stop_all<T, F, Fut, E>(items: Vec<T>, stop: F) -> RealtimeResult<()>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut first = None;
    for (index, item) in items.into_iter().enumerate() {
        if let Err(e) = stop(item).await {
            warn!("Failed to stop sender {}: {}", index, e);
            first.get_or_insert(RealtimeError::Transport(e.to_string()));
        }
    }
    first.map_or(Ok(()), Err)
}

struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerLink for WebRtcPeer {
    async fn stop_senders(&self) -> RealtimeResult<()> {
        let senders = self.pc.get_senders().await;
        stop_all(senders, |sender| async move { sender.stop().await }).await
    }

    async fn close(&self) -> RealtimeResult<()> {
        self.pc
            .close()
            .await
            .map_err(|e| RealtimeError::Transport(e.to_string()))
    }
}
