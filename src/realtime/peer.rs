//! Seams to the media engine.
//!
//! The session drives a peer connection through these traits; the host
//! (a browser binding, a native WebRTC stack, or a test double) implements
//! them and reports asynchronous happenings as [`PeerEvent`]s.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Label of the provider's event channel.
pub const EVENTS_CHANNEL: &str = "oai-events";

/// Something the media engine observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// The data channel is open and can carry messages.
    ChannelOpen,
    /// Text message on the data channel.
    ChannelMessage(String),
    /// The remote audio track arrived and playback started.
    RemoteTrack,
    /// Mono samples from either side, for the amplitude indicator.
    Samples(Vec<f32>),
    /// The connection failed or was closed by the remote side.
    Closed(String),
}

/// A local microphone track.
pub trait AudioTrack: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    fn stop(&self);
}

/// Outgoing half of a data channel.
#[async_trait]
pub trait DataChannel: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
}

/// One WebRTC peer connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: Arc<dyn AudioTrack>) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<Arc<dyn DataChannel>>;

    /// Create an offer, apply it as the local description and return its SDP.
    async fn create_offer(&self) -> Result<String>;

    async fn set_remote_answer(&self, sdp: &str) -> Result<()>;

    async fn close(&self);
}

/// Factory for connections and capture devices.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// New connection that reports to `events`.
    async fn create_peer(&self, events: mpsc::UnboundedSender<PeerEvent>) -> Result<Arc<dyn PeerConnection>>;

    /// Open the default microphone.
    async fn open_microphone(&self) -> Result<Arc<dyn AudioTrack>>;
}
