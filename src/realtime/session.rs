//! Realtime voice session lifecycle.
//!
//! ```text
//! connect
//!   GET /session ─► credential
//!   engine.create_peer, open_microphone, add_track
//!   create_data_channel("oai-events")
//!   create_offer ─► POST <provider>?model=… ─► set_remote_answer
//!   spawn event loop ─► view updates (captions, bars)
//! close / drop
//!   cancel loop, stop microphone, close peer
//! ```
//!
//! Any failure after the peer exists tears everything down before the
//! error is returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::events::{Followup, ServerEvent, SessionUpdate, TranscriptState};
use super::peer::{AudioTrack, DataChannel, EVENTS_CHANNEL, MediaEngine, PeerConnection, PeerEvent};
use super::signaling::Signaling;
use super::visualizer::{BAR_COUNT, MIN_HEIGHT, Visualizer};
use crate::api::BackendClient;
use crate::config::RealtimeConfig;
use crate::error::{ClientError, Result};
use crate::state::Store;

const MICROPHONE_DENIED: &str = "Please allow microphone access.";

/// Connection phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Closed,
    /// The remote side dropped the connection.
    Failed(String),
}

/// What the realtime screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeView {
    pub state: ConnectionState,
    pub mic_enabled: bool,
    pub transcript: String,
    pub model_speaking: bool,
    pub bars: [f32; BAR_COUNT],
}

impl Default for RealtimeView {
    fn default() -> Self {
        Self {
            state: ConnectionState::Connecting,
            mic_enabled: true,
            transcript: String::new(),
            model_speaking: false,
            bars: [MIN_HEIGHT; BAR_COUNT],
        }
    }
}

/// A connected voice session. Dropping it cancels the event loop and stops
/// the microphone; call [`close`](Self::close) to also close the peer.
pub struct RealtimeSession {
    view: Arc<Store<RealtimeView>>,
    peer: Arc<dyn PeerConnection>,
    microphone: Arc<dyn AudioTrack>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RealtimeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSession")
            .field("view", &self.view.get())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RealtimeSession {
    /// Establish a session.
    ///
    /// # Errors
    ///
    /// `AuthExpired` when the credential fetch answers 401; `Realtime` for
    /// microphone, signaling or engine failures.
    pub async fn connect(
        client: &BackendClient,
        engine: &dyn MediaEngine,
        signaling: &Signaling,
        config: &RealtimeConfig,
    ) -> Result<Self> {
        let span = crate::realtime_connect_span!(config.model);
        async {
            let credential = client.realtime_credential().await?;

            let (tx, rx) = mpsc::unbounded_channel();
            let peer = engine.create_peer(tx).await?;
            let view = Arc::new(Store::new(RealtimeView::default()));
            let microphone = match engine.open_microphone().await {
                Ok(track) => track,
                Err(e) => {
                    tracing::warn!(error = %e, "microphone unavailable");
                    peer.close().await;
                    return Err(ClientError::Realtime(MICROPHONE_DENIED.into()));
                }
            };

            let setup = async {
                peer.add_track(Arc::clone(&microphone)).await?;
                let channel = peer.create_data_channel(EVENTS_CHANNEL).await?;
                let offer = peer.create_offer().await?;
                let answer = signaling.exchange(&offer, &credential).await?;
                peer.set_remote_answer(&answer).await?;
                Ok::<_, ClientError>(channel)
            };
            let channel = match setup.await {
                Ok(channel) => channel,
                Err(e) => {
                    microphone.stop();
                    peer.close().await;
                    return Err(e);
                }
            };

            let cancel = CancellationToken::new();
            let event_loop = EventLoop {
                events: rx,
                channel,
                view: Arc::clone(&view),
                instructions: config.instructions.clone(),
                linger: Duration::from_secs(config.transcript_linger_secs),
            };
            let task = tokio::spawn(event_loop.run(cancel.clone()).in_current_span());
            view.update(|v| v.state = ConnectionState::Connected);
            tracing::info!("realtime session connected");

            Ok(Self {
                view,
                peer,
                microphone,
                cancel,
                task: Mutex::new(Some(task)),
                closed: AtomicBool::new(false),
            })
        }
        .instrument(span)
        .await
    }

    /// Observable screen state.
    pub fn view(&self) -> &Store<RealtimeView> {
        &self.view
    }

    /// Mute or unmute the microphone track. Returns the new enabled state.
    pub fn toggle_mic(&self) -> bool {
        let enabled = !self.microphone.is_enabled();
        self.microphone.set_enabled(enabled);
        self.view.update(|v| v.mic_enabled = enabled);
        enabled
    }

    /// Tear down every resource. Safe to call more than once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::debug!(error = %e, "realtime event loop ended abnormally");
        }
        self.microphone.stop();
        self.peer.close().await;
        self.view.update(|v| v.state = ConnectionState::Closed);
        tracing::info!("realtime session closed");
    }
}

impl Drop for RealtimeSession {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.cancel.cancel();
            self.microphone.stop();
        }
    }
}

struct EventLoop {
    events: mpsc::UnboundedReceiver<PeerEvent>,
    channel: Arc<dyn DataChannel>,
    view: Arc<Store<RealtimeView>>,
    instructions: String,
    linger: Duration,
}

impl EventLoop {
    async fn run(mut self, cancel: CancellationToken) {
        let mut visualizer = Visualizer::new();
        let mut captions = TranscriptState::default();
        let mut clear_at: Option<Instant> = None;

        loop {
            let deadline = clear_at;
            let clear = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                () = cancel.cancelled() => break,
                () = clear => {
                    clear_at = None;
                    captions.transcript.clear();
                    self.view.update(|v| v.transcript.clear());
                }
                event = self.events.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        PeerEvent::ChannelOpen => self.send_session_update().await,
                        PeerEvent::ChannelMessage(text) => {
                            if self.handle_message(&text, &mut captions) == Followup::ClearLater {
                                clear_at = Some(Instant::now() + self.linger);
                            }
                        }
                        PeerEvent::RemoteTrack => tracing::debug!("remote audio track started"),
                        PeerEvent::Samples(samples) => {
                            visualizer.push_samples(&samples);
                            let bars = visualizer.bars();
                            self.view.update_if(|v| {
                                let changed = v.bars != bars;
                                v.bars = bars;
                                changed
                            });
                        }
                        PeerEvent::Closed(reason) => {
                            tracing::warn!(reason = %reason, "peer connection closed");
                            self.view.update(|v| v.state = ConnectionState::Failed(reason));
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn send_session_update(&self) {
        let message = match serde_json::to_string(&SessionUpdate::new(self.instructions.clone())) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode session.update");
                return;
            }
        };
        if let Err(e) = self.channel.send_text(&message).await {
            tracing::warn!(error = %e, "failed to send session.update");
        }
    }

    fn handle_message(&self, text: &str, captions: &mut TranscriptState) -> Followup {
        let event = match ServerEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable realtime event");
                return Followup::None;
            }
        };
        let followup = captions.apply(&event);
        let (transcript, speaking) = (captions.transcript.clone(), captions.model_speaking);
        self.view.update_if(|v| {
            let changed = v.transcript != transcript || v.model_speaking != speaking;
            v.transcript = transcript;
            v.model_speaking = speaking;
            changed
        });
        followup
    }
}
