//! Realtime voice sessions.
//!
//! The crate owns signaling, the session state machine, data-channel event
//! handling and amplitude analysis. Media capture and playback live behind
//! the [`peer`] traits.

pub mod events;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod visualizer;

pub use events::{ServerEvent, SessionUpdate, TranscriptState};
pub use peer::{AudioTrack, DataChannel, MediaEngine, PeerConnection, PeerEvent};
pub use session::{ConnectionState, RealtimeSession, RealtimeView};
pub use signaling::Signaling;
pub use visualizer::Visualizer;
