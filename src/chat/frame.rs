//! Decoding of chat stream frames into deltas and errors.

use serde::Deserialize;

use super::sse::{SseEvent, SseLineParser};

/// What one frame means for the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Text to append to the assistant message.
    Delta(String),
    /// The backend reported an error; reading stops.
    ServerError(String),
    /// The payload was not valid JSON; reading stops.
    Malformed(String),
}

impl FrameEvent {
    /// Whether reading must stop after this event.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Delta(_))
    }
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Decode one frame payload. Empty `content` and empty `error` are ignored.
pub fn decode_frame(data: &str) -> Option<FrameEvent> {
    let payload: FramePayload = match serde_json::from_str(data) {
        Ok(p) => p,
        Err(e) => return Some(FrameEvent::Malformed(e.to_string())),
    };
    if let Some(error) = payload.error {
        let message = match error {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null | serde_json::Value::Bool(false) => String::new(),
            other => other.to_string(),
        };
        if !message.is_empty() {
            return Some(FrameEvent::ServerError(message));
        }
    }
    payload
        .content
        .filter(|c| !c.is_empty())
        .map(FrameEvent::Delta)
}

/// Byte chunks in, [`FrameEvent`]s out.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    parser: SseLineParser,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every frame completed by `chunk`, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FrameEvent> {
        self.parser
            .push(chunk)
            .iter()
            .filter_map(Self::decode_event)
            .collect()
    }

    /// Decode a final frame that was not blank-line terminated.
    pub fn finish(&mut self) -> Option<FrameEvent> {
        self.parser.flush().as_ref().and_then(Self::decode_event)
    }

    fn decode_event(event: &SseEvent) -> Option<FrameEvent> {
        if event.is_done() {
            return None;
        }
        decode_frame(&event.data)
    }
}
