//! Data-channel events exchanged with the voice provider.

use serde::{Deserialize, Serialize};

/// Events the client reacts to. Anything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "response.created")]
    ResponseCreated,
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded,
    #[serde(rename = "response.audio_transcript.delta")]
    TranscriptDelta {
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.audio_transcript.done")]
    TranscriptDone {
        #[serde(default)]
        transcript: String,
    },
    #[serde(rename = "output_audio_buffer.stopped")]
    AudioStopped,
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Parse one data-channel message.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// `session.update` sent once the data channel opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "session.update")]
pub struct SessionUpdate {
    pub session: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSettings {
    pub instructions: String,
}

impl SessionUpdate {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            session: SessionSettings {
                instructions: instructions.into(),
            },
        }
    }
}

/// Caption and speaking indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptState {
    pub transcript: String,
    pub model_speaking: bool,
}

/// Follow-up the caller has to schedule after [`TranscriptState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    None,
    /// Clear the caption after the linger delay.
    ClearLater,
}

impl TranscriptState {
    pub fn apply(&mut self, event: &ServerEvent) -> Followup {
        match event {
            ServerEvent::ResponseCreated => self.transcript.clear(),
            ServerEvent::OutputItemAdded => self.model_speaking = true,
            ServerEvent::TranscriptDelta { delta } => self.transcript.push_str(delta),
            ServerEvent::TranscriptDone { transcript } => self.transcript = transcript.clone(),
            ServerEvent::AudioStopped => {
                self.model_speaking = false;
                return Followup::ClearLater;
            }
            ServerEvent::Other => {}
        }
        Followup::None
    }
}
