//! Transcript messages and their content parts.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::markup;

/// Content the renderer skips: a lone zero-width space.
pub const INVISIBLE_CONTENT: &str = "\u{200B}";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Fresh message id of the form `msg_<unix_millis>_<9 base36 chars>`.
pub fn generate_message_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| char::from(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())]))
        .collect();
    format!("msg_{}_{suffix}", chrono::Utc::now().timestamp_millis())
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Client-side error notice shown inline.
    Error,
}

/// One typed part of a user (or image-generation) message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text {
        text: String,
    },
    /// `content` is a path relative to the backend base URL.
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        content: String,
    },
    /// `content` holds the extracted text of the uploaded file.
    File {
        name: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },
    /// Extracted text of a linked page.
    Url {
        content: String,
    },
}

impl ContentPart {
    /// A text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Display name of non-text parts.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Image { name, .. } => name.as_deref(),
            Self::File { name, .. } => Some(name),
            Self::Text { .. } | Self::Url { .. } => None,
        }
    }

    /// Whether this is a text part.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }

    /// Whether this is an image part.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// A message body: plain text (assistant / error) or typed parts (user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

fn complete_by_default() -> bool {
    true
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_message_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: MessageContent,
    /// False while an assistant message is still streaming. Stored
    /// messages carry no flag and load as complete.
    #[serde(default = "complete_by_default", rename = "isComplete")]
    pub is_complete: bool,
}

impl Message {
    /// A user turn.
    pub fn user(parts: Vec<ContentPart>) -> Self {
        Self {
            id: generate_message_id(),
            role: Role::User,
            content: MessageContent::Parts(parts),
            is_complete: true,
        }
    }

    /// An assistant turn with plain text.
    pub fn assistant(text: impl Into<String>, is_complete: bool) -> Self {
        Self {
            id: generate_message_id(),
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
            is_complete,
        }
    }

    /// An assistant turn made of parts (generated images).
    pub fn assistant_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            id: generate_message_id(),
            role: Role::Assistant,
            content: MessageContent::Parts(parts),
            is_complete: true,
        }
    }

    /// An inline error notice.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            id: generate_message_id(),
            role: Role::Error,
            content: MessageContent::Text(text.into()),
            is_complete: true,
        }
    }

    /// The text body: the string content, or the first text part.
    pub fn text(&self) -> &str {
        match &self.content {
            MessageContent::Text(t) => t,
            MessageContent::Parts(parts) => parts
                .iter()
                .find_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .unwrap_or(""),
        }
    }

    /// Every part that is not text.
    pub fn non_text_parts(&self) -> Vec<ContentPart> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) => {
                parts.iter().filter(|p| !p.is_text()).cloned().collect()
            }
        }
    }

    /// Whether the message carries an image part.
    pub fn has_image(&self) -> bool {
        matches!(&self.content, MessageContent::Parts(parts) if parts.iter().any(ContentPart::is_image))
    }

    /// Text placed on the clipboard by "copy".
    ///
    /// Parts are joined with spaces using each part's text or name; string
    /// content has its tool markers removed.
    pub fn copy_text(&self) -> String {
        match &self.content {
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.as_str(),
                    other => other.name().unwrap_or(""),
                })
                .collect::<Vec<_>>()
                .join(" "),
            MessageContent::Text(t) => markup::strip_tool_markers(t),
        }
    }

    /// False for content the transcript does not draw.
    pub fn is_renderable(&self) -> bool {
        match &self.content {
            MessageContent::Text(t) => t.trim() != INVISIBLE_CONTENT,
            MessageContent::Parts(parts) => !parts.is_empty(),
        }
    }
}
