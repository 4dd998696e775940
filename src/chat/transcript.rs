//! Ordered transcript of one conversation.

use super::message::{Message, MessageContent, Role};

/// Messages plus the flags the composer shows while a request is running.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub messages: Vec<Message>,
    /// A request is in flight.
    pub is_loading: bool,
    /// Reasoning is expected and no text has arrived yet.
    pub is_thinking: bool,
    /// Transient notice (failed delete and similar).
    pub toast: Option<String>,
}

impl Transcript {
    /// Transcript restored from stored messages.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Transcript loaded from the backend: assistant messages are complete.
    pub fn restored(mut messages: Vec<Message>) -> Self {
        for message in messages.iter_mut().filter(|m| m.role == Role::Assistant) {
            message.is_complete = true;
        }
        Self::from_messages(messages)
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Write `text` into the trailing assistant message, creating it when
    /// the last message is not from the assistant.
    pub fn update_assistant(&mut self, text: &str, is_complete: bool) {
        self.is_thinking = false;
        if let Some(last) = self.messages.last_mut()
            && last.role == Role::Assistant
        {
            last.content = MessageContent::Text(text.to_string());
            last.is_complete = is_complete;
            return;
        }
        self.messages.push(Message::assistant(text, is_complete));
    }

    /// Append an inline error message.
    pub fn push_error(&mut self, text: impl Into<String>) {
        self.messages.push(Message::error(text));
    }

    /// Drop every message from `index` on.
    pub fn truncate(&mut self, index: usize) {
        self.messages.truncate(index);
    }

    /// Whether any message carries an image (switches the composer to vision mode).
    pub fn has_image(&self) -> bool {
        self.messages.iter().any(Message::has_image)
    }

    /// Messages the renderer draws, with their transcript index.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_renderable())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::ContentPart;

    #[test]
    fn update_assistant_appends_then_replaces() {
        let mut t = Transcript::default();
        t.push(Message::user(vec![ContentPart::text("hi")]));
        t.update_assistant("He", false);
        t.update_assistant("Hello", false);
        assert_eq!(t.len(), 2);
        assert_eq!(t.messages[1].text(), "Hello");
        assert!(!t.messages[1].is_complete);
        t.update_assistant("Hello", true);
        assert!(t.messages[1].is_complete);
    }

    #[test]
    fn update_after_error_starts_new_assistant_message() {
        let mut t = Transcript::default();
        t.push_error("boom");
        t.update_assistant("x", true);
        assert_eq!(t.len(), 2);
        assert_eq!(t.messages[1].role, Role::Assistant);
    }

    #[test]
    fn restored_marks_assistant_complete() {
        let t = Transcript::restored(vec![Message::assistant("partial", false)]);
        assert!(t.messages[0].is_complete);
    }

    #[test]
    fn truncate_and_visible() {
        let mut t = Transcript::default();
        t.push(Message::user(vec![ContentPart::text("a")]));
        t.push(Message::assistant("\u{200B}", true));
        t.push(Message::user(vec![ContentPart::text("b")]));
        assert_eq!(t.visible().map(|(i, _)| i).collect::<Vec<_>>(), vec![0, 2]);
        t.truncate(1);
        assert_eq!(t.len(), 1);
    }
}
