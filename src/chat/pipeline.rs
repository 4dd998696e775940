//! Streaming chat turns for one conversation.
//!
//! A send posts the [`ChatRequest`] envelope to the active model's endpoint
//! and folds the `data:` frames of the reply into the transcript:
//!
//! ```text
//! send("hello")
//!   ├─ push user message, is_loading = true
//!   ├─ resolve link previews (POST /visit_url)
//!   ├─ POST <endpoint>            401 → Err(AuthExpired)
//!   └─ for each frame
//!        content → update trailing assistant message
//!        error   → push error message, stop
//!        bad JSON→ push error message, stop
//!      end of body → mark assistant message complete
//! ```
//!
//! Only one stream per conversation is live. Starting a send cancels the
//! previous one and bumps the generation counter held by [`StreamGuard`];
//! transcript writes from a stale generation are dropped.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::frame::{FrameDecoder, FrameEvent};
use super::message::{ContentPart, Message, MessageContent};
use super::request::ChatRequest;
use super::transcript::Transcript;
use super::urls::{detect_urls, normalize_url};
use crate::api::{BackendClient, ConversationDetail};
use crate::error::{ClientError, ErrorKind, Result};
use crate::state::{InitialSettings, SettingsState, Store};

/// Notice shown when the composer is empty.
pub const EMPTY_MESSAGE: &str = "Please enter a message.";
/// Notice shown when stored messages could not be deleted.
pub const DELETE_FAILED: &str = "Failed to delete messages.";
const INVALID_MODEL: &str = "the selected model is not valid";

/// How a send ended. Auth expiry and input validation are returned as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The body ended normally; the assistant message is complete.
    Completed,
    /// Stopped by the user; the partial assistant message is left as-is.
    Cancelled,
    /// A newer send on the same conversation took over.
    Superseded,
    /// The backend sent an `error` frame; one error message was appended.
    ServerError(String),
    /// Request, read or decode failure; one error message was appended.
    Failed(String),
}

/// Generation counter and cancellation handle of the live stream.
#[derive(Debug, Default)]
pub struct StreamGuard {
    generation: AtomicU64,
    active: Mutex<Option<(u64, CancellationToken)>>,
}

impl StreamGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is running and start a new generation.
    pub fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((previous, old)) = active.replace((generation, token.clone())) {
            tracing::debug!(previous, generation, "superseding in-flight stream");
            old.cancel();
        }
        (generation, token)
    }

    /// Whether `generation` is still the newest one.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Newest generation handed out.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel the live stream without starting a new one.
    pub fn cancel(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.as_ref() {
            Some((_, token)) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel the live stream and bump the generation so none of its
    /// pending writes land. Nothing new is registered.
    pub fn retire(&self) -> u64 {
        let (generation, _) = self.begin();
        self.finish(generation);
        generation
    }

    /// Release the handle if `generation` still owns it.
    pub fn finish(&self, generation: u64) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().is_some_and(|(g, _)| *g == generation) {
            *active = None;
        }
    }

    /// Whether a stream is registered and not cancelled.
    pub fn is_active(&self) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.as_ref().is_some_and(|(_, t)| !t.is_cancelled())
    }
}

/// One open conversation: its transcript and the stream feeding it.
#[derive(Debug)]
pub struct ChatSession {
    conversation_id: String,
    client: BackendClient,
    transcript: Store<Transcript>,
    guard: StreamGuard,
}

impl ChatSession {
    /// An empty session for `conversation_id`.
    pub fn new(client: BackendClient, conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            client,
            transcript: Store::default(),
            guard: StreamGuard::new(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Observable transcript.
    pub fn transcript(&self) -> &Store<Transcript> {
        &self.transcript
    }

    /// Whether a reply is currently streaming.
    pub fn is_streaming(&self) -> bool {
        self.guard.is_active()
    }

    /// Restore settings and transcript from `GET /conversation/{id}`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the conversation does not exist; `AuthExpired` on 401.
    pub async fn load(&self, settings: &Store<SettingsState>) -> Result<ConversationDetail> {
        let detail = self.client.conversation(&self.conversation_id).await?;
        settings.update(|s| apply_stored_settings(s, &detail));

        tracing::info!(
            conversation_id = %self.conversation_id,
            messages = detail.messages.len(),
            "conversation restored"
        );
        self.transcript.set(Transcript::restored(detail.messages.clone()));
        Ok(detail)
    }

    /// Send a user turn and stream the reply into the transcript.
    ///
    /// # Errors
    ///
    /// `Validation` for blank text (nothing is changed); `AuthExpired` when
    /// the backend answers 401. Every other failure is written into the
    /// transcript and reported through [`StreamOutcome`].
    pub async fn send(
        &self,
        text: &str,
        files: Vec<ContentPart>,
        settings: &SettingsState,
    ) -> Result<StreamOutcome> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation(EMPTY_MESSAGE.into()));
        }
        let mut parts = Vec::with_capacity(files.len() + 1);
        parts.push(ContentPart::text(text));
        parts.extend(files);

        let (generation, token) = self.guard.begin();
        let user = Message::user(parts.clone());
        self.apply(generation, |t| {
            t.push(user);
            t.is_loading = true;
        });

        let span = crate::chat_stream_span!(self.conversation_id, settings.model, generation);
        let result = async {
            parts.extend(self.link_previews(text).await?);
            self.stream_reply(generation, &token, parts, settings).await
        }
        .instrument(span)
        .await;

        self.apply(generation, |t| {
            t.is_loading = false;
            t.is_thinking = false;
        });
        self.guard.finish(generation);
        result
    }

    /// Take the pending toast, if any.
    pub fn take_toast(&self) -> Option<String> {
        let mut toast = None;
        self.transcript.update_if(|t| {
            toast = t.toast.take();
            toast.is_some()
        });
        toast
    }

    /// Stop the live stream. Returns `false` if nothing was streaming.
    pub fn stop(&self) -> bool {
        self.guard.cancel()
    }

    /// Truncate the transcript at `index` locally and on the backend.
    ///
    /// A live stream is retired first so it cannot write past the cut. The
    /// local truncation stands even if the backend call fails; the failure
    /// is recorded as a toast and returned.
    pub async fn delete_from(&self, index: usize) -> Result<()> {
        self.guard.retire();
        self.transcript.update(|t| {
            t.truncate(index);
            t.is_loading = false;
            t.is_thinking = false;
            t.toast = None;
        });
        if let Err(e) = self
            .client
            .delete_messages_from(&self.conversation_id, index)
            .await
        {
            tracing::warn!(conversation_id = %self.conversation_id, index, error = %e, "message delete failed");
            self.transcript.update(|t| t.toast = Some(DELETE_FAILED.into()));
            return Err(e);
        }
        Ok(())
    }

    /// Send `content` again, optionally truncating at `delete_index` first.
    /// The first text part becomes the message text; other parts are attached.
    pub async fn resend(
        &self,
        content: Vec<ContentPart>,
        delete_index: Option<usize>,
        settings: &SettingsState,
    ) -> Result<StreamOutcome> {
        if let Some(index) = delete_index
            && let Err(e) = self.delete_from(index).await
            && e.kind() == ErrorKind::AuthExpired
        {
            return Err(e);
        }
        let mut text = String::new();
        let mut attachments = Vec::new();
        for part in content {
            match part {
                ContentPart::Text { text: t } if text.is_empty() => text = t,
                ContentPart::Text { .. } => {}
                other => attachments.push(other),
            }
        }
        self.send(&text, attachments, settings).await
    }

    /// Replace the text of the user message at `index` and send it again,
    /// dropping everything after it.
    pub async fn edit(&self, index: usize, new_text: &str, settings: &SettingsState) -> Result<StreamOutcome> {
        if new_text.trim().is_empty() {
            return Err(ClientError::Validation(EMPTY_MESSAGE.into()));
        }
        let Some(message) = self.transcript.read(|t| t.messages.get(index).cloned()) else {
            return Err(ClientError::Validation(format!("no message at index {index}")));
        };
        let mut content = vec![ContentPart::text(new_text)];
        content.extend(message.non_text_parts());
        self.resend(content, Some(index), settings).await
    }

    /// Re-ask the user message that precedes the assistant message at
    /// `index`. Returns `None` when there is no preceding message.
    pub async fn regenerate(&self, index: usize, settings: &SettingsState) -> Result<Option<StreamOutcome>> {
        let Some(previous_index) = index.checked_sub(1) else {
            return Ok(None);
        };
        let Some(previous) = self.transcript.read(|t| t.messages.get(previous_index).cloned()) else {
            return Ok(None);
        };
        let content = match previous.content {
            MessageContent::Parts(parts) => parts,
            MessageContent::Text(text) => vec![ContentPart::text(text)],
        };
        self.resend(content, Some(previous_index), settings)
            .await
            .map(Some)
    }

    /// Apply `f` to the transcript unless `generation` has been superseded.
    fn apply(&self, generation: u64, f: impl FnOnce(&mut Transcript)) -> bool {
        self.transcript.update_if(|t| {
            if self.guard.is_current(generation) {
                f(t);
                true
            } else {
                false
            }
        })
    }

    fn fail(&self, generation: u64, message: String) -> StreamOutcome {
        let text = message.clone();
        self.apply(generation, |t| t.push_error(text));
        StreamOutcome::Failed(message)
    }

    fn interrupted(&self, generation: u64) -> StreamOutcome {
        if self.guard.is_current(generation) {
            tracing::info!("stream cancelled");
            StreamOutcome::Cancelled
        } else {
            StreamOutcome::Superseded
        }
    }

    async fn link_previews(&self, text: &str) -> Result<Vec<ContentPart>> {
        let urls: Vec<String> = detect_urls(text).into_iter().map(normalize_url).collect();
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let results =
            futures_util::future::join_all(urls.iter().map(|url| self.client.visit_url(url))).await;
        let mut parts = Vec::new();
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(Some(content)) => parts.push(ContentPart::Url { content }),
                Ok(None) => {}
                Err(e) if e.kind() == ErrorKind::AuthExpired => return Err(e),
                Err(e) => tracing::debug!(url, error = %e, "link preview failed"),
            }
        }
        Ok(parts)
    }

    async fn stream_reply(
        &self,
        generation: u64,
        token: &CancellationToken,
        parts: Vec<ContentPart>,
        settings: &SettingsState,
    ) -> Result<StreamOutcome> {
        let Some(model) = settings.catalog.find(&settings.model) else {
            return Ok(self.fail(generation, format!("Failed to send message: {INVALID_MODEL}")));
        };
        if settings.is_inference {
            self.apply(generation, |t| t.is_thinking = true);
        }

        let request = ChatRequest::new(&self.conversation_id, model, settings, parts);
        let response = tokio::select! {
            biased;
            () = token.cancelled() => return Ok(self.interrupted(generation)),
            response = self.client.open_stream(&model.endpoint, &request) => response,
        };
        let response = match response {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::AuthExpired => return Err(e),
            Err(e) => {
                return Ok(self.fail(generation, format!("Failed to send message: {}", e.message())));
            }
        };
        Ok(self.read_stream(generation, token, response.bytes_stream()).await)
    }

    /// Fold a response body into the transcript.
    pub(crate) async fn read_stream<S, E>(
        &self,
        generation: u64,
        token: &CancellationToken,
        stream: S,
    ) -> StreamOutcome
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: std::fmt::Display,
    {
        tokio::pin!(stream);
        let mut decoder = FrameDecoder::new();
        let mut text = String::new();
        let mut frames = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => return self.interrupted(generation),
                next = stream.next() => next,
            };
            let events = match next {
                Some(Ok(chunk)) => decoder.push(&chunk),
                Some(Err(e)) => return self.fail(generation, format!("Failed to send message: {e}")),
                None => {
                    if let Some(outcome) = self.apply_frames(generation, &mut text, decoder.finish()) {
                        return outcome;
                    }
                    if !self.apply(generation, |t| t.update_assistant(&text, true)) {
                        return StreamOutcome::Superseded;
                    }
                    tracing::info!(frames, chars = text.chars().count(), "stream completed");
                    return StreamOutcome::Completed;
                }
            };
            frames += events.len();
            if let Some(outcome) = self.apply_frames(generation, &mut text, events) {
                return outcome;
            }
        }
    }

    /// Returns an outcome when reading must stop.
    fn apply_frames(
        &self,
        generation: u64,
        text: &mut String,
        events: impl IntoIterator<Item = FrameEvent>,
    ) -> Option<StreamOutcome> {
        for event in events {
            match event {
                FrameEvent::Delta(delta) => {
                    text.push_str(&delta);
                    let snapshot = text.as_str();
                    if !self.apply(generation, |t| t.update_assistant(snapshot, false)) {
                        return Some(StreamOutcome::Superseded);
                    }
                }
                FrameEvent::ServerError(message) => {
                    tracing::warn!(error = %message, "backend reported stream error");
                    let notice = format!("Server error: {message}");
                    self.apply(generation, |t| t.push_error(notice));
                    return Some(StreamOutcome::ServerError(message));
                }
                FrameEvent::Malformed(detail) => {
                    tracing::warn!(error = %detail, "malformed stream frame");
                    return Some(self.fail(generation, format!("Streaming error: {detail}")));
                }
            }
        }
        None
    }
}

fn apply_stored_settings(settings: &mut SettingsState, detail: &ConversationDetail) {
    let initial = InitialSettings {
        is_inference: detail.inference,
        is_search: detail.search,
        is_deep_research: detail.deep_research,
    };
    settings.update_model(&detail.model, Some(&initial));
    settings.alias = detail.alias.clone();
    if let Some(t) = detail.temperature {
        settings.temperature = t;
    }
    if let Some(r) = detail.reason {
        settings.reason = r;
    }
    if let Some(v) = detail.verbosity {
        settings.verbosity = v;
    }
    settings.set_system_message(detail.system_message.clone());
    settings.is_dan = detail.dan && settings.can_control_system_message;
    settings.set_mcp_list(detail.mcp.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::Role;
    use crate::config::BackendConfig;

    fn session() -> ChatSession {
        let client = match BackendClient::new(&BackendConfig::default()) {
            Ok(c) => c,
            Err(e) => unreachable!("client: {e}"),
        };
        ChatSession::new(client, "conv-1")
    }

    type Body = futures_util::stream::Iter<std::vec::IntoIter<std::result::Result<Bytes, String>>>;

    fn chunks(parts: &[&str]) -> Body {
        let owned: Vec<std::result::Result<Bytes, String>> = parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect();
        futures_util::stream::iter(owned)
    }

    fn last_text(session: &ChatSession) -> String {
        session
            .transcript()
            .read(|t| t.messages.last().map(|m| m.text().to_string()))
            .unwrap_or_default()
    }

    #[test]
    fn guard_begin_cancels_previous() {
        let guard = StreamGuard::new();
        let (g1, t1) = guard.begin();
        let (g2, t2) = guard.begin();
        assert!(t1.is_cancelled());
        assert!(!t2.is_cancelled());
        assert!(!guard.is_current(g1));
        assert!(guard.is_current(g2));
        guard.finish(g1);
        assert!(guard.is_active());
        guard.finish(g2);
        assert!(!guard.is_active());
    }

    #[test]
    fn guard_retire_invalidates_live_stream() {
        let guard = StreamGuard::new();
        let (g, token) = guard.begin();
        let retired = guard.retire();
        assert!(token.is_cancelled());
        assert!(!guard.is_current(g));
        assert!(guard.is_current(retired));
        assert!(!guard.is_active());
    }

    #[test]
    fn guard_cancel_keeps_generation() {
        let guard = StreamGuard::new();
        let (g, token) = guard.begin();
        assert!(guard.cancel());
        assert!(token.is_cancelled());
        assert!(guard.is_current(g));
        assert!(!guard.cancel());
    }

    #[tokio::test]
    async fn content_frames_concatenate_in_order() {
        let s = session();
        let (g, token) = s.guard.begin();
        let body = chunks(&[
            "data: {\"content\": \"Hel\"}\n\nda",
            "ta: {\"content\": \"lo\"}\n",
            "\ndata: {\"content\": \"!\"}\n\n",
        ]);
        let outcome = s.read_stream(g, &token, body).await;
        assert_eq!(outcome, StreamOutcome::Completed);
        assert_eq!(last_text(&s), "Hello!");
        assert_eq!(
            s.transcript().read(|t| t.messages.last().map(|m| m.is_complete)),
            Some(true)
        );
    }

    #[tokio::test]
    async fn error_frame_stops_reading() {
        let s = session();
        let (g, token) = s.guard.begin();
        let body = chunks(&[
            "data: {\"content\": \"a\"}\n\ndata: {\"error\": \"quota\"}\n\ndata: {\"content\": \"b\"}\n\n",
        ]);
        let outcome = s.read_stream(g, &token, body).await;
        assert_eq!(outcome, StreamOutcome::ServerError("quota".into()));
        let roles: Vec<Role> = s.transcript().read(|t| t.messages.iter().map(|m| m.role).collect());
        assert_eq!(roles, vec![Role::Assistant, Role::Error]);
        assert_eq!(last_text(&s), "Server error: quota");
    }

    #[tokio::test]
    async fn malformed_frame_appends_one_error() {
        let s = session();
        let (g, token) = s.guard.begin();
        let outcome = s
            .read_stream(g, &token, chunks(&["data: {oops\n\ndata: {oops\n\n"]))
            .await;
        assert!(matches!(outcome, StreamOutcome::Failed(ref m) if m.starts_with("Streaming error")));
        let errors = s
            .transcript()
            .read(|t| t.messages.iter().filter(|m| m.role == Role::Error).count());
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn cancelled_stream_appends_nothing() {
        let s = session();
        let (g, token) = s.guard.begin();
        token.cancel();
        let outcome = s
            .read_stream(g, &token, chunks(&["data: {\"content\": \"x\"}\n\n"]))
            .await;
        assert_eq!(outcome, StreamOutcome::Cancelled);
        assert!(s.transcript().read(|t| t.is_empty()));
    }

    #[tokio::test]
    async fn superseded_stream_writes_nothing() {
        let s = session();
        let (old, old_token) = s.guard.begin();
        let _ = s.guard.begin();
        let outcome = s
            .read_stream(old, &old_token, chunks(&["data: {\"content\": \"x\"}\n\n"]))
            .await;
        assert_eq!(outcome, StreamOutcome::Superseded);
        assert!(s.transcript().read(|t| t.is_empty()));
    }

    #[tokio::test]
    async fn read_error_becomes_inline_message() {
        let s = session();
        let (g, token) = s.guard.begin();
        let body = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"content\": \"par\"}\n\n")),
            Err("connection reset".to_string()),
        ]);
        let outcome = s.read_stream(g, &token, body).await;
        assert!(matches!(outcome, StreamOutcome::Failed(ref m) if m.contains("connection reset")));
        assert_eq!(s.transcript().read(|t| t.len()), 2);
    }

    #[tokio::test]
    async fn blank_send_is_rejected_without_changes() {
        let s = session();
        let settings = SettingsState::new(Default::default(), &Default::default());
        match s.send("   ", Vec::new(), &settings).await {
            Err(ClientError::Validation(m)) => assert_eq!(m, EMPTY_MESSAGE),
            other => unreachable!("expected validation error, got {other:?}"),
        }
        assert!(s.transcript().read(|t| t.is_empty()));
    }
}
