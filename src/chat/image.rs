//! Image generation turns.
//!
//! The prompt parts are posted as `{model, prompt}` to the image model's
//! endpoint; the reply's `content` path is joined to the backend origin and
//! shown as an assistant image.

use tokio_util::sync::CancellationToken;

use super::message::{ContentPart, Message};
use super::pipeline::{EMPTY_MESSAGE, StreamGuard};
use super::transcript::Transcript;
use crate::api::{BackendClient, ImageRequest, ImageResponse};
use crate::error::{ClientError, ErrorKind, Result};
use crate::model::ModelDescriptor;
use crate::state::Store;

const GENERATION_FAILED: &str = "Image generation failed.";

/// How an image request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    /// An image was appended.
    Generated,
    Cancelled,
    /// An error message was appended.
    Failed(String),
}

/// One image conversation (`/image/:id`).
#[derive(Debug)]
pub struct ImageSession {
    conversation_id: String,
    client: BackendClient,
    transcript: Store<Transcript>,
    guard: StreamGuard,
}

impl ImageSession {
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

    pub fn transcript(&self) -> &Store<Transcript> {
        &self.transcript
    }

    /// Abort the pending request.
    pub fn stop(&self) -> bool {
        self.guard.cancel()
    }

    /// Ask `model` for an image described by `text` and any reference images.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank prompt, `AuthExpired` on 401. Other failures
    /// are appended to the transcript.
    pub async fn send(
        &self,
        model: &ModelDescriptor,
        text: &str,
        files: Vec<ContentPart>,
    ) -> Result<ImageOutcome> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation(EMPTY_MESSAGE.into()));
        }
        let mut prompt = vec![ContentPart::text(text)];
        prompt.extend(files);

        let (generation, token) = self.guard.begin();
        let user = Message::user(prompt.clone());
        self.apply(generation, |t| {
            t.push(user);
            t.is_loading = true;
        });

        let result = self.request(model, &prompt, &token).await;
        let outcome = match result {
            Ok(Some(response)) => self.apply_response(generation, response),
            Ok(None) => ImageOutcome::Cancelled,
            Err(e) if e.kind() == ErrorKind::AuthExpired => {
                self.settle(generation);
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(model = %model.model_name, error = %e, "image generation failed");
                let message = format!("{GENERATION_FAILED} {}", e.message());
                let text = message.clone();
                if !self.apply(generation, |t| t.push_error(text)) {
                    return Ok(ImageOutcome::Cancelled);
                }
                ImageOutcome::Failed(message)
            }
        };
        self.settle(generation);
        Ok(outcome)
    }

    async fn request(
        &self,
        model: &ModelDescriptor,
        prompt: &[ContentPart],
        token: &CancellationToken,
    ) -> Result<Option<ImageResponse>> {
        let body = ImageRequest {
            model: &model.model_name,
            prompt,
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Ok(None),
            response = self.client.generate_image(&model.endpoint, &body) => response.map(Some),
        }
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

    fn apply_response(&self, generation: u64, response: ImageResponse) -> ImageOutcome {
        let Some(path) = response.content.filter(|c| !c.is_empty()) else {
            if !self.apply(generation, |t| t.push_error(GENERATION_FAILED)) {
                return ImageOutcome::Cancelled;
            }
            return ImageOutcome::Failed(GENERATION_FAILED.into());
        };
        let image = ContentPart::Image {
            name: response.name,
            content: format!("{}{path}", self.client.base_url()),
        };
        if !self.apply(generation, |t| t.push(Message::assistant_parts(vec![image]))) {
            return ImageOutcome::Cancelled;
        }
        ImageOutcome::Generated
    }

    fn settle(&self, generation: u64) {
        self.apply(generation, |t| t.is_loading = false);
        self.guard.finish(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn session() -> ImageSession {
        let client = match BackendClient::new(&BackendConfig {
            base_url: "http://backend.test".into(),
            ..BackendConfig::default()
        }) {
            Ok(c) => c,
            Err(e) => unreachable!("client: {e}"),
        };
        ImageSession::new(client, "img-1")
    }

    #[test]
    fn content_path_is_prefixed_with_origin() {
        let s = session();
        let (g, _token) = s.guard.begin();
        let outcome = s.apply_response(g, ImageResponse {
            content: Some("/images/a.png".into()),
            name: Some("a.png".into()),
        });
        assert_eq!(outcome, ImageOutcome::Generated);
        let part = s
            .transcript()
            .read(|t| t.messages.last().map(|m| m.non_text_parts()));
        match part.as_deref() {
            Some([ContentPart::Image { content, name }]) => {
                assert_eq!(content, "http://backend.test/images/a.png");
                assert_eq!(name.as_deref(), Some("a.png"));
            }
            other => unreachable!("unexpected parts: {other:?}"),
        }
    }

    #[test]
    fn missing_content_is_an_error_message() {
        let s = session();
        let (g, _token) = s.guard.begin();
        let outcome = s.apply_response(g, ImageResponse::default());
        assert!(matches!(outcome, ImageOutcome::Failed(_)));
        assert_eq!(
            s.transcript().read(|t| t.messages.last().map(|m| m.role)),
            Some(crate::chat::Role::Error)
        );
    }

    #[test]
    fn superseded_reply_is_dropped() {
        let s = session();
        let (old, _old_token) = s.guard.begin();
        let _ = s.guard.begin();
        let outcome = s.apply_response(old, ImageResponse {
            content: Some("/images/late.png".into()),
            name: None,
        });
        assert_eq!(outcome, ImageOutcome::Cancelled);
        assert!(s.transcript().read(|t| t.is_empty()));
    }
}
