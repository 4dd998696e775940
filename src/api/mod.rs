//! HTTP client for the devochat backend.
//!
//! Session authentication is cookie based, so one [`BackendClient`] keeps a
//! cookie store for its lifetime. Every non-success status is mapped through
//! [`ClientError::from_status`]: 401 becomes `AuthExpired`, 404 `NotFound`.
//!
//! # Example
//!
//! ```no_run
//! use devochat::api::BackendClient;
//! use devochat::config::BackendConfig;
//!
//! # async fn example() -> devochat::error::Result<()> {
//! let client = BackendClient::new(&BackendConfig::default())?;
//! if client.auth_status().await?.logged_in {
//!     for conv in client.conversations().await? {
//!         println!("{}", conv.alias);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod types;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::config::BackendConfig;
use crate::error::{ClientError, Result};
use crate::model::ModelCatalog;
use crate::observability::redact::{RedactedString, redact_all};
use crate::state::conversations::Conversation;

pub use types::*;

/// Client for every backend endpoint.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendClient {
    /// Build a client for `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path such as `/conversations`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, method: reqwest::Method, path: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let span = crate::api_request_span!(method, path);
        async move {
            let response = request.send().await?;
            let response = check_status(response).await;
            match &response {
                Ok(r) => tracing::debug!(status = r.status().as_u16(), "backend request ok"),
                Err(e) => tracing::debug!(code = e.code(), detail = %redact_all(e.message()), "backend request failed"),
            }
            response
        }
        .instrument(span)
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.http.get(self.url(path)).timeout(self.timeout);
        let response = self.send(reqwest::Method::GET, path, request).await?;
        Ok(response.json().await?)
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.http.post(self.url(path)).timeout(self.timeout).json(body);
        let response = self.send(reqwest::Method::POST, path, request).await?;
        Ok(response.json().await?)
    }

    async fn put_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let request = self.http.put(self.url(path)).timeout(self.timeout).json(body);
        self.send(reqwest::Method::PUT, path, request).await?;
        Ok(())
    }

    async fn delete_unit(&self, path: &str) -> Result<()> {
        let request = self.http.delete(self.url(path)).timeout(self.timeout);
        self.send(reqwest::Method::DELETE, path, request).await?;
        Ok(())
    }

    // ── Auth ──────────────────────────────────────────────────

    /// `GET /auth/status`.
    pub async fn auth_status(&self) -> Result<AuthStatus> {
        self.get_json("/auth/status").await
    }

    /// `GET /auth/user`.
    pub async fn user_info(&self) -> Result<UserInfo> {
        self.get_json("/auth/user").await
    }

    /// `POST /login`; the session cookie is kept by this client.
    pub async fn login(&self, email: &str, password: &RedactedString) -> Result<()> {
        let body = LoginRequest {
            email,
            password: password.as_str(),
        };
        let request = self.http.post(self.url("/login")).timeout(self.timeout).json(&body);
        match self.send(reqwest::Method::POST, "/login", request).await {
            Ok(_) => {
                tracing::info!("logged in");
                Ok(())
            }
            // a rejected login is bad input, not an expired session
            Err(ClientError::AuthExpired(_)) => {
                Err(ClientError::Validation("invalid email or password".into()))
            }
            Err(e) => Err(e),
        }
    }

    /// `POST /register`.
    pub async fn register(&self, name: &str, email: &str, password: &RedactedString) -> Result<()> {
        let body = RegisterRequest {
            name,
            email,
            password: password.as_str(),
        };
        let request = self.http.post(self.url("/register")).timeout(self.timeout).json(&body);
        self.send(reqwest::Method::POST, "/register", request).await?;
        Ok(())
    }

    /// `POST /logout`.
    pub async fn logout(&self) -> Result<()> {
        let request = self
            .http
            .post(self.url("/logout"))
            .timeout(self.timeout)
            .json(&serde_json::json!({}));
        self.send(reqwest::Method::POST, "/logout", request).await?;
        Ok(())
    }

    // ── Conversations ─────────────────────────────────────────

    /// `GET /conversations`.
    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        let list: ConversationList = self.get_json("/conversations").await?;
        Ok(list.conversations)
    }

    /// `GET /conversation/{id}`.
    pub async fn conversation(&self, conversation_id: &str) -> Result<ConversationDetail> {
        self.get_json(&conversation_path(conversation_id, "")).await
    }

    /// `POST /new_conversation`.
    pub async fn new_conversation(&self, request: &NewConversationRequest<'_>) -> Result<NewConversation> {
        self.post_json("/new_conversation", request).await
    }

    /// `POST /image/new_conversation`.
    pub async fn new_image_conversation(&self) -> Result<NewConversation> {
        self.post_json("/image/new_conversation", &serde_json::json!({}))
            .await
    }

    /// `PUT /conversation/{id}/rename`.
    pub async fn rename_conversation(&self, conversation_id: &str, alias: &str) -> Result<()> {
        self.put_unit(&conversation_path(conversation_id, "/rename"), &RenameRequest { alias })
            .await
    }

    /// `PUT /conversation/{id}/star`.
    pub async fn star_conversation(&self, conversation_id: &str, starred: bool) -> Result<()> {
        self.put_unit(&conversation_path(conversation_id, "/star"), &StarRequest { starred })
            .await
    }

    /// `DELETE /conversation/{id}`.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        self.delete_unit(&conversation_path(conversation_id, "")).await
    }

    /// `DELETE /conversation/all`.
    pub async fn delete_all_conversations(&self) -> Result<()> {
        self.delete_unit("/conversation/all").await
    }

    /// `DELETE /conversation/{id}/{start_index}`: drop stored messages from `start_index` on.
    pub async fn delete_messages_from(&self, conversation_id: &str, start_index: usize) -> Result<()> {
        self.delete_unit(&conversation_path(conversation_id, &format!("/{start_index}")))
            .await
    }

    /// `POST /get_alias`.
    pub async fn generate_alias(&self, conversation_id: &str, text: &str) -> Result<Option<String>> {
        let response: AliasResponse = self
            .post_json("/get_alias", &AliasRequest { conversation_id, text })
            .await?;
        Ok(response.alias.filter(|a| !a.trim().is_empty()))
    }

    // ── Models ────────────────────────────────────────────────

    /// `GET /models`.
    pub async fn models(&self) -> Result<ModelCatalog> {
        self.get_json("/models").await
    }

    /// `GET /chat_models`.
    pub async fn chat_models(&self) -> Result<ModelCatalog> {
        self.get_json("/chat_models").await
    }

    /// `GET /image_models`.
    pub async fn image_models(&self) -> Result<ModelCatalog> {
        self.get_json("/image_models").await
    }

    /// `GET /realtime_models`.
    pub async fn realtime_models(&self) -> Result<ModelCatalog> {
        self.get_json("/realtime_models").await
    }

    // ── Chat and media ────────────────────────────────────────

    /// `POST /visit_url`: extracted page text, if the backend found any.
    pub async fn visit_url(&self, url: &str) -> Result<Option<String>> {
        let response: VisitUrlResponse = self.post_json("/visit_url", &VisitUrlRequest { url }).await?;
        Ok(response.content.filter(|c| !c.is_empty()))
    }

    /// POST a chat envelope to a model endpoint and return the unread
    /// streaming response. No overall timeout applies.
    pub async fn open_stream<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<reqwest::Response> {
        let request = self.http.post(self.url(endpoint)).json(body);
        self.send(reqwest::Method::POST, endpoint, request).await
    }

    /// POST an image prompt to an image model endpoint.
    pub async fn generate_image(&self, endpoint: &str, request: &ImageRequest<'_>) -> Result<ImageResponse> {
        let request = self.http.post(self.url(endpoint)).json(request);
        let response = self.send(reqwest::Method::POST, endpoint, request).await?;
        Ok(response.json().await?)
    }

    /// Upload one file as multipart field `file` to `/upload/image` or `/upload/file`.
    ///
    /// 422 is reported as `ClientError::Validation`; an `error` field in the
    /// reply as `ClientError::Upload`.
    pub async fn upload(&self, path: &str, file_name: &str, mime: &str, bytes: Vec<u8>) -> Result<UploadResponse> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .map_err(|e| ClientError::Upload(format!("invalid MIME type '{mime}': {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let request = self.http.post(self.url(path)).timeout(self.timeout).multipart(form);

        let span = crate::api_request_span!("POST", path);
        let response = request.send().instrument(span).await?;
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let detail = extract_error_message(&response.text().await.unwrap_or_default());
            return Err(ClientError::Validation(detail));
        }
        let response = check_status(response).await?;
        let body: UploadResponse = response.json().await?;
        if let Some(error) = &body.error {
            return Err(ClientError::Upload(error.clone()));
        }
        Ok(body)
    }

    /// `GET /session`: short-lived realtime credential.
    pub async fn realtime_credential(&self) -> Result<RedactedString> {
        let session: RealtimeSessionResponse = self.get_json("/session").await?;
        Ok(RedactedString::new(session.client_secret.value))
    }

    // ── Misc ──────────────────────────────────────────────────

    /// `GET /notice`.
    pub async fn notice(&self) -> Result<Notice> {
        self.get_json("/notice").await
    }

    /// `GET /mcp-servers`.
    pub async fn mcp_servers(&self) -> Result<Vec<McpServer>> {
        self.get_json("/mcp-servers").await
    }
}

fn conversation_path(conversation_id: &str, suffix: &str) -> String {
    format!("/conversation/{}{suffix}", urlencoding::encode(conversation_id))
}

/// Turn a non-success response into an error carrying the backend's detail.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::from_status(status, extract_error_message(&body)))
}

/// Pull `detail` (FastAPI), `error`, or `error.message` out of an error body.
pub(crate) fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };
    let detail = value.get("detail").or_else(|| value.get("error"));
    match detail {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Object(obj)) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| body.to_string()),
        Some(serde_json::Value::Array(_)) => "invalid input".to_string(),
        _ => body.to_string(),
    }
}
