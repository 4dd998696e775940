//! Request and response bodies of the backend API.

use serde::{Deserialize, Deserializer, Serialize};

use crate::chat::message::{ContentPart, Message};
use crate::state::conversations::{Conversation, lenient_timestamp};

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `GET /auth/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub logged_in: bool,
}

/// `GET /auth/user`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub email: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub trial: bool,
}

/// `POST /login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

/// `GET /conversations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConversationList {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// `GET /conversation/{id}`: settings and transcript of one conversation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversationDetail {
    pub conversation_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub alias: String,
    #[serde(default, deserialize_with = "nullable")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub reason: Option<f64>,
    #[serde(default)]
    pub verbosity: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub system_message: String,
    #[serde(default, deserialize_with = "nullable")]
    pub messages: Vec<Message>,
    #[serde(default, deserialize_with = "nullable")]
    pub inference: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub search: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub deep_research: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub dan: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub mcp: Vec<String>,
}

/// `POST /new_conversation`.
#[derive(Debug, Clone, Serialize)]
pub struct NewConversationRequest<'a> {
    pub model: &'a str,
    pub temperature: f64,
    pub reason: f64,
    pub system_message: &'a str,
    pub user_message: &'a str,
}

/// Reply to `POST /new_conversation`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewConversation {
    pub conversation_id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub alias: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `PUT /conversation/{id}/rename`.
#[derive(Debug, Clone, Serialize)]
pub struct RenameRequest<'a> {
    pub alias: &'a str,
}

/// `PUT /conversation/{id}/star`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StarRequest {
    pub starred: bool,
}

/// `POST /get_alias`.
#[derive(Debug, Clone, Serialize)]
pub struct AliasRequest<'a> {
    pub conversation_id: &'a str,
    pub text: &'a str,
}

/// Reply to `POST /get_alias`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasResponse {
    #[serde(default)]
    pub alias: Option<String>,
}

/// `POST /visit_url`.
#[derive(Debug, Clone, Serialize)]
pub struct VisitUrlRequest<'a> {
    pub url: &'a str,
}

/// Reply to `POST /visit_url`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitUrlResponse {
    #[serde(default)]
    pub content: Option<String>,
}

/// Reply to `POST /upload/image` and `POST /upload/file`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Reply to `GET /session`.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeSessionResponse {
    pub client_secret: ClientSecret,
}

/// Short-lived realtime credential.
#[derive(Clone, Deserialize)]
pub struct ClientSecret {
    pub value: String,
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecret")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Body posted to an image model's endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a [ContentPart],
}

/// Reply from an image model's endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `GET /notice`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub message: Option<String>,
}

/// One entry of `GET /mcp-servers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct McpServer {
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,
    /// Only offered to admin users.
    #[serde(default)]
    pub admin: bool,
}

/// Servers a user may select.
pub fn available_mcp_servers<'a>(servers: &'a [McpServer], user: &UserInfo) -> Vec<&'a McpServer> {
    servers.iter().filter(|s| user.admin || !s.admin).collect()
}
