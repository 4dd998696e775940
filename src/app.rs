//! Application state and the flows that span several components.
//!
//! [`App`] owns the backend client and every observable store. Screens call
//! its methods; errors are routed through [`App::handle_error`], which turns
//! each [`ErrorKind`] into the matching user-visible reaction.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{BackendClient, McpServer, NewConversationRequest, UserInfo, available_mcp_servers};
use crate::chat::pipeline::EMPTY_MESSAGE;
use crate::chat::{ChatSession, ContentPart, ImageOutcome, ImageSession, StreamOutcome, Transcript};
use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorKind, Result};
use crate::model::ModelDescriptor;
use crate::observability::redact::RedactedString;
use crate::realtime::{MediaEngine, RealtimeSession, Signaling};
use crate::routing::{AuthState, Navigation, Route, expired_redirect, gate};
use crate::state::conversations::FALLBACK_ALIAS;
use crate::state::{Conversation, ConversationsState, SettingsState, Store};
use crate::upload::UploadQueue;

const NOT_FOUND_FLASH: &str = "Conversation not found.";
const LOAD_FAILED_FLASH: &str = "Failed to load the conversation.";
const START_FAILED: &str = "Failed to start a new conversation.";
const FETCH_FAILED: &str = "Failed to load conversations.";
const INVALID_MODEL: &str = "The selected model is not valid.";

/// Top-level client state.
#[derive(Debug)]
pub struct App {
    config: ClientConfig,
    client: BackendClient,
    signaling: Signaling,
    settings: Store<SettingsState>,
    conversations: Store<ConversationsState>,
    navigation: Store<Navigation>,
    auth: Store<AuthState>,
    user: Store<Option<UserInfo>>,
    notices: Store<Vec<String>>,
}

impl App {
    /// # Errors
    ///
    /// `ClientError::Config` when an HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = BackendClient::new(&config.backend)?;
        let signaling = Signaling::new(
            config.realtime.provider_url.clone(),
            config.realtime.model.clone(),
            Duration::from_secs(config.backend.request_timeout_secs),
        )?;
        let settings = SettingsState::new(Arc::default(), &config.chat);
        Ok(Self {
            config,
            client,
            signaling,
            settings: Store::new(settings),
            conversations: Store::default(),
            navigation: Store::new(Navigation::to(Route::Home)),
            auth: Store::default(),
            user: Store::default(),
            notices: Store::default(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn settings(&self) -> &Store<SettingsState> {
        &self.settings
    }

    pub fn conversations(&self) -> &Store<ConversationsState> {
        &self.conversations
    }

    pub fn navigation(&self) -> &Store<Navigation> {
        &self.navigation
    }

    pub fn auth(&self) -> AuthState {
        self.auth.get()
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.user.get()
    }

    /// Current route.
    pub fn route(&self) -> Route {
        self.navigation.read(|n| n.route.clone())
    }

    /// Go to `route` after login gating. Returns the route actually shown.
    pub fn navigate(&self, route: Route) -> Route {
        let shown = gate(route, self.auth.get());
        self.navigation.set(Navigation::to(shown.clone()));
        shown
    }

    fn navigate_home_with(&self, flash: impl Into<String>) {
        self.navigation.set(Navigation::with_flash(Route::Home, flash));
    }

    /// Queue a transient notice.
    pub fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        self.notices.update(|n| n.push(message));
    }

    /// Drain queued notices.
    pub fn take_notices(&self) -> Vec<String> {
        let mut taken = Vec::new();
        self.notices.update(|n| taken = std::mem::take(n));
        taken
    }

    /// React to an error the way its kind prescribes.
    pub fn handle_error(&self, error: &ClientError) {
        match error.kind() {
            ErrorKind::AuthExpired => {
                tracing::info!("session expired");
                self.auth.set(AuthState::default());
                self.user.set(None);
                if let Some(route) = expired_redirect(&self.route()) {
                    self.navigation.set(Navigation::to(route));
                }
            }
            ErrorKind::Validation | ErrorKind::Network => self.notify(error.message()),
            ErrorKind::NotFound => self.navigate_home_with(NOT_FOUND_FLASH),
        }
    }

    // ── Session ───────────────────────────────────────────────

    /// Check the session and, when signed in, load the user, the model
    /// catalog and the conversation list.
    pub async fn bootstrap(&self) -> AuthState {
        let logged_in = match self.client.auth_status().await {
            Ok(status) => status.logged_in,
            Err(e) => {
                tracing::debug!(error = %e, "auth status unavailable");
                false
            }
        };
        let mut auth = AuthState { logged_in, admin: false };
        if logged_in {
            match self.client.user_info().await {
                Ok(user) => {
                    auth.admin = user.admin;
                    self.user.set(Some(user));
                }
                Err(e) => tracing::warn!(error = %e, "failed to load user"),
            }
            if let Err(e) = self.load_models().await {
                tracing::warn!(error = %e, "failed to load models");
                self.notify(e.message());
            }
            self.auth.set(auth);
            self.fetch_conversations().await;
        } else {
            self.auth.set(auth);
        }
        tracing::info!(logged_in = auth.logged_in, admin = auth.admin, "session checked");
        auth
    }

    /// Sign in and bootstrap.
    pub async fn login(&self, email: &str, password: &RedactedString) -> Result<AuthState> {
        if let Err(e) = self.client.login(email, password).await {
            self.notify(e.message());
            return Err(e);
        }
        let auth = self.bootstrap().await;
        self.navigate(Route::Home);
        Ok(auth)
    }

    /// Create an account; the user signs in afterwards.
    pub async fn register(&self, name: &str, email: &str, password: &RedactedString) -> Result<()> {
        if let Err(e) = self.client.register(name, email, password).await {
            self.notify(e.message());
            return Err(e);
        }
        self.navigate(Route::Login { expired: false });
        Ok(())
    }

    /// Sign out and drop every piece of per-user state.
    pub async fn logout(&self) -> Result<()> {
        let result = self.client.logout().await;
        self.auth.set(AuthState::default());
        self.user.set(None);
        self.conversations.set(ConversationsState::default());
        self.navigate(Route::Login { expired: false });
        result
    }

    /// Replace the model catalog from `GET /models`.
    pub async fn load_models(&self) -> Result<()> {
        let catalog = Arc::new(self.client.models().await?);
        tracing::debug!(models = catalog.models.len(), "model catalog loaded");
        self.settings.update(|s| s.set_catalog(catalog));
        Ok(())
    }

    /// MCP servers the signed-in user may select.
    pub async fn mcp_servers(&self) -> Result<Vec<McpServer>> {
        let servers = self.client.mcp_servers().await?;
        let user = self.user.get().unwrap_or_default();
        Ok(available_mcp_servers(&servers, &user).into_iter().cloned().collect())
    }

    /// Text of the current notice, if any.
    pub async fn notice(&self) -> Option<String> {
        match self.client.notice().await {
            Ok(notice) => notice.message.filter(|m| !m.trim().is_empty()),
            Err(e) => {
                tracing::debug!(error = %e, "notice unavailable");
                None
            }
        }
    }

    // ── Conversations ─────────────────────────────────────────

    /// Reload the conversation list. Failures are kept in the store.
    pub async fn fetch_conversations(&self) {
        self.conversations.update(|c| c.is_loading = true);
        match self.client.conversations().await {
            Ok(list) => self.conversations.update(|c| {
                c.replace(list);
                c.is_loading = false;
            }),
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch conversations");
                if e.kind() == ErrorKind::AuthExpired {
                    self.handle_error(&e);
                }
                self.conversations.update(|c| {
                    c.error = Some(FETCH_FAILED.into());
                    c.is_loading = false;
                });
            }
        }
    }

    /// Create a conversation from the first message and stream the reply.
    ///
    /// The alias is requested alongside the reply; if that fails the
    /// conversation is named [`FALLBACK_ALIAS`].
    pub async fn start_conversation(
        &self,
        text: &str,
        files: Vec<ContentPart>,
    ) -> Result<(Arc<ChatSession>, StreamOutcome)> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation(EMPTY_MESSAGE.into()));
        }
        let settings = self.settings.get();
        if !settings.model_is_known() {
            self.notify(INVALID_MODEL);
            return Err(ClientError::Validation(INVALID_MODEL.into()));
        }

        let request = NewConversationRequest {
            model: &settings.model,
            temperature: settings.temperature,
            reason: settings.reason,
            system_message: &settings.system_message,
            user_message: text,
        };
        let created = match self.client.new_conversation(&request).await {
            Ok(created) => created,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create conversation");
                if e.kind() == ErrorKind::AuthExpired {
                    self.handle_error(&e);
                } else {
                    self.notify(START_FAILED);
                }
                return Err(e);
            }
        };

        let id = created.conversation_id.clone();
        let mut pending = Conversation::pending(&id, created.created_at);
        pending.alias = created.alias;
        self.conversations.update(|c| c.add(pending));
        self.navigate(Route::Chat(id.clone()));

        let session = Arc::new(ChatSession::new(self.client.clone(), &id));
        let (outcome, ()) = tokio::join!(
            session.send(text, files, &settings),
            self.name_conversation(&id, text)
        );
        match outcome {
            Ok(outcome) => Ok((session, outcome)),
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    async fn name_conversation(&self, conversation_id: &str, text: &str) {
        let alias = match self.client.generate_alias(conversation_id, text).await {
            Ok(Some(alias)) => alias,
            Ok(None) => FALLBACK_ALIAS.to_string(),
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "alias generation failed");
                if e.kind() == ErrorKind::AuthExpired {
                    self.handle_error(&e);
                }
                FALLBACK_ALIAS.to_string()
            }
        };
        self.conversations
            .update(|c| c.update(conversation_id, &alias, Some(false)));
    }

    /// Open a stored conversation and restore its settings.
    ///
    /// On failure the list is refreshed and the user is sent home with a
    /// flash message (or to login on 401).
    pub async fn open_conversation(&self, conversation_id: &str) -> Result<Arc<ChatSession>> {
        let session = Arc::new(ChatSession::new(self.client.clone(), conversation_id));
        match session.load(&self.settings).await {
            Ok(_) => {
                self.navigate(Route::Chat(conversation_id.to_string()));
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "failed to open conversation");
                match e.kind() {
                    ErrorKind::AuthExpired => self.handle_error(&e),
                    ErrorKind::NotFound => {
                        self.fetch_conversations().await;
                        self.navigate_home_with(NOT_FOUND_FLASH);
                    }
                    _ => {
                        self.fetch_conversations().await;
                        self.navigate_home_with(LOAD_FAILED_FLASH);
                    }
                }
                Err(e)
            }
        }
    }

    /// Read-only transcript for `/view/:id`. Needs no session.
    pub async fn view_conversation(&self, conversation_id: &str) -> Result<Transcript> {
        self.navigate(Route::View(conversation_id.to_string()));
        match self.client.conversation(conversation_id).await {
            Ok(detail) => Ok(Transcript::restored(detail.messages)),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    self.navigate_home_with(NOT_FOUND_FLASH);
                }
                Err(e)
            }
        }
    }

    pub async fn rename_conversation(&self, conversation_id: &str, alias: &str) -> Result<()> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(ClientError::Validation("alias is empty".into()));
        }
        if let Err(e) = self.client.rename_conversation(conversation_id, alias).await {
            self.handle_error(&e);
            return Err(e);
        }
        self.conversations
            .update(|c| c.update(conversation_id, alias, None));
        Ok(())
    }

    /// Star or unstar. The list changes immediately and is rolled back if
    /// the backend refuses.
    pub async fn star_conversation(&self, conversation_id: &str, starred: bool) -> Result<()> {
        let previous = self
            .conversations
            .read(|c| c.get(conversation_id).map(|conv| (conv.starred, conv.starred_at)));
        self.conversations
            .update(|c| c.toggle_star(conversation_id, starred));

        if let Err(e) = self.client.star_conversation(conversation_id, starred).await {
            if let Some((was_starred, was_starred_at)) = previous {
                self.conversations.update(|c| {
                    if let Some(conv) = c
                        .conversations
                        .iter_mut()
                        .find(|conv| conv.conversation_id == conversation_id)
                    {
                        conv.starred = was_starred;
                        conv.starred_at = was_starred_at;
                    }
                });
            }
            self.handle_error(&e);
            return Err(e);
        }
        Ok(())
    }

    /// Delete one conversation; leaves its screen if it is open.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        if let Err(e) = self.client.delete_conversation(conversation_id).await {
            self.handle_error(&e);
            return Err(e);
        }
        self.conversations.update(|c| {
            c.delete(conversation_id);
        });
        if matches!(self.route(), Route::Chat(id) | Route::Image(id) if id == conversation_id) {
            self.navigate(Route::Home);
        }
        Ok(())
    }

    pub async fn delete_all_conversations(&self) -> Result<()> {
        if let Err(e) = self.client.delete_all_conversations().await {
            self.handle_error(&e);
            return Err(e);
        }
        self.conversations.update(ConversationsState::delete_all);
        self.navigate(Route::Home);
        Ok(())
    }

    // ── Images, uploads, realtime ─────────────────────────────

    /// Create an image conversation and ask `model` for the first image.
    pub async fn start_image_conversation(
        &self,
        model: &ModelDescriptor,
        text: &str,
        files: Vec<ContentPart>,
    ) -> Result<(ImageSession, ImageOutcome)> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation(EMPTY_MESSAGE.into()));
        }
        let created = match self.client.new_image_conversation().await {
            Ok(created) => created,
            Err(e) => {
                if e.kind() == ErrorKind::AuthExpired {
                    self.handle_error(&e);
                } else {
                    self.notify(START_FAILED);
                }
                return Err(e);
            }
        };
        let id = created.conversation_id.clone();
        let mut pending = Conversation::pending(&id, created.created_at);
        pending.alias = FALLBACK_ALIAS.to_string();
        self.conversations.update(|c| c.add(pending));
        self.navigate(Route::Image(id.clone()));

        let session = ImageSession::new(self.client.clone(), &id);
        let (outcome, ()) = tokio::join!(
            session.send(model, text, files),
            self.name_conversation(&id, text)
        );
        match outcome {
            Ok(outcome) => Ok((session, outcome)),
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    /// A fresh attachment queue using the configured limits.
    pub fn upload_queue(&self) -> UploadQueue {
        UploadQueue::new(self.client.clone(), self.config.upload.clone())
    }

    /// Open the realtime screen and connect. Any failure other than an
    /// expired session sends the user home with the error as flash message.
    /// Signed-out users are sent to the login page and get `Validation`.
    pub async fn connect_realtime(&self, engine: &dyn MediaEngine) -> Result<RealtimeSession> {
        let shown = self.navigate(Route::Realtime);
        if shown != Route::Realtime {
            return Err(ClientError::Validation(format!("realtime is not available here; showing {shown}")));
        }
        match RealtimeSession::connect(&self.client, engine, &self.signaling, &self.config.realtime).await {
            Ok(session) => Ok(session),
            Err(e) => {
                tracing::warn!(error = %e, "realtime connection failed");
                if e.kind() == ErrorKind::AuthExpired {
                    self.handle_error(&e);
                } else {
                    self.navigate_home_with(e.message());
                }
                Err(e)
            }
        }
    }

    /// Tear the session down and go back home.
    pub async fn leave_realtime(&self, session: &RealtimeSession) {
        session.close().await;
        self.navigate(Route::Home);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        match App::new(ClientConfig::default()) {
            Ok(app) => app,
            Err(e) => unreachable!("app: {e}"),
        }
    }

    fn signed_in(app: &App) {
        app.auth.set(AuthState {
            logged_in: true,
            admin: false,
        });
    }

    #[test]
    fn navigation_is_gated() {
        let app = app();
        assert_eq!(app.navigate(Route::Chat("c".into())), Route::Login { expired: false });
        signed_in(&app);
        assert_eq!(app.navigate(Route::Chat("c".into())), Route::Chat("c".into()));
        assert_eq!(app.navigate(Route::Login { expired: false }), Route::Home);
    }

    #[test]
    fn auth_expiry_redirects_with_flag() {
        let app = app();
        signed_in(&app);
        app.navigate(Route::Chat("c".into()));
        app.handle_error(&ClientError::AuthExpired("401".into()));
        assert_eq!(app.route(), Route::Login { expired: true });
        assert!(!app.auth().logged_in);
    }

    #[test]
    fn auth_expiry_on_login_page_stays() {
        let app = app();
        app.navigate(Route::Register);
        app.handle_error(&ClientError::AuthExpired("401".into()));
        assert_eq!(app.route(), Route::Register);
    }

    #[test]
    fn validation_errors_become_notices() {
        let app = app();
        app.handle_error(&ClientError::Validation("too big".into()));
        assert_eq!(app.take_notices(), vec!["too big".to_string()]);
        assert!(app.take_notices().is_empty());
    }

    #[test]
    fn not_found_goes_home_with_flash() {
        let app = app();
        signed_in(&app);
        app.navigate(Route::Chat("gone".into()));
        app.handle_error(&ClientError::NotFound("missing".into()));
        let nav = app.navigation().get();
        assert_eq!(nav.route, Route::Home);
        assert_eq!(nav.flash.as_deref(), Some(NOT_FOUND_FLASH));
    }

    #[tokio::test]
    async fn blank_first_message_is_rejected_locally() {
        let app = app();
        assert!(matches!(
            app.start_conversation("  ", Vec::new()).await,
            Err(ClientError::Validation(_))
        ));
        assert!(app.conversations().read(|c| c.conversations.is_empty()));
    }
}
