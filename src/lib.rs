//! DevoChat: client core for the DevoChat conversational AI backend.
//!
//! This crate holds everything a DevoChat front end needs besides drawing:
//! streaming chat, image generation, file uploads, realtime voice sessions
//! and the observable state behind the sidebar and the composer.
//!
//! # Architecture
//!
//! - **API**: `api::BackendClient` wraps every backend HTTP endpoint
//! - **Chat**: `chat::ChatSession` posts a turn to the model endpoint and
//!   folds the `data:` frames of the reply into a transcript
//! - **Markup**: `markup` splits assistant text into text, think and tool
//!   segments; `render` turns them into HTML or terminal text
//! - **State**: `state::Store` carries settings and the conversation list
//!   with change notification
//! - **Realtime**: `realtime::RealtimeSession` drives signaling and the
//!   data channel of a voice session through the `realtime::peer` traits
//! - **App**: `app::App` ties the pieces together and maps each error kind
//!   to its user-visible reaction

pub mod api;
pub mod app;
pub mod app_dirs;
pub mod chat;
pub mod config;
pub mod error;
pub mod markup;
pub mod model;
pub mod observability;
pub mod realtime;
pub mod render;
pub mod routing;
pub mod state;
pub mod upload;

pub use api::BackendClient;
pub use app::App;
pub use chat::{ChatSession, Message, StreamOutcome, Transcript};
pub use config::ClientConfig;
pub use error::{ClientError, ErrorKind, Result};
pub use model::{ModelCatalog, ModelDescriptor};
pub use routing::Route;
pub use state::{SettingsState, Store};
