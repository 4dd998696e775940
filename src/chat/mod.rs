//! Chat transcripts and the streaming request pipeline.

pub mod frame;
pub mod image;
pub mod message;
pub mod pipeline;
pub mod request;
pub mod sse;
pub mod transcript;
pub mod urls;

pub use image::{ImageOutcome, ImageSession};
pub use message::{ContentPart, INVISIBLE_CONTENT, Message, MessageContent, Role, generate_message_id};
pub use pipeline::{ChatSession, StreamGuard, StreamOutcome};
pub use request::ChatRequest;
pub use transcript::Transcript;
