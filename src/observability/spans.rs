//! Span names and helpers for structured tracing.
//!
//! ```text
//! devochat.api.request
//! devochat.chat.stream
//!   └─> devochat.api.request (model endpoint)
//! devochat.realtime.connect
//! ```

/// Span for a single backend API call.
pub const SPAN_API_REQUEST: &str = "devochat.api.request";

/// Span covering one streamed assistant turn.
pub const SPAN_CHAT_STREAM: &str = "devochat.chat.stream";

/// Span covering realtime session setup.
pub const SPAN_REALTIME_CONNECT: &str = "devochat.realtime.connect";

/// Create a span for a backend API call.
#[macro_export]
macro_rules! api_request_span {
    ($method:expr, $path:expr) => {
        tracing::debug_span!(
            $crate::observability::spans::SPAN_API_REQUEST,
            method = %$method,
            path = %$path,
        )
    };
}

/// Create a span for one streamed assistant turn.
#[macro_export]
macro_rules! chat_stream_span {
    ($conversation_id:expr, $model:expr, $generation:expr) => {
        tracing::info_span!(
            $crate::observability::spans::SPAN_CHAT_STREAM,
            conversation_id = %$conversation_id,
            model = %$model,
            generation = $generation,
        )
    };
}

/// Create a span for realtime session setup.
#[macro_export]
macro_rules! realtime_connect_span {
    ($model:expr) => {
        tracing::info_span!(
            $crate::observability::spans::SPAN_REALTIME_CONNECT,
            model = %$model,
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_names_share_prefix() {
        for name in [SPAN_API_REQUEST, SPAN_CHAT_STREAM, SPAN_REALTIME_CONNECT] {
            assert!(name.starts_with("devochat."), "{name}");
        }
    }

    #[test]
    fn span_macros_expand() {
        let span = crate::chat_stream_span!("conv-1", "gpt-x", 3u64);
        let _enter = span.enter();
        let api = crate::api_request_span!("GET", "/models");
        let _api = api.enter();
        let rt = crate::realtime_connect_span!("gpt-4o-mini-realtime-preview");
        let _rt = rt.enter();
    }
}
