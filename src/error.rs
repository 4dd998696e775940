//! Error types for the devochat client.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via [`ClientError::code()`].
//! Codes are part of the public API contract and will not change.
//!
//! Every error also maps to an [`ErrorKind`], which decides how the
//! application surfaces it: a login redirect, a transient notice, an inline
//! transcript message, or a navigation home with a flash message.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Invalid or missing configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// The backend rejected the session (HTTP 401).
    pub const AUTH_EXPIRED: &str = "AUTH_EXPIRED";

    /// User input was rejected before anything was sent.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";

    /// Request to the backend failed.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// Streaming response encountered an error.
    pub const STREAM_FAILED: &str = "STREAM_FAILED";

    /// The backend reported an error inside a stream frame or JSON body.
    pub const SERVER_ERROR: &str = "SERVER_ERROR";

    /// The requested conversation or resource does not exist.
    pub const NOT_FOUND: &str = "NOT_FOUND";

    /// File upload was rejected or failed.
    pub const UPLOAD_FAILED: &str = "UPLOAD_FAILED";

    /// Realtime voice session setup or teardown failed.
    pub const REALTIME_FAILED: &str = "REALTIME_FAILED";
}

/// How an error is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Redirect to the login page.
    AuthExpired,
    /// Transient notice; no state is changed.
    Validation,
    /// Inline error message in the transcript, recoverable by retry.
    Network,
    /// Navigate home carrying a flash message.
    NotFound,
}

/// Errors produced by the devochat client.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid or missing configuration.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// The backend answered 401.
    #[error("[{}] {}", error_codes::AUTH_EXPIRED, .0)]
    AuthExpired(String),

    /// User input rejected locally.
    #[error("[{}] {}", error_codes::VALIDATION_FAILED, .0)]
    Validation(String),

    /// Transport or HTTP status failure.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    Request(String),

    /// Stream read or frame decode failure.
    #[error("[{}] {}", error_codes::STREAM_FAILED, .0)]
    Stream(String),

    /// Error reported by the backend in-band.
    #[error("[{}] {}", error_codes::SERVER_ERROR, .0)]
    Server(String),

    /// Conversation or resource not found (HTTP 404).
    #[error("[{}] {}", error_codes::NOT_FOUND, .0)]
    NotFound(String),

    /// Upload rejected or failed.
    #[error("[{}] {}", error_codes::UPLOAD_FAILED, .0)]
    Upload(String),

    /// Realtime session failure.
    #[error("[{}] {}", error_codes::REALTIME_FAILED, .0)]
    Realtime(String),
}

impl ClientError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => error_codes::CONFIG_INVALID,
            Self::AuthExpired(_) => error_codes::AUTH_EXPIRED,
            Self::Validation(_) => error_codes::VALIDATION_FAILED,
            Self::Request(_) => error_codes::REQUEST_FAILED,
            Self::Stream(_) => error_codes::STREAM_FAILED,
            Self::Server(_) => error_codes::SERVER_ERROR,
            Self::NotFound(_) => error_codes::NOT_FOUND,
            Self::Upload(_) => error_codes::UPLOAD_FAILED,
            Self::Realtime(_) => error_codes::REALTIME_FAILED,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::AuthExpired(m)
            | Self::Validation(m)
            | Self::Request(m)
            | Self::Stream(m)
            | Self::Server(m)
            | Self::NotFound(m)
            | Self::Upload(m)
            | Self::Realtime(m) => m,
        }
    }

    /// Classifies the error for presentation.
    ///
    /// Configuration and upload problems are reported like input errors:
    /// the user fixes them and tries again, nothing in the transcript moves.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthExpired(_) => ErrorKind::AuthExpired,
            Self::Validation(_) | Self::Config(_) | Self::Upload(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Request(_) | Self::Stream(_) | Self::Server(_) | Self::Realtime(_) => {
                ErrorKind::Network
            }
        }
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: reqwest::StatusCode, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status.as_u16() {
            401 => Self::AuthExpired(format!("session expired: {detail}")),
            404 => Self::NotFound(detail),
            _ => Self::Request(format!("HTTP {}: {detail}", status.as_u16())),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_status(status, err.to_string());
        }
        Self::Request(err.to_string())
    }
}

/// Convenience alias for client results.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_prefix() {
        let err = ClientError::Config("missing base_url".into());
        let display = format!("{err}");
        assert!(display.starts_with("[CONFIG_INVALID]"));
        assert!(display.contains("missing base_url"));
    }

    #[test]
    fn message_returns_inner_text() {
        let err = ClientError::Stream("unexpected EOF".into());
        assert_eq!(err.message(), "unexpected EOF");
    }

    #[test]
    fn all_codes_are_screaming_snake_case() {
        let errors = vec![
            ClientError::Config("x".into()),
            ClientError::AuthExpired("x".into()),
            ClientError::Validation("x".into()),
            ClientError::Request("x".into()),
            ClientError::Stream("x".into()),
            ClientError::Server("x".into()),
            ClientError::NotFound("x".into()),
            ClientError::Upload("x".into()),
            ClientError::Realtime("x".into()),
        ];
        for err in &errors {
            let code = err.code();
            assert!(
                code.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
                "code {code:?} is not SCREAMING_SNAKE_CASE"
            );
        }
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            ClientError::AuthExpired("x".into()).kind(),
            ErrorKind::AuthExpired
        );
        assert_eq!(
            ClientError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(ClientError::Upload("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(ClientError::Stream("x".into()).kind(), ErrorKind::Network);
        assert_eq!(ClientError::Server("x".into()).kind(), ErrorKind::Network);
        assert_eq!(ClientError::NotFound("x".into()).kind(), ErrorKind::NotFound);
    }

    #[test]
    fn status_401_is_auth_expired() {
        let err = ClientError::from_status(reqwest::StatusCode::UNAUTHORIZED, "nope");
        assert_eq!(err.code(), error_codes::AUTH_EXPIRED);
    }

    #[test]
    fn status_404_is_not_found() {
        let err = ClientError::from_status(reqwest::StatusCode::NOT_FOUND, "gone");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "gone");
    }

    #[test]
    fn status_500_is_request_error() {
        let err =
            ClientError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.code(), error_codes::REQUEST_FAILED);
        assert!(err.message().contains("500"));
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientError>();
    }
}
