//! Secret redaction for log output.
//!
//! ```rust
//! use devochat::observability::redact::RedactedString;
//!
//! let credential = RedactedString::new("ek_1234567890abcdef");
//! assert_eq!(format!("{credential}"), "[REDACTED]");
//! assert_eq!(credential.as_str(), "ek_1234567890abcdef");
//! ```

use std::fmt;

/// A string wrapper that redacts its value in Display and Debug output.
///
/// The only way to read the value is [`as_str`](RedactedString::as_str) or
/// [`into_inner`](RedactedString::into_inner).
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedString {
    inner: String,
}

impl RedactedString {
    /// Wrap a secret.
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Access the inner value, e.g. to build an `Authorization` header.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Consume the wrapper and return the inner value.
    pub fn into_inner(self) -> String {
        self.inner
    }
}

impl fmt::Display for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl fmt::Debug for RedactedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedString(\"[REDACTED]\")")
    }
}

/// Redact `Bearer <token>` occurrences.
pub fn redact_bearer(s: &str) -> String {
    let lower = s.to_ascii_lowercase();
    let Some(pos) = lower.find("bearer ") else {
        return s.to_string();
    };
    let before = &s[..pos + 7];
    let after = &s[pos + 7..];
    let token_end = after
        .find(|c: char| c.is_whitespace())
        .unwrap_or(after.len());
    format!("{before}***REDACTED***{}", &after[token_end..])
}

/// Redact the value of a `"password"` field in a JSON-like string.
pub fn redact_password_in_json(s: &str) -> String {
    let Some(pos) = s.find("\"password\"") else {
        return s.to_string();
    };
    let before = &s[..pos];
    let after = &s[pos..];
    let Some(colon) = after.find(':') else {
        return s.to_string();
    };
    let after_colon = &after[colon + 1..];
    let Some(open) = after_colon.find('"') else {
        return s.to_string();
    };
    let value = &after_colon[open + 1..];
    match value.find('"') {
        Some(close) => format!(
            "{before}\"password\": \"***REDACTED***\"{}",
            &value[close + 1..]
        ),
        None => s.to_string(),
    }
}

/// Apply every redaction pattern.
pub fn redact_all(s: &str) -> String {
    redact_password_in_json(&redact_bearer(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_shows_value() {
        let secret = RedactedString::new("ek_abc");
        assert!(!format!("{secret:?}").contains("ek_abc"));
    }

    #[test]
    fn bearer_token_is_redacted() {
        let header = "Authorization: Bearer ek_abc123 trailing";
        assert_eq!(
            redact_bearer(header),
            "Authorization: Bearer ***REDACTED*** trailing"
        );
    }

    #[test]
    fn text_without_bearer_is_unchanged() {
        assert_eq!(redact_bearer("nothing here"), "nothing here");
    }

    #[test]
    fn non_ascii_prefix_keeps_offsets() {
        let line = "İİİİİİİİ bearer secret end";
        assert_eq!(redact_bearer(line), "İİİİİİİİ bearer ***REDACTED*** end");
        assert_eq!(redact_all("İİİİİİİİ"), "İİİİİİİİ");
    }

    #[test]
    fn password_field_is_redacted() {
        let body = r#"{"email": "a@b.kr", "password": "hunter2"}"#;
        let redacted = redact_password_in_json(body);
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("a@b.kr"));
    }

    #[test]
    fn redact_all_combines_patterns() {
        let line = r#"Bearer tok {"password": "pw"}"#;
        let redacted = redact_all(line);
        assert!(!redacted.contains("tok "));
        assert!(!redacted.contains("\"pw\""));
    }
}
