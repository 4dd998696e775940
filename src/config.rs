//! Client configuration.
//!
//! Loaded from TOML (`app_dirs::config_file()` by default). A missing file
//! yields defaults. The `DEVOCHAT_API_URL` environment variable overrides
//! `backend.base_url` so one variable is enough to point the client at a
//! different backend origin.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Environment variable selecting the backend origin.
pub const API_URL_ENV: &str = "DEVOCHAT_API_URL";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend HTTP settings.
    pub backend: BackendConfig,
    /// Chat defaults.
    pub chat: ChatConfig,
    /// Upload limits.
    pub upload: UploadConfig,
    /// Realtime voice settings.
    pub realtime: RealtimeConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Backend HTTP settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub base_url: String,
    /// Timeout for non-streaming requests, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            request_timeout_secs: 30,
        }
    }
}

/// Chat defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model selected before anything is restored from a conversation.
    pub default_model: String,
    /// Initial sampling temperature.
    pub temperature: f64,
    /// Initial reasoning effort.
    pub reason: f64,
    /// Initial verbosity.
    pub verbosity: f64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: "gemini-2.5-flash".into(),
            temperature: 0.5,
            reason: 0.5,
            verbosity: 0.5,
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum number of attachments pending on one message.
    pub max_files: usize,
    /// Maximum size of a single attachment in bytes.
    pub max_file_size_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_file_size_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Realtime voice settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Provider endpoint that accepts the SDP offer.
    pub provider_url: String,
    /// Realtime model passed as the `model` query parameter.
    pub model: String,
    /// Instructions sent in the `session.update` event once the data channel opens.
    pub instructions: String,
    /// Seconds the last transcript stays visible after the model stops speaking.
    pub transcript_linger_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            provider_url: "https://api.openai.com/v1/realtime".into(),
            model: "gpt-4o-mini-realtime-preview".into(),
            instructions: "Respond in the language the user speaks.".into(),
            transcript_linger_secs: 3,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    /// Also write a daily-rotated log file under `app_dirs::logs_dir()`.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "devochat=info".into(),
            file: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!(
                "failed to parse config file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Load from `path` if it exists, otherwise defaults, then apply the
    /// environment override and validate.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` on parse or validation failure.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.apply_base_url_override(&url);
        }
        config.validate()?;
        Ok(config)
    }

    /// Replace the backend origin, ignoring blank values.
    pub fn apply_base_url_override(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.backend.base_url = url.trim_end_matches('/').to_string();
        }
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        validate_http_url("backend.base_url", &self.backend.base_url)?;
        validate_http_url("realtime.provider_url", &self.realtime.provider_url)?;
        if self.upload.max_files == 0 {
            return Err(ClientError::Config("upload.max_files must be at least 1".into()));
        }
        if self.chat.default_model.trim().is_empty() {
            return Err(ClientError::Config("chat.default_model is empty".into()));
        }
        Ok(())
    }

    /// Write the configuration atomically (temp file → fsync → rename).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` on serialization, write, or rename failure.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("failed to serialize config: {e}")))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClientError::Config(format!(
                    "failed to create config directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| {
            ClientError::Config(format!(
                "failed to create temp file '{}': {e}",
                tmp_path.display()
            ))
        })?;
        file.write_all(toml_str.as_bytes())
            .map_err(|e| ClientError::Config(format!("failed to write temp file: {e}")))?;
        file.sync_all()
            .map_err(|e| ClientError::Config(format!("failed to sync temp file: {e}")))?;

        std::fs::rename(&tmp_path, path).map_err(|e| {
            ClientError::Config(format!(
                "failed to rename '{}' to '{}': {e}",
                tmp_path.display(),
                path.display()
            ))
        })
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClientError::Config(format!("{field} is empty")));
    }
    let parsed = url::Url::parse(value)
        .map_err(|e| ClientError::Config(format!("{field} is not a valid URL: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ClientError::Config(format!(
            "{field} must use http or https, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.upload.max_files, 10);
        assert_eq!(config.upload.max_file_size_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: ClientConfig = match toml::from_str(
            r#"
            [backend]
            base_url = "https://chat.example.net"
            "#,
        ) {
            Ok(c) => c,
            Err(e) => unreachable!("valid toml: {e}"),
        };
        assert_eq!(config.backend.base_url, "https://chat.example.net");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.chat.default_model, "gemini-2.5-flash");
    }

    #[test]
    fn override_trims_trailing_slash() {
        let mut config = ClientConfig::default();
        config.apply_base_url_override("https://api.example.kr/ ");
        assert_eq!(config.backend.base_url, "https://api.example.kr");
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut config = ClientConfig::default();
        config.apply_base_url_override("   ");
        assert_eq!(config.backend.base_url, "http://localhost:8000");
    }

    #[test]
    fn validate_rejects_non_http_scheme() {
        let mut config = ClientConfig::default();
        config.backend.base_url = "ftp://example.com".into();
        match config.validate() {
            Err(ClientError::Config(msg)) => assert!(msg.contains("backend.base_url")),
            other => unreachable!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_max_files() {
        let mut config = ClientConfig::default();
        config.upload.max_files = 0;
        assert!(config.validate().is_err());
    }
}
