//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Config | `~/Library/Application Support/devochat/` | `~/.config/devochat/` |
//! | Data (logs) | `~/Library/Application Support/devochat/` | `~/.local/share/devochat/` |
//!
//! Overrides: `DEVOCHAT_CONFIG_DIR`, `DEVOCHAT_DATA_DIR`.

use std::path::PathBuf;

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DEVOCHAT_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("devochat"))
        .unwrap_or_else(|| PathBuf::from("/tmp/devochat-config"))
}

/// Application data root directory.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("DEVOCHAT_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("devochat"))
        .unwrap_or_else(|| PathBuf::from("/tmp/devochat-data"))
}

/// Default config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
