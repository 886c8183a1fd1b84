//! Application directory paths for the assistant.
//!
//! Uses the [`dirs`] crate for platform-appropriate directory resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/jarvis/` | `~/.local/share/jarvis/` |
//! | Config | `~/Library/Application Support/jarvis/` | `~/.config/jarvis/` |
//!
//! # Environment Overrides
//!
//! - `JARVIS_DATA_DIR` overrides [`data_dir`]
//! - `JARVIS_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Holds `settings.json`, `reminders.json`, screenshots and logs.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("JARVIS_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("jarvis"))
        .unwrap_or_else(|| PathBuf::from("/tmp/jarvis-data"))
}

/// Application config directory.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("JARVIS_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("jarvis"))
        .unwrap_or_else(|| PathBuf::from("/tmp/jarvis-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Voice and wake-word settings (`data_dir()/settings.json`).
#[must_use]
pub fn settings_file() -> PathBuf {
    data_dir().join("settings.json")
}

/// Pending reminders (`data_dir()/reminders.json`).
#[must_use]
pub fn reminders_file() -> PathBuf {
    data_dir().join("reminders.json")
}

/// Where screenshots taken on request are saved.
#[must_use]
pub fn screenshots_dir() -> PathBuf {
    data_dir().join("screenshots")
}

/// The user's Downloads folder, if the platform defines one.
#[must_use]
pub fn downloads_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
}
