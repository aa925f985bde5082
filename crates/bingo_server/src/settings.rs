//! Server settings loaded from `bingo.toml`.

use crate::session::DEFAULT_EVENT_BUFFER;
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Settings for the bingo server binary.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host the HTTP transport binds to.
    #[serde(default = "default_host")]
    host: String,

    /// Port the HTTP transport binds to.
    #[serde(default = "default_port")]
    port: u16,

    /// Board configuration loaded at startup.
    #[serde(default)]
    board: Option<PathBuf>,

    /// Events a slow subscriber may fall behind by before it lags.
    #[serde(default = "default_event_buffer")]
    event_buffer: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            board: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl ServerSettings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        debug!("Loading settings from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SettingsError::new(format!("Failed to read settings file: {}", e)))?;

        let settings: Self = toml::from_str(&content)
            .map_err(|e| SettingsError::new(format!("Failed to parse settings: {}", e)))?;

        info!(host = %settings.host, port = settings.port, "Settings loaded");
        Ok(settings)
    }

    /// Loads settings from `path` if it exists, otherwise the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError`] if the file exists but is invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            debug!(path = %path.as_ref().display(), "No settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Replaces the HTTP bind address.
    pub fn with_address(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }
}

/// Settings error.
#[derive(Debug, Clone, Display, Error)]
#[display("Settings error: {} at {}:{}", message, file, line)]
pub struct SettingsError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SettingsError {
    /// Creates a new settings error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 4100\nboard = \"boards/office.json\"").unwrap();

        let settings = ServerSettings::from_file(file.path()).unwrap();
        assert_eq!(*settings.port(), 4100);
        assert_eq!(settings.host(), "127.0.0.1");
        assert_eq!(settings.board().as_deref(), Some(Path::new("boards/office.json")));
        assert_eq!(*settings.event_buffer(), DEFAULT_EVENT_BUFFER);
    }

    #[test]
    fn test_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"not a number\"").unwrap();

        let err = ServerSettings::from_file(file.path()).unwrap_err();
        assert!(err.message.starts_with("Failed to parse settings"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ServerSettings::load_or_default(dir.path().join("bingo.toml")).unwrap();
        assert_eq!(settings, ServerSettings::default());
    }

    #[test]
    fn test_with_address_overrides() {
        let settings = ServerSettings::default().with_address(Some("0.0.0.0".into()), None);
        assert_eq!(settings.host(), "0.0.0.0");
        assert_eq!(*settings.port(), 3000);
    }
}
