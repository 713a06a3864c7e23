//! CLI configuration file.
//!
//! ```json
//! {
//!   "backend": { "type": "http", "baseUrl": "https://tasks.example.com", "token": "..." },
//!   "requestTimeoutSecs": 30
//! }
//! ```
//!
//! The `TASKSYNC_TOKEN` environment variable overrides the configured token.
//!
//! `http` is the only backend type accepted. The cloud-file and document
//! transports are embedded by applications through the engine library.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable overriding the backend token.
pub const TOKEN_ENV: &str = "TASKSYNC_TOKEN";

/// Name of the config file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Errors loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file does not exist.
    #[error("no config file at {0}; pass --config or create one")]
    Missing(PathBuf),
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("invalid config {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Remote backend selection.
///
/// Only the self-hosted endpoint is reachable from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BackendSettings {
    /// The self-hosted `GET/PUT /api/data` endpoint.
    #[serde(rename_all = "camelCase")]
    Http {
        /// Server base URL.
        base_url: String,
        /// Optional bearer token.
        #[serde(default)]
        token: Option<String>,
    },
}

/// Contents of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Remote backend.
    pub backend: BackendSettings,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Settings {
    /// Loads settings from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ConfigError::Missing(path.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses settings from JSON bytes.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The effective token: `env_token` if set and non-empty, else the
    /// configured one.
    pub fn token(&self, env_token: Option<String>) -> Option<String> {
        let configured = match &self.backend {
            BackendSettings::Http { token, .. } => token.clone(),
        };
        env_token.filter(|t| !t.is_empty()).or(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_http_backend() {
        let settings = Settings::parse(
            br#"{"backend":{"type":"http","baseUrl":"https://tasks.example.com"}}"#,
        )
        .unwrap();
        assert_eq!(
            settings.backend,
            BackendSettings::Http {
                base_url: "https://tasks.example.com".into(),
                token: None,
            }
        );
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn env_token_overrides() {
        let settings = Settings::parse(
            br#"{"backend":{"type":"http","baseUrl":"http://x","token":"file"},"requestTimeoutSecs":5}"#,
        )
        .unwrap();
        assert_eq!(settings.request_timeout_secs, 5);
        assert_eq!(settings.token(None).as_deref(), Some("file"));
        assert_eq!(settings.token(Some(String::new())).as_deref(), Some("file"));
        assert_eq!(settings.token(Some("env".into())).as_deref(), Some("env"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Settings::parse(br#"{"backend":{"type":"ftp"}}"#).is_err());
        assert!(Settings::parse(br#"{"backend":{"type":"cloudFile"}}"#).is_err());
        assert!(Settings::parse(br#"{"backend":{"type":"document","userId":"u"}}"#).is_err());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }
}
