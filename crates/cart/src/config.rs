//! Cart backend configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PADKOS_FIRESTORE_PROJECT` - Google Cloud project id holding the
//!   Firestore database
//!
//! ## Optional
//! - `PADKOS_FIRESTORE_DATABASE` - Database id (default: `(default)`)
//! - `PADKOS_FIRESTORE_TOKEN` - OAuth2 bearer token for the REST API;
//!   omit against an emulator
//! - `PADKOS_FIRESTORE_URL` - REST endpoint override, e.g. an emulator
//!   (default: `https://firestore.googleapis.com/v1`)
//! - `PADKOS_FIRESTORE_POLL_MS` - Feed poll interval in milliseconds
//!   (default: 2000)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Default Firestore REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Default feed poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Firestore REST backend configuration.
///
/// Implements `Debug` manually to redact the bearer token.
#[derive(Clone)]
pub struct FirestoreConfig {
    /// Google Cloud project id.
    pub project_id: String,
    /// Firestore database id.
    pub database_id: String,
    /// OAuth2 bearer token. `None` is only valid against an emulator.
    pub access_token: Option<SecretString>,
    /// REST endpoint, without a trailing slash.
    pub base_url: String,
    /// How often the subscription feed polls for changes.
    pub poll_interval: Duration,
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl FirestoreConfig {
    /// Create a configuration with defaults for everything but the project.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_owned(),
            access_token: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails
    /// to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_id = require_env("PADKOS_FIRESTORE_PROJECT")?;
        let mut config = Self::new(project_id);

        if let Ok(database_id) = std::env::var("PADKOS_FIRESTORE_DATABASE") {
            config.database_id = database_id;
        }
        if let Ok(token) = std::env::var("PADKOS_FIRESTORE_TOKEN") {
            config.access_token = Some(SecretString::from(token));
        }
        if let Ok(url) = std::env::var("PADKOS_FIRESTORE_URL") {
            config.base_url = url.trim_end_matches('/').to_owned();
        }
        if let Ok(raw) = std::env::var("PADKOS_FIRESTORE_POLL_MS") {
            let millis: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidEnvVar(
                    "PADKOS_FIRESTORE_POLL_MS".to_owned(),
                    format!("expected an integer, got {raw:?}"),
                )
            })?;
            config.poll_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = FirestoreConfig::new("padkos-prod");
        assert_eq!(config.project_id, "padkos-prod");
        assert_eq!(config.database_id, "(default)");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = FirestoreConfig::new("padkos-prod");
        config.access_token = Some(SecretString::from("ya29.secret"));
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("ya29"));
        assert!(rendered.contains("REDACTED"));
    }
}
