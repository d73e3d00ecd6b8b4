//! Sync configuration
//!
//! Resolution order: defaults, then a TOML file, then `DESK_*` environment
//! variables, then whatever the caller sets through the builder methods.

use desk_core::Phase;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding the API base URL
pub const ENV_BASE_URL: &str = "DESK_BASE_URL";

/// Environment variable overriding the API token
pub const ENV_API_TOKEN: &str = "DESK_API_TOKEN";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Desk sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// API base URL
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_token: Option<String>,
    /// Timeout for REST calls in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Status poll interval in seconds, 0 disables polling
    pub poll_interval_secs: u64,
    /// Phases whose success triggers a desk refetch
    pub refetch_on_success: Vec<Phase>,
    /// Capacity of the notice broadcast channel
    pub notice_capacity: usize,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed input.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Load from a TOML file and apply environment overrides
    ///
    /// # Errors
    /// Read, parse or validation failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?.with_env_overrides();
        config.validate()?;
        tracing::debug!(path = %path.display(), base_url = %config.base_url, "config loaded");
        Ok(config)
    }

    /// Apply `DESK_BASE_URL` / `DESK_API_TOKEN`
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
        self
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With API token
    #[inline]
    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// With poll interval, zero disables polling
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs();
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// With phases whose success triggers a refetch
    #[inline]
    #[must_use]
    pub fn with_refetch_on_success(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        self.refetch_on_success = phases.into_iter().collect();
        self
    }

    /// Check values
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: format!("{url:?} is not an http(s) URL"),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        if self.notice_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "notice_capacity",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    #[inline]
    #[must_use]
    pub fn api_root(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// REST call timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout
    #[inline]
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Poll interval, `None` when polling is disabled
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.poll_interval_secs > 0).then(|| Duration::from_secs(self.poll_interval_secs))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: None,
            request_timeout_secs: 300,
            connect_timeout_secs: 10,
            poll_interval_secs: 15,
            refetch_on_success: vec![Phase::Content],
            notice_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.poll_interval(), Some(Duration::from_secs(15)));
        assert_eq!(config.refetch_on_success, vec![Phase::Content]);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            base_url = "https://desk.example.com/api/"
            poll_interval_secs = 0
            refetch_on_success = ["outline", "content"]
            "#,
        )
        .unwrap();
        assert_eq!(config.api_root(), "https://desk.example.com/api");
        assert_eq!(config.poll_interval(), None);
        assert_eq!(config.refetch_on_success, vec![Phase::Outline, Phase::Content]);
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    fn unknown_phase_is_a_parse_error() {
        let err = SyncConfig::from_toml_str(r#"refetch_on_success = ["publish"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let err = SyncConfig::new().with_base_url("ftp://x").validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
        let err = SyncConfig::new()
            .with_request_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let config = SyncConfig::new().with_overrides_from(|key| match key {
            ENV_BASE_URL => Some("http://override:9000".to_string()),
            ENV_API_TOKEN => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.base_url, "http://override:9000");
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "base_url = \"http://127.0.0.1:8123\"").unwrap();
        writeln!(file, "api_token = \"secret\"").unwrap();
        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn load_missing_file() {
        let err = SyncConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
