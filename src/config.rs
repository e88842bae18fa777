//! Configuration types for the authentication client.

use crate::errors::{AuthError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for the authentication client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base URL of the backend API (e.g. `https://api.secretsafe.app`)
    pub api_base_url: String,

    /// Timeout applied to every backend request
    pub request_timeout: Duration,

    /// Expected access token lifetime
    pub access_token_lifetime: Duration,

    /// Remaining lifetime at which a silent refresh is triggered
    pub refresh_threshold: Duration,

    /// How long after token expiry the safety-net cleanup fires
    pub cleanup_grace: Duration,

    /// Interval between background session re-validations
    pub revalidation_interval: Duration,

    /// Interval between token health recomputations
    pub health_poll_interval: Duration,

    /// Prefix applied to every persisted key
    pub storage_key_prefix: String,

    /// Path of the durable session store; volatile in-memory storage when unset
    pub storage_path: Option<std::path::PathBuf>,

    /// Cookie mirroring configuration
    pub cookie: CookieConfig,
}

/// Configuration for the cookie mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Cookie path
    pub path: String,

    /// Cookie max-age
    pub max_age: Duration,

    /// SameSite policy
    pub same_site: CookieSameSite,
}

/// Cookie SameSite policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CookieSameSite {
    Strict,
    Lax,
    None,
}

impl CookieSameSite {
    /// Attribute value as it appears in a Set-Cookie header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            same_site: CookieSameSite::Lax,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(10),
            access_token_lifetime: Duration::from_secs(30 * 60),
            refresh_threshold: Duration::from_secs(5 * 60),
            cleanup_grace: Duration::from_secs(24 * 60 * 60),
            revalidation_interval: Duration::from_secs(5 * 60),
            health_poll_interval: Duration::from_secs(30),
            storage_key_prefix: "secret_safe_".to_string(),
            storage_path: None,
            cookie: CookieConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend API base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the refresh threshold.
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Set the storage key prefix.
    pub fn storage_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.storage_key_prefix = prefix.into();
        self
    }

    /// Persist the session to a file at the given path.
    pub fn storage_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(AuthError::configuration("api_base_url must not be empty"));
        }
        url::Url::parse(&self.api_base_url)
            .map_err(|e| AuthError::configuration(format!("invalid api_base_url: {e}")))?;
        if self.request_timeout.is_zero() {
            return Err(AuthError::configuration("request_timeout must be non-zero"));
        }
        if self.refresh_threshold >= self.access_token_lifetime {
            return Err(AuthError::configuration(
                "refresh_threshold must be shorter than access_token_lifetime",
            ));
        }
        Ok(())
    }

    /// Fully qualified storage key for the access token.
    pub fn access_token_key(&self) -> String {
        format!("{}access_token", self.storage_key_prefix)
    }

    /// Fully qualified storage key for the refresh token.
    pub fn refresh_token_key(&self) -> String {
        format!("{}refresh_token", self.storage_key_prefix)
    }

    /// Fully qualified storage key for the token expiry timestamp.
    pub fn token_expiry_key(&self) -> String {
        format!("{}token_expiry", self.storage_key_prefix)
    }

    /// Fully qualified storage key for the token issued-at timestamp.
    pub fn token_issued_at_key(&self) -> String {
        format!("{}token_issued_at", self.storage_key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_base_url() {
        let config = AuthConfig::new().api_base_url("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_threshold_exceeding_lifetime() {
        let config = AuthConfig {
            refresh_threshold: Duration::from_secs(3600),
            access_token_lifetime: Duration::from_secs(1800),
            ..AuthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn storage_keys_carry_prefix() {
        let config = AuthConfig::new().storage_key_prefix("ss_");
        assert_eq!(config.access_token_key(), "ss_access_token");
        assert_eq!(config.refresh_token_key(), "ss_refresh_token");
        assert_eq!(config.token_expiry_key(), "ss_token_expiry");
        assert_eq!(config.token_issued_at_key(), "ss_token_issued_at");
    }
}
