//! Authorization node configuration.
//!
//! All durations are written in humantime notation (`"15m"`, `"10s"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Root configuration of the authorization orchestrator.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// public_url = "https://node.example.com"
///
/// [auth.oauth]
/// flow_timeout = "15m"
/// access_token_lifetime = "15m"
///
/// [auth.client]
/// request_timeout = "10s"
/// strict_mode = true
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Public base URL of this node. Owned identifiers are the `did:web`
    /// identifiers of `{public_url}/iam/{id}`.
    pub public_url: String,

    /// Protocol timing.
    pub oauth: OAuthConfig,

    /// Outbound HTTP client settings.
    pub client: ClientConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

/// Lifetimes of ephemeral protocol state.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// TTL shared by the nonce, client-state and authorization-code
    /// namespaces.
    #[serde(with = "humantime_serde")]
    pub flow_timeout: Duration,

    /// Lifetime of issued access tokens.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            flow_timeout: Duration::from_secs(15 * 60),
            access_token_lifetime: Duration::from_secs(15 * 60),
        }
    }
}

/// Settings for calls to remote wallets and verifiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Request timeout; a timed out call becomes a `server_error`.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// When enabled, remote URLs must use https and must not point at
    /// loopback or unspecified hosts.
    pub strict_mode: bool,

    /// Maximum accepted response body size in bytes.
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            strict_mode: true,
            max_response_size: 1024 * 1024,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `public_url` is missing or not an absolute
    /// http(s) URL, or if any lifetime or limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.public_url.is_empty() {
            return Err(ConfigError::Missing("public_url".to_string()));
        }
        self.public_url()?;

        if self.oauth.flow_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "oauth.flow_timeout must be > 0".to_string(),
            ));
        }
        if self.oauth.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "oauth.access_token_lifetime must be > 0".to_string(),
            ));
        }
        if self.client.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "client.request_timeout must be > 0".to_string(),
            ));
        }
        if self.client.max_response_size == 0 {
            return Err(ConfigError::InvalidValue(
                "client.max_response_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Parsed `public_url`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the URL does not parse or is
    /// not http(s).
    pub fn public_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.public_url).map_err(|e| {
            ConfigError::InvalidValue(format!("public_url '{}': {e}", self.public_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidValue(format!(
                "public_url scheme must be http or https, got '{other}'"
            ))),
        }
    }
}
