//! Adapter configuration, loaded from environment variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_REST_URL: &str = "https://www.okx.com";
const DEFAULT_WS_PUBLIC_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";
const DEFAULT_WS_PRIVATE_URL: &str = "wss://ws.okx.com:8443/ws/v5/private";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// API credentials for signed REST and WebSocket login.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OkxCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl OkxCredentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: require_env("OKX_API_KEY")?,
            secret_key: require_env("OKX_SECRET_KEY")?,
            passphrase: require_env("OKX_PASSPHRASE")?,
        })
    }

    /// Whether credentials are populated; empty credentials restrict the
    /// adapter to public channels.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty() && !self.passphrase.is_empty()
    }
}

/// Main adapter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkxConfig {
    pub rest_url: String,
    pub ws_public_url: String,
    pub ws_private_url: String,

    #[serde(skip)]
    pub credentials: OkxCredentials,

    /// Demo-trading flag (adds the venue's simulated-trading header).
    pub simulated: bool,

    /// Checksum mismatches force a resync instead of only logging.
    pub strict_checksum: bool,

    /// Levels requested in REST book snapshots.
    pub book_depth: usize,

    /// Per-side level cap kept in memory (None keeps everything).
    pub max_book_depth: Option<usize>,

    /// Bound of each symbol's pending-update queue.
    pub queue_capacity: usize,

    /// Seconds between outbound heartbeat pings.
    pub ping_interval_secs: u64,
}

impl Default for OkxConfig {
    fn default() -> Self {
        Self {
            rest_url: DEFAULT_REST_URL.to_string(),
            ws_public_url: DEFAULT_WS_PUBLIC_URL.to_string(),
            ws_private_url: DEFAULT_WS_PRIVATE_URL.to_string(),
            credentials: OkxCredentials::default(),
            simulated: false,
            strict_checksum: false,
            book_depth: 400,
            max_book_depth: None,
            queue_capacity: keysync::synchronizer::DEFAULT_QUEUE_CAPACITY,
            ping_interval_secs: 20,
        }
    }
}

impl OkxConfig {
    /// Full configuration with credentials taken from
    /// `OKX_API_KEY` / `OKX_SECRET_KEY` / `OKX_PASSPHRASE`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.credentials = OkxCredentials::from_env()?;
        if let Ok(v) = std::env::var("OKX_SIMULATED") {
            config.simulated = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("OKX_STRICT_CHECKSUM") {
            config.strict_checksum = v == "1" || v.eq_ignore_ascii_case("true");
        }
        config.validate()?;
        Ok(config)
    }

    /// Public-market-data-only configuration; no credentials, no private
    /// channels.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.book_depth == 0 {
            return Err(ConfigError::ValidationError(
                "book_depth must be positive".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarMissing(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = OkxConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.credentials.is_configured());
        assert!(!config.strict_checksum);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = OkxConfig {
            book_depth: 0,
            ..OkxConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
