//! Client configuration: TOML file with per-field defaults, CLI overrides on top.
//!
//! ```toml
//! endpoint = "wss://example.execute-api.us-east-1.amazonaws.com/vidbot/"
//! request_timeout_secs = 600
//! affordances = "per_lane"
//!
//! [reconnect]
//! strategy = "exponential"
//! base_delay_ms = 1000
//! max_delay_ms = 30000
//! max_attempts = 10
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ReconnectPolicy;
use crate::correlator::AffordancePolicy;
use crate::error::{ClientError, Result};

pub const DEFAULT_ENDPOINT: &str = "wss://fyocljsr02.execute-api.us-east-1.amazonaws.com/vidbot/";
pub const DEFAULT_THUMBNAIL_BASE: &str = "https://cfvod.kaltura.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectStrategy {
    Fixed,
    Exponential,
}

impl std::fmt::Display for ReconnectStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconnectStrategy::Fixed => write!(f, "fixed"),
            ReconnectStrategy::Exponential => write!(f, "exponential"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub strategy: ReconnectStrategy,
    pub fixed_delay_ms: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            strategy: ReconnectStrategy::Fixed,
            fixed_delay_ms: 5_000,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 10,
        }
    }
}

impl ReconnectConfig {
    pub fn policy(&self) -> ReconnectPolicy {
        match self.strategy {
            ReconnectStrategy::Fixed => ReconnectPolicy::Fixed {
                delay: Duration::from_millis(self.fixed_delay_ms),
            },
            ReconnectStrategy::Exponential => ReconnectPolicy::Exponential {
                base: Duration::from_millis(self.base_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                max_attempts: self.max_attempts,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub reconnect: ReconnectConfig,
    /// Seconds before a pending affordance is released. `0` disables the timeout.
    pub request_timeout_secs: u64,
    pub affordances: AffordancePolicy,
    pub thumbnail_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect: ReconnectConfig::default(),
            request_timeout_secs: 600,
            affordances: AffordancePolicy::PerLane,
            thumbnail_base: DEFAULT_THUMBNAIL_BASE.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a config file.
    ///
    /// # Errors
    /// `ConfigRead` when the file cannot be read, `ConfigParse` when it is not
    /// valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ClientError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    /// Check that the endpoint parses and uses a WebSocket scheme.
    pub fn validated_endpoint(&self) -> Result<url::Url> {
        let parsed = url::Url::parse(&self.endpoint).map_err(|e| ClientError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            detail: e.to_string(),
        })?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(parsed),
            other => Err(ClientError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                detail: format!("unsupported scheme '{other}'"),
            }),
        }
    }
}
