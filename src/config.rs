//! Gateway configuration
//!
//! One JSON document groups the HTTP, token and change stream settings.
//! Every field has a default, so an empty object (or no file) is valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::JwtConfig;
use crate::http_server::HttpServerConfig;
use crate::ingest::IngestConfig;
use crate::realtime::DEFAULT_OUTBOUND_CAPACITY;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Reported by the health endpoints (default: "websocket-service")
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub jwt: JwtConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    /// Messages buffered per connection before it counts as a slow consumer
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

fn default_service_name() -> String {
    "websocket-service".to_string()
}

fn default_outbound_queue_capacity() -> usize {
    DEFAULT_OUTBOUND_CAPACITY
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            http: HttpServerConfig::default(),
            jwt: JwtConfig::default(),
            ingest: IngestConfig::default(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl GatewayConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: GatewayConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.is_empty() {
            return Err(ConfigError::Invalid("jwt.secret must not be empty".into()));
        }
        if self.jwt.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("jwt.token_ttl_hours must be > 0".into()));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound_queue_capacity must be > 0".into(),
            ));
        }
        if self.ingest.bootstrap_servers.is_empty() {
            return Err(ConfigError::Invalid(
                "ingest.bootstrap_servers must not be empty".into(),
            ));
        }
        if self.ingest.documents_topic == self.ingest.signatures_topic {
            return Err(ConfigError::Invalid(
                "ingest.documents_topic and ingest.signatures_topic must differ".into(),
            ));
        }
        if self.ingest.backoff.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "ingest.backoff.multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }
}
