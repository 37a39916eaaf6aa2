//! CLI argument definitions using clap
//!
//! Commands:
//! - changecast serve [--config <path>] [overrides...]
//! - changecast token --user-id <id> --email <email>

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};
use jsonwebtoken::Algorithm;

use super::errors::{CliError, CliResult};
use crate::config::GatewayConfig;

/// changecast - change record broadcast gateway
#[derive(Parser, Debug)]
#[command(name = "changecast")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the gateway: change stream consumer plus websocket server
    Serve(ServeArgs),

    /// Print a signed token for connecting test clients
    Token(TokenArgs),
}

/// Overrides applied on top of the config file
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Path to JSON configuration file
    #[arg(long, env = "CHANGECAST_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "SERVICE_NAME")]
    pub service_name: Option<String>,

    /// Host to bind to
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS")]
    pub kafka_bootstrap_servers: Option<String>,

    #[arg(long, env = "KAFKA_CONSUMER_GROUP")]
    pub kafka_consumer_group: Option<String>,

    #[arg(long, env = "CDC_DOCUMENTS_TOPIC")]
    pub documents_topic: Option<String>,

    #[arg(long, env = "CDC_SIGNATURES_TOPIC")]
    pub signatures_topic: Option<String>,

    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// HS256, HS384 or HS512
    #[arg(long, env = "JWT_ALGORITHM")]
    pub jwt_algorithm: Option<String>,

    /// Serve GET /auth/token
    #[arg(long)]
    pub enable_token_endpoint: bool,

    /// Serve websockets without consuming the change stream
    #[arg(long)]
    pub no_ingest: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TokenArgs {
    /// Path to JSON configuration file
    #[arg(long, env = "CHANGECAST_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub user_id: String,

    #[arg(long)]
    pub email: String,

    /// Token lifetime; defaults to jwt.token_ttl_hours
    #[arg(long)]
    pub ttl_hours: Option<i64>,

    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    pub jwt_secret: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

impl ServeArgs {
    /// Load the config file (if any) and apply command line overrides
    pub fn resolve(&self) -> CliResult<GatewayConfig> {
        let mut config = GatewayConfig::load_or_default(self.config.as_deref())
            .map_err(|e| CliError::config_error(e.to_string()))?;
        self.apply(&mut config)?;
        config
            .validate()
            .map_err(|e| CliError::config_error(e.to_string()))?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut GatewayConfig) -> CliResult<()> {
        if let Some(name) = &self.service_name {
            config.service_name = name.clone();
        }
        if let Some(host) = &self.host {
            config.http.host = host.clone();
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(servers) = &self.kafka_bootstrap_servers {
            config.ingest.bootstrap_servers = servers.clone();
        }
        if let Some(group) = &self.kafka_consumer_group {
            config.ingest.group_id = group.clone();
        }
        if let Some(topic) = &self.documents_topic {
            config.ingest.documents_topic = topic.clone();
        }
        if let Some(topic) = &self.signatures_topic {
            config.ingest.signatures_topic = topic.clone();
        }
        if let Some(secret) = &self.jwt_secret {
            config.jwt.secret = secret.clone();
        }
        if let Some(name) = &self.jwt_algorithm {
            config.jwt.algorithm = Algorithm::from_str(name).map_err(|e| {
                CliError::config_error(format!("Invalid JWT algorithm '{}': {}", name, e))
            })?;
        }
        if self.enable_token_endpoint {
            config.http.enable_token_endpoint = true;
        }
        Ok(())
    }
}

impl TokenArgs {
    pub fn resolve(&self) -> CliResult<GatewayConfig> {
        let mut config = GatewayConfig::load_or_default(self.config.as_deref())
            .map_err(|e| CliError::config_error(e.to_string()))?;
        if let Some(secret) = &self.jwt_secret {
            config.jwt.secret = secret.clone();
        }
        Ok(config)
    }
}
