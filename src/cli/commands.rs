//! CLI command implementations
//!
//! `serve` wires registry, dispatcher, ingestor and HTTP server together and
//! runs until Ctrl-C; `token` prints a signed token and exits.

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::{JwtManager, TokenResponse};
use crate::config::GatewayConfig;
use crate::http_server::{HttpServer, RealtimeState};
use crate::ingest::{ChangeStreamIngestor, IngestorMonitor, StreamConnector};
use crate::realtime::{Dispatcher, SubscriberRegistry};

use super::args::{Cli, Command, ServeArgs, TokenArgs};
use super::errors::{CliError, CliResult};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run a command
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve(args) => serve(&args),
        Command::Token(args) => token(&args),
    }
}

/// Run the gateway until interrupted
pub fn serve(args: &ServeArgs) -> CliResult<()> {
    let config = args.resolve()?;
    init_tracing();

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    let connector = change_stream(&config, !args.no_ingest);
    rt.block_on(run_gateway(config, connector))
}

#[cfg(feature = "kafka")]
fn change_stream(config: &GatewayConfig, enabled: bool) -> Option<crate::ingest::KafkaConnector> {
    enabled.then(|| crate::ingest::KafkaConnector::new(config.ingest.clone()))
}

#[cfg(not(feature = "kafka"))]
fn change_stream(_config: &GatewayConfig, enabled: bool) -> Option<crate::ingest::ChannelConnector> {
    if enabled {
        warn!("built without the kafka feature; change stream consumer disabled");
    }
    None
}

/// Start the ingestor (when a connector is given) and serve HTTP until
/// Ctrl-C, then drain connections and stop the ingestor.
pub async fn run_gateway<C: StreamConnector>(
    config: GatewayConfig,
    connector: Option<C>,
) -> CliResult<()> {
    let jwt = Arc::new(JwtManager::new(&config.jwt)?);
    let registry = Arc::new(SubscriberRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(registry));

    info!(service = %config.service_name, "starting up");

    let ingestor = match connector {
        Some(connector) => {
            let ingestor =
                ChangeStreamIngestor::from_config(connector, &config.ingest, Arc::clone(&dispatcher));
            ingestor.start().await?;
            Some(ingestor)
        }
        None => {
            warn!("change stream consumer disabled; only manual broadcasts will be delivered");
            None
        }
    };
    let monitor = ingestor
        .as_ref()
        .map(ChangeStreamIngestor::monitor)
        .unwrap_or_else(IngestorMonitor::detached);

    let state = Arc::new(RealtimeState::new(
        config.service_name.clone(),
        dispatcher,
        jwt,
        monitor,
        config.outbound_queue_capacity,
    ));
    let server = HttpServer::new(config.http.clone(), state);
    let result = server.start(shutdown_signal()).await;

    info!(service = %config.service_name, "shutting down");
    if let Some(ingestor) = &ingestor {
        ingestor.stop().await;
    }

    result.map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))?;
    info!("shutdown complete");
    Ok(())
}

/// Print a signed token as JSON
pub fn token(args: &TokenArgs) -> CliResult<()> {
    let config = args.resolve()?;
    let jwt = JwtManager::new(&config.jwt)?;

    let access_token = match args.ttl_hours {
        Some(hours) => jwt.generate_token_with_ttl(&args.user_id, &args.email, Duration::hours(hours))?,
        None => jwt.generate_token(&args.user_id, &args.email)?,
    };
    let response = TokenResponse::bearer(access_token, args.user_id.clone(), args.email.clone());

    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| CliError::io_error(format!("JSON error: {}", e)))?;
    println!("{}", json);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "changecast=info,tower_http=info".into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
