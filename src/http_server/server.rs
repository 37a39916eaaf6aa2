//! # HTTP Server
//!
//! Main HTTP server combining all endpoint routers.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::auth_routes::{auth_routes, AuthState};
use super::config::HttpServerConfig;
use super::observability_routes::observability_routes;
use super::realtime_routes::{realtime_routes, RealtimeState};

/// HTTP server for the gateway
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: Arc<RealtimeState>) -> Self {
        let router = Self::build_router(&config, state);
        Self { config, router }
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &HttpServerConfig, state: Arc<RealtimeState>) -> Router {
        let auth_state = Arc::new(AuthState::new(
            Arc::clone(&state.jwt),
            config.enable_token_endpoint,
        ));

        let cors = if config.allows_any_origin() || config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(observability_routes(Arc::clone(&state)))
            .merge(realtime_routes(state))
            .nest("/auth", auth_routes(auth_state))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(%addr, "gateway listening");
        info!("  - GET  /ws/:subject_id?token=...  subscriber websocket");
        info!("  - POST /broadcast/:subject_id     manual broadcast");
        info!("  - GET  /health/live, /health/ready, /stats");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
