//! # HTTP Server Module
//!
//! Axum server for the gateway.
//!
//! # Endpoints
//!
//! - `/ws/:subject_id` - Subscriber WebSocket
//! - `/broadcast/:subject_id` - Manual broadcast
//! - `/health/live`, `/health/ready`, `/stats` - Probes and statistics
//! - `/auth/token` - Test token minting (disabled by default)

pub mod auth_routes;
pub mod config;
pub mod observability_routes;
pub mod realtime_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use realtime_routes::RealtimeState;
pub use server::HttpServer;
