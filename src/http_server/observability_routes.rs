//! Observability HTTP Routes
//!
//! Liveness and readiness probes plus connection and ingest statistics.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use super::realtime_routes::RealtimeState;
use crate::ingest::{IngestStatsSnapshot, IngestorState};

/// Liveness response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub service: String,
    pub kafka_consumer: IngestorState,
    pub total_connections: usize,
}

/// Gateway statistics
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_connections: usize,
    pub documents_with_subscribers: usize,
    pub kafka_consumer_running: bool,
    pub ingest: IngestStatsSnapshot,
}

/// Create observability routes
pub fn observability_routes(state: Arc<RealtimeState>) -> Router {
    Router::new()
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
}

async fn liveness_handler(State(state): State<Arc<RealtimeState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "alive".to_string(),
        service: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}

/// Ready only while the ingestor is consuming
async fn readiness_handler(State(state): State<Arc<RealtimeState>>) -> impl IntoResponse {
    let ingestor = state.ingestor.state();
    let ready = ingestor == IngestorState::Running;
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" },
        service: state.service_name.clone(),
        kafka_consumer: ingestor,
        total_connections: state.registry.total_connections(),
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn stats_handler(State(state): State<Arc<RealtimeState>>) -> impl IntoResponse {
    Json(StatsResponse {
        total_connections: state.registry.total_connections(),
        documents_with_subscribers: state.registry.subjects_with_subscribers(),
        kafka_consumer_running: state.ingestor.is_running(),
        ingest: state.ingestor.stats(),
    })
}
