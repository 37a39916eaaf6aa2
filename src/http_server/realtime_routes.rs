//! Realtime HTTP Routes and WebSocket Handler
//!
//! The subscriber endpoint `GET /ws/:subject_id?token=...` and the manual
//! broadcast endpoint.

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::auth::JwtManager;
use crate::ingest::IngestorMonitor;
use crate::realtime::websocket::{reject, run_session};
use crate::realtime::{Dispatcher, ServerMessage, Session, SubscriberRegistry};

// ==================
// Shared State
// ==================

/// State shared by every gateway handler
#[derive(Debug, Clone)]
pub struct RealtimeState {
    pub service_name: String,
    pub registry: Arc<SubscriberRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub jwt: Arc<JwtManager>,
    pub ingestor: IngestorMonitor,
    pub outbound_capacity: usize,
}

impl RealtimeState {
    pub fn new(
        service_name: impl Into<String>,
        dispatcher: Arc<Dispatcher>,
        jwt: Arc<JwtManager>,
        ingestor: IngestorMonitor,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            registry: Arc::clone(dispatcher.registry()),
            dispatcher,
            jwt,
            ingestor,
            outbound_capacity,
        }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub status: String,
    pub document_id: String,
    pub recipients: usize,
}

// ==================
// Realtime Routes
// ==================

/// Create realtime routes with WebSocket support
pub fn realtime_routes(state: Arc<RealtimeState>) -> Router {
    Router::new()
        .route("/ws/:subject_id", get(websocket_handler))
        .route("/broadcast/:subject_id", post(broadcast_handler))
        .with_state(state)
}

// ==================
// WebSocket Handler
// ==================

/// Authenticate the handshake, then upgrade into a session or a rejection.
///
/// Rejected clients still get the upgrade so the refusal can travel as a
/// close frame with a policy-violation code.
async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(subject_id): Path<String>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<RealtimeState>>,
) -> Response {
    match state.jwt.authenticate(params.token.as_deref()) {
        Ok(identity) => {
            let session = Session::new(subject_id, identity, Arc::clone(&state.registry))
                .with_outbound_capacity(state.outbound_capacity);
            ws.on_upgrade(move |socket| run_session(socket, session))
        }
        Err(e) => {
            warn!(subject_id = %subject_id, error = %e, "websocket handshake rejected");
            ws.on_upgrade(move |socket| reject(socket, e))
        }
    }
}

// ==================
// HTTP Handlers
// ==================

/// Forward an arbitrary JSON message to every subscriber of a subject
async fn broadcast_handler(
    State(state): State<Arc<RealtimeState>>,
    Path(subject_id): Path<String>,
    Json(message): Json<Value>,
) -> impl IntoResponse {
    let report = state
        .dispatcher
        .dispatch_message(&subject_id, &ServerMessage::Raw(message));
    info!(subject_id = %subject_id, recipients = report.delivered, "manual broadcast");

    Json(BroadcastResponse {
        status: "broadcasted".to_string(),
        document_id: subject_id,
        recipients: report.delivered,
    })
}
