//! Auth HTTP Routes
//!
//! Test-token minting. Off unless `enable_token_endpoint` is set.

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::errors::AuthError;
use crate::auth::jwt::{JwtManager, TokenResponse};

/// Shared auth state
#[derive(Debug, Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtManager>,
    pub token_endpoint_enabled: bool,
}

impl AuthState {
    pub fn new(jwt: Arc<JwtManager>, token_endpoint_enabled: bool) -> Self {
        Self {
            jwt,
            token_endpoint_enabled,
        }
    }
}

/// Auth routes with shared state
pub fn auth_routes(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/token", get(token_handler))
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: StatusCode) -> Self {
        Self {
            error: error.into(),
            code: code.as_u16(),
        }
    }
}

impl From<AuthError> for ErrorResponse {
    fn from(err: AuthError) -> Self {
        Self {
            error: err.to_string(),
            code: err.status_code(),
        }
    }
}

// ==================
// Handlers
// ==================

/// Mint a signed token for the given user
async fn token_handler(
    State(state): State<Arc<AuthState>>,
    Query(request): Query<TokenRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !state.token_endpoint_enabled {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Token endpoint disabled", StatusCode::NOT_FOUND)),
        ));
    }

    match state.jwt.generate_token(&request.user_id, &request.email) {
        Ok(token) => {
            info!(user_id = %request.user_id, "issued test token");
            Ok(Json(TokenResponse::bearer(
                token,
                request.user_id,
                request.email,
            )))
        }
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Err((status, Json(ErrorResponse::from(e))))
        }
    }
}
