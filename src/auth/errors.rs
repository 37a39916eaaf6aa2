//! # Auth Errors
//!
//! Error types for bearer-token authentication.

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// WebSocket close code for policy violations (RFC 6455 §7.4.1)
pub const POLICY_VIOLATION: u16 = 1008;

/// Authentication errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    // ==================
    // Handshake Errors
    // ==================
    /// No bearer token supplied with the connection request
    #[error("Missing token")]
    MissingToken,

    /// JWT token is malformed or carries unexpected claims
    #[error("Malformed token")]
    MalformedToken,

    /// JWT token has expired
    #[error("Token expired")]
    TokenExpired,

    /// JWT signature is invalid
    #[error("Invalid token signature")]
    InvalidSignature,

    // ==================
    // Internal Errors
    // ==================
    /// Configured algorithm cannot be used with a shared secret
    #[error("Unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Token generation failed
    #[error("Internal error: token generation failed")]
    TokenGenerationFailed,
}

impl AuthError {
    /// Returns the WebSocket close code sent when a handshake is rejected
    pub fn close_code(&self) -> u16 {
        POLICY_VIOLATION
    }

    /// Returns the close reason sent to the client.
    ///
    /// Expired tokens are distinguishable from forged or garbled ones so
    /// clients know to refresh rather than give up.
    pub fn close_reason(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Missing token",
            AuthError::TokenExpired => "Token expired",
            _ => "Invalid token",
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::MalformedToken => 400,

            AuthError::MissingToken => 401,
            AuthError::TokenExpired => 401,
            AuthError::InvalidSignature => 401,

            AuthError::UnsupportedAlgorithm(_) => 500,
            AuthError::TokenGenerationFailed => 500,
        }
    }
}
