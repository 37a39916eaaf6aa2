//! # Authentication
//!
//! Bearer-token authentication for subscriber connections.

pub mod errors;
pub mod jwt;

pub use errors::{AuthError, AuthResult, POLICY_VIOLATION};
pub use jwt::{Identity, JwtClaims, JwtConfig, JwtManager, TokenResponse};
