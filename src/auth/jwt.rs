//! # JWT Token Management
//!
//! Bearer-token generation and validation for subscriber connections.
//!
//! Tokens are HMAC-signed with a shared secret fixed at process start and
//! carry only the subscriber identity (`sub`, `email`) plus `iat`/`exp`.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::errors::{AuthError, AuthResult};

/// JWT claims carried by subscriber tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// User's email
    pub email: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds)
    pub exp: i64,
}

/// Identity of an authenticated subscriber, extracted from its token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

impl From<JwtClaims> for Identity {
    fn from(claims: JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Shared secret for signing and verification
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Signing algorithm (HMAC family only)
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,

    /// Lifetime of tokens minted by this process, in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Clock skew tolerated on `exp`, in seconds
    #[serde(default)]
    pub leeway_secs: u64,
}

fn default_secret() -> String {
    "secret-key".to_string()
}

fn default_algorithm() -> Algorithm {
    Algorithm::HS256
}

fn default_token_ttl_hours() -> i64 {
    24
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: default_secret(),
            algorithm: default_algorithm(),
            token_ttl_hours: default_token_ttl_hours(),
            leeway_secs: 0,
        }
    }
}

/// JWT manager for token generation and validation
#[derive(Clone)]
pub struct JwtManager {
    algorithm: Algorithm,
    token_ttl: Duration,
    leeway_secs: u64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("algorithm", &self.algorithm)
            .field("token_ttl", &self.token_ttl)
            .field("leeway_secs", &self.leeway_secs)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Create a new JWT manager with the given configuration
    pub fn new(config: &JwtConfig) -> AuthResult<Self> {
        if !matches!(
            config.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::UnsupportedAlgorithm(format!(
                "{:?}",
                config.algorithm
            )));
        }

        Ok(Self {
            algorithm: config.algorithm,
            token_ttl: Duration::hours(config.token_ttl_hours),
            leeway_secs: config.leeway_secs,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        })
    }

    /// Generate a token for a subscriber using the configured lifetime
    pub fn generate_token(&self, user_id: &str, email: &str) -> AuthResult<String> {
        self.generate_token_with_ttl(user_id, email, self.token_ttl)
    }

    /// Generate a token with an explicit lifetime
    pub fn generate_token_with_ttl(
        &self,
        user_id: &str,
        email: &str,
        ttl: Duration,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|_| AuthError::TokenGenerationFailed)
    }

    /// Validate a token's signature and expiry and extract its claims
    pub fn validate_token(&self, token: &str) -> AuthResult<JwtClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.leeway_secs;

        let token_data =
            decode::<JwtClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AuthError::InvalidSignature
                    }
                    _ => AuthError::MalformedToken,
                }
            })?;

        Ok(token_data.claims)
    }

    /// Authenticate a connection request carrying an optional bearer token
    pub fn authenticate(&self, token: Option<&str>) -> AuthResult<Identity> {
        match token {
            Some(token) if !token.is_empty() => self.validate_token(token).map(Identity::from),
            _ => Err(AuthError::MissingToken),
        }
    }
}

/// Token response returned by the test-token endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: String,
    pub email: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String, user_id: String, email: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            user_id,
            email,
        }
    }
}
