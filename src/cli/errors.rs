//! CLI-specific error types
//!
//! Every CLI error is fatal: the binary prints it and exits non-zero.

use std::io;

use thiserror::Error;

use crate::auth::AuthError;
use crate::ingest::IngestError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file or override error
    ConfigError,
    /// I/O error (stdout, socket bind)
    IoError,
    /// Runtime, consumer or server failed to come up
    BootFailed,
    /// Token could not be issued
    TokenFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "CHANGECAST_CLI_CONFIG_ERROR",
            Self::IoError => "CHANGECAST_CLI_IO_ERROR",
            Self::BootFailed => "CHANGECAST_CLI_BOOT_FAILED",
            Self::TokenFailed => "CHANGECAST_CLI_TOKEN_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug, Error)]
#[error("{}: {message}", .code.code())]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<IngestError> for CliError {
    fn from(e: IngestError) -> Self {
        Self::boot_failed(format!("Change stream consumer failed to start: {}", e))
    }
}

impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UnsupportedAlgorithm(_) => Self::config_error(e.to_string()),
            _ => Self::new(CliErrorCode::TokenFailed, e.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StreamError;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::config_error("bad port");
        assert_eq!(err.to_string(), "CHANGECAST_CLI_CONFIG_ERROR: bad port");
    }

    #[test]
    fn test_ingest_error_is_boot_failure() {
        let err = CliError::from(IngestError::Stream(StreamError::Connect("refused".into())));
        assert_eq!(err.code(), &CliErrorCode::BootFailed);
        assert!(err.message().contains("refused"));
    }

    #[test]
    fn test_auth_error_mapping() {
        let err = CliError::from(AuthError::UnsupportedAlgorithm("RS256".into()));
        assert_eq!(err.code(), &CliErrorCode::ConfigError);

        let err = CliError::from(AuthError::TokenGenerationFailed);
        assert_eq!(err.code(), &CliErrorCode::TokenFailed);
    }
}
