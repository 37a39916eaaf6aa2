//! # Real-Time Errors
//!
//! Error types for the real-time module.

use thiserror::Error;

/// Result type for real-time operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Real-time errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    // ==================
    // Change Record Errors
    // ==================
    /// Payload is not a decodable change record
    #[error("Invalid change record: {0}")]
    InvalidRecord(String),

    /// Operation requires a row image the record does not carry
    #[error("{operation} record is missing its '{image}' image")]
    MissingImage {
        operation: &'static str,
        image: &'static str,
    },

    /// A watched field holds a value of the wrong type
    #[error("Field '{field}' must be {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    // ==================
    // Delivery Errors
    // ==================
    /// Connection has already been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound queue is full; the subscriber is not keeping up
    #[error("Slow consumer: outbound queue full")]
    SlowConsumer,

    // ==================
    // Protocol Errors
    // ==================
    /// Invalid control frame from a client
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RealtimeError::MissingImage {
            operation: "create",
            image: "after",
        };
        assert_eq!(err.to_string(), "create record is missing its 'after' image");

        let err = RealtimeError::InvalidField {
            field: "version".into(),
            expected: "an integer",
        };
        assert_eq!(err.to_string(), "Field 'version' must be an integer");
    }
}
