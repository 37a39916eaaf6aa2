//! # Ingest Errors
//!
//! Error types for the change stream and its consumer loop.

use thiserror::Error;

/// Result type for ingestor operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Errors reported by a change stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// Could not create or subscribe the consumer
    #[error("Failed to connect to change stream: {0}")]
    Connect(String),

    /// Connection to the broker was lost; the consumer must be rebuilt
    #[error("Change stream disconnected: {0}")]
    Disconnected(String),

    /// A recoverable error; the next poll may succeed
    #[error("Transient change stream error: {0}")]
    Transient(String),

    /// The stream has ended and will yield no more records
    #[error("Change stream closed")]
    Closed,
}

/// Ingestor lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// `start()` called while the ingestor is not stopped
    #[error("Ingestor is already running")]
    AlreadyRunning,

    /// Stream error surfaced during startup
    #[error(transparent)]
    Stream(#[from] StreamError),
}
