//! # Ingest Module
//!
//! Consumes change records from the upstream stream and feeds them through
//! the interpreter into the dispatcher.
//!
//! - **Stream**: `StreamConnector` / `ChangeStream` seam, in-memory channel
//! - **Kafka**: rdkafka adapter (feature `kafka`)
//! - **Ingestor**: lifecycle, consume loop, reconnect with backoff

pub mod backoff;
pub mod config;
pub mod errors;
pub mod ingestor;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod stream;

pub use backoff::BackoffPolicy;
pub use config::{IngestConfig, TopicRoutes};
pub use errors::{IngestError, IngestResult, StreamError};
pub use ingestor::{
    ChangeStreamIngestor, IngestStats, IngestStatsSnapshot, IngestorMonitor, IngestorState,
};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConnector, KafkaStream};
pub use stream::{
    ChangeStream, ChannelConnector, ChannelPublisher, ChannelStream, StreamConnector, StreamRecord,
};
