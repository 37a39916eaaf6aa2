//! Kafka change stream built on rdkafka's `StreamConsumer`.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use tracing::{debug, info};

use super::config::IngestConfig;
use super::errors::StreamError;
use super::stream::{ChangeStream, StreamConnector, StreamRecord};

/// Connects to the configured brokers and subscribes to both change topics
#[derive(Debug, Clone)]
pub struct KafkaConnector {
    config: IngestConfig,
}

/// Subscribed Kafka consumer
pub struct KafkaStream {
    consumer: Arc<StreamConsumer>,
}

impl KafkaConnector {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new();
        client
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("group.id", &self.config.group_id)
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set("enable.auto.commit", "true")
            .set("enable.partition.eof", "false");
        client
    }
}

impl StreamConnector for KafkaConnector {
    type Stream = KafkaStream;

    async fn connect(&self) -> Result<KafkaStream, StreamError> {
        let consumer: StreamConsumer = self
            .client_config()
            .create()
            .map_err(|e| StreamError::Connect(format!("failed to create consumer: {e}")))?;
        let consumer = Arc::new(consumer);

        let topics = self.config.topics();
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| StreamError::Connect(format!("failed to subscribe: {e}")))?;

        // Subscribing never touches the network; metadata does.
        let probe = Arc::clone(&consumer);
        let timeout = Duration::from_millis(self.config.metadata_timeout_ms);
        tokio::task::spawn_blocking(move || probe.fetch_metadata(None, timeout).map(|_| ()))
            .await
            .map_err(|e| StreamError::Connect(e.to_string()))?
            .map_err(|e| StreamError::Connect(format!("brokers unreachable: {e}")))?;

        info!(
            bootstrap_servers = %self.config.bootstrap_servers,
            group_id = %self.config.group_id,
            topics = ?topics,
            "subscribed to change topics"
        );
        Ok(KafkaStream { consumer })
    }
}

impl ChangeStream for KafkaStream {
    async fn next_record(&mut self) -> Result<StreamRecord, StreamError> {
        match self.consumer.recv().await {
            Ok(msg) => Ok(StreamRecord {
                topic: msg.topic().to_string(),
                partition: msg.partition(),
                offset: msg.offset(),
                key: msg.key().map(<[u8]>::to_vec),
                payload: msg.payload().map(<[u8]>::to_vec),
            }),
            Err(e) => Err(classify(e)),
        }
    }

    fn close(&mut self) {
        debug!("unsubscribing kafka consumer");
        self.consumer.unsubscribe();
    }
}

fn classify(error: KafkaError) -> StreamError {
    match error.rdkafka_error_code() {
        Some(RDKafkaErrorCode::AllBrokersDown) | Some(RDKafkaErrorCode::BrokerTransportFailure) => {
            StreamError::Disconnected(error.to_string())
        }
        _ => StreamError::Transient(error.to_string()),
    }
}
