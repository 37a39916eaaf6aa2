//! Change stream consumer configuration.

use serde::{Deserialize, Serialize};

use super::backoff::BackoffPolicy;
use crate::realtime::EntityKind;

/// Change stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Kafka bootstrap servers (default: "localhost:9092")
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,

    /// Consumer group for independent offset tracking
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Topic carrying document change records
    #[serde(default = "default_documents_topic")]
    pub documents_topic: String,

    /// Topic carrying signature change records
    #[serde(default = "default_signatures_topic")]
    pub signatures_topic: String,

    /// Where a new consumer group starts reading (default: "latest")
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,

    /// How long startup waits for broker metadata (default: 10s)
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,

    /// Reconnect policy after losing the broker
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "websocket-consumer-group".to_string()
}

fn default_documents_topic() -> String {
    "cdc.documents".to_string()
}

fn default_signatures_topic() -> String {
    "cdc.signatures".to_string()
}

fn default_auto_offset_reset() -> String {
    "latest".to_string()
}

fn default_metadata_timeout_ms() -> u64 {
    10_000
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            group_id: default_group_id(),
            documents_topic: default_documents_topic(),
            signatures_topic: default_signatures_topic(),
            auto_offset_reset: default_auto_offset_reset(),
            metadata_timeout_ms: default_metadata_timeout_ms(),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl IngestConfig {
    /// Topic → entity routing for this configuration
    pub fn routes(&self) -> TopicRoutes {
        TopicRoutes::new(&self.documents_topic, &self.signatures_topic)
    }

    /// Topics to subscribe to
    pub fn topics(&self) -> Vec<String> {
        vec![self.documents_topic.clone(), self.signatures_topic.clone()]
    }
}

/// Maps each watched topic to the entity kind it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRoutes {
    documents: String,
    signatures: String,
}

impl TopicRoutes {
    pub fn new(documents: impl Into<String>, signatures: impl Into<String>) -> Self {
        Self {
            documents: documents.into(),
            signatures: signatures.into(),
        }
    }

    pub fn entity_for(&self, topic: &str) -> Option<EntityKind> {
        if topic == self.documents {
            Some(EntityKind::Document)
        } else if topic == self.signatures {
            Some(EntityKind::Signature)
        } else {
            None
        }
    }
}

impl Default for TopicRoutes {
    fn default() -> Self {
        IngestConfig::default().routes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.group_id, "websocket-consumer-group");
        assert_eq!(config.auto_offset_reset, "latest");
        assert_eq!(config.topics(), vec!["cdc.documents", "cdc.signatures"]);
    }

    #[test]
    fn test_routes() {
        let routes = TopicRoutes::default();

        assert_eq!(routes.entity_for("cdc.documents"), Some(EntityKind::Document));
        assert_eq!(routes.entity_for("cdc.signatures"), Some(EntityKind::Signature));
        assert_eq!(routes.entity_for("cdc.users"), None);
    }

    #[test]
    fn test_partial_config() {
        let config: IngestConfig =
            serde_json::from_str(r#"{"bootstrap_servers": "kafka:29092"}"#).unwrap();

        assert_eq!(config.bootstrap_servers, "kafka:29092");
        assert_eq!(config.documents_topic, "cdc.documents");
        assert_eq!(config.backoff, BackoffPolicy::default());
    }
}
