//! Change stream abstraction.
//!
//! The ingestor only sees [`StreamConnector`] and [`ChangeStream`]; the Kafka
//! consumer and the in-memory channel used by tests both sit behind them.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use super::errors::StreamError;

/// One raw record read from the change stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// `None` for tombstones
    pub payload: Option<Vec<u8>>,
}

impl StreamRecord {
    /// Record with a payload on partition 0
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            key: None,
            payload: Some(payload.into()),
        }
    }

    /// Tombstone record (no payload)
    pub fn tombstone(topic: impl Into<String>) -> Self {
        Self {
            payload: None,
            ..Self::new(topic, Vec::new())
        }
    }

    pub fn at_offset(mut self, partition: i32, offset: i64) -> Self {
        self.partition = partition;
        self.offset = offset;
        self
    }
}

/// A connected, subscribed source of change records
pub trait ChangeStream: Send + 'static {
    /// Wait for the next record.
    ///
    /// `StreamError::Closed` ends consumption; `StreamError::Disconnected`
    /// asks the caller to rebuild the stream through its connector.
    fn next_record(&mut self) -> impl Future<Output = Result<StreamRecord, StreamError>> + Send;

    /// Release the subscription. Called once before the stream is dropped.
    fn close(&mut self);
}

/// Builds change streams; called once at start and again on every reconnect
pub trait StreamConnector: Send + Sync + 'static {
    type Stream: ChangeStream;

    fn connect(&self) -> impl Future<Output = Result<Self::Stream, StreamError>> + Send;
}

type Item = Result<StreamRecord, StreamError>;
type Slot = Arc<Mutex<Option<mpsc::Receiver<Item>>>>;

/// In-memory change stream fed by a [`ChannelPublisher`].
///
/// Only one stream can be connected at a time; closing it hands the
/// receiver back so the connector can be reconnected without losing
/// queued records.
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    slot: Slot,
}

/// Producer half of an in-memory change stream
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<Item>,
}

/// Stream handed out by [`ChannelConnector::connect`]
#[derive(Debug)]
pub struct ChannelStream {
    receiver: Option<mpsc::Receiver<Item>>,
    slot: Slot,
}

impl ChannelConnector {
    /// Create a connector and the publisher feeding it
    pub fn new(capacity: usize) -> (Self, ChannelPublisher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connector = Self {
            slot: Arc::new(Mutex::new(Some(rx))),
        };
        (connector, ChannelPublisher { tx })
    }
}

impl StreamConnector for ChannelConnector {
    type Stream = ChannelStream;

    async fn connect(&self) -> Result<ChannelStream, StreamError> {
        let receiver = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| StreamError::Connect("channel stream already connected".to_string()))?;

        Ok(ChannelStream {
            receiver: Some(receiver),
            slot: Arc::clone(&self.slot),
        })
    }
}

impl ChangeStream for ChannelStream {
    async fn next_record(&mut self) -> Result<StreamRecord, StreamError> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(StreamError::Closed);
        };
        match receiver.recv().await {
            Some(item) => item,
            None => Err(StreamError::Closed),
        }
    }

    fn close(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(receiver);
        }
    }
}

impl Drop for ChannelStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl ChannelPublisher {
    /// Queue a record; fails once the connector has been dropped
    pub async fn publish(&self, record: StreamRecord) -> Result<(), StreamError> {
        self.tx.send(Ok(record)).await.map_err(|_| StreamError::Closed)
    }

    /// Queue a JSON change record on `topic`
    pub async fn publish_json(
        &self,
        topic: &str,
        value: &serde_json::Value,
    ) -> Result<(), StreamError> {
        self.publish(StreamRecord::new(topic, value.to_string())).await
    }

    /// Inject a stream error, as a broker failure would surface it
    pub async fn fail(&self, error: StreamError) -> Result<(), StreamError> {
        self.tx.send(Err(error)).await.map_err(|_| StreamError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_arrive_in_order() {
        let (connector, publisher) = ChannelConnector::new(8);
        let mut stream = connector.connect().await.unwrap();

        publisher.publish(StreamRecord::new("t", "a")).await.unwrap();
        publisher.publish(StreamRecord::new("t", "b")).await.unwrap();

        assert_eq!(stream.next_record().await.unwrap().payload.unwrap(), b"a");
        assert_eq!(stream.next_record().await.unwrap().payload.unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_dropped_publisher_closes_stream() {
        let (connector, publisher) = ChannelConnector::new(8);
        let mut stream = connector.connect().await.unwrap();
        drop(publisher);

        assert_eq!(stream.next_record().await, Err(StreamError::Closed));
    }

    #[tokio::test]
    async fn test_single_active_stream() {
        let (connector, _publisher) = ChannelConnector::new(8);
        let _stream = connector.connect().await.unwrap();

        assert!(matches!(
            connector.connect().await,
            Err(StreamError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_reconnect_keeps_queued_records() {
        let (connector, publisher) = ChannelConnector::new(8);
        let mut stream = connector.connect().await.unwrap();
        publisher.publish(StreamRecord::new("t", "queued")).await.unwrap();
        stream.close();
        drop(stream);

        let mut stream = connector.connect().await.unwrap();
        let record = stream.next_record().await.unwrap();
        assert_eq!(record.payload.unwrap(), b"queued");
    }

    #[tokio::test]
    async fn test_injected_error() {
        let (connector, publisher) = ChannelConnector::new(8);
        let mut stream = connector.connect().await.unwrap();
        publisher
            .fail(StreamError::Transient("timeout".into()))
            .await
            .unwrap();

        assert_eq!(
            stream.next_record().await,
            Err(StreamError::Transient("timeout".into()))
        );
    }
}
