//! # Change Stream Ingestor
//!
//! Owns the consume loop: pull a record, interpret it, dispatch the event.
//!
//! Lifecycle is `stopped → running → stopping → stopped`. The loop has a
//! single suspension point (the next record) and is cancelled there.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::config::{IngestConfig, TopicRoutes};
use super::errors::{IngestError, IngestResult, StreamError};
use super::stream::{ChangeStream, StreamConnector, StreamRecord};
use crate::realtime::{interpret_bytes, Dispatcher};

/// Ingestor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestorState {
    Stopped,
    Running,
    Stopping,
}

impl IngestorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

/// Consume loop counters
#[derive(Debug, Default)]
pub struct IngestStats {
    consumed: AtomicU64,
    dispatched: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
    reconnects: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    pub records_consumed: u64,
    pub events_dispatched: u64,
    pub records_skipped: u64,
    pub errors: u64,
    pub reconnects: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            records_consumed: self.consumed.load(Ordering::Relaxed),
            events_dispatched: self.dispatched.load(Ordering::Relaxed),
            records_skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-only view of an ingestor for health and stats reporting
#[derive(Debug, Clone)]
pub struct IngestorMonitor {
    state: watch::Receiver<IngestorState>,
    stats: Arc<IngestStats>,
}

impl IngestorMonitor {
    /// Monitor for a gateway running without an ingestor; always stopped
    pub fn detached() -> Self {
        let (_, state) = watch::channel(IngestorState::Stopped);
        Self {
            state,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn state(&self) -> IngestorState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == IngestorState::Running
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait until the ingestor reaches `target`
    pub async fn wait_for(&mut self, target: IngestorState) -> IngestorState {
        let reached = self
            .state
            .wait_for(|state| *state == target)
            .await
            .map(|state| *state);
        reached.unwrap_or_else(|_| self.state())
    }
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

struct Pipeline<C> {
    connector: C,
    routes: TopicRoutes,
    backoff: BackoffPolicy,
    dispatcher: Arc<Dispatcher>,
    state: watch::Sender<IngestorState>,
    stats: Arc<IngestStats>,
}

/// Consumes change records and hands the resulting events to the dispatcher
pub struct ChangeStreamIngestor<C: StreamConnector> {
    pipeline: Arc<Pipeline<C>>,
    worker: Mutex<Option<Worker>>,
}

impl<C: StreamConnector> ChangeStreamIngestor<C> {
    pub fn new(
        connector: C,
        routes: TopicRoutes,
        backoff: BackoffPolicy,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        let (state, _) = watch::channel(IngestorState::Stopped);
        Self {
            pipeline: Arc::new(Pipeline {
                connector,
                routes,
                backoff,
                dispatcher,
                state,
                stats: Arc::new(IngestStats::default()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Ingestor using the topics and reconnect policy from `config`
    pub fn from_config(connector: C, config: &IngestConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self::new(connector, config.routes(), config.backoff.clone(), dispatcher)
    }

    pub fn state(&self) -> IngestorState {
        *self.pipeline.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == IngestorState::Running
    }

    pub fn stats(&self) -> IngestStatsSnapshot {
        self.pipeline.stats.snapshot()
    }

    pub fn monitor(&self) -> IngestorMonitor {
        IngestorMonitor {
            state: self.pipeline.state.subscribe(),
            stats: Arc::clone(&self.pipeline.stats),
        }
    }

    /// Connect to the stream and spawn the consume loop.
    ///
    /// Fails with `AlreadyRunning` unless stopped; connection failures are
    /// returned and leave the ingestor stopped.
    pub async fn start(&self) -> IngestResult<()> {
        let mut worker = self.worker.lock().await;
        if self.state() != IngestorState::Stopped {
            return Err(IngestError::AlreadyRunning);
        }

        // A loop that gave up on reconnecting leaves its handle behind.
        if let Some(finished) = worker.take() {
            let _ = finished.handle.await;
        }

        let stream = self.pipeline.connector.connect().await?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        self.pipeline.state.send_replace(IngestorState::Running);

        let pipeline = Arc::clone(&self.pipeline);
        let handle = tokio::spawn(async move { pipeline.consume(stream, shutdown_rx).await });
        *worker = Some(Worker { shutdown, handle });

        info!("change stream ingestor started");
        Ok(())
    }

    /// Cancel the consume loop, wait for it to release the stream, then
    /// report stopped. No-op when already stopped.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;
        let Some(Worker { shutdown, handle }) = worker.take() else {
            return;
        };

        self.pipeline.state.send_if_modified(|state| {
            if *state == IngestorState::Running {
                *state = IngestorState::Stopping;
                true
            } else {
                false
            }
        });
        let _ = shutdown.send(true);

        if let Err(e) = handle.await {
            error!(error = %e, "consume loop panicked");
        }
        self.pipeline.state.send_replace(IngestorState::Stopped);
        info!("change stream ingestor stopped");
    }
}

impl<C: StreamConnector> Pipeline<C> {
    async fn consume(&self, mut stream: C::Stream, mut shutdown: watch::Receiver<bool>) {
        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = stream.next_record() => next,
            };

            match next {
                Ok(record) => self.process(&record),
                Err(StreamError::Transient(reason)) => {
                    IngestStats::bump(&self.stats.errors);
                    warn!(%reason, "change stream error, continuing");
                }
                Err(StreamError::Closed) => {
                    info!("change stream closed");
                    break;
                }
                Err(e @ (StreamError::Disconnected(_) | StreamError::Connect(_))) => {
                    IngestStats::bump(&self.stats.errors);
                    warn!(error = %e, "change stream lost, reconnecting");
                    stream.close();
                    drop(stream);

                    match self.reconnect(&mut shutdown).await {
                        Some(fresh) => stream = fresh,
                        None => {
                            self.finish(&shutdown);
                            return;
                        }
                    }
                }
            }
        }

        stream.close();
        self.finish(&shutdown);
    }

    /// Loop exited: unless `stop()` asked for it, nobody else will mark the
    /// ingestor stopped.
    fn finish(&self, shutdown: &watch::Receiver<bool>) {
        if !*shutdown.borrow() {
            self.state.send_replace(IngestorState::Stopped);
        }
    }

    async fn reconnect(&self, shutdown: &mut watch::Receiver<bool>) -> Option<C::Stream> {
        let max_retries = self.backoff.max_retries;
        for attempt in 1..=max_retries {
            let delay = self.backoff.delay(attempt);
            info!(attempt, max_retries, delay_ms = delay.as_millis() as u64, "reconnect scheduled");

            tokio::select! {
                biased;
                _ = shutdown.changed() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.connector.connect().await {
                Ok(stream) => {
                    IngestStats::bump(&self.stats.reconnects);
                    info!(attempt, "change stream reconnected");
                    return Some(stream);
                }
                Err(e) => {
                    IngestStats::bump(&self.stats.errors);
                    warn!(attempt, error = %e, "reconnect attempt failed");
                }
            }
        }

        error!(max_retries, "giving up on change stream, ingestor stopping");
        None
    }

    fn process(&self, record: &StreamRecord) {
        IngestStats::bump(&self.stats.consumed);

        let Some(entity) = self.routes.entity_for(&record.topic) else {
            IngestStats::bump(&self.stats.skipped);
            debug!(topic = %record.topic, "record from unrouted topic");
            return;
        };
        let Some(payload) = record.payload.as_deref() else {
            IngestStats::bump(&self.stats.skipped);
            debug!(topic = %record.topic, offset = record.offset, "tombstone skipped");
            return;
        };

        match interpret_bytes(entity, payload) {
            Ok(Some(event)) if event.is_addressable() => {
                let report = self.dispatcher.dispatch(&event.subject_id, &event);
                IngestStats::bump(&self.stats.dispatched);
                debug!(
                    subject_id = %event.subject_id,
                    event_type = event.event_type.as_str(),
                    delivered = report.delivered,
                    "event dispatched"
                );
            }
            Ok(Some(event)) => {
                IngestStats::bump(&self.stats.skipped);
                debug!(event_type = event.event_type.as_str(), "event has no subject id");
            }
            Ok(None) => IngestStats::bump(&self.stats.skipped),
            Err(e) => {
                IngestStats::bump(&self.stats.errors);
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "failed to process change record"
                );
            }
        }
    }
}
