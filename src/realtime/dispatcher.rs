//! # Broadcast Dispatcher
//!
//! Fan-out of events to the connections subscribed to their subject.
//!
//! Delivery is best-effort and isolated per connection. A connection that
//! fails a delivery is considered dead: it is unregistered and its channel
//! closed, and the remaining subscribers are still served.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::event::DomainEvent;
use super::subscription::SubscriberRegistry;
use super::websocket::ServerMessage;

/// Event dispatcher that fans out events to subscribed connections
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<SubscriberRegistry>,
}

impl Dispatcher {
    /// Create a new dispatcher over a registry
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Dispatch a domain event to every subscriber of `subject_id`
    pub fn dispatch(&self, subject_id: &str, event: &DomainEvent) -> DispatchReport {
        self.dispatch_message(subject_id, &ServerMessage::Event(event.clone()))
    }

    /// Dispatch any outbound message to every subscriber of `subject_id`.
    ///
    /// Works on a snapshot of the subscriber set, so registrations racing
    /// with the broadcast neither block it nor change who it reaches.
    pub fn dispatch_message(&self, subject_id: &str, message: &ServerMessage) -> DispatchReport {
        let subscribers = self.registry.subscribers_of(subject_id);
        let mut report = DispatchReport {
            matched: subscribers.len(),
            ..DispatchReport::default()
        };

        if subscribers.is_empty() {
            debug!(subject_id, "no active connections for subject");
            return report;
        }

        for connection in subscribers {
            match connection.try_deliver(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        subject_id,
                        connection_id = %connection.id(),
                        error = %e,
                        "delivery failed, dropping connection"
                    );
                    self.registry.unregister(&connection.id());
                    connection.close();
                    report.failed += 1;
                }
            }
        }

        info!(
            subject_id,
            message_type = message.type_name(),
            delivered = report.delivered,
            failed = report.failed,
            "broadcast to subject"
        );
        report
    }
}

/// Result of dispatching an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Number of subscribers in the snapshot
    pub matched: usize,
    /// Number of connections the message was queued for
    pub delivered: usize,
    /// Number of connections dropped after a failed delivery
    pub failed: usize,
}
