//! # Subscriber Registry
//!
//! Concurrency-safe directory of which connections are subscribed to which
//! subject.
//!
//! Two views of the same relation are kept: subject → connections and
//! connection → registration. Both live behind a single lock and are always
//! mutated together, so a connection is in a subject's set if and only if
//! its registration names that subject. Empty subject sets are dropped
//! eagerly.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use super::connection::{Connection, ConnectionId};
use crate::auth::Identity;

/// What the registry knows about one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub subject_id: String,
    pub identity: Identity,
}

#[derive(Debug, Default)]
struct RegistryState {
    by_subject: HashMap<String, HashMap<ConnectionId, Connection>>,
    by_connection: HashMap<ConnectionId, Registration>,
}

impl RegistryState {
    fn detach(&mut self, connection_id: &ConnectionId) -> Option<Registration> {
        let registration = self.by_connection.remove(connection_id)?;

        if let Some(connections) = self.by_subject.get_mut(&registration.subject_id) {
            connections.remove(connection_id);
            if connections.is_empty() {
                self.by_subject.remove(&registration.subject_id);
            }
        }

        Some(registration)
    }
}

/// Registry of live subscriber connections
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriberRegistry {
    /// Create a new registry
    pub fn new() -> Self {
        Self::default()
    }

    // Mutations never leave the maps half-updated, so a poisoned lock still
    // guards a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection for a subject.
    ///
    /// Registering the same connection for the same subject again is a
    /// no-op. A connection follows exactly one subject; registering it for a
    /// different one moves it. Returns `true` if the registry changed.
    pub fn register(&self, connection: &Connection, subject_id: &str, identity: Identity) -> bool {
        let mut state = self.write();

        if let Some(existing) = state.by_connection.get(&connection.id()) {
            if existing.subject_id == subject_id {
                return false;
            }
            state.detach(&connection.id());
        }

        state
            .by_subject
            .entry(subject_id.to_string())
            .or_default()
            .insert(connection.id(), connection.clone());
        state.by_connection.insert(
            connection.id(),
            Registration {
                subject_id: subject_id.to_string(),
                identity,
            },
        );
        true
    }

    /// Remove a connection from whichever subject it follows.
    ///
    /// Returns the dropped registration, or `None` if the connection was
    /// not registered.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<Registration> {
        self.write().detach(connection_id)
    }

    /// Snapshot of the connections subscribed to a subject.
    ///
    /// The copy is taken under the lock and iterated outside it, so delivery
    /// never holds up registration and is never affected by it.
    pub fn subscribers_of(&self, subject_id: &str) -> Vec<Connection> {
        self.read()
            .by_subject
            .get(subject_id)
            .map(|connections| connections.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Registration of a connection, if it is live
    pub fn registration(&self, connection_id: &ConnectionId) -> Option<Registration> {
        self.read().by_connection.get(connection_id).cloned()
    }

    /// Number of connections subscribed to a subject
    pub fn count_for(&self, subject_id: &str) -> usize {
        self.read()
            .by_subject
            .get(subject_id)
            .map_or(0, HashMap::len)
    }

    /// Number of live connections
    pub fn total_connections(&self) -> usize {
        self.read().by_connection.len()
    }

    /// Number of subjects with at least one subscriber
    pub fn subjects_with_subscribers(&self) -> usize {
        self.read().by_subject.len()
    }

    /// Check that both views describe the same relation
    pub fn is_consistent(&self) -> bool {
        let state = self.read();

        let forward_ok = state.by_subject.iter().all(|(subject_id, connections)| {
            !connections.is_empty()
                && connections.keys().all(|id| {
                    state
                        .by_connection
                        .get(id)
                        .is_some_and(|r| &r.subject_id == subject_id)
                })
        });
        let reverse_ok = state.by_connection.iter().all(|(id, registration)| {
            state
                .by_subject
                .get(&registration.subject_id)
                .is_some_and(|connections| connections.contains_key(id))
        });

        forward_ok && reverse_ok
    }
}
