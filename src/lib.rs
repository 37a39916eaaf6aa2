//! changecast - pushes document change records to websocket subscribers
//!
//! Change records flow from the upstream stream through the interpreter
//! into domain events, which the dispatcher fans out to every connection
//! subscribed to the affected document.

pub mod auth;
pub mod cli;
pub mod config;
pub mod http_server;
pub mod ingest;
pub mod realtime;
