//! Typed daemon event bus.
//!
//! Every observable daemon outcome is one variant of a closed sum type.
//! Subscribers receive all variants over a broadcast channel and filter by
//! kind; there is no stringly-typed listener registration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use super::errors::DaemonError;
use super::types::DaemonStatus;

/// Structured failure cause carried on `Error` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCause {
    /// Stable machine-readable kind (`timeout`, `installation_missing`, …).
    pub code: String,
    pub message: String,
}

impl ErrorCause {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<&DaemonError> for ErrorCause {
    fn from(error: &DaemonError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// All events a daemon can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DaemonEvent {
    /// One request completed with a captured response.
    Response {
        id: String,
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// One request exhausted its retries (or failed fatally).
    Error {
        id: String,
        cause: ErrorCause,
        attempt: u32,
        max_attempts: u32,
        timestamp: DateTime<Utc>,
    },
    /// A status transition. Emitted exactly once per transition; duplicate
    /// same-state transitions are suppressed at the source.
    Status {
        previous: DaemonStatus,
        current: DaemonStatus,
        timestamp: DateTime<Utc>,
    },
}

impl DaemonEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DaemonEvent::Response { .. } => "response",
            DaemonEvent::Error { .. } => "error",
            DaemonEvent::Status { .. } => "status",
        }
    }
}

/// Broadcast bus for daemon events.
///
/// Slow subscribers may lag and miss events; the bridge treats a lag as a
/// gap to skip, never as an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DaemonEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.tx.subscribe()
    }

    /// Emit to all current subscribers. Emitting with no subscribers is
    /// fine; the event is dropped.
    pub fn emit(&self, event: DaemonEvent) {
        trace!(event = "core.daemon.event_emitted", kind = event.kind());
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
