//! Engine progress events
//!
//! The engine reports what it is doing through an [`EventSink`], separately
//! from the `log` output. Hosts can forward these to a UI or collect them in
//! tests with [`VecEventSink`].

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Trait for receiving engine events
///
/// This abstracts over the transport (channel, UI bridge, test buffer) so
/// the engine can be used in different contexts.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g. channel closed).
    fn send(&self, event: EngineEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted during one `process` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A run started
    #[serde(rename_all = "camelCase")]
    ProcessStarted {
        snapshot_id: String,
        start: Option<NodeId>,
    },

    /// A worker is about to run
    NodeStarted { node: NodeId, kind: String },

    /// A worker finished and its outputs were cached
    NodeCompleted { node: NodeId },

    /// A worker returned an error; the run is being aborted
    NodeFailed { node: NodeId, error: String },

    /// `abort()` was called on a running engine
    AbortRequested,

    /// The run ended
    ProcessFinished { aborted: bool },
}

impl EngineEvent {
    pub fn node_failed(node: NodeId, error: impl ToString) -> Self {
        Self::NodeFailed {
            node,
            error: error.to_string(),
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EngineEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: parking_lot::Mutex<Vec<EngineEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}
