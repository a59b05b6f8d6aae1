//! Event types for the propsync event system
//!
//! Provides shared event definitions and the EventBus used by the import
//! service for SSE broadcasting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Propsync event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PropsyncEvent {
    /// An import run started (one batch invocation)
    ImportRunStarted {
        /// Watermark the run resumes from
        resume_from_id: i64,
        /// Records the run will process at most
        batch_size: u32,
        /// Failed ids queued for retry before the watermark advances
        retry_pending: usize,
        /// When the run started
        timestamp: DateTime<Utc>,
    },

    /// A legacy record was mapped and upserted into the catalog
    RecordImported {
        /// Legacy WPL property id
        wp_id: i64,
        /// Records processed so far in this run
        processed: u64,
        /// When the record finished
        timestamp: DateTime<Utc>,
    },

    /// A legacy record already existed in the catalog and was skipped
    RecordSkipped {
        /// Legacy WPL property id
        wp_id: i64,
        /// When the record was skipped
        timestamp: DateTime<Utc>,
    },

    /// A legacy record failed to import; the run continues
    RecordFailed {
        /// Legacy WPL property id
        wp_id: i64,
        /// Failure description
        error: String,
        /// When the record failed
        timestamp: DateTime<Utc>,
    },

    /// An import run reached a terminal state for this invocation
    ImportRunFinished {
        /// Terminal state label (COMPLETED, PAUSED or FAILED)
        state: String,
        /// Lifetime processed counter from the checkpoint
        total_processed: u64,
        /// Lifetime failed counter from the checkpoint
        total_failed: u64,
        /// When the run finished
        timestamp: DateTime<Utc>,
    },

    /// The checkpoint was cleared by an operator
    CheckpointReset {
        /// When the reset happened
        timestamp: DateTime<Utc>,
    },
}

impl PropsyncEvent {
    /// Event type name for SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            PropsyncEvent::ImportRunStarted { .. } => "ImportRunStarted",
            PropsyncEvent::RecordImported { .. } => "RecordImported",
            PropsyncEvent::RecordSkipped { .. } => "RecordSkipped",
            PropsyncEvent::RecordFailed { .. } => "RecordFailed",
            PropsyncEvent::ImportRunFinished { .. } => "ImportRunFinished",
            PropsyncEvent::CheckpointReset { .. } => "CheckpointReset",
        }
    }
}

/// Broadcast bus for propsync events
///
/// Cheap to clone; all clones share the same underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PropsyncEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Older events are dropped for lagging subscribers once the buffer
    /// fills; the import driver never blocks on slow SSE clients.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PropsyncEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns the number of receivers the event was delivered to.
    /// Emitting with no subscribers is not an error.
    pub fn emit(&self, event: PropsyncEvent) -> usize {
        match self.tx.send(event) {
            Ok(count) => count,
            Err(_) => 0,
        }
    }
}
