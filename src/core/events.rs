//! View event stream for presentational consumers
//!
//! A view publishes a [`ViewEvent`] at every transition. Renderers subscribe
//! and re-read the view snapshot when something they care about happened.
//!
//! ```text
//! setters ─┐
//!          ├──▶ EventBus::publish() ──▶ broadcast channel ──▶ renderers
//! fetches ─┤
//! mutations┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Which optimistic mutation an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Remove,
}

/// Events emitted by a collection view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Filter, search, sort or page changed
    SpecChanged,

    /// A `list` call was issued
    FetchStarted { seq: u64 },

    /// The latest `list` call succeeded and its result is displayed
    FetchSucceeded { seq: u64, total: usize },

    /// The latest `list` call failed; stale items stay visible
    FetchFailed { seq: u64, message: String },

    /// A superseded response arrived and was ignored
    ResponseDiscarded { seq: u64 },

    /// A local patch was applied ahead of the gateway call
    MutationApplied {
        kind: MutationKind,
        entity_id: String,
    },

    /// The gateway confirmed a mutation
    MutationReconciled {
        kind: MutationKind,
        entity_id: String,
    },

    /// The gateway rejected a mutation and the local patch was reverted
    MutationRolledBack {
        kind: MutationKind,
        entity_id: String,
        message: String,
    },

    /// The session changed and the view dropped its data
    Reset,
}

/// Envelope wrapping a view event with metadata
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// Collection the emitting view shows
    pub collection: String,
    /// The actual event
    pub event: ViewEvent,
}

impl EventEnvelope {
    pub fn new(collection: impl Into<String>, event: ViewEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            collection: collection.into(),
            event,
        }
    }
}

/// Broadcast-based event bus
///
/// Cheap to clone; several views may share one bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity
    ///
    /// Receivers that fall more than `capacity` events behind get `Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers
    ///
    /// Never fails; with no subscribers the event is dropped.
    pub fn publish(&self, collection: &str, event: ViewEvent) -> usize {
        self.sender
            .send(EventEnvelope::new(collection, event))
            .unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
