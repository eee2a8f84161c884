//! Event types for the listcat event system
//!
//! Provides catalog event definitions and the broadcast EventBus used by the
//! sync engine to report run progress and revision changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Catalog event types
///
/// Events are broadcast via EventBus and can be serialized for an external
/// push channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum CatalogEvent {
    /// A sync run entered the Running state
    SyncStarted {
        run_id: Uuid,
        full_discovery: bool,
        timestamp: DateTime<Utc>,
    },

    /// A sync run committed a new lists map
    SyncCompleted {
        run_id: Uuid,
        list_count: usize,
        item_count: usize,
        revision: u64,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A sync run was abandoned; the previous lists map stays authoritative
    SyncFailed {
        run_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A trigger arrived while another run was active
    SyncSkipped { timestamp: DateTime<Utc> },

    /// The externally visible catalog shape changed
    RevisionChanged {
        old_revision: u64,
        new_revision: u64,
        timestamp: DateTime<Utc>,
    },

    /// An admin edit changed a list's local overlay
    ListEdited {
        list_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast event bus (tokio::broadcast)
///
/// One-to-many delivery; slow subscribers lose the oldest events once the
/// channel capacity is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use listcat_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// let _rx = event_bus.subscribe();
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CatalogEvent) {
        let _ = self.tx.send(event);
    }
}
