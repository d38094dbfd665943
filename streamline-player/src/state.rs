//! Shared player state
//!
//! The controller owns the session exclusively; this is the read-mostly surface
//! other tasks use to observe it: the event broadcaster and a few counters.

use std::sync::atomic::{AtomicU64, Ordering};
use streamline_common::events::PlayerEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Shared state accessible by observers of the controller
pub struct SharedState {
    /// Event broadcaster for status observers
    pub event_tx: broadcast::Sender<PlayerEvent>,

    /// Mode transitions performed since startup
    pub transitions_total: AtomicU64,

    /// Same-mode transcode recoveries performed since startup
    pub recoveries_total: AtomicU64,

    /// Ranges removed from segment buffers since startup
    pub evictions_total: AtomicU64,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100); // Buffer up to 100 events
        Self {
            event_tx,
            transitions_total: AtomicU64::new(0),
            recoveries_total: AtomicU64::new(0),
            evictions_total: AtomicU64::new(0),
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: PlayerEvent) {
        trace!(event = event.name(), "Broadcasting player event");
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    pub fn record_transition(&self) {
        self.transitions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recovery(&self) {
        self.recoveries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
