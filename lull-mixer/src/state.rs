//! Shared event state
//!
//! Thread-safe event broadcaster shared by the registry, the session and the
//! HTTP layer.

use lull_common::MixerEvent;
use tokio::sync::broadcast;

/// Event buffer depth; slow SSE clients lag rather than block the mixer
const EVENT_BUFFER: usize = 100;

/// Shared state accessible by all components
pub struct SharedState {
    /// Event broadcaster for SSE events
    pub event_tx: broadcast::Sender<MixerEvent>,
}

impl SharedState {
    /// Create new shared state
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { event_tx }
    }

    /// Broadcast an event to all listeners
    pub fn broadcast_event(&self, event: MixerEvent) {
        // Ignore send errors (no receivers is OK)
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<MixerEvent> {
        self.event_tx.subscribe()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
