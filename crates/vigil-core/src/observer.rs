//! Best-effort state broadcast.
//!
//! The loop emits a [`StateUpdate`] on every transition; dashboards and
//! the WebSocket surface subscribe through [`Broadcast::subscribe`].
//! Emission never blocks and never fails the loop: with no subscribers
//! (or lagging ones) the update is simply dropped.

use tokio::sync::broadcast;
use tracing::trace;

use vigil_types::event::StateUpdate;

/// Fan-out of loop state updates to any number of subscribers.
#[derive(Clone)]
pub struct Broadcast {
    tx: broadcast::Sender<StateUpdate>,
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcast {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Subscribe to future updates.
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.tx.subscribe()
    }

    /// Emit one update, best-effort.
    pub fn emit(&self, update: StateUpdate) {
        trace!(status = ?update.status, "broadcast");
        let _ = self.tx.send(update);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
