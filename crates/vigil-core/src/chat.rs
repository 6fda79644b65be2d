//! Pending creator chats.
//!
//! Chat endpoints enqueue a [`PendingChat`] and get back a oneshot
//! receiver that resolves with the iteration's reply. The loop drains
//! the whole queue atomically at the top of each iteration, so a burst
//! of messages is answered together. The queue has a soft cap: enqueues
//! past it still succeed but are logged.

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{info, warn};

use vigil_types::chat::{ChatOutcome, ChatSource};

/// Soft cap on queued chats before enqueues start logging warnings.
const QUEUE_SOFT_CAP: usize = 50;

/// One creator message waiting for the next iteration.
pub struct PendingChat {
    pub message: String,
    pub source: ChatSource,
    responder: oneshot::Sender<ChatOutcome>,
}

impl PendingChat {
    /// Complete this chat. Consumes the pending entry; a dropped
    /// receiver is not an error.
    pub fn respond(self, outcome: ChatOutcome) {
        let _ = self.responder.send(outcome);
    }
}

/// Thread-safe FIFO of pending chats.
#[derive(Default)]
pub struct ChatQueue {
    inner: Mutex<Vec<PendingChat>>,
}

impl ChatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message; the returned receiver resolves when the loop
    /// answers it.
    pub fn enqueue(&self, message: String, source: ChatSource) -> oneshot::Receiver<ChatOutcome> {
        let (tx, rx) = oneshot::channel();
        let mut queue = self.inner.lock();
        queue.push(PendingChat {
            message,
            source,
            responder: tx,
        });
        if queue.len() > QUEUE_SOFT_CAP {
            warn!(queued = queue.len(), "chat queue past soft cap");
        }
        info!(queued = queue.len(), source = %source, "chat enqueued");
        rx
    }

    /// Atomically take everything queued so far.
    pub fn drain(&self) -> Vec<PendingChat> {
        std::mem::take(&mut *self.inner.lock())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
