//! Loop status events broadcast to observers.
//!
//! The iteration loop emits a [`StateUpdate`] on every transition; the
//! HTTP/WebSocket surface subscribes and fans these out to dashboards.
//! Delivery is best-effort and must never block the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The loop's externally visible phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopStatus {
    Paused,
    Running,
    Planning,
    Executing,
    Idle,
    Error,
}

/// One broadcast message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdate {
    pub status: LoopStatus,
    pub timestamp: DateTime<Utc>,
    /// Status-specific extras (iteration number, thinking head, budget
    /// snapshot, next wake time).
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StateUpdate {
    /// A bare update with no extra fields.
    pub fn new(status: LoopStatus) -> Self {
        Self {
            status,
            timestamp: Utc::now(),
            fields: Map::new(),
        }
    }

    /// Attach an extra field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}
