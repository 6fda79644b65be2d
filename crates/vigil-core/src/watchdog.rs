//! The loop watchdog.
//!
//! Polls the loop task's handle on a fixed interval. If the task has
//! terminated (panicked, or completed when it should run forever) and
//! the agent is neither paused nor shutting down, the watchdog spawns a
//! fresh loop task from its factory. It never tries to resurrect an
//! in-flight iteration.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vigil_store::StatePersistor;

/// Default poll interval.
const POLL_SECONDS: u64 = 30;

/// Restarts the iteration loop when its task dies.
pub struct Watchdog {
    state: Arc<StatePersistor>,
    poll_interval: Duration,
}

impl Watchdog {
    pub fn new(state: Arc<StatePersistor>) -> Self {
        Self {
            state,
            poll_interval: Duration::from_secs(POLL_SECONDS),
        }
    }

    /// Override the poll interval (tests).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Monitor `handle`, restarting via `spawn_loop` as needed, until
    /// `cancel` fires.
    pub async fn run<F>(
        &self,
        mut handle: JoinHandle<()>,
        spawn_loop: F,
        cancel: CancellationToken,
    ) where
        F: Fn() -> JoinHandle<()>,
    {
        info!(poll_secs = self.poll_interval.as_secs(), "watchdog started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("watchdog shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            if !handle.is_finished() {
                continue;
            }
            // Never restart a deliberately stopped or paused agent.
            if cancel.is_cancelled() {
                return;
            }
            if self.state.is_paused().unwrap_or(false) {
                continue;
            }

            match (&mut handle).await {
                Ok(()) => warn!("loop task completed unexpectedly"),
                Err(e) if e.is_panic() => error!("loop task panicked"),
                Err(e) => warn!(error = %e, "loop task died"),
            }
            info!("watchdog restarting loop");
            handle = spawn_loop();
        }
    }
}
