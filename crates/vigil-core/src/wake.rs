//! The wake latch and interruptible sleep.
//!
//! A single-consumer, auto-reset signal: [`wake`](WakeSignal::wake)
//! releases the sleep currently in progress; the loop clears any stale
//! signal before each sleep, so a wake that fires mid-iteration does not
//! shorten the following sleep. Waking is idempotent -- any number of
//! calls release exactly one sleep.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::debug;

/// Single-fire wake signal for the iteration loop.
pub struct WakeSignal {
    tx: mpsc::Sender<()>,
    rx: Mutex<mpsc::Receiver<()>>,
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeSignal {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Interrupt the current sleep. Idempotent; callable from any task.
    pub fn wake(&self) {
        // A full channel means a wake is already pending.
        let _ = self.tx.try_send(());
        debug!("wake triggered");
    }

    /// Sleep for up to `duration`, returning `true` when interrupted by
    /// [`wake`](Self::wake). Clears any signal raised before the sleep
    /// started.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let mut rx = self.rx.lock().await;
        while rx.try_recv().is_ok() {}

        tokio::select! {
            _ = rx.recv() => {
                debug!(slept_less_than = duration.as_secs_f64(), "sleep interrupted");
                true
            }
            _ = tokio::time::sleep(duration) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn full_sleep_without_wake() {
        let signal = WakeSignal::new();
        let start = Instant::now();
        let interrupted = signal.sleep(Duration::from_millis(50)).await;
        assert!(!interrupted);
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn wake_interrupts_sleep_early() {
        let signal = Arc::new(WakeSignal::new());
        let waker = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waker.wake();
        });

        let start = Instant::now();
        let interrupted = signal.sleep(Duration::from_secs(10)).await;
        assert!(interrupted);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn wake_is_idempotent() {
        let signal = Arc::new(WakeSignal::new());
        let waker = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waker.wake();
            waker.wake();
            waker.wake();
        });

        // First sleep interrupted by the burst of wakes.
        assert!(signal.sleep(Duration::from_secs(10)).await);
        // Second sleep runs to completion: the burst collapsed into one.
        assert!(!signal.sleep(Duration::from_millis(30)).await);
    }

    #[tokio::test]
    async fn stale_wake_cleared_before_sleep() {
        let signal = WakeSignal::new();
        // Wake fires while the loop is "busy", before the sleep starts.
        signal.wake();
        // The sleep clears the stale signal and runs its full course.
        let interrupted = signal.sleep(Duration::from_millis(30)).await;
        assert!(!interrupted);
    }
}
