//! Recurring one-second observation.
//!
//! Each observer owns its own [`Probe`]. Dropping the probe aborts its task,
//! so a probe never keeps firing after the view that started it is gone.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct Probe {
    handle: Option<JoinHandle<()>>,
}

impl Probe {
    /// Default observation period.
    pub const PERIOD: Duration = Duration::from_secs(1);

    /// Run `observe` once per `period` on the current tokio runtime, starting
    /// immediately, until it breaks or the probe is dropped.
    ///
    /// Late ticks are skipped rather than replayed in a burst; the observer
    /// recomputes from the deadline anyway.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(period: Duration, mut observe: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if observe().is_break() {
                    break;
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Wait until the observer breaks on its own.
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::warn!("probe task failed: {}", e);
                }
            }
        }
    }

    pub fn cancel(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.abort();
    }
}
