//! Cancellable, re-armable delayed-work timers for the two background
//! schedules described in §4.3/§4.5: the per-entry "force write" delay
//! (default 1000 ms) and the periodic reclaim tick (default 100 ms).
//!
//! These are optimizations, not correctness requirements — the reservation
//! slow path and reclaim must both make forward progress without the timer
//! ever firing — so the implementation favors a simple cancel-and-respawn
//! task over a dedicated timer wheel.

use crate::invariants::debug_assert_previous_timer_cancelled;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// A one-shot delayed action that can be cancelled and re-armed. Used for
/// the "force write after N ms of inactivity" timer on an open entry buffer.
pub struct DelayedTimer {
    cancel: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl DelayedTimer {
    pub fn new() -> Self {
        Self {
            cancel: Arc::new(Notify::new()),
            handle: None,
        }
    }

    /// Arms the timer: after `delay`, spawns `on_fire` unless cancelled or
    /// re-armed first. Re-arming an already-armed timer cancels the
    /// previous one.
    pub fn arm<F, Fut>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let had_previous = self.handle.is_some();
        self.cancel_inner();
        debug_assert_previous_timer_cancelled!(had_previous, true);
        let cancel = Arc::new(Notify::new());
        self.cancel = cancel.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => on_fire().await,
                _ = cancel.notified() => {}
            }
        }));
    }

    /// Cancels a pending timer, if one is armed. A no-op if the timer
    /// already fired or was never armed.
    pub fn cancel(&mut self) {
        self.cancel_inner();
    }

    fn cancel_inner(&mut self) {
        self.cancel.notify_waiters();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Default for DelayedTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DelayedTimer {
    fn drop(&mut self) {
        self.cancel_inner();
    }
}

/// A periodic background tick, used to drive `reclaim_tick()` independent
/// of reservation traffic. Dropping the handle stops the loop.
pub struct PeriodicTimer {
    handle: JoinHandle<()>,
}

impl PeriodicTimer {
    /// Spawns a task that calls `on_tick` every `period`, starting after the
    /// first `period` elapses.
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately, skip it
            loop {
                interval.tick().await;
                on_tick().await;
            }
        });
        Self { handle }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
