//! The continuation/wait-list primitive described in §5: a caller registers
//! interest, a completer wakes everyone registered, and registration that
//! races a completion self-completes instead of hanging forever.
//!
//! This is a thin, named wrapper around [`tokio::sync::Notify`] rather than a
//! hand-rolled wait queue: `Notify` already gives the permit-on-notify
//! semantics this protocol needs (a `notify_waiters()` that races an in-flight
//! `notified()` registration is still observed), which is exactly the
//! registration-ordering guarantee the reservation slow path and reclaim tick
//! depend on.

use tokio::sync::Notify;

/// A named wait list: producers block on [`WaitList::wait`] until some other
/// task calls [`WaitList::wake_all`] (e.g. after a buffer switch frees
/// capacity, or reclaim advances `last_seq`).
#[derive(Debug, Default)]
pub struct WaitList {
    notify: Notify,
}

impl WaitList {
    pub fn new() -> Self {
        Self { notify: Notify::new() }
    }

    /// Registers and waits for the next wake. Cancel-safe: dropping the
    /// returned future before it resolves does not consume a wake that was
    /// never observed.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Registers interest without waiting yet. Callers that must recheck a
    /// condition under a lock before committing to wait should call this
    /// first, drop the lock, then `.await` the returned future — a
    /// `wake_all` that lands between registration and the await is still
    /// observed, which a `wait()` called only after dropping the lock would
    /// miss.
    pub fn notified(&self) -> tokio::sync::Notified<'_> {
        self.notify.notified()
    }

    /// Wakes every task currently registered via [`WaitList::wait`]. Tasks
    /// that register after this call are unaffected — callers must recheck
    /// the condition they were waiting on after waking, not assume the
    /// event is still pending.
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }

    /// Wakes at most one waiting task, or stores a permit for the next
    /// registrant if none is currently waiting.
    pub fn wake_one(&self) {
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn wake_all_releases_all_waiters() {
        let list = Arc::new(WaitList::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let list = list.clone();
            handles.push(tokio::spawn(async move {
                list.wait().await;
            }));
        }
        // Give the spawned tasks a chance to register.
        tokio::task::yield_now().await;
        list.wake_all();
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn wake_one_is_a_single_permit() {
        let list = WaitList::new();
        list.wake_one();
        // A registrant arriving after a lone wake_one() self-completes.
        list.wait().await;
    }
}
