//! One-way halt latch: once the journal hits an unrecoverable I/O error it
//! never recovers, and every waiter blocked on reservation/reclaim capacity
//! must be woken so it can observe the latched error instead of hanging.
//!
//! An `AtomicBool` plus a shared `Notify`-backed wait list, generalized from
//! "closed for new registrations" to "journal latched into the error state"
//! (§7, `Error::IO`).

use crate::invariants::debug_assert_halt_woke_waiters;
use crate::wait_list::WaitList;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared one-way latch. Cloning a [`HaltSignal`] shares the same underlying
/// flag and wait list; the first caller to invoke [`HaltSignal::halt`] wins,
/// subsequent calls are no-ops.
#[derive(Debug, Default)]
pub struct HaltLatch {
    halted: AtomicBool,
    waiters: WaitList,
}

impl HaltLatch {
    pub fn new() -> Self {
        Self {
            halted: AtomicBool::new(false),
            waiters: WaitList::new(),
        }
    }

    /// Returns `true` if the journal has already halted.
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    /// Latches the halt and wakes every task waiting on reservation or
    /// reclaim capacity so they can observe the error and bail out. Returns
    /// `true` if this call performed the transition, `false` if the journal
    /// was already halted.
    pub fn halt(&self) -> bool {
        let first = self
            .halted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        let mut woke = false;
        if first {
            self.waiters.wake_all();
            woke = true;
        }
        debug_assert_halt_woke_waiters!(first, woke);
        first
    }

    /// Waits for a halt to occur. Returns immediately if already halted.
    /// Intended for callers that want to race this against their own
    /// capacity-wait future (e.g. `tokio::select!`) rather than polling
    /// `is_halted()`.
    pub async fn wait_for_halt(&self) {
        if self.is_halted() {
            return;
        }
        self.waiters.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn halt_is_idempotent() {
        let latch = HaltLatch::new();
        assert!(latch.halt());
        assert!(!latch.halt());
        assert!(latch.is_halted());
    }

    #[tokio::test]
    async fn wait_for_halt_wakes_existing_waiters() {
        let latch = Arc::new(HaltLatch::new());
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move {
                latch.wait_for_halt().await;
            })
        };
        tokio::task::yield_now().await;
        latch.halt();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_halt_self_completes_if_already_halted() {
        let latch = HaltLatch::new();
        latch.halt();
        latch.wait_for_halt().await;
    }
}
