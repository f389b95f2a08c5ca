//! Debug assertion macros for the wait-list/halt-latch primitives.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// INV-HALT-01: Halt Wakes Waiters
// =============================================================================

/// Assert that a successful halt transition woke the wait list.
///
/// **Invariant**: `halt() transitions false->true → waiters.wake_all() ran`
///
/// Used in: `HaltLatch::halt()`.
macro_rules! debug_assert_halt_woke_waiters {
    ($transitioned:expr, $woke:expr) => {
        debug_assert!(
            !$transitioned || $woke,
            "INV-HALT-01 violated: halt transitioned but did not wake waiters"
        )
    };
}

// =============================================================================
// INV-TIMER-01: Single Active Timer
// =============================================================================

/// Assert that re-arming a `DelayedTimer` cancelled the previous instance.
///
/// **Invariant**: `arm() called twice → only the second fire ever runs`
///
/// Used in: `DelayedTimer::arm()`.
macro_rules! debug_assert_previous_timer_cancelled {
    ($had_previous:expr, $cancelled:expr) => {
        debug_assert!(
            !$had_previous || $cancelled,
            "INV-TIMER-01 violated: re-arm did not cancel the previous timer"
        )
    };
}

pub(crate) use debug_assert_halt_woke_waiters;
pub(crate) use debug_assert_previous_timer_cancelled;
