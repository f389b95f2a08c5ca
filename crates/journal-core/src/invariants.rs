//! Debug assertion macros for the orchestrator-level invariants (§8).
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds.

// =============================================================================
// INV-SEQ-01: Monotonic Sequence Window
// =============================================================================

/// **Invariant**: `last_seq ≤ cur_seq`
macro_rules! debug_assert_seq_window {
    ($last_seq:expr, $cur_seq:expr) => {
        debug_assert!(
            $last_seq <= $cur_seq,
            "INV-SEQ-01 violated: last_seq {} > cur_seq {}",
            $last_seq,
            $cur_seq
        )
    };
}

// =============================================================================
// INV-SEQ-02: On-Disk Low-Water Mark
// =============================================================================

/// **Invariant**: `last_seq_ondisk ≤ last_seq`
macro_rules! debug_assert_ondisk_mark {
    ($last_seq_ondisk:expr, $last_seq:expr) => {
        debug_assert!(
            $last_seq_ondisk <= $last_seq,
            "INV-SEQ-02 violated: last_seq_ondisk {} > last_seq {}",
            $last_seq_ondisk,
            $last_seq
        )
    };
}

// =============================================================================
// INV-SWITCH-01: No Switch While Previous Unwritten
// =============================================================================

/// **Invariant**: `switch_buffer` never succeeds while `prev_buf_unwritten`.
macro_rules! debug_assert_switch_not_inuse {
    ($succeeded:expr, $prev_buf_unwritten_before:expr) => {
        debug_assert!(
            !$succeeded || !$prev_buf_unwritten_before,
            "INV-SWITCH-01 violated: switch succeeded while prev_buf_unwritten was set"
        )
    };
}

// =============================================================================
// INV-RING-01: No Reuse of a Still-Pinned Bucket
// =============================================================================

/// **Invariant**: `DeviceRing::advance` never overwrites a bucket whose
/// recorded seq is still above the on-disk low-water mark.
macro_rules! debug_assert_bucket_reusable {
    ($reusable:expr) => {
        debug_assert!(
            $reusable,
            "INV-RING-01 violated: advance would overwrite a bucket still holding an unreclaimed seq"
        )
    };
}

pub(crate) use debug_assert_bucket_reusable;
pub(crate) use debug_assert_ondisk_mark;
pub(crate) use debug_assert_seq_window;
pub(crate) use debug_assert_switch_not_inuse;
