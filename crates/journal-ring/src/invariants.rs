//! Debug assertion macros for the packed reservation word's invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds. Used by `state.rs`.

// =============================================================================
// INV-RES-01: Bounded Count
// =============================================================================

/// Assert that a buffer's outstanding reservation count fits the packed field.
///
/// **Invariant**: `0 ≤ count[idx] ≤ MAX_COUNT`
///
/// Used in: `PackedState::to_u64()` before packing.
macro_rules! debug_assert_bounded_count {
    ($count:expr, $max:expr) => {
        debug_assert!(
            $count <= $max,
            "INV-RES-01 violated: reservation count {} exceeds packed field max {}",
            $count,
            $max
        )
    };
}

// =============================================================================
// INV-RES-02: No Double Grant
// =============================================================================

/// Assert a successful CAS only ever grew the offset into the entry's ceiling.
///
/// **Invariant**: `old_offset ≤ new_offset ≤ cur_entry_bytes`
///
/// Used in: `ReservationWord::try_get()` after a winning `compare_exchange_weak`.
macro_rules! debug_assert_no_double_grant {
    ($old_offset:expr, $new_offset:expr, $ceiling:expr) => {
        debug_assert!(
            $new_offset >= $old_offset && $new_offset <= $ceiling,
            "INV-RES-02 violated: new offset {} out of range [{}, {}]",
            $new_offset,
            $old_offset,
            $ceiling
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_no_double_grant;
