//! The packed reservation word and its lock-free fast path.
//!
//! # Bit layout
//!
//! ```text
//! bit  63           48 47           33 32   31                    0
//!      +-------------+---------------+---+-----------------------+
//!      | count[1]:15 |  count[0]:15  |idx|       offset:32        |
//!      +-------------+---------------+---+-----------------------+
//!      ^ prev_buf_unwritten is bit 63's sibling, packed separately below
//! ```
//!
//! Five logically distinct fields share one 64-bit atomic so the fast path
//! is a single compare-and-swap: `offset` (bytes reserved in the open
//! buffer, or a sentinel), `idx` (which buffer is open), `count[0]` /
//! `count[1]` (outstanding reservations per buffer), and
//! `prev_buf_unwritten` (the other buffer still has a write in flight).
//!
//! # Memory ordering
//!
//! **Fast path (`res_get`/`res_put`):**
//! 1. Load the word with Acquire (synchronizes with the switcher's Release).
//! 2. Compute the candidate next word entirely from the loaded value.
//! 3. `compare_exchange_weak` with Release success / Acquire failure ordering,
//!    retrying on failure with a fresh load.
//!
//! This mirrors the reservation protocol of a single-producer ring buffer's
//! `reserve()`/`commit()` pair, generalized to many producers racing on one
//! word instead of one producer owning a tail index outright.
use crate::invariants::{debug_assert_bounded_count, debug_assert_no_double_grant};
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel `offset` value meaning "buffer closed, not accepting reservations".
pub const CLOSED: u32 = u32::MAX - 1;
/// Sentinel `offset` value meaning "journal latched into the error state".
pub const ERROR: u32 = u32::MAX;

const OFFSET_BITS: u32 = 32;
const IDX_BITS: u32 = 1;
const COUNT_BITS: u32 = 15;

const OFFSET_SHIFT: u32 = 0;
const IDX_SHIFT: u32 = OFFSET_SHIFT + OFFSET_BITS;
const COUNT0_SHIFT: u32 = IDX_SHIFT + IDX_BITS;
const COUNT1_SHIFT: u32 = COUNT0_SHIFT + COUNT_BITS;
const PREV_UNWRITTEN_SHIFT: u32 = COUNT1_SHIFT + COUNT_BITS;

const OFFSET_MASK: u64 = (1u64 << OFFSET_BITS) - 1;
const IDX_MASK: u64 = (1u64 << IDX_BITS) - 1;
const COUNT_MASK: u64 = (1u64 << COUNT_BITS) - 1;

/// Maximum outstanding reservations on a single buffer before `count[idx]`
/// saturates. In practice the entry buffer runs out of byte space long
/// before this many producers are concurrently mid-reservation.
pub const MAX_COUNT: u32 = COUNT_MASK as u32;

/// A decoded view of the packed reservation word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedState {
    pub offset: u32,
    pub idx: u8,
    pub count: [u32; 2],
    pub prev_buf_unwritten: bool,
}

impl PackedState {
    /// The state of a freshly initialized, never-opened journal: both
    /// buffers free, buffer 0 will be the first opened, closed for now.
    pub const fn fresh() -> Self {
        Self {
            offset: CLOSED,
            idx: 0,
            count: [0, 0],
            prev_buf_unwritten: false,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.offset < CLOSED
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.offset == ERROR
    }

    #[inline]
    fn to_u64(self) -> u64 {
        debug_assert_bounded_count!(self.count[0], MAX_COUNT);
        debug_assert_bounded_count!(self.count[1], MAX_COUNT);
        (u64::from(self.offset) << OFFSET_SHIFT)
            | (u64::from(self.idx & 1) << IDX_SHIFT)
            | (u64::from(self.count[0] & COUNT_MASK as u32) << COUNT0_SHIFT)
            | (u64::from(self.count[1] & COUNT_MASK as u32) << COUNT1_SHIFT)
            | (u64::from(self.prev_buf_unwritten) << PREV_UNWRITTEN_SHIFT)
    }

    #[inline]
    fn from_u64(word: u64) -> Self {
        Self {
            offset: ((word >> OFFSET_SHIFT) & OFFSET_MASK) as u32,
            idx: ((word >> IDX_SHIFT) & IDX_MASK) as u8,
            count: [
                ((word >> COUNT0_SHIFT) & COUNT_MASK) as u32,
                ((word >> COUNT1_SHIFT) & COUNT_MASK) as u32,
            ],
            prev_buf_unwritten: (word >> PREV_UNWRITTEN_SHIFT) & 1 == 1,
        }
    }
}

/// Outcome of a fast-path reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastGet {
    /// Reservation granted; caller owns `[offset, offset+granted)` in buffer `idx`.
    Granted { idx: u8, offset: u32, granted: u32 },
    /// The buffer is closed or errored, or there wasn't enough room for `need_min`;
    /// caller must fall back to the slow path.
    SlowPath,
    /// The journal has latched into the error state; no slow path will help.
    Errored,
}

/// The packed atomic reservation word plus the entry-size ceiling it reserves
/// against. Cache-line padded: this word is read on every `res_get`/`res_put`
/// from every producer thread, and padding it keeps those loads from
/// false-sharing a cache line with whatever the allocator places next to it.
pub struct ReservationWord {
    word: CachePadded<AtomicU64>,
}

impl ReservationWord {
    pub fn new() -> Self {
        Self {
            word: CachePadded::new(AtomicU64::new(PackedState::fresh().to_u64())),
        }
    }

    #[inline]
    pub fn load(&self, order: Ordering) -> PackedState {
        PackedState::from_u64(self.word.load(order))
    }

    /// Lock-free fast path for `res_get`. `cur_entry_u64s` is the byte
    /// ceiling of the currently open buffer (0 if none is open yet, in
    /// which case this always falls to the slow path to run `open_entry`).
    pub fn try_get(&self, need_min: u32, need_max: u32, cur_entry_bytes: u32) -> FastGet {
        let mut old = self.load(Ordering::Acquire);
        loop {
            if old.is_error() {
                return FastGet::Errored;
            }
            if !old.is_open() {
                return FastGet::SlowPath;
            }
            let room = cur_entry_bytes.saturating_sub(old.offset);
            let granted = need_max.min(room);
            if granted < need_min {
                return FastGet::SlowPath;
            }
            if old.count[old.idx as usize] >= MAX_COUNT {
                return FastGet::SlowPath;
            }

            let mut new = old;
            new.offset = old.offset + granted;
            new.count[old.idx as usize] += 1;

            match self.word.compare_exchange_weak(
                old.to_u64(),
                new.to_u64(),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug_assert_no_double_grant!(old.offset, new.offset, cur_entry_bytes);
                    return FastGet::Granted {
                        idx: old.idx,
                        offset: old.offset,
                        granted,
                    };
                }
                Err(observed) => old = PackedState::from_u64(observed),
            }
        }
    }

    /// Decrements `count[idx]`. Returns `true` if this call dropped the count
    /// to zero on a buffer that is not the currently-open one (i.e. a closed
    /// buffer whose last holder just left, meaning a write may be submitted).
    pub fn put(&self, idx: u8) -> bool {
        let mut old = self.word.load(Ordering::Acquire);
        loop {
            let mut decoded = PackedState::from_u64(old);
            debug_assert!(decoded.count[idx as usize] > 0, "res_put with no outstanding count");
            decoded.count[idx as usize] -= 1;
            let new = decoded.to_u64();
            match self
                .word
                .compare_exchange_weak(old, new, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => {
                    let closing = decoded.idx != idx || !decoded.is_open();
                    return closing && decoded.count[idx as usize] == 0;
                }
                Err(observed) => old = observed,
            }
        }
    }

    /// Attempts the switch edge described in §4.2: close the open buffer,
    /// flip `idx`, set `prev_buf_unwritten`, bump the new buffer's open count.
    /// Fails with `None` if the other buffer is still `Submitted`
    /// (`prev_buf_unwritten` already set) — callers must wait for that
    /// write's completion before retrying. On success, returns the outgoing
    /// buffer's final `offset` (the exact byte count reserved into it) along
    /// with its index and the incoming buffer's index, so the caller can
    /// seal the outgoing buffer at its true size rather than its capacity.
    pub fn try_switch(&self) -> Option<(u8, u8, u32)> {
        let mut old = self.load(Ordering::Acquire);
        loop {
            if old.prev_buf_unwritten || !old.is_open() {
                return None;
            }
            let outgoing = old.idx;
            let incoming = outgoing ^ 1;
            let outgoing_offset = old.offset;
            let mut new = old;
            new.offset = CLOSED;
            new.idx = incoming;
            new.prev_buf_unwritten = true;
            new.count[incoming as usize] += 1;

            match self.word.compare_exchange_weak(
                old.to_u64(),
                new.to_u64(),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some((outgoing, incoming, outgoing_offset)),
                Err(observed) => old = PackedState::from_u64(observed),
            }
        }
    }

    /// Claims the synthetic "buffer is open" reference on `idx` without
    /// going through `try_switch`. Only needed once, at journal start, for
    /// buffer 0's first opening — every later open claims its reference as
    /// part of the switch CAS itself.
    pub fn claim_open_ref(&self, idx: u8) {
        let mut old = self.word.load(Ordering::Acquire);
        loop {
            let mut decoded = PackedState::from_u64(old);
            decoded.count[idx as usize] += 1;
            match self.word.compare_exchange_weak(
                old,
                decoded.to_u64(),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => old = observed,
            }
        }
    }

    /// Publishes `cur_entry_bytes`'s worth of open state on buffer `idx`,
    /// transitioning `offset` from `CLOSED` to `already_used` (normally 0).
    /// Called by `open_entry` after it has computed capacity under the core
    /// mutex; this is still a CAS (not a plain store) because a concurrent
    /// `res_put` may be touching `count` at the same time.
    pub fn publish_open(&self, idx: u8, already_used: u32) -> bool {
        let mut old = self.word.load(Ordering::Acquire);
        loop {
            let decoded = PackedState::from_u64(old);
            if decoded.offset != CLOSED || decoded.idx != idx {
                return false;
            }
            let mut new = decoded;
            new.offset = already_used;
            match self
                .word
                .compare_exchange_weak(old, new.to_u64(), Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(observed) => old = observed,
            }
        }
    }

    /// Clears `prev_buf_unwritten` once the outgoing buffer's write completes.
    pub fn clear_prev_unwritten(&self) {
        let mut old = self.word.load(Ordering::Acquire);
        loop {
            let mut decoded = PackedState::from_u64(old);
            decoded.prev_buf_unwritten = false;
            match self.word.compare_exchange_weak(
                old,
                decoded.to_u64(),
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => old = observed,
            }
        }
    }

    /// One-way transition into the error-latched state (`halt()`).
    pub fn halt(&self) {
        self.word.store(
            PackedState {
                offset: ERROR,
                ..PackedState::fresh()
            }
            .to_u64(),
            Ordering::Release,
        );
    }
}

impl Default for ReservationWord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_roundtrip() {
        let s = PackedState {
            offset: 12345,
            idx: 1,
            count: [3, 7],
            prev_buf_unwritten: true,
        };
        assert_eq!(PackedState::from_u64(s.to_u64()), s);
    }

    #[test]
    fn fresh_is_closed() {
        let w = ReservationWord::new();
        let s = w.load(Ordering::Acquire);
        assert!(!s.is_open());
        assert_eq!(s.offset, CLOSED);
    }

    #[test]
    fn publish_open_then_get() {
        let w = ReservationWord::new();
        assert!(w.publish_open(0, 0));
        match w.try_get(8, 8, 4096) {
            FastGet::Granted { idx, offset, granted } => {
                assert_eq!(idx, 0);
                assert_eq!(offset, 0);
                assert_eq!(granted, 8);
            }
            other => panic!("expected Granted, got {other:?}"),
        }
    }

    #[test]
    fn two_producers_disjoint_ranges() {
        let w = ReservationWord::new();
        w.publish_open(0, 0);
        let a = w.try_get(16, 16, 4096);
        let b = w.try_get(16, 16, 4096);
        let (a_off, b_off) = match (a, b) {
            (FastGet::Granted { offset: a, .. }, FastGet::Granted { offset: b, .. }) => (a, b),
            _ => panic!("expected both granted"),
        };
        assert_ne!(a_off, b_off);
        assert_eq!(a_off.min(b_off), 0);
        assert_eq!(a_off.max(b_off), 16);
    }

    #[test]
    fn exhausted_entry_falls_to_slow_path() {
        let w = ReservationWord::new();
        w.publish_open(0, 4090);
        assert_eq!(w.try_get(8, 8, 4096), FastGet::SlowPath);
    }

    #[test]
    fn switch_refused_while_prev_unwritten() {
        let w = ReservationWord::new();
        w.publish_open(0, 0);
        let (out1, in1, _) = w.try_switch().expect("first switch succeeds");
        assert_eq!((out1, in1), (0, 1));
        assert!(w.try_switch().is_none(), "second switch must wait for prev_buf_unwritten");
        w.clear_prev_unwritten();
        let (out2, in2, _) = w.try_switch().expect("switch succeeds after prev write completes");
        assert_eq!((out2, in2), (1, 0));
    }

    #[test]
    fn halt_latches_error() {
        let w = ReservationWord::new();
        w.publish_open(0, 0);
        w.halt();
        assert_eq!(w.try_get(1, 1, 4096), FastGet::Errored);
    }
}
