//! The staging area for one in-construction log entry (§3, EntryBuffer).
//!
//! Two of these exist per `JournalCore`, indexed by the same `idx` the
//! packed reservation word in `journal-ring` tracks. Producers holding a
//! granted reservation write their payload bytes here without taking the
//! core mutex — §4.1 requires the fast path to stay lock-free end to end,
//! not just through the point where the byte range is granted. Exclusivity
//! over the arena comes from the reservation protocol itself (disjoint
//! byte ranges, plus the switcher never reopening a buffer until every
//! outstanding reservation on it has called `res_put`) — a "single-writer
//! per range" guarantee the type system cannot express but the protocol
//! enforces. `data` therefore lives behind an `UnsafeCell` with a manual
//! `Send + Sync` impl rather than a `Mutex`.

use crate::wire::{JsetHeader, CRC_LEN, HEADER_LEN};
use journal_async::WaitList;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// 256-bit membership filter. False positives are acceptable (§4.6); false
/// negatives are not, so every set uses `Release` and every query `Acquire`.
#[derive(Debug, Default)]
pub struct InodeFilter {
    words: [AtomicU64; 4],
}

impl InodeFilter {
    fn bit_index(inode: u64) -> (usize, u64) {
        // A single hash (not the textbook two-hash Bloom construction) is
        // sufficient at 256 bits for the expected entry-local working set;
        // the cost of a false positive here is only an unnecessary flush.
        let h = inode.wrapping_mul(0x9E3779B97F4A7C15) >> 56; // top byte, 0..256
        ((h as usize) / 64, 1u64 << (h % 64))
    }

    pub fn set(&self, inode: u64) {
        let (word, mask) = Self::bit_index(inode);
        self.words[word].fetch_or(mask, Ordering::Release);
    }

    pub fn contains(&self, inode: u64) -> bool {
        let (word, mask) = Self::bit_index(inode);
        self.words[word].load(Ordering::Acquire) & mask != 0
    }

    pub fn clear(&self) {
        for w in &self.words {
            w.store(0, Ordering::Release);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| w.load(Ordering::Acquire) == 0)
    }
}

/// One of the two in-construction entries.
///
/// `data`, `size`, `seq`, `last_seq` and `used_bytes` are all reachable
/// without the core mutex: `res_get`'s fast path reads `size`/`seq` to hand
/// back a `Reservation`, and the caller then calls `write_at` directly. Only
/// field mutations that cross the open/closed boundary (`reset_for_reuse`,
/// `ensure_capacity`, `set_seq`, ...) require the caller to already hold
/// either the core mutex or sole ownership of a just-closed buffer, per the
/// call sites in `core.rs`.
pub struct EntryBuffer {
    /// Payload arena; grown on demand between `min_entry_bytes` and
    /// `max_entry_bytes`. Includes the header region: byte offsets handed
    /// out by the reservation word are relative to `HEADER_LEN`.
    data: UnsafeCell<Vec<u8>>,
    /// Current allocation size in bytes, header included.
    size: AtomicU32,
    /// Sectors on disk computed from the device ring at open time.
    pub disk_sectors: AtomicU32,
    seq: AtomicU64,
    last_seq: AtomicU64,
    /// Exact payload byte count reserved into this buffer as of the last
    /// switch (§4.2 step 2's outgoing offset), used to size the sealed
    /// entry instead of the arena's full capacity.
    used_bytes: AtomicU32,
    pub has_inode: InodeFilter,
    pub wait: WaitList,
}

// SAFETY: `data` is mutated only by `ensure_capacity` (exclusively, while
// the buffer is closed and not yet reachable through the reservation word)
// and by `write_at` (disjoint byte ranges, guaranteed by the reservation
// protocol in `journal-ring`, never overlapping `ensure_capacity`'s grow
// window because growth happens before `publish_open`). `seal` only reads
// once every producer has called `res_put`, which happens-after every
// `write_at` for the same buffer via the reservation word's Release/Acquire
// handoff. This mirrors `ring.rs`'s own invariant: enforced by protocol,
// not the type system.
unsafe impl Send for EntryBuffer {}
unsafe impl Sync for EntryBuffer {}

impl EntryBuffer {
    pub fn new(min_entry_bytes: u32) -> Self {
        Self {
            data: UnsafeCell::new(vec![0u8; min_entry_bytes as usize]),
            size: AtomicU32::new(min_entry_bytes),
            disk_sectors: AtomicU32::new(0),
            seq: AtomicU64::new(0),
            last_seq: AtomicU64::new(0),
            used_bytes: AtomicU32::new(0),
            has_inode: InodeFilter::default(),
            wait: WaitList::new(),
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// The byte ceiling producers may reserve against: the arena size minus
    /// the header region reservations never cover.
    #[inline]
    pub fn payload_capacity(&self) -> u32 {
        self.size().saturating_sub(HEADER_LEN as u32)
    }

    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_seq(&self, seq: u64) {
        self.seq.store(seq, Ordering::Release);
    }

    #[inline]
    pub fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_last_seq(&self, seq: u64) {
        self.last_seq.store(seq, Ordering::Release);
    }

    #[inline]
    pub fn used_bytes(&self) -> u32 {
        self.used_bytes.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_used_bytes(&self, bytes: u32) {
        self.used_bytes.store(bytes, Ordering::Release);
    }

    /// Resets this buffer to a fresh, unopened state so it can be reused
    /// for a later seq (§4.2 step 3: "Initializes the new buffer (zero
    /// header, zero Bloom)"). Callers must hold the core mutex; the buffer
    /// is not yet reachable through the reservation word at this point.
    pub fn reset_for_reuse(&self) {
        self.seq.store(0, Ordering::Release);
        self.last_seq.store(0, Ordering::Release);
        self.used_bytes.store(0, Ordering::Release);
        self.has_inode.clear();
    }

    /// Grows the arena to at least `needed` bytes, up to `max_entry_bytes`,
    /// doubling each step to stay power-of-two sized. Returns `false` if
    /// `needed` exceeds the ceiling. Callers must hold the core mutex and
    /// must call this before `publish_open` makes the buffer reachable from
    /// the fast path.
    pub fn ensure_capacity(&self, needed: u32, max_entry_bytes: u32) -> bool {
        if needed > max_entry_bytes {
            return false;
        }
        let cur = self.size();
        if needed <= cur {
            return true;
        }
        let mut new_size = cur.max(1);
        while new_size < needed {
            new_size = (new_size * 2).min(max_entry_bytes);
        }
        // SAFETY: exclusive access — the buffer is closed (pre-publish_open)
        // and the core mutex is held, so no concurrent `write_at`/`seal`
        // can observe `data` mid-resize.
        unsafe {
            (*self.data.get()).resize(new_size as usize, 0);
        }
        self.size.store(new_size, Ordering::Release);
        true
    }

    /// Writes `payload` at payload-relative `offset` inside the arena.
    /// Callers hold a reservation covering `[offset, offset+payload.len())`
    /// in payload space, guaranteeing exclusivity without any additional
    /// synchronization here.
    pub fn write_at(&self, offset: u32, payload: &[u8]) {
        let start = HEADER_LEN + offset as usize;
        let end = start + payload.len();
        // SAFETY: the reservation word guarantees no other caller holds an
        // overlapping `[offset, offset+payload.len())` range on this `idx`
        // while `prev_buf_unwritten`/switch state keeps this buffer open.
        unsafe {
            (*self.data.get())[start..end].copy_from_slice(payload);
        }
    }

    /// Seals the header and appends the trailing CRC, returning the exact
    /// bytes that belong on disk for this entry (§6, §4.2 step 1). Callers
    /// must only invoke this once every reservation on the buffer has been
    /// released (`count[idx] == 0`), which happens-after every `write_at`.
    pub fn seal(&self, u64s_used: u32) -> Vec<u8> {
        let header = JsetHeader {
            seq: self.seq(),
            last_seq: self.last_seq(),
            u64s_used,
            flags: 0,
        };
        let payload_len = (u64s_used as usize) * 8;
        let mut out = Vec::with_capacity(HEADER_LEN + payload_len + CRC_LEN);
        header.encode(&mut out);
        // SAFETY: see struct-level comment; every writer has released its
        // reservation by the time a caller may call `seal`.
        unsafe {
            out.extend_from_slice(&(*self.data.get())[HEADER_LEN..HEADER_LEN + payload_len]);
        }
        crate::wire::append_checksum(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inode_filter_set_and_query() {
        let filter = InodeFilter::default();
        assert!(!filter.contains(42));
        filter.set(42);
        assert!(filter.contains(42));
    }

    #[test]
    fn inode_filter_clear_resets_all_bits() {
        let filter = InodeFilter::default();
        filter.set(1);
        filter.set(999999);
        filter.clear();
        assert!(filter.is_empty());
    }

    #[test]
    fn ensure_capacity_grows_by_doubling() {
        let buf = EntryBuffer::new(64);
        assert!(buf.ensure_capacity(100, 4096));
        assert_eq!(buf.size(), 128);
    }

    #[test]
    fn ensure_capacity_rejects_past_ceiling() {
        let buf = EntryBuffer::new(64);
        assert!(!buf.ensure_capacity(8192, 4096));
    }

    #[test]
    fn reset_for_reuse_clears_bloom() {
        let buf = EntryBuffer::new(64);
        buf.has_inode.set(7);
        buf.reset_for_reuse();
        assert!(buf.has_inode.is_empty());
    }

    #[test]
    fn write_at_offsets_past_header() {
        let buf = EntryBuffer::new(256);
        buf.set_seq(1);
        buf.write_at(0, &[0xAB; 8]);
        buf.set_used_bytes(8);
        let sealed = buf.seal(1);
        // header, then the payload byte, then a 4-byte CRC trailer.
        assert_eq!(sealed[HEADER_LEN], 0xAB);
        assert_eq!(sealed.len(), HEADER_LEN + 8 + CRC_LEN);
    }
}
