//! Per-device circular bucket allocation bookkeeping (§3, §4.8).
//!
//! A "bucket" here is a large contiguous on-disk extent the journal writes
//! round-robin into; `DeviceRing` only tracks which physical bucket numbers
//! are assigned to the ring and which seq was last written into each, not
//! the bytes themselves (that's `StorageBackend`'s job).

use crate::invariants::debug_assert_bucket_reusable;
use journal_store::DeviceId;

/// One device's ring of journal buckets.
pub struct DeviceRing {
    /// Physical bucket numbers, in ring order.
    pub buckets: Vec<u64>,
    /// Highest seq written into `buckets[i]`, parallel to `buckets`.
    pub bucket_seq: Vec<u64>,
    /// Index currently being written into.
    pub cur_idx: usize,
    /// Index of the oldest still-live bucket.
    pub last_idx: usize,
}

impl DeviceRing {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            bucket_seq: Vec::new(),
            cur_idx: 0,
            last_idx: 0,
        }
    }

    pub fn nr(&self) -> usize {
        self.buckets.len()
    }

    /// A bucket is reusable once its recorded seq is at or below the
    /// on-disk low-water mark.
    pub fn bucket_reusable(&self, idx: usize, last_seq_ondisk: u64) -> bool {
        self.bucket_seq[idx] <= last_seq_ondisk
    }

    /// Whether `cur_idx`'s bucket may be written into without clobbering a
    /// seq that isn't durable yet.
    pub fn has_space(&self, last_seq_ondisk: u64) -> bool {
        if self.buckets.is_empty() {
            return false;
        }
        self.bucket_reusable(self.cur_idx, last_seq_ondisk)
    }

    /// Advances `cur_idx` to the next bucket, wrapping, and records `seq` as
    /// having been written into the bucket just vacated. Callers must check
    /// `has_space` first; this only asserts it in debug builds (INV-RING-01)
    /// rather than re-deriving it, since the caller already holds the seq
    /// under which that check is valid.
    pub fn advance(&mut self, seq: u64, last_seq_ondisk: u64) -> u64 {
        debug_assert_bucket_reusable!(self.bucket_reusable(self.cur_idx, last_seq_ondisk));
        let bucket = self.buckets[self.cur_idx];
        self.bucket_seq[self.cur_idx] = seq;
        self.cur_idx = (self.cur_idx + 1) % self.buckets.len();
        bucket
    }

    /// Walks `last_idx` forward over every bucket that has become reusable
    /// now that the on-disk low-water mark is `last_seq_ondisk`, stopping at
    /// `cur_idx` (the ring can never advance `last_idx` past the bucket it
    /// is about to write into next).
    pub fn advance_last_idx(&mut self, last_seq_ondisk: u64) {
        if self.buckets.is_empty() {
            return;
        }
        while self.last_idx != self.cur_idx && self.bucket_reusable(self.last_idx, last_seq_ondisk) {
            self.last_idx = (self.last_idx + 1) % self.buckets.len();
        }
    }

    /// `dev_journal_exit`: resets this ring to the unprovisioned state
    /// `DeviceRing::new()` starts in. Callers are responsible for releasing
    /// `buckets` back to the allocator first.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.bucket_seq.clear();
        self.cur_idx = 0;
        self.last_idx = 0;
    }

    /// Grows this ring to `target_nr` buckets by allocating `target_nr -
    /// nr()` new physical bucket numbers via `allocate_bucket` and inserting
    /// them at `last_idx`, shifting `cur_idx` to account for the insertion
    /// (§4.8). Shrinking is unsupported. On allocator failure partway
    /// through, buckets allocated so far are released via `release_bucket`
    /// and the ring is left unchanged.
    pub fn grow_to(
        &mut self,
        target_nr: u64,
        mut allocate_bucket: impl FnMut() -> Option<u64>,
        mut release_bucket: impl FnMut(u64),
    ) -> bool {
        let target_nr = target_nr as usize;
        if target_nr <= self.nr() {
            return true;
        }
        let to_add = target_nr - self.nr();
        let mut allocated = Vec::with_capacity(to_add);
        for _ in 0..to_add {
            match allocate_bucket() {
                Some(bucket) => allocated.push(bucket),
                None => {
                    for bucket in allocated {
                        release_bucket(bucket);
                    }
                    return false;
                }
            }
        }

        let insert_at = self.last_idx;
        for (offset, bucket) in allocated.into_iter().enumerate() {
            let at = insert_at + offset;
            self.buckets.insert(at, bucket);
            self.bucket_seq.insert(at, 0);
            if self.cur_idx >= at {
                self.cur_idx += 1;
            }
        }
        true
    }
}

impl Default for DeviceRing {
    fn default() -> Self {
        Self::new()
    }
}

/// The set of all configured devices' rings, indexed by `DeviceId`.
#[derive(Default)]
pub struct DeviceRingSet {
    rings: Vec<DeviceRing>,
}

impl DeviceRingSet {
    pub fn new(device_count: usize) -> Self {
        Self {
            rings: (0..device_count).map(|_| DeviceRing::new()).collect(),
        }
    }

    pub fn get(&self, device: DeviceId) -> &DeviceRing {
        &self.rings[device]
    }

    pub fn get_mut(&mut self, device: DeviceId) -> &mut DeviceRing {
        &mut self.rings[device]
    }

    pub fn device_count(&self) -> usize {
        self.rings.len()
    }
}
