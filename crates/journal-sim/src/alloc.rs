//! A trivial [`BucketAllocator`] for the simulation harness: physical bucket
//! numbers are handed out sequentially per device and never reused. Real
//! allocator integration (free lists, GC) is outside this crate's concern —
//! see `BucketSeqCleanupHook` in `journal-core` for that seam.

use journal_core::BucketAllocator;
use journal_store::DeviceId;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct SequentialAllocator {
    next: Vec<AtomicU64>,
}

impl SequentialAllocator {
    pub fn new(devices: usize) -> Self {
        Self {
            next: (0..devices).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

impl BucketAllocator for SequentialAllocator {
    fn allocate_bucket(&self, device: DeviceId) -> Option<u64> {
        Some(self.next[device].fetch_add(1, Ordering::SeqCst))
    }

    fn release_bucket(&self, _device: DeviceId, _bucket: u64) {}

    fn mark_journal_metadata(&self, _device: DeviceId, _bucket: u64) {}
}
