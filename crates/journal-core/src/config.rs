//! Plain configuration struct for a mounted journal (this expansion, §1.1).
//!
//! A `const fn` constructor with validating assertions, no `serde`/`clap` —
//! configuration is a builder struct passed at mount time, not a
//! deserialized document. (`serde` is reserved for on-the-wire/on-disk
//! types, which this crate hand-rolls instead; see `wire.rs`.)

use std::time::Duration;

/// Minimum and maximum entry buffer sizes, in bytes. Powers of two; the
/// buffer grows on demand between these bounds (§3, EntryBuffer).
pub const MIN_ENTRY_BYTES: u32 = 4 * 1024;
pub const MAX_ENTRY_BYTES: u32 = 4 * 1024 * 1024;

/// Number of distinct B-tree IDs the trailing "guaranteed" suffix reserves
/// room for (§4.3).
pub const BTREE_ID_COUNT: u32 = 16;
/// Per-B-tree overhead reserved in the guaranteed suffix.
pub const JSET_KEYS_OVERHEAD: u32 = 64;
/// Largest single extent key the guaranteed suffix must fit.
pub const MAX_EXTENT_SIZE: u32 = 256;

/// Device bucket sizing bounds (§4.8).
pub const MIN_BUCKETS: u64 = 8;
pub const MAX_BUCKETS: u64 = 1024;

#[derive(Debug, Clone, Copy)]
pub struct JournalConfig {
    /// Starting entry buffer size; grows up to `max_entry_bytes` on demand.
    pub min_entry_bytes: u32,
    /// Ceiling on entry buffer growth.
    pub max_entry_bytes: u32,
    /// How long an open entry waits for more reservations before a
    /// force-write timer closes it (§4.3).
    pub force_write_delay: Duration,
    /// Period of the background reclaim tick (§4.5).
    pub reclaim_tick_period: Duration,
    /// Depth of the PinFIFO ring; bounds how many seqs may be pinned
    /// simultaneously before `open_entry` refuses for lack of FIFO room.
    pub pin_fifo_depth: usize,
    /// Number of switches between invocations of the bucket-seq cleanup
    /// hook (§9 Open Question decision).
    pub bucket_seq_cleanup_interval: u32,
}

impl JournalConfig {
    pub const fn new(
        min_entry_bytes: u32,
        max_entry_bytes: u32,
        force_write_delay: Duration,
        reclaim_tick_period: Duration,
        pin_fifo_depth: usize,
    ) -> Self {
        assert!(
            min_entry_bytes >= MIN_ENTRY_BYTES && min_entry_bytes <= max_entry_bytes,
            "min_entry_bytes must be >= MIN_ENTRY_BYTES and <= max_entry_bytes"
        );
        assert!(
            max_entry_bytes <= MAX_ENTRY_BYTES,
            "max_entry_bytes exceeds the configured ceiling"
        );
        assert!(pin_fifo_depth > 0, "pin_fifo_depth must be non-zero");
        Self {
            min_entry_bytes,
            max_entry_bytes,
            force_write_delay,
            reclaim_tick_period,
            pin_fifo_depth,
            bucket_seq_cleanup_interval: 1 << 14,
        }
    }

    /// The guaranteed trailing suffix size reserved at `open_entry` time.
    #[inline]
    pub const fn guaranteed_suffix_bytes(&self) -> u32 {
        BTREE_ID_COUNT * (JSET_KEYS_OVERHEAD + MAX_EXTENT_SIZE)
    }

    /// Device bucket count for a device of `nbuckets` total buckets and a
    /// fixed `bucket_size`, per the §4.8 sizing formula.
    #[inline]
    pub fn device_bucket_target(nbuckets: u64, bucket_size: u64) -> u64 {
        let by_fraction = (nbuckets / 256).max(MIN_BUCKETS);
        let by_capacity = (512 * 1024 * 1024 / bucket_size.max(1)).max(1);
        by_fraction.min(MAX_BUCKETS).min(by_capacity)
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self::new(
            MIN_ENTRY_BYTES,
            MAX_ENTRY_BYTES,
            Duration::from_millis(1000),
            Duration::from_millis(100),
            256,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = JournalConfig::default();
        assert!(cfg.min_entry_bytes <= cfg.max_entry_bytes);
    }

    #[test]
    #[should_panic(expected = "min_entry_bytes")]
    fn rejects_min_above_max() {
        JournalConfig::new(
            MAX_ENTRY_BYTES,
            MIN_ENTRY_BYTES,
            Duration::from_millis(1000),
            Duration::from_millis(100),
            16,
        );
    }

    #[test]
    fn device_bucket_target_clamps_to_bounds() {
        assert_eq!(JournalConfig::device_bucket_target(0, 4096), MIN_BUCKETS);
        assert!(JournalConfig::device_bucket_target(u64::MAX, 4096) <= MAX_BUCKETS);
    }
}
