//! The orchestrator (§3, §4): entry buffers, pin FIFO, per-device bucket
//! rings and the reclaim engine, wired around `journal-ring`'s lock-free
//! reservation word and `journal-async`'s continuation primitives into one
//! `JournalCore` per mounted filesystem.
//!
//! `journal-ring` grants byte ranges; `journal-core` is everything above
//! that — sequence numbers, the double-buffer switch, write submission,
//! pin/reclaim bookkeeping, and the synchronous/asynchronous flush API a
//! B-tree insert path calls against (§4.6, §4.7).

mod config;
mod core;
mod device_ring;
mod entry;
mod invariants;
mod metrics;
mod pin_fifo;
mod wire;

pub use config::{JournalConfig, BTREE_ID_COUNT, JSET_KEYS_OVERHEAD, MAX_BUCKETS, MAX_ENTRY_BYTES, MAX_EXTENT_SIZE, MIN_BUCKETS, MIN_ENTRY_BYTES};
pub use core::{BucketAllocator, BucketSeqCleanupHook, JournalCore, NoopCleanupHook, OpenSeqOutcome, Reservation};
pub use device_ring::{DeviceRing, DeviceRingSet};
pub use entry::{EntryBuffer, InodeFilter};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pin_fifo::{Flusher, PinFIFO, PinList};
pub use wire::{decode_jset, JsetEntryView, JsetHeader, WireError, CRC_LEN, ENTRY_PREFIX_LEN, HEADER_LEN};
