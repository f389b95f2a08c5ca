//! End-to-end scenarios against an in-memory backend (§8, literal scenarios).

use journal_core::{BucketAllocator, JournalConfig, JournalCore};
use journal_store::{DeviceId, MemoryBackend, StorageBackend, StoreError};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> JournalConfig {
    JournalConfig::new(
        4 * 1024,
        4 * 1024,
        Duration::from_millis(1000),
        Duration::from_millis(20),
        16,
    )
}

/// Hands out ever-increasing bucket numbers per device. Real bucket
/// placement belongs to the filesystem's own allocator; the journal core
/// only tracks which buckets it currently owns.
struct SequentialAllocator {
    next: Vec<AtomicU64>,
}

impl SequentialAllocator {
    fn new(devices: usize) -> Self {
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

async fn fresh_journal(devices: usize) -> Arc<JournalCore<MemoryBackend>> {
    let backend = Arc::new(MemoryBackend::new(devices, 64, 4 * 1024));
    let core = JournalCore::new(test_config(), backend);
    let allocator = SequentialAllocator::new(devices);
    for device in 0..devices {
        assert!(
            core.set_nr_journal_buckets(device, 16, &allocator).await,
            "provisioning the device ring before start must succeed"
        );
    }
    core.start(&[]).await.expect("journal starts");
    core
}

/// Scenario 1: single-producer happy path.
#[tokio::test]
async fn single_producer_happy_path() {
    let core = fresh_journal(1).await;

    let res = core.res_get(8, 8).await.expect("reservation granted");
    assert_eq!(res.granted, 8);
    assert_eq!(res.offset, 0);
    core.write_payload(res, &[0xAB; 8]);
    core.res_put(res).await;

    core.flush_seq(res.seq).await.expect("flush succeeds");
    assert_eq!(res.seq, 1);

    let snap = core.metrics().snapshot();
    assert!(snap.writes_acked >= 1);
}

/// Scenario 2: two producers sharing one seq get disjoint byte ranges.
#[tokio::test]
async fn two_producers_one_seq_disjoint_ranges() {
    let core = fresh_journal(1).await;

    let a = core.res_get(16, 16).await.unwrap();
    let b = core.res_get(16, 16).await.unwrap();
    assert_eq!(a.seq, b.seq);

    let (lo, hi) = if a.offset < b.offset { (a, b) } else { (b, a) };
    assert_eq!(lo.offset, 0);
    assert_eq!(hi.offset, 16);

    core.write_payload(a, &[1u8; 16]);
    core.write_payload(b, &[2u8; 16]);
    core.res_put(a).await;
    core.res_put(b).await;

    core.flush().await.expect("flush succeeds");
}

/// Scenario 3: forcing a switch via `need_min` larger than remaining room
/// produces two distinct durable seqs. `test_config`'s 4 KiB min == max
/// entry size means each buffer's payload ceiling is fixed at
/// `4096 - HEADER_LEN` bytes for the lifetime of the journal.
#[tokio::test]
async fn forced_switch_on_full_produces_two_entries() {
    let core = fresh_journal(1).await;
    let ceiling = 4096 - journal_core::HEADER_LEN as u32;

    let first = core.res_get(16, 16).await.unwrap();
    core.write_payload(first, &[0u8; 16]);
    core.res_put(first).await;

    // More than the remaining room on the first buffer, but within a fresh
    // buffer's ceiling: this forces the slow path to switch and open seq 2.
    let need = ceiling - 8;
    let second = core.res_get(need, need).await.unwrap();
    assert!(second.seq > first.seq, "switch must advance the sequence number");
    assert_eq!(second.offset, 0, "fresh buffer starts at offset 0");
    core.write_payload(second, &vec![0u8; second.granted as usize]);
    core.res_put(second).await;

    core.flush_seq(first.seq).await.unwrap();
    core.flush_seq(second.seq).await.unwrap();

    let snap = core.metrics().snapshot();
    assert!(snap.switches >= 1);
    assert!(snap.writes_acked >= 2);
}

/// Scenario 4: halt mid-flight fails the pending and future reservations
/// without panicking.
#[tokio::test]
async fn halt_mid_flight_fails_cleanly() {
    let core = fresh_journal(1).await;

    let res = core.res_get(8, 8).await.unwrap();
    core.write_payload(res, &[9u8; 8]);

    core.halt();
    core.res_put(res).await; // must not panic even though the journal is halted

    let err = core.res_get(8, 8).await.unwrap_err();
    assert!(err.is_terminal());

    let err = core.flush_seq(res.seq).await.unwrap_err();
    assert!(err.is_terminal());
    assert!(core.journal_error());
}

/// Scenario 5: the inode filter answers `inode_journal_seq` from the
/// currently-open or just-closed buffer, and clears on reuse.
#[tokio::test]
async fn inode_filter_tracks_then_clears_on_reuse() {
    let core = fresh_journal(1).await;

    let res = core.res_get(8, 8).await.unwrap();
    core.write_payload(res, &[0u8; 8]);
    core.res_mark_inode(res, 0xABCDEF).await;

    assert_eq!(core.inode_journal_seq(0xABCDEF).await, res.seq);

    core.res_put(res).await;
    core.flush_seq(res.seq).await.unwrap();

    // Cycle enough new entries through both buffers that the one which
    // carried the marked inode gets reset for reuse and its bit cleared.
    // `flush_seq` force-closes the current entry regardless of fill level,
    // so this alone is enough to walk through several switches.
    for _ in 0..4 {
        let r = core.res_get(8, 8).await.unwrap();
        core.write_payload(r, &[0u8; 8]);
        core.res_put(r).await;
        core.flush_seq(r.seq).await.unwrap();
    }

    assert_eq!(core.inode_journal_seq(0xABCDEF).await, 0);
}

/// Scenario 6: growing a device's bucket ring while producers are active
/// does not fail any in-flight reservation.
#[tokio::test]
async fn device_bucket_add_during_operation() {
    let core = fresh_journal(1).await;
    let allocator = SequentialAllocator::new(1);

    let res = core.res_get(8, 8).await.unwrap();
    core.write_payload(res, &[0u8; 8]);

    let ok = core.set_nr_journal_buckets(0, 32, &allocator).await;
    assert!(ok, "growing the ring while a reservation is outstanding must not fail");

    core.res_put(res).await;
    core.flush_seq(res.seq).await.unwrap();
}

#[tokio::test]
async fn meta_produces_strictly_increasing_durable_seqs() {
    let core = fresh_journal(1).await;
    let s1 = core.meta().await.unwrap();
    let s2 = core.meta().await.unwrap();
    assert!(s2 > s1);
}

/// Blocks every `write_bucket` call on a shared semaphore until the test
/// releases it, and counts how many calls have reached that point. Lets a
/// test pin down exactly how many buffer switches have already recorded
/// their device-ring bucket assignment, independent of how many times the
/// executor happens to poll a background task.
struct GatedBackend {
    inner: MemoryBackend,
    gate: Arc<tokio::sync::Semaphore>,
    entered: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl StorageBackend for GatedBackend {
    async fn write_bucket(&self, device: DeviceId, bucket: u64, data: &[u8]) -> Result<(), StoreError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.unwrap();
        permit.forget();
        self.inner.write_bucket(device, bucket, data).await
    }

    async fn read_bucket(&self, device: DeviceId, bucket: u64) -> Result<Vec<u8>, StoreError> {
        self.inner.read_bucket(device, bucket).await
    }

    fn bucket_size(&self) -> u64 {
        self.inner.bucket_size()
    }

    fn device_count(&self) -> usize {
        self.inner.device_count()
    }
}

async fn wait_for_entries(entered: &AtomicUsize, n: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while entered.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("background submit task never reached the gate");
}

/// Scenario 7: a 2-bucket device ring refuses to open a new entry once
/// every bucket holds an unreclaimed seq, and the blocked producer unblocks
/// once the oldest of them is reclaimed. This exercises the device-ring
/// wraparound gate and the `switch_buffer` retry path together — a
/// `switch_buffer` that doesn't retry a failed `open_entry` would strand
/// this producer forever instead of eventually granting it.
#[tokio::test]
async fn ring_wrap_blocks_until_oldest_seq_reclaimed() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let backend = Arc::new(GatedBackend {
        inner: MemoryBackend::new(1, 2, 4 * 1024),
        gate: gate.clone(),
        entered: entered.clone(),
    });
    let core = JournalCore::new(test_config(), backend);
    let allocator = SequentialAllocator::new(1);
    assert!(core.set_nr_journal_buckets(0, 2, &allocator).await);
    core.start(&[]).await.expect("journal starts");

    let ceiling = 4096 - journal_core::HEADER_LEN as u32;
    let need = ceiling - 8;

    let r1 = core.res_get(16, 16).await.unwrap();
    core.write_payload(r1, &[1u8; 16]);
    core.res_put(r1).await;

    // Forces switch #1: closes seq 1 (-> bucket 0), opens seq 2.
    let r2 = core.res_get(need, need).await.unwrap();
    assert_eq!(r2.seq, 2);
    wait_for_entries(&entered, 1).await;
    core.write_payload(r2, &vec![2u8; r2.granted as usize]);
    core.res_put(r2).await;

    // Forces switch #2: closes seq 2 (-> bucket 1), opens seq 3.
    let r3 = core.res_get(need, need).await.unwrap();
    assert_eq!(r3.seq, 3);
    wait_for_entries(&entered, 2).await;
    core.write_payload(r3, &vec![3u8; r3.granted as usize]);
    core.res_put(r3).await;

    // Both buckets now hold un-reclaimed seqs (1 and 2). Forcing a third
    // switch closes seq 3 and must block opening seq 4: the ring has
    // wrapped back to bucket 0, which still holds seq 1.
    let core2 = core.clone();
    let blocked = tokio::spawn(async move { core2.res_get(need, need).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!blocked.is_finished(), "seq 4 must not open until bucket 0 is reclaimed");

    // Release seq 1's write: it completes, reclaims seq 1, and the pending
    // open retries (via reclaim_tick) and succeeds.
    gate.add_permits(1);

    let r4 = tokio::time::timeout(Duration::from_secs(2), blocked)
        .await
        .expect("blocked reservation must eventually unblock")
        .expect("task didn't panic")
        .expect("reservation granted");
    assert_eq!(r4.seq, 4);
    assert_eq!(r4.offset, 0);
}

#[tokio::test]
async fn fs_journal_stop_halts_future_reservations() {
    let core = fresh_journal(1).await;
    core.fs_journal_stop().await;
    let err = core.res_get(8, 8).await.unwrap_err();
    assert!(err.is_terminal());
    assert!(core.journal_error());
}

#[tokio::test]
async fn dev_stop_returns_immediately_with_no_inflight_writes() {
    let core = fresh_journal(1).await;
    tokio::time::timeout(Duration::from_millis(100), core.dev_stop(0))
        .await
        .expect("dev_stop must not block when nothing is in flight");
}

#[tokio::test]
async fn dev_journal_exit_releases_every_provisioned_bucket() {
    let core = fresh_journal(1).await;

    struct TrackingAllocator {
        released: std::sync::Mutex<Vec<u64>>,
    }
    impl BucketAllocator for TrackingAllocator {
        fn allocate_bucket(&self, _device: DeviceId) -> Option<u64> {
            None
        }
        fn release_bucket(&self, _device: DeviceId, bucket: u64) {
            self.released.lock().unwrap().push(bucket);
        }
        fn mark_journal_metadata(&self, _device: DeviceId, _bucket: u64) {}
    }
    let allocator = TrackingAllocator { released: std::sync::Mutex::new(Vec::new()) };

    core.dev_journal_exit(0, &allocator).await;

    assert_eq!(allocator.released.lock().unwrap().len(), 16, "every provisioned bucket must be released");
}
