//! The orchestrator (§4): reservation → buffer-switch → open-next →
//! write-submit → pin-release, plus the synchronous flush primitives and
//! device-bucket management exposed to the B-tree insert path (§6).

use crate::config::JournalConfig;
use crate::device_ring::DeviceRingSet;
use crate::entry::EntryBuffer;
use crate::invariants::{
    debug_assert_ondisk_mark, debug_assert_seq_window, debug_assert_switch_not_inuse,
};
use crate::metrics::Metrics;
use crate::pin_fifo::{Flusher, PinFIFO};
use journal_async::{DelayedTimer, HaltLatch, JournalError, PeriodicTimer, WaitList};
use journal_ring::{FastGet, ReservationWord};
use journal_store::{DeviceId, StorageBackend};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A caller-exclusive byte range inside seq `seq`'s open entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub seq: u64,
    pub idx: u8,
    pub offset: u32,
    pub granted: u32,
}

/// External collaborator for growing a device's bucket ring (§4.8). The
/// journal core never picks physical bucket numbers itself.
pub trait BucketAllocator: Send + Sync {
    fn allocate_bucket(&self, device: DeviceId) -> Option<u64>;
    fn release_bucket(&self, device: DeviceId, bucket: u64);
    fn mark_journal_metadata(&self, device: DeviceId, bucket: u64);
}

/// Callback invoked every `bucket_seq_cleanup_interval` buffer switches
/// (§9 Open Question). The coupling to allocator GC is external to the
/// journal core; the default does nothing.
pub trait BucketSeqCleanupHook: Send + Sync {
    fn on_threshold(&self, bucket_journal_seq: u32);
}

pub struct NoopCleanupHook;
impl BucketSeqCleanupHook for NoopCleanupHook {
    fn on_threshold(&self, _bucket_journal_seq: u32) {}
}

struct Inner {
    pin_fifo: PinFIFO,
    device_rings: DeviceRingSet,
    cur_seq: u64,
    last_seq_ondisk: u64,
    force_write_timers: [DelayedTimer; 2],
    bucket_journal_seq: u32,
    reclaim_timer: Option<PeriodicTimer>,
}

/// One filesystem instance's journal. Not a singleton: each mounted
/// filesystem owns exactly one of these.
pub struct JournalCore<S: StorageBackend + 'static> {
    config: JournalConfig,
    backend: Arc<S>,
    word: ReservationWord,
    halt: HaltLatch,
    metrics: Arc<Metrics>,
    /// Outside the mutex deliberately: producers write their payload bytes
    /// here after `res_get` grants a reservation, without ever touching
    /// `inner` (§4.1's lock-free fast path extends through the write, not
    /// just the grant).
    buffers: [EntryBuffer; 2],
    inner: Mutex<Inner>,
    reservation_wait: WaitList,
    cleanup_hook: Arc<dyn BucketSeqCleanupHook>,
    /// Outstanding `write_bucket` calls per device, for `dev_stop` (§5).
    device_inflight: Vec<AtomicU64>,
    device_drained: WaitList,
}

impl<S: StorageBackend + 'static> JournalCore<S> {
    /// `fs_journal_init` + `dev_journal_init`: constructs a fresh journal
    /// over `backend`, with one ring per device reporting `device_count()`.
    pub fn new(config: JournalConfig, backend: Arc<S>) -> Arc<Self> {
        let device_count = backend.device_count();
        Arc::new(Self {
            config,
            backend,
            word: ReservationWord::new(),
            halt: HaltLatch::new(),
            metrics: Arc::new(Metrics::new()),
            buffers: [EntryBuffer::new(config.min_entry_bytes), EntryBuffer::new(config.min_entry_bytes)],
            inner: Mutex::new(Inner {
                pin_fifo: PinFIFO::new(config.pin_fifo_depth),
                device_rings: DeviceRingSet::new(device_count),
                cur_seq: 0,
                last_seq_ondisk: 0,
                force_write_timers: [DelayedTimer::new(), DelayedTimer::new()],
                bucket_journal_seq: 0,
                reclaim_timer: None,
            }),
            reservation_wait: WaitList::new(),
            cleanup_hook: Arc::new(NoopCleanupHook),
            device_inflight: (0..device_count).map(|_| AtomicU64::new(0)).collect(),
            device_drained: WaitList::new(),
        })
    }

    /// `fs_journal_start`: opens the first entry and arms the periodic
    /// reclaim tick. `_blacklisted_seq_ranges` is accepted for interface
    /// parity with §6's lifecycle API; replay is out of scope so there is
    /// nothing to blacklist against here.
    pub async fn start(self: &Arc<Self>, _blacklisted_seq_ranges: &[(u64, u64)]) -> Result<(), JournalError> {
        // Buffer 0's first open never goes through `try_switch`, so it
        // never picks up the synthetic "buffer is open" reference that
        // `try_switch` grants every later incoming buffer. Claim it here.
        self.word.claim_open_ref(0);
        {
            let mut inner = self.inner.lock().await;
            self.open_entry(&mut inner)?;
        }
        let this = self.clone();
        let period = self.config.reclaim_tick_period;
        let timer = PeriodicTimer::spawn(period, move || {
            let this = this.clone();
            async move {
                this.reclaim_tick().await;
            }
        });
        self.inner.lock().await.reclaim_timer = Some(timer);
        Ok(())
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn journal_error(&self) -> bool {
        self.halt.is_halted()
    }

    /// §4.1: lock-free fast path, falling back to the slow path under the
    /// core mutex when the fast path cannot grant space.
    pub async fn res_get(self: &Arc<Self>, need_min: u32, need_max: u32) -> Result<Reservation, JournalError> {
        loop {
            if self.halt.is_halted() {
                return Err(JournalError::Io("journal halted".into()));
            }
            let idx = self.word.load(Ordering::Acquire).idx;
            let cur_entry_bytes = self.buffers[idx as usize].payload_capacity();
            match self.word.try_get(need_min, need_max, cur_entry_bytes) {
                FastGet::Granted { idx, offset, granted } => {
                    self.metrics.reservations_granted.fetch_add(1, Ordering::Relaxed);
                    let seq = self.buffers[idx as usize].seq();
                    return Ok(Reservation { seq, idx, offset, granted });
                }
                FastGet::Errored => {
                    return Err(JournalError::Io("journal halted".into()));
                }
                FastGet::SlowPath => match self.res_get_slow(need_min, need_max).await? {
                    Some(reservation) => return Ok(reservation),
                    None => continue,
                },
            }
        }
    }

    /// Writes `payload` into the reserved byte range `reservation` grants.
    /// Lock-free: the reservation itself is this call's only synchronization.
    pub fn write_payload(&self, reservation: Reservation, payload: &[u8]) {
        debug_assert!(payload.len() as u32 <= reservation.granted, "payload exceeds granted range");
        self.buffers[reservation.idx as usize].write_at(reservation.offset, payload);
    }

    async fn res_get_slow(self: &Arc<Self>, need_min: u32, need_max: u32) -> Result<Option<Reservation>, JournalError> {
        self.metrics.reserve_spins.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().await;

        let idx = self.word.load(Ordering::Acquire).idx;
        let cur_entry_bytes = self.buffers[idx as usize].payload_capacity();
        if let FastGet::Granted { idx, offset, granted } = self.word.try_get(need_min, need_max, cur_entry_bytes) {
            let seq = self.buffers[idx as usize].seq();
            return Ok(Some(Reservation { seq, idx, offset, granted }));
        }

        // If the word is already closed (not open), a previous switch's
        // `open_entry` retry is still pending — most likely because the
        // device rings had no reusable bucket at the time. Retry the open
        // directly rather than attempting another `try_switch`, which would
        // just fail `Inuse` forever against an already-closed word.
        let outcome = if self.word.load(Ordering::Acquire).is_open() {
            self.switch_buffer(&mut inner).await
        } else {
            self.open_entry(&mut inner).map_err(|_| SwitchOutcome::NoSpace)
        };

        match outcome {
            Ok(()) => Ok(None),
            Err(SwitchOutcome::Inuse | SwitchOutcome::NoSpace) => {
                // Register while still holding the lock: a wake_all fired by
                // another task can't land in the gap between the failed
                // switch and us starting to wait.
                let notified = self.reservation_wait.notified();
                drop(inner);
                self.metrics.mark_blocked_start();
                notified.await;
                self.metrics.clear_blocked_start();
                Ok(None)
            }
        }
    }

    /// §4.2: the single state-machine edge. Closes the open buffer, opens
    /// the other, and submits the outgoing buffer's write once every
    /// producer holding a reservation on it has released (`res_put`).
    async fn switch_buffer(self: &Arc<Self>, inner: &mut Inner) -> Result<(), SwitchOutcome> {
        let prev_unwritten_before = self.word.load(Ordering::Acquire).prev_buf_unwritten;
        let Some((outgoing, incoming, outgoing_offset)) = self.word.try_switch() else {
            return Err(SwitchOutcome::Inuse);
        };
        debug_assert_switch_not_inuse!(true, prev_unwritten_before);
        self.metrics.switches.fetch_add(1, Ordering::Relaxed);

        inner.force_write_timers[outgoing as usize].cancel();

        let outgoing_buf = &self.buffers[outgoing as usize];
        outgoing_buf.set_used_bytes(outgoing_offset);
        let outgoing_seq = outgoing_buf.seq();
        outgoing_buf.set_last_seq(inner.pin_fifo.last_seq().unwrap_or(outgoing_seq));

        inner.bucket_journal_seq = inner.bucket_journal_seq.wrapping_add(1);
        if inner.bucket_journal_seq >= self.config.bucket_seq_cleanup_interval {
            inner.bucket_journal_seq = 0;
            self.cleanup_hook.on_threshold(self.config.bucket_seq_cleanup_interval);
        }

        let open_result = self.open_entry(inner);
        if let Err(ref e) = open_result {
            debug!(outgoing_seq, error = ?e, "open_entry failed after switch, will retry");
        }

        // Release the switch's own synthetic reference on the outgoing
        // buffer regardless of whether the next entry opened: a failed
        // `open_entry` leaves the word closed but must not strand the
        // outgoing buffer's pin forever. If no producer is still mid-write,
        // this is what actually triggers submission (via
        // `maybe_submit_if_closed`). A producer still holding a reservation
        // will trigger it instead, from `res_put`, once it finishes writing.
        // The retry for a failed open happens on the next `res_get_slow`
        // call or the next `reclaim_tick`, once space frees up.
        self.maybe_submit_if_closed(outgoing, outgoing_seq);

        info!(outgoing, incoming, outgoing_seq, "journal buffer switch");
        open_result.map_err(|_| SwitchOutcome::NoSpace)
    }

    /// Spawns `submit_buffer` for `idx` iff releasing this reference (via
    /// `word.put`) dropped its count to zero on a now-closed buffer — i.e.
    /// iff this was the last outstanding producer or the switcher's own
    /// synthetic reference, whichever came last (§4.2 step 5, §4.4).
    fn maybe_submit_if_closed(self: &Arc<Self>, idx: u8, seq: u64) {
        if self.word.put(idx) {
            let this = self.clone();
            tokio::spawn(async move {
                this.submit_buffer(idx, seq).await;
            });
        }
    }

    /// §4.3: opens a new entry on whichever buffer the reservation word
    /// says is incoming. Must run under the core mutex.
    fn open_entry(self: &Arc<Self>, inner: &mut Inner) -> Result<(), JournalError> {
        if inner.pin_fifo.is_full() {
            return Err(JournalError::NoSpace);
        }
        let incoming = self.word.load(Ordering::Acquire).idx;

        let bucket_size = self.backend.bucket_size();
        let last_seq_ondisk = inner.last_seq_ondisk;
        let usable: u64 = (0..self.backend.device_count())
            .map(|d| {
                let ring = inner.device_rings.get(d);
                if ring.nr() == 0 || !ring.has_space(last_seq_ondisk) {
                    0
                } else {
                    bucket_size
                }
            })
            .min()
            .unwrap_or(0);
        if usable == 0 {
            return Err(JournalError::NoSpace);
        }

        let guaranteed_suffix = self.config.guaranteed_suffix_bytes();
        let cur_entry_bytes = (usable as u32).saturating_sub(guaranteed_suffix).max(self.config.min_entry_bytes);

        inner.cur_seq += 1;
        let new_seq = inner.cur_seq;
        if !inner.pin_fifo.push(new_seq) {
            inner.cur_seq -= 1;
            return Err(JournalError::NoSpace);
        }

        let buf = &self.buffers[incoming as usize];
        buf.reset_for_reuse();
        buf.set_seq(new_seq);
        buf.ensure_capacity(cur_entry_bytes + crate::wire::HEADER_LEN as u32, self.config.max_entry_bytes);

        self.word.publish_open(incoming, 0);
        debug_assert_seq_window!(inner.pin_fifo.last_seq().unwrap_or(new_seq), new_seq);

        let force_delay = self.config.force_write_delay;
        let this = self.clone();
        inner.force_write_timers[incoming as usize].arm(force_delay, move || async move {
            let _ = this.res_get_slow(0, 0).await;
        });

        debug!(new_seq, cur_entry_bytes, "opened journal entry");
        Ok(())
    }

    /// Seals `idx`'s buffer, replicates it to every device, and on success
    /// retires its pin, wakes waiters, and kicks reclaim (§4.4).
    async fn submit_buffer(self: &Arc<Self>, idx: u8, seq: u64) {
        let buf = &self.buffers[idx as usize];
        let u64s_used = (buf.used_bytes() / 8).min(u32::from(u16::MAX));
        let sealed = buf.seal(u64s_used);
        self.metrics.writes_submitted.fetch_add(1, Ordering::Relaxed);

        let bucket_size = self.backend.bucket_size() as usize;
        let mut padded = sealed.clone();
        padded.resize(bucket_size.max(sealed.len()), 0);

        let device_count = self.backend.device_count();
        let mut buckets = Vec::with_capacity(device_count);
        {
            let mut inner = self.inner.lock().await;
            let last_seq_ondisk = inner.last_seq_ondisk;
            for device in 0..device_count {
                let ring = inner.device_rings.get_mut(device);
                if ring.nr() == 0 {
                    continue;
                }
                if !ring.has_space(last_seq_ondisk) {
                    warn!(device, seq, "device ring has no reusable bucket, skipping replica");
                    continue;
                }
                buckets.push((device, ring.advance(seq, last_seq_ondisk)));
            }
        }

        let mut join_set = tokio::task::JoinSet::new();
        for (device, bucket) in buckets {
            let backend = self.backend.clone();
            let data = padded.clone();
            let this = self.clone();
            self.device_inflight[device].fetch_add(1, Ordering::AcqRel);
            join_set.spawn(async move {
                let result = backend.write_bucket(device, bucket, &data).await;
                if this.device_inflight[device].fetch_sub(1, Ordering::AcqRel) == 1 {
                    this.device_drained.wake_all();
                }
                result
            });
        }

        let mut failed = false;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(())) => {}
                _ => failed = true,
            }
        }

        if failed {
            warn!(seq, "journal write failed, halting");
            self.halt();
            return;
        }

        self.metrics.writes_acked.fetch_add(1, Ordering::Relaxed);
        self.metrics.bytes_written.fetch_add(sealed.len() as u64, Ordering::Relaxed);

        self.word.clear_prev_unwritten();

        let mut inner = self.inner.lock().await;
        if let Some(pin) = inner.pin_fifo.get_mut(seq) {
            pin.unpin();
        }
        self.buffers[idx as usize].wait.wake_all();
        let last_seq = inner.pin_fifo.last_seq().unwrap_or(seq);
        debug_assert_ondisk_mark!(inner.last_seq_ondisk, last_seq);
        drop(inner);

        self.reservation_wait.wake_all();
        self.reclaim_tick().await;
    }

    /// §4.1: decrements the outstanding count; if this was the last
    /// reservation on a now-closed buffer, dispatches its write (§4.2 step
    /// 5, §4.4: "when the last `res_put` fires for a closed buffer, a write
    /// is dispatched").
    pub async fn res_put(self: &Arc<Self>, reservation: Reservation) {
        self.maybe_submit_if_closed(reservation.idx, reservation.seq);
    }

    /// §4.6: marks `inode` as touched by the entry `reservation` belongs
    /// to. Safe without the core mutex — the caller's reservation pins the
    /// buffer below the switch boundary.
    pub async fn res_mark_inode(self: &Arc<Self>, reservation: Reservation, inode: u64) {
        self.buffers[reservation.idx as usize].has_inode.set(inode);
    }

    /// §4.6: answers "what is the most recent unflushed seq touching
    /// `inode`?", 0 if none.
    pub async fn inode_journal_seq(self: &Arc<Self>, inode: u64) -> u64 {
        // Still taken under the mutex, even though the buffers themselves
        // live outside it: this keeps "read the current idx and consult
        // both buffers" atomic with respect to a concurrent switch, which
        // matters for this query's "most recent" semantics even though
        // each individual buffer field access is itself lock-free.
        let _inner = self.inner.lock().await;
        let cur_idx = self.word.load(Ordering::Acquire).idx;
        if self.buffers[cur_idx as usize].has_inode.contains(inode) {
            return self.buffers[cur_idx as usize].seq();
        }
        let other = cur_idx ^ 1;
        if self.buffers[other as usize].has_inode.contains(inode) {
            return self.buffers[other as usize].seq();
        }
        0
    }

    /// §4.5: runs flushers for every seq at the front of the FIFO whose
    /// refcount has reached zero, advancing `last_seq`. Also retries a
    /// pending `open_entry` that an earlier `switch_buffer` couldn't
    /// complete for lack of a reusable bucket (Comment 1's retry path) now
    /// that reclaiming may have freed one.
    pub async fn reclaim_tick(self: &Arc<Self>) {
        self.metrics.reclaim_ticks.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().await;
        let reclaimed = inner.pin_fifo.reclaim_ready();
        let mut should_wake = false;
        if !reclaimed.is_empty() {
            self.metrics.seqs_reclaimed.fetch_add(reclaimed.len() as u64, Ordering::Relaxed);
            if let Some(&last) = reclaimed.last() {
                inner.last_seq_ondisk = inner.last_seq_ondisk.max(last);
            }
            let last_seq_ondisk = inner.last_seq_ondisk;
            for device in 0..inner.device_rings.device_count() {
                inner.device_rings.get_mut(device).advance_last_idx(last_seq_ondisk);
            }
            should_wake = true;
        }

        if !self.halt.is_halted() && !self.word.load(Ordering::Acquire).is_open() {
            should_wake |= self.open_entry(&mut inner).is_ok();
        }

        drop(inner);
        if should_wake {
            self.reservation_wait.wake_all();
        }
    }

    /// §4.7: blocks until `seq` is durable.
    pub async fn flush_seq(self: &Arc<Self>, seq: u64) -> Result<(), JournalError> {
        loop {
            if self.halt.is_halted() {
                return Err(JournalError::Io("journal halted".into()));
            }
            let idx = if seq == self.buffers[0].seq() {
                Some(0u8)
            } else if seq == self.buffers[1].seq() {
                Some(1u8)
            } else {
                None
            };
            let Some(idx) = idx else { return Ok(()) };

            // Register interest before checking durability: a completion
            // that lands between the check and the wait must still wake us.
            let notified = self.buffers[idx as usize].wait.notified();
            let durable = {
                let mut inner = self.inner.lock().await;
                let word = self.word.load(Ordering::Acquire);
                let is_open = word.idx == idx && word.is_open();
                if is_open {
                    // Force a close so the seq can become durable.
                    let _ = self.switch_buffer(&mut inner).await;
                }
                inner.pin_fifo.get_mut(seq).map_or(true, |p| p.refcount == 0)
            };
            if durable {
                return Ok(());
            }
            tokio::select! {
                _ = notified => {}
                _ = self.halt.wait_for_halt() => {
                    return Err(JournalError::Io("journal halted".into()));
                }
            }
        }
    }

    /// §4.7: registers `continuation` to run once `seq` is durable instead
    /// of blocking the calling task.
    pub fn flush_seq_async(self: &Arc<Self>, seq: u64, continuation: Flusher) {
        let this = self.clone();
        tokio::spawn(async move {
            if this.flush_seq(seq).await.is_ok() {
                continuation();
            }
        });
    }

    /// §4.7: flushes whichever seq is current (or the last closed one).
    pub async fn flush(self: &Arc<Self>) -> Result<(), JournalError> {
        let seq = {
            let inner = self.inner.lock().await;
            inner.pin_fifo.cur_seq().unwrap_or(0)
        };
        self.flush_seq(seq).await
    }

    /// §4.7: acquires a zero-payload reservation purely to create a new
    /// seq, then flushes it, producing a durable barrier.
    pub async fn meta(self: &Arc<Self>) -> Result<u64, JournalError> {
        let reservation = self.res_get(0, 0).await?;
        self.res_put(reservation).await;
        self.flush_seq(reservation.seq).await?;
        Ok(reservation.seq)
    }

    /// §4.7: ensures `seq` is open (or already exists), queuing
    /// `continuation` if `open_entry` must block on FIFO/device space.
    pub async fn open_seq_async(self: &Arc<Self>, seq: u64, continuation: Flusher) -> OpenSeqOutcome {
        let mut inner = self.inner.lock().await;
        let cur = inner.cur_seq;
        if seq < cur {
            return OpenSeqOutcome::AlreadyExists;
        }
        if seq == cur && self.word.load(Ordering::Acquire).is_open() {
            return OpenSeqOutcome::AlreadyOpen;
        }
        match self.open_entry(&mut inner) {
            Ok(()) => OpenSeqOutcome::Opened,
            Err(_) => {
                drop(inner);
                let this = self.clone();
                tokio::spawn(async move {
                    this.reservation_wait.wait().await;
                    continuation();
                });
                OpenSeqOutcome::Blocked
            }
        }
    }

    /// §7: one-way transition into the error-latched state.
    pub fn halt(self: &Arc<Self>) {
        if self.halt.halt() {
            self.metrics.halts.fetch_add(1, Ordering::Relaxed);
            self.word.halt();
            self.reservation_wait.wake_all();
            warn!("journal halted");
        }
    }

    /// Collaborator hook for the outer B-tree iteration loop to cooperate
    /// with the scheduler (§5).
    pub async fn cond_yield(&self) {
        tokio::task::yield_now().await;
    }

    /// §4.8, §6 `set_nr_journal_buckets`: grows `device`'s ring to
    /// `target_nr` buckets while producers remain active.
    pub async fn set_nr_journal_buckets(
        self: &Arc<Self>,
        device: DeviceId,
        target_nr: u64,
        allocator: &dyn BucketAllocator,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        let ok = inner.device_rings.get_mut(device).grow_to(
            target_nr,
            || allocator.allocate_bucket(device),
            |b| allocator.release_bucket(device, b),
        );
        if ok {
            let ring = inner.device_rings.get(device);
            for &bucket in &ring.buckets {
                allocator.mark_journal_metadata(device, bucket);
            }
        }
        ok
    }

    /// §5 `dev_stop`: blocks until no `write_bucket` call targeting `device`
    /// is still in flight. Does not prevent new writes from being submitted
    /// to `device` afterward — pair with `fs_journal_stop` (or stop
    /// producing new reservations by some other means) if that matters.
    pub async fn dev_stop(&self, device: DeviceId) {
        loop {
            let notified = self.device_drained.notified();
            if self.device_inflight[device].load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// `dev_journal_exit`: releases `device`'s bucket ring back to the
    /// allocator, e.g. when the device is being removed from the
    /// filesystem. Waits out `dev_stop` first so no write is still
    /// targeting a bucket about to be released.
    pub async fn dev_journal_exit(self: &Arc<Self>, device: DeviceId, allocator: &dyn BucketAllocator) {
        self.dev_stop(device).await;
        let mut inner = self.inner.lock().await;
        let ring = inner.device_rings.get_mut(device);
        for &bucket in &ring.buckets {
            allocator.release_bucket(device, bucket);
        }
        ring.clear();
        info!(device, "device journal ring exited");
    }

    /// `fs_journal_stop`: the unmount-time counterpart to `start`. Halts
    /// future reservations and cancels the background reclaim and
    /// force-write timers; writes already in flight are left to finish (use
    /// `dev_stop` to wait on a specific device). Idempotent.
    pub async fn fs_journal_stop(self: &Arc<Self>) {
        self.halt();
        let mut inner = self.inner.lock().await;
        inner.reclaim_timer = None;
        for timer in &mut inner.force_write_timers {
            timer.cancel();
        }
    }

    /// `fs_journal_exit`: the final teardown step after `fs_journal_stop`.
    /// There's no separate resource to release beyond what `stop` already
    /// cancelled — the core's own state drops once the last `Arc` goes away
    /// — so this exists only to give the mount path's `init`/`start`/
    /// `stop`/`exit` naming a literal counterpart here, and is safe to call
    /// without having called `fs_journal_stop` first.
    pub async fn fs_journal_exit(self: &Arc<Self>) {
        self.fs_journal_stop().await;
    }

    /// §6 debug surface: current seq, for telemetry and simulation harnesses.
    pub async fn cur_seq(&self) -> u64 {
        self.inner.lock().await.cur_seq
    }

    /// §6 debug surface: oldest seq still pinned, for telemetry and
    /// simulation harnesses.
    pub async fn last_seq(&self) -> Option<u64> {
        self.inner.lock().await.pin_fifo.last_seq()
    }

    /// §6 debug surface: one-line text rendering of the packed reservation
    /// word. Not part of correctness — diagnostic only.
    pub fn debug_reservation_state(&self) -> String {
        let s = self.word.load(Ordering::Acquire);
        format!(
            "idx={} offset={} count=[{},{}] prev_buf_unwritten={} open={} error={}",
            s.idx,
            s.offset,
            s.count[0],
            s.count[1],
            s.prev_buf_unwritten,
            s.is_open(),
            s.is_error(),
        )
    }

    /// §6 debug surface: one-line-per-seq text rendering of the pin FIFO's
    /// contents. Not part of correctness — diagnostic only.
    pub async fn debug_pin_fifo(&self) -> String {
        let inner = self.inner.lock().await;
        let mut out = String::new();
        for pin in inner.pin_fifo.iter() {
            out.push_str(&format!(
                "seq={} refcount={} pending={} flushed={}\n",
                pin.seq,
                pin.refcount,
                pin.pending.len(),
                pin.flushed.len(),
            ));
        }
        if out.is_empty() {
            out.push_str("(empty)\n");
        }
        out
    }
}

enum SwitchOutcome {
    Inuse,
    NoSpace,
}

/// Outcome of `open_seq_async` (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenSeqOutcome {
    AlreadyExists,
    AlreadyOpen,
    Opened,
    Blocked,
}
