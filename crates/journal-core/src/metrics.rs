//! Lock-free, snapshot-able telemetry (§3.1). Purely observational: no code
//! path's correctness depends on reading a `Metrics` snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
pub struct Metrics {
    pub reservations_granted: AtomicU64,
    pub reservations_blocked: AtomicU64,
    pub reserve_spins: AtomicU64,
    /// Epoch-millis timestamp set when a producer first blocks in the slow
    /// path; cleared (set to 0) on unblock. Zero means "nobody is blocked".
    pub res_get_blocked_start: AtomicU64,
    pub switches: AtomicU64,
    pub writes_submitted: AtomicU64,
    pub writes_acked: AtomicU64,
    pub bytes_written: AtomicU64,
    pub reclaim_ticks: AtomicU64,
    pub seqs_reclaimed: AtomicU64,
    pub halts: AtomicU64,
}

/// A point-in-time copy of every counter, for reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub reservations_granted: u64,
    pub reservations_blocked: u64,
    pub reserve_spins: u64,
    pub res_get_blocked_start: u64,
    pub switches: u64,
    pub writes_submitted: u64,
    pub writes_acked: u64,
    pub bytes_written: u64,
    pub reclaim_ticks: u64,
    pub seqs_reclaimed: u64,
    pub halts: u64,
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_blocked_start(&self) {
        self.reservations_blocked.fetch_add(1, Ordering::Relaxed);
        self.res_get_blocked_start.store(epoch_millis(), Ordering::Relaxed);
    }

    pub fn clear_blocked_start(&self) {
        self.res_get_blocked_start.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reservations_granted: self.reservations_granted.load(Ordering::Relaxed),
            reservations_blocked: self.reservations_blocked.load(Ordering::Relaxed),
            reserve_spins: self.reserve_spins.load(Ordering::Relaxed),
            res_get_blocked_start: self.res_get_blocked_start.load(Ordering::Relaxed),
            switches: self.switches.load(Ordering::Relaxed),
            writes_submitted: self.writes_submitted.load(Ordering::Relaxed),
            writes_acked: self.writes_acked.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            reclaim_ticks: self.reclaim_ticks.load(Ordering::Relaxed),
            seqs_reclaimed: self.seqs_reclaimed.load(Ordering::Relaxed),
            halts: self.halts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_start_set_and_cleared() {
        let m = Metrics::new();
        assert_eq!(m.snapshot().res_get_blocked_start, 0);
        m.mark_blocked_start();
        assert!(m.snapshot().res_get_blocked_start > 0);
        m.clear_blocked_start();
        assert_eq!(m.snapshot().res_get_blocked_start, 0);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let m = Metrics::new();
        m.reservations_granted.fetch_add(3, Ordering::Relaxed);
        m.switches.fetch_add(1, Ordering::Relaxed);
        let snap = m.snapshot();
        assert_eq!(snap.reservations_granted, 3);
        assert_eq!(snap.switches, 1);
    }
}
