//! A bounded ring of per-sequence pin lists (§3, PinFIFO).
//!
//! Every seq between `last_seq` and `cur_seq` has a live `PinList`. A seq's
//! space cannot be reclaimed while its `refcount` is non-zero; reclaiming
//! runs each seq's registered flushers once the count drops to zero and the
//! seq is the eldest still present.

use std::collections::VecDeque;
use std::sync::Arc;

/// A callback registered against a seq, run by the reclaim engine once that
/// seq's refcount reaches zero. Typically moves dirty B-tree nodes to disk;
/// the journal core has no opinion on what a flusher actually does.
pub type Flusher = Arc<dyn Fn() + Send + Sync>;

/// Per-seq pin bookkeeping.
pub struct PinList {
    pub seq: u64,
    pub refcount: u64,
    pub pending: Vec<Flusher>,
    pub flushed: Vec<Flusher>,
}

impl PinList {
    pub fn new(seq: u64, initial_refcount: u64) -> Self {
        Self {
            seq,
            refcount: initial_refcount,
            pending: Vec::new(),
            flushed: Vec::new(),
        }
    }

    pub fn pin(&mut self) {
        self.refcount += 1;
    }

    /// Drops one reference, returning `true` if the refcount reached zero.
    pub fn unpin(&mut self) -> bool {
        debug_assert!(self.refcount > 0, "unpin with no outstanding references");
        self.refcount -= 1;
        self.refcount == 0
    }

    /// Runs and retires every pending flusher for this seq.
    pub fn run_flushers(&mut self) {
        for flusher in self.pending.drain(..) {
            flusher();
            self.flushed.push(flusher);
        }
    }
}

/// Bounded FIFO of `PinList`s, indexed by seq. Invariant: indices
/// `[last_seq, cur_seq]` are present as long as the journal has been
/// started; `refcount[last_seq] == 0` is the precondition for reclaim to
/// advance `last_seq`.
pub struct PinFIFO {
    lists: VecDeque<PinList>,
    depth: usize,
}

impl PinFIFO {
    pub fn new(depth: usize) -> Self {
        Self {
            lists: VecDeque::with_capacity(depth),
            depth,
        }
    }

    pub fn is_full(&self) -> bool {
        self.lists.len() >= self.depth
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Pushes a new seq's pin list (the buffer-switch's synthetic "open"
    /// reference, refcount starts at 1). Returns `false` if the FIFO is
    /// already at `depth` capacity.
    pub fn push(&mut self, seq: u64) -> bool {
        if self.is_full() {
            return false;
        }
        self.lists.push_back(PinList::new(seq, 1));
        true
    }

    pub fn get_mut(&mut self, seq: u64) -> Option<&mut PinList> {
        self.lists.iter_mut().find(|p| p.seq == seq)
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.lists.front().map(|p| p.seq)
    }

    pub fn cur_seq(&self) -> Option<u64> {
        self.lists.back().map(|p| p.seq)
    }

    /// Iterates pin lists from `last_seq` to `cur_seq`, for the debug surface (§6).
    pub fn iter(&self) -> impl Iterator<Item = &PinList> {
        self.lists.iter()
    }

    /// Runs flushers and pops every leading seq whose refcount is zero.
    /// Returns the seqs actually reclaimed, in order.
    pub fn reclaim_ready(&mut self) -> Vec<u64> {
        let mut reclaimed = Vec::new();
        while let Some(front) = self.lists.front_mut() {
            if front.refcount != 0 {
                break;
            }
            front.run_flushers();
            let seq = self.lists.pop_front().unwrap().seq;
            reclaimed.push(seq);
        }
        reclaimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn push_respects_depth() {
        let mut fifo = PinFIFO::new(2);
        assert!(fifo.push(1));
        assert!(fifo.push(2));
        assert!(!fifo.push(3));
    }

    #[test]
    fn reclaim_stops_at_first_nonzero_refcount() {
        let mut fifo = PinFIFO::new(4);
        fifo.push(1);
        fifo.push(2);
        fifo.get_mut(1).unwrap().unpin(); // 1 -> 0
        let reclaimed = fifo.reclaim_ready();
        assert_eq!(reclaimed, vec![1]);
        assert_eq!(fifo.last_seq(), Some(2));
    }

    #[test]
    fn flushers_run_exactly_once_on_reclaim() {
        let mut fifo = PinFIFO::new(4);
        fifo.push(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        fifo.get_mut(1).unwrap().pending.push(Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
        }));
        fifo.get_mut(1).unwrap().unpin();
        fifo.reclaim_ready();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reclaim_is_empty_when_nothing_ready() {
        let mut fifo = PinFIFO::new(4);
        fifo.push(1);
        assert!(fifo.reclaim_ready().is_empty());
    }
}
