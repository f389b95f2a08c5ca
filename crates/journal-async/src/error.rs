//! The journal's crate-boundary error type (§7).
//!
//! `JournalError` is deliberately small: it names the five outcomes a caller
//! of the reservation/flush API actually needs to branch on, not every
//! internal failure mode. Storage-layer detail lives in `journal_store`'s
//! own `StoreError` and is folded into `Io` at the boundary via `#[from]`.

use thiserror::Error;

/// Errors surfaced across the journal's public async API.
#[derive(Debug, Error)]
pub enum JournalError {
    /// The journal FIFO or device ring is full and reclaim cannot free
    /// enough space; callers should retry with backoff.
    #[error("journal has no space available")]
    NoSpace,

    /// Too few writable device replicas are available to satisfy the
    /// configured replication factor; the filesystem must reject the write.
    #[error("insufficient writable devices for replication")]
    ReadOnly,

    /// An I/O error from the storage backend latched the journal into its
    /// terminal error state. Irreversible: every subsequent call observes
    /// this until remount.
    #[error("journal I/O failure, halted: {0}")]
    Io(String),

    /// The calling task was cancelled while waiting on a wait list.
    #[error("interrupted while waiting")]
    Interrupted,

    /// Allocation failed while growing an in-memory structure (arena,
    /// pin list node, device ring entry).
    #[error("allocation failed")]
    Oom,
}

impl JournalError {
    /// Returns `true` for errors a caller may reasonably retry after backoff
    /// (as opposed to `Io`, which is a permanent halt).
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NoSpace | Self::Interrupted)
    }

    /// Returns `true` if the journal itself is now unusable and must be
    /// remounted rather than retried.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
