//! Async primitives shared by the journal core: a `Notify`-backed
//! continuation/wait-list, a one-way halt latch, cancellable delayed-work
//! timers, and the crate-boundary [`JournalError`] (§5, §7).
//!
//! `journal-core` holds one [`wait_list::WaitList`] per capacity condition
//! (reservation space, pin-FIFO drain) and one [`halt::HaltLatch`] per
//! mounted journal; both rely on `tokio::sync::Notify`'s
//! registration-after-completion guarantee for backpressure signaling.

mod error;
mod halt;
mod invariants;
mod timer;
mod wait_list;

pub use error::JournalError;
pub use halt::HaltLatch;
pub use timer::{DelayedTimer, PeriodicTimer};
pub use wait_list::WaitList;
