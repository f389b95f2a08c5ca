//! Lock-free packed-atomic reservation protocol for a two-buffer journal.
//!
//! This crate implements only the §3/§4.1/§4.2 fast path: a single 64-bit
//! atomic word packs {open buffer index, bytes reserved, per-buffer
//! outstanding-reservation counts, "other buffer still writing" flag}, and
//! producers race a compare-and-swap loop to carve out disjoint byte ranges
//! without ever taking a lock. Everything above the word itself — sequence
//! numbers, payload arenas, pin lists, device I/O — lives in `journal-core`,
//! which holds one [`ReservationWord`] per filesystem instance.
//!
//! # Example
//!
//! ```
//! use journal_ring::{FastGet, ReservationWord};
//!
//! let word = ReservationWord::new();
//! word.publish_open(0, 0); // entry buffer 0 now open, ceiling set by the caller
//!
//! match word.try_get(8, 8, 4096) {
//!     FastGet::Granted { offset, granted, .. } => {
//!         assert_eq!(offset, 0);
//!         assert_eq!(granted, 8);
//!     }
//!     _ => unreachable!(),
//! }
//! ```

mod invariants;
mod state;

pub use state::{FastGet, PackedState, ReservationWord, CLOSED, ERROR, MAX_COUNT};
