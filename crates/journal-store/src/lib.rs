//! The `StorageBackend` collaborator trait (§4.4.1) plus two test doubles
//! that exercise it without a real block device underneath: an in-memory
//! backend for unit/property tests and `journal-sim`, and a file-backed
//! backend (`tokio::fs`) for integration tests that want real fsync/seek
//! semantics.
//!
//! Neither double is the production driver — a real block-device backend
//! plugs in by implementing [`StorageBackend`] itself.

mod backend;
mod file;
mod memory;

pub use backend::{DeviceId, StorageBackend, StoreError};
pub use file::FileBackend;
pub use memory::MemoryBackend;
