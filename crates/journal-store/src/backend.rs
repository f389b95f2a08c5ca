//! The `StorageBackend` collaborator trait (§4.4.1).
//!
//! This is the seam between the journal core's bucket-allocation bookkeeping
//! and whatever actually issues device I/O. The production driver for a real
//! block device is out of scope for this crate; it plugs in by implementing
//! this trait. `journal-store` ships two test doubles — [`MemoryBackend`]
//! and [`FileBackend`] — that exercise the same contract without needing
//! real disks underneath.

use async_trait::async_trait;
use thiserror::Error;

/// Identifies one of the configured journal devices.
pub type DeviceId = usize;

/// Failures a [`StorageBackend`] implementation can report.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `device` is out of range for this backend.
    #[error("device {0} is not configured")]
    UnknownDevice(DeviceId),

    /// `bucket` is out of range for the device's bucket count.
    #[error("bucket {bucket} out of range for device {device} (have {bucket_count} buckets)")]
    BucketOutOfRange {
        device: DeviceId,
        bucket: u64,
        bucket_count: u64,
    },

    /// The write payload did not match the backend's fixed bucket size.
    #[error("write of {len} bytes does not match bucket size {bucket_size}")]
    BadWriteSize { len: usize, bucket_size: u64 },

    /// The underlying I/O operation failed (file backend only).
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The async collaborator the journal core submits bucket-granular writes
/// and reads through. Implementations own replication, fsync policy, and
/// whatever on-disk layout the real block device uses; the journal core
/// only ever deals in `(device, bucket, bytes)` triples.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Writes exactly `bucket_size()` bytes of `data` to `(device, bucket)`.
    /// Implementations that guarantee durability on return (e.g. fsync) may
    /// document that; the trait itself makes no durability promise beyond
    /// "readable by a subsequent `read_bucket` once this future resolves".
    async fn write_bucket(&self, device: DeviceId, bucket: u64, data: &[u8]) -> Result<(), StoreError>;

    /// Reads back exactly `bucket_size()` bytes from `(device, bucket)`.
    async fn read_bucket(&self, device: DeviceId, bucket: u64) -> Result<Vec<u8>, StoreError>;

    /// The fixed size, in bytes, of one bucket on this backend.
    fn bucket_size(&self) -> u64;

    /// The number of devices this backend exposes, numbered `0..device_count()`.
    fn device_count(&self) -> usize;
}
