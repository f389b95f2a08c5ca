//! An in-memory [`StorageBackend`], used by unit/property tests and
//! `journal-sim`'s fault-injection harness where real files would only add
//! noise.

use crate::backend::{DeviceId, StorageBackend, StoreError};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// `device_count` devices, each a fixed number of `bucket_size`-byte buckets,
/// all held in memory. Reads of a never-written bucket return all zeros,
/// matching an unused block device.
pub struct MemoryBackend {
    bucket_size: u64,
    devices: Vec<RwLock<Vec<Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new(device_count: usize, buckets_per_device: u64, bucket_size: u64) -> Self {
        let devices = (0..device_count)
            .map(|_| RwLock::new(vec![vec![0u8; bucket_size as usize]; buckets_per_device as usize]))
            .collect();
        Self { bucket_size, devices }
    }

    fn bucket_count(&self, device: DeviceId) -> u64 {
        self.devices[device].blocking_read().len() as u64
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn write_bucket(&self, device: DeviceId, bucket: u64, data: &[u8]) -> Result<(), StoreError> {
        let dev = self.devices.get(device).ok_or(StoreError::UnknownDevice(device))?;
        if data.len() as u64 != self.bucket_size {
            return Err(StoreError::BadWriteSize {
                len: data.len(),
                bucket_size: self.bucket_size,
            });
        }
        let mut buckets = dev.write().await;
        let slot = buckets
            .get_mut(bucket as usize)
            .ok_or(StoreError::BucketOutOfRange {
                device,
                bucket,
                bucket_count: buckets.len() as u64,
            })?;
        slot.copy_from_slice(data);
        Ok(())
    }

    async fn read_bucket(&self, device: DeviceId, bucket: u64) -> Result<Vec<u8>, StoreError> {
        let dev = self.devices.get(device).ok_or(StoreError::UnknownDevice(device))?;
        let buckets = dev.read().await;
        buckets
            .get(bucket as usize)
            .cloned()
            .ok_or(StoreError::BucketOutOfRange {
                device,
                bucket,
                bucket_count: buckets.len() as u64,
            })
    }

    fn bucket_size(&self) -> u64 {
        self.bucket_size
    }

    fn device_count(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let backend = MemoryBackend::new(2, 4, 64);
        let data = vec![7u8; 64];
        backend.write_bucket(0, 2, &data).await.unwrap();
        let read = backend.read_bucket(0, 2).await.unwrap();
        assert_eq!(read, data);
    }

    #[tokio::test]
    async fn unwritten_bucket_reads_zeros() {
        let backend = MemoryBackend::new(1, 4, 32);
        let read = backend.read_bucket(0, 1).await.unwrap();
        assert_eq!(read, vec![0u8; 32]);
    }

    #[tokio::test]
    async fn out_of_range_bucket_errors() {
        let backend = MemoryBackend::new(1, 2, 16);
        let err = backend.read_bucket(0, 99).await.unwrap_err();
        assert!(matches!(err, StoreError::BucketOutOfRange { .. }));
    }

    #[tokio::test]
    async fn unknown_device_errors() {
        let backend = MemoryBackend::new(1, 2, 16);
        let err = backend.write_bucket(5, 0, &[0u8; 16]).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownDevice(5)));
    }

    #[tokio::test]
    async fn wrong_size_write_errors() {
        let backend = MemoryBackend::new(1, 2, 16);
        let err = backend.write_bucket(0, 0, &[0u8; 10]).await.unwrap_err();
        assert!(matches!(err, StoreError::BadWriteSize { .. }));
    }

    #[test]
    fn bucket_count_matches_configured() {
        let backend = MemoryBackend::new(1, 7, 16);
        assert_eq!(backend.bucket_count(0), 7);
    }
}
