//! A file-backed [`StorageBackend`]: one regular file per device, used by
//! integration tests that want real I/O semantics (partial writes across
//! process restarts, fsync ordering) rather than the in-memory double.

use crate::backend::{DeviceId, StorageBackend, StoreError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tokio::sync::Mutex;

/// One file per device, truncated to `buckets_per_device * bucket_size`
/// bytes at construction. Bucket `n` lives at byte offset `n * bucket_size`.
pub struct FileBackend {
    bucket_size: u64,
    files: Vec<Mutex<File>>,
}

impl FileBackend {
    /// Creates (or truncates) one file per device under `dir`, named
    /// `device-<n>.bin`.
    pub async fn create(dir: &std::path::Path, device_count: usize, buckets_per_device: u64, bucket_size: u64) -> Result<Self, StoreError> {
        let mut files = Vec::with_capacity(device_count);
        for n in 0..device_count {
            let path: PathBuf = dir.join(format!("device-{n}.bin"));
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .await?;
            file.set_len(buckets_per_device * bucket_size).await?;
            files.push(Mutex::new(file));
        }
        Ok(Self { bucket_size, files })
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn write_bucket(&self, device: DeviceId, bucket: u64, data: &[u8]) -> Result<(), StoreError> {
        if data.len() as u64 != self.bucket_size {
            return Err(StoreError::BadWriteSize {
                len: data.len(),
                bucket_size: self.bucket_size,
            });
        }
        let file = self.files.get(device).ok_or(StoreError::UnknownDevice(device))?;
        let mut file = file.lock().await;
        file.seek(SeekFrom::Start(bucket * self.bucket_size)).await?;
        file.write_all(data).await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn read_bucket(&self, device: DeviceId, bucket: u64) -> Result<Vec<u8>, StoreError> {
        let file = self.files.get(device).ok_or(StoreError::UnknownDevice(device))?;
        let mut file = file.lock().await;
        let len = file.metadata().await?.len();
        let offset = bucket * self.bucket_size;
        if offset + self.bucket_size > len {
            return Err(StoreError::BucketOutOfRange {
                device,
                bucket,
                bucket_count: len / self.bucket_size,
            });
        }
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; self.bucket_size as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    fn bucket_size(&self) -> u64 {
        self.bucket_size
    }

    fn device_count(&self) -> usize {
        self.files.len()
    }
}
