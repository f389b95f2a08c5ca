//! A [`StorageBackend`] wrapper that injects deterministic write failures
//! (§8.1: "seeded ... fuzzing of many concurrent producers plus injected
//! device failures").
//!
//! Failures are decided by the same seeded RNG the harness uses to schedule
//! producers, so a run is fully reproducible from its seed.

use async_trait::async_trait;
use journal_store::{DeviceId, MemoryBackend, StorageBackend, StoreError};
use rand::rngs::SmallRng;
use rand::Rng;
use std::sync::Mutex;

/// Wraps a [`MemoryBackend`], failing `write_bucket` with probability
/// `fail_probability` per call. Reads always succeed — a real device losing
/// writes but staying readable is the failure mode this harness exercises;
/// a backend that also corrupts reads would need its own model.
pub struct FaultyBackend {
    inner: MemoryBackend,
    fail_probability: f64,
    rng: Mutex<SmallRng>,
}

impl FaultyBackend {
    pub fn new(inner: MemoryBackend, fail_probability: f64, rng: SmallRng) -> Self {
        Self {
            inner,
            fail_probability,
            rng: Mutex::new(rng),
        }
    }

    fn roll_failure(&self) -> bool {
        if self.fail_probability <= 0.0 {
            return false;
        }
        self.rng.lock().unwrap().gen_bool(self.fail_probability)
    }
}

#[async_trait]
impl StorageBackend for FaultyBackend {
    async fn write_bucket(&self, device: DeviceId, bucket: u64, data: &[u8]) -> Result<(), StoreError> {
        if self.roll_failure() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("injected failure writing device {device} bucket {bucket}"),
            )));
        }
        self.inner.write_bucket(device, bucket, data).await
    }

    async fn read_bucket(&self, device: DeviceId, bucket: u64) -> Result<Vec<u8>, StoreError> {
        self.inner.read_bucket(device, bucket).await
    }

    fn bucket_size(&self) -> u64 {
        self.inner.bucket_size()
    }

    fn device_count(&self) -> usize {
        self.inner.device_count()
    }
}
