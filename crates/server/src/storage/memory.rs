//! Volatile in-memory adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use metrod_core::{MetricId, MetricSample};
use tokio::sync::RwLock;

use super::{Storage, StorageError};

/// Map guarded by one read/write lock. Samples are stored by value.
#[derive(Default)]
pub struct MemoryStorage {
    samples: RwLock<HashMap<MetricId, MetricSample>>,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError> {
        self.samples
            .write()
            .await
            .insert(sample.id(), sample.clone());
        Ok(())
    }

    async fn get(&self, id: &MetricId) -> Result<Option<MetricSample>, StorageError> {
        Ok(self.samples.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<MetricSample>, StorageError> {
        Ok(self.samples.read().await.values().cloned().collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
