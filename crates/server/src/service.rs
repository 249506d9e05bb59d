//! Ingest and query operations. Merge semantics (counter accumulation,
//! gauge replacement) live here; storage adapters stay dumb.

use std::sync::Arc;

use chrono::Utc;
use metrod_core::{MetricId, MetricKind, MetricSample, SampleError};

use crate::storage::{FileStorage, Storage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("metric name is empty")]
    EmptyName,
    #[error("invalid metric: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<SampleError> for ServiceError {
    fn from(err: SampleError) -> Self {
        match err {
            SampleError::EmptyName => ServiceError::EmptyName,
            other => ServiceError::Validation(other.to_string()),
        }
    }
}

pub struct MetricsService {
    storage: Arc<dyn Storage>,
    /// In synchronous-snapshot mode every merged sample is appended to the
    /// snapshot file before the response goes out.
    sync_snapshot: Option<Arc<FileStorage>>,
}

impl MetricsService {
    pub fn new(storage: Arc<dyn Storage>, sync_snapshot: Option<Arc<FileStorage>>) -> Self {
        Self {
            storage,
            sync_snapshot,
        }
    }

    /// Merge one sample into the store and return the post-merge state.
    pub async fn update_one(&self, sample: MetricSample) -> Result<MetricSample, ServiceError> {
        let mut merged = normalize(sample)?;
        let id = merged.id();
        let now = Utc::now();

        let current = self.storage.get(&id).await?;
        match merged.kind {
            MetricKind::Counter => {
                let prev = current.as_ref().and_then(|c| c.delta).unwrap_or(0);
                let delta = merged.delta.unwrap_or(0);
                merged.delta = Some(prev.saturating_add(delta));
                merged.value = None;
            }
            MetricKind::Gauge => {
                // Replacement: the incoming value stands.
                merged.delta = None;
            }
        }
        merged.created_at = current.and_then(|c| c.created_at).or(Some(now));
        merged.updated_at = Some(now);

        self.storage.save(&merged).await?;
        if let Some(snapshot) = &self.sync_snapshot {
            snapshot.save(&merged).await?;
        }
        Ok(merged)
    }

    /// Apply `update_one` to each sample in order. Stops at the first
    /// failure; effects of already-applied samples remain.
    pub async fn update_batch(&self, samples: Vec<MetricSample>) -> Result<(), ServiceError> {
        for sample in samples {
            self.update_one(sample).await?;
        }
        Ok(())
    }

    pub async fn get(&self, id: &MetricId) -> Result<Option<MetricSample>, ServiceError> {
        if id.name.trim().is_empty() {
            return Err(ServiceError::EmptyName);
        }
        Ok(self.storage.get(id).await?)
    }

    /// All stored samples, sorted ascending by name for stable rendering.
    pub async fn list(&self) -> Result<Vec<MetricSample>, ServiceError> {
        let mut samples = self.storage.list().await?;
        samples.sort_by(|a, b| a.name.cmp(&b.name).then(a.kind.as_str().cmp(b.kind.as_str())));
        Ok(samples)
    }

    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.storage.ping().await?)
    }
}

fn normalize(mut sample: MetricSample) -> Result<MetricSample, ServiceError> {
    let trimmed = sample.name.trim();
    if trimmed.len() != sample.name.len() {
        sample.name = trimmed.to_string();
    }
    sample.validate()?;
    Ok(sample)
}
