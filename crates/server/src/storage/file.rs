//! Append-only line-delimited JSON adapter.
//!
//! Every `save` appends one record; the file is never rewritten. Readers
//! deduplicate by `(name, kind)` keeping the last occurrence, so the logical
//! state is the newest record per key. A missing file reads as empty.

use std::collections::HashMap;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metrod_core::{MetricId, MetricSample};
use tokio::sync::RwLock;

use super::{Storage, StorageError};

pub struct FileStorage {
    path: PathBuf,
    // Write half serializes appenders; readers share the read half.
    lock: RwLock<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<MetricSample>, StorageError> {
        let _guard = self.lock.read().await;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_lines(&path)).await?
    }
}

fn read_lines(path: &Path) -> Result<Vec<MetricSample>, StorageError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut samples = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        samples.push(serde_json::from_str(line)?);
    }
    Ok(samples)
}

fn append_line(path: &Path, sample: &MetricSample) -> Result<(), StorageError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let mut line = serde_json::to_vec(sample)?;
    line.push(b'\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(&line)?;
    Ok(())
}

#[async_trait]
impl Storage for FileStorage {
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError> {
        let _guard = self.lock.write().await;
        let path = self.path.clone();
        let sample = sample.clone();
        tokio::task::spawn_blocking(move || append_line(&path, &sample)).await?
    }

    async fn get(&self, id: &MetricId) -> Result<Option<MetricSample>, StorageError> {
        let samples = self.read_all().await?;
        Ok(samples
            .into_iter()
            .rev()
            .find(|s| s.name == id.name && s.kind == id.kind))
    }

    async fn list(&self) -> Result<Vec<MetricSample>, StorageError> {
        let samples = self.read_all().await?;
        let mut latest: HashMap<MetricId, MetricSample> = HashMap::new();
        for sample in samples {
            latest.insert(sample.id(), sample);
        }
        Ok(latest.into_values().collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
