//! Storage adapters. Adapters only expose raw save/get/list; merge
//! semantics live in the service layer.

mod file;
mod memory;
mod postgres;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use metrod_core::{MetricId, MetricSample};

/// Adapter failures. Absence of a key is not an error; `get` models it as
/// `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("storage task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The common read/write contract all adapters satisfy.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upsert by `(name, kind)`, storing the sample as given.
    async fn save(&self, sample: &MetricSample) -> Result<(), StorageError>;

    /// Fetch one sample; `Ok(None)` when the key is absent.
    async fn get(&self, id: &MetricId) -> Result<Option<MetricSample>, StorageError>;

    /// Complete enumeration of the stored samples.
    async fn list(&self) -> Result<Vec<MetricSample>, StorageError>;

    /// Backend health probe for `/ping`.
    async fn ping(&self) -> Result<(), StorageError>;
}
