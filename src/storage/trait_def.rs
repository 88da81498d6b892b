use crate::models::TelemetryRecord;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no telemetry record with id {0}")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable home for telemetry records.
///
/// Records are write-once: there is no update path, and deletion is left
/// to whoever operates the database.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Persist a record. Either the whole row becomes visible or nothing does.
    async fn insert(&self, record: &TelemetryRecord) -> StorageResult<()>;

    /// Load a record by its identifier, returning `StorageError::NotFound`
    /// when no row matches.
    async fn fetch_by_id(&self, id: &str) -> StorageResult<TelemetryRecord>;
}
