use crate::models::TelemetryRecord;
use crate::storage::{RecordStore, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;

/// Read-through cache in front of another store.
///
/// Records never change once written, so cached entries are never
/// invalidated; capacity is the only bound. Misses are not cached.
pub struct CachedStorage<S> {
    /// Underlying storage implementation
    inner: S,
    /// Recently written or fetched records (Moka cache)
    read_cache: Cache<String, TelemetryRecord>,
}

impl<S: RecordStore> CachedStorage<S> {
    pub fn new(inner: S, max_cache_entries: u64) -> Self {
        Self {
            inner,
            read_cache: Cache::builder().max_capacity(max_cache_entries).build(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for CachedStorage<S> {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn insert(&self, record: &TelemetryRecord) -> StorageResult<()> {
        self.inner.insert(record).await?;
        // A card request usually follows right after the submission
        self.read_cache
            .insert(record.id.clone(), record.clone())
            .await;
        Ok(())
    }

    async fn fetch_by_id(&self, id: &str) -> StorageResult<TelemetryRecord> {
        if let Some(record) = self.read_cache.get(id).await {
            return Ok(record);
        }

        let record = self.inner.fetch_by_id(id).await?;
        self.read_cache
            .insert(id.to_string(), record.clone())
            .await;
        Ok(record)
    }
}
