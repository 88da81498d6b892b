use crate::models::TelemetryRecord;
use crate::storage::{RecordStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl RecordStore for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS speedtest_users (
                id BIGSERIAL PRIMARY KEY,
                timestamp TIMESTAMPTZ NOT NULL DEFAULT now(),
                ip TEXT NOT NULL,
                ispinfo TEXT,
                extra TEXT,
                ua TEXT NOT NULL,
                lang TEXT NOT NULL,
                dl TEXT,
                ul TEXT,
                ping TEXT,
                jitter TEXT,
                log TEXT,
                uuid TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert(&self, record: &TelemetryRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO speedtest_users (ip, ispinfo, extra, ua, lang, dl, ul, ping, jitter, log, uuid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&record.ip_address)
        .bind(&record.isp_info)
        .bind(&record.extra)
        .bind(&record.user_agent)
        .bind(&record.language)
        .bind(&record.download)
        .bind(&record.upload)
        .bind(&record.ping)
        .bind(&record.jitter)
        .bind(&record.log)
        .bind(&record.id)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        Ok(())
    }

    async fn fetch_by_id(&self, id: &str) -> StorageResult<TelemetryRecord> {
        let record = sqlx::query_as::<_, TelemetryRecord>(
            r#"
            SELECT uuid, ip,
                   COALESCE(ispinfo, '') AS ispinfo,
                   COALESCE(extra, '') AS extra,
                   ua, lang,
                   COALESCE(dl, '') AS dl,
                   COALESCE(ul, '') AS ul,
                   COALESCE(ping, '') AS ping,
                   COALESCE(jitter, '') AS jitter,
                   COALESCE(log, '') AS log
            FROM speedtest_users
            WHERE uuid = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        record.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}
