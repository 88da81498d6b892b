use crate::models::TelemetryRecord;
use crate::storage::{RecordStore, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Close every pooled connection. Later calls fail with a storage error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqliteStorage {
    async fn init(&self) -> Result<()> {
        // Measurements are TEXT so the submitted digits survive untouched
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS speedtest_users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
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

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_speedtest_users_uuid ON speedtest_users(uuid)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert(&self, record: &TelemetryRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO speedtest_users (ip, ispinfo, extra, ua, lang, dl, ul, ping, jitter, log, uuid)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
            WHERE uuid = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        record.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}
