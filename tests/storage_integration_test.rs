//! Integration tests for the record stores
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests
//! - By default, both backends are tested (PostgreSQL only when DATABASE_URL is set)

use speedtest::ids::IdGenerator;
use speedtest::models::TelemetryRecord;
use speedtest::storage::{
    CachedStorage, PostgresStorage, RecordStore, SqliteStorage, StorageError,
};
use std::sync::Arc;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<SqliteStorage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create PostgreSQL test storage
async fn create_postgres_storage() -> Option<Arc<PostgresStorage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

fn sample_record(id: String) -> TelemetryRecord {
    TelemetryRecord {
        id,
        ip_address: "2001:db8::42".to_string(),
        isp_info: r#"{"processedString":"2001:db8::42 - Example ISP, DE","rawIspInfo":""}"#
            .to_string(),
        extra: r#"{"server":"fra-1"}"#.to_string(),
        user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_string(),
        language: "de-DE,de;q=0.9".to_string(),
        download: "0940.50".to_string(),
        upload: "1e2".to_string(),
        ping: "7.000".to_string(),
        jitter: "".to_string(),
        log: "line one\nline two".to_string(),
    }
}

async fn check_round_trip<S: RecordStore>(storage: &S) {
    let ids = IdGenerator::new();
    let record = sample_record(ids.next_string());

    storage.insert(&record).await.unwrap();
    let fetched = storage.fetch_by_id(&record.id).await.unwrap();

    // Decimal strings come back exactly as submitted
    assert_eq!(fetched, record);
    assert_eq!(fetched.download, "0940.50");
    assert_eq!(fetched.upload, "1e2");
    assert_eq!(fetched.jitter, "");
}

async fn check_not_found<S: RecordStore>(storage: &S) {
    let err = storage
        .fetch_by_id("01ARZ3NDEKTSV4RRFFQ69G5FAV")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "expected NotFound, got {err}");
    assert!(matches!(err, StorageError::NotFound(ref id) if id == "01ARZ3NDEKTSV4RRFFQ69G5FAV"));
}

async fn check_duplicate_id_rejected<S: RecordStore>(storage: &S) {
    let ids = IdGenerator::new();
    let record = sample_record(ids.next_string());

    storage.insert(&record).await.unwrap();
    let err = storage.insert(&record).await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_round_trip_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;
    check_round_trip(storage.as_ref()).await;
}

#[tokio::test]
async fn test_not_found_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;
    check_not_found(storage.as_ref()).await;
}

#[tokio::test]
async fn test_duplicate_id_rejected_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;
    check_duplicate_id_rejected(storage.as_ref()).await;
}

#[tokio::test]
async fn test_failure_is_not_not_found_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;
    storage.close().await;

    let err = storage
        .fetch_by_id("01ARZ3NDEKTSV4RRFFQ69G5FAV")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Other(_)));

    let insert_err = storage
        .insert(&sample_record("01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(insert_err, StorageError::Other(_)));
}

#[tokio::test]
async fn test_init_is_idempotent_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    let storage = create_sqlite_storage().await;
    let record = sample_record(IdGenerator::new().next_string());
    storage.insert(&record).await.unwrap();

    storage.init().await.unwrap();
    assert_eq!(storage.fetch_by_id(&record.id).await.unwrap(), record);
}

#[tokio::test]
async fn test_concurrent_inserts_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("speedtest.db").display());
    let storage = SqliteStorage::new(&url, 4).await.unwrap();
    storage.init().await.unwrap();
    let storage = Arc::new(CachedStorage::new(storage, 100));
    let ids = Arc::new(IdGenerator::new());

    let mut handles = vec![];
    for _ in 0..20 {
        let storage = Arc::clone(&storage);
        let ids = Arc::clone(&ids);
        handles.push(tokio::spawn(async move {
            let record = sample_record(ids.next_string());
            storage.insert(&record).await.map(|_| record.id)
        }));
    }

    let mut stored = vec![];
    for handle in handles {
        stored.push(handle.await.unwrap().unwrap());
    }

    stored.sort();
    stored.dedup();
    assert_eq!(stored.len(), 20, "every submission gets its own id");

    for id in &stored {
        let record = storage.inner().fetch_by_id(id).await.unwrap();
        assert_eq!(&record.id, id);
    }
}

#[tokio::test]
async fn test_round_trip_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    check_round_trip(storage.as_ref()).await;
}

#[tokio::test]
async fn test_not_found_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    check_not_found(storage.as_ref()).await;
}

#[tokio::test]
async fn test_duplicate_id_rejected_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    check_duplicate_id_rejected(storage.as_ref()).await;
}
