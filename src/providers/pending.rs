use std::path::Path;

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use tokio::sync::Mutex;

use crate::domains::envelope::{now_ms, PendingTransaction};
use crate::error::{Result, SphereBridgeError};

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(QueryableByName)]
struct EntriesRow {
    #[diesel(sql_type = Text)]
    entries_json: String,
}

// The whole ordered collection lives in one row and is replaced wholesale on
// every mutation; concurrent writers resolve last-writer-wins.
pub struct PendingStore {
    pool: SqlitePool,
    // Serializes read-modify-write within this handle.
    write_lock: Mutex<()>,
}

impl PendingStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| SphereBridgeError::Storage(e.to_string()))?;

        let store = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        store.ensure_table().await?;
        Ok(store)
    }

    pub async fn list(&self) -> Result<Vec<PendingTransaction>> {
        let mut conn = self.conn().await?;
        load_entries(&mut conn).await
    }

    // Request ids are unique among live entries.
    pub async fn add(&self, entry: PendingTransaction) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.conn().await?;
        let mut entries = load_entries(&mut conn).await?;
        if entries.iter().any(|e| e.request_id == entry.request_id) {
            return Err(SphereBridgeError::Validation(format!(
                "duplicate pending request id {}",
                entry.request_id
            )));
        }
        entries.push(entry);
        save_entries(&mut conn, &entries).await
    }

    pub async fn remove_by_request_id(&self, request_id: &str) -> Result<Option<PendingTransaction>> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.conn().await?;
        let mut entries = load_entries(&mut conn).await?;
        let index = entries.iter().position(|e| e.request_id == request_id);
        let Some(index) = index else {
            return Ok(None);
        };
        let removed = entries.remove(index);
        save_entries(&mut conn, &entries).await?;
        Ok(Some(removed))
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.conn().await?;
        save_entries(&mut conn, &[]).await
    }

    async fn ensure_table(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        diesel::sql_query(
            "CREATE TABLE IF NOT EXISTS pending_transactions (
                id INTEGER PRIMARY KEY,
                entries_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&mut conn)
        .await
        .map_err(|e| SphereBridgeError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| SphereBridgeError::Storage(e.to_string()))
    }
}

async fn load_entries(conn: &mut SqliteAsyncConn) -> Result<Vec<PendingTransaction>> {
    let row: std::result::Result<EntriesRow, _> =
        diesel::sql_query("SELECT entries_json FROM pending_transactions WHERE id = 1")
            .get_result(conn)
            .await;
    match row {
        Ok(row) => serde_json::from_str(&row.entries_json)
            .map_err(|e| SphereBridgeError::Serialization(e.to_string())),
        Err(diesel::result::Error::NotFound) => Ok(Vec::new()),
        Err(e) => Err(SphereBridgeError::Storage(e.to_string())),
    }
}

async fn save_entries(conn: &mut SqliteAsyncConn, entries: &[PendingTransaction]) -> Result<()> {
    let entries_json = serde_json::to_string(entries)
        .map_err(|e| SphereBridgeError::Serialization(e.to_string()))?;
    diesel::sql_query(
        "INSERT INTO pending_transactions (id, entries_json, updated_at)
         VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET entries_json = excluded.entries_json, updated_at = excluded.updated_at",
    )
    .bind::<Text, _>(entries_json)
    .bind::<BigInt, _>(now_ms())
    .execute(conn)
    .await
    .map_err(|e| SphereBridgeError::Storage(e.to_string()))?;
    Ok(())
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SphereBridgeError::Storage(e.to_string()))?;
    }
    Ok(())
}
