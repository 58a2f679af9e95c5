use std::path::Path;
use std::time::Duration;

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::domains::envelope::{now_ms, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{Result, SphereBridgeError};

#[derive(QueryableByName)]
struct ConfigRow {
    #[diesel(sql_type = Text)]
    config_json: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub request_timeout_ms: Option<u64>,
    pub sqlite_path: Option<String>,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    pub fn storage_path(&self) -> String {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| "./data/sphere-bridge.db".to_string())
    }

    pub fn from_store(db_path: &str) -> Result<Config> {
        ensure_parent_dir(db_path)?;
        let mut conn = open_conn(db_path)?;
        ensure_table(&mut conn)?;

        let row: ConfigRow = diesel::sql_query("SELECT config_json FROM bridge_config WHERE id = 1")
            .get_result(&mut conn)
            .map_err(|e| SphereBridgeError::Storage(e.to_string()))?;

        serde_json::from_str(&row.config_json)
            .map_err(|e| SphereBridgeError::Serialization(e.to_string()))
    }

    pub fn save_to_store(&self, db_path: &str) -> Result<()> {
        ensure_parent_dir(db_path)?;
        let mut conn = open_conn(db_path)?;
        ensure_table(&mut conn)?;

        let config_json = serde_json::to_string(self)
            .map_err(|e| SphereBridgeError::Serialization(e.to_string()))?;
        diesel::sql_query(
            "INSERT INTO bridge_config (id, config_json, updated_at)
             VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET config_json = excluded.config_json, updated_at = excluded.updated_at",
        )
        .bind::<Text, _>(config_json)
        .bind::<BigInt, _>(now_ms())
        .execute(&mut conn)
        .map_err(|e| SphereBridgeError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn open_conn(db_path: &str) -> Result<SqliteConnection> {
    SqliteConnection::establish(db_path).map_err(|e| SphereBridgeError::Storage(e.to_string()))
}

fn ensure_table(conn: &mut SqliteConnection) -> Result<()> {
    diesel::sql_query(
        "CREATE TABLE IF NOT EXISTS bridge_config (
            id INTEGER PRIMARY KEY,
            config_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
    )
    .execute(conn)
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
