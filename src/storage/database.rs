//! SQLite store for settings and call history, migrated via `user_version`.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Current schema version. Increment when adding new migrations.
const SCHEMA_VERSION: i32 = 2;

/// V1 schema: key/value settings (campaign selection and credentials).
const V1_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;

/// V2 migration: call history written after each placed call.
const V2_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS call_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    lead_id TEXT NOT NULL,
    lead_name TEXT NOT NULL,
    from_number TEXT NOT NULL,
    to_number TEXT NOT NULL,
    started_at TEXT NOT NULL,
    status TEXT NOT NULL,
    conversation_status TEXT NOT NULL,
    queue_position INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_call_history_started_at ON call_history(started_at);
"#;

/// Summary of one placed call, as kept in the local call history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    /// Upstream request identifier.
    pub id: String,
    pub lead_id: String,
    pub lead_name: String,
    pub from: String,
    pub to: String,
    /// RFC 3339 UTC timestamp of placement.
    pub started_at: String,
    /// Placeholder until the call log is fetched from upstream.
    pub status: String,
    pub conversation_status: String,
    pub queue_position: i64,
}

/// SQLite database handle.
#[derive(Debug, Clone)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Initializes the database at the given path.
    /// Creates parent directories if needed, opens the SQLite file, and runs migrations.
    pub async fn init(db_path: PathBuf) -> Result<Self, AppError> {
        let path = db_path.clone();

        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::Internal(format!("Failed to create database directory: {e}"))
                    })?;
                }
            }

            let mut conn = open_connection(&path)?;
            run_migrations(&mut conn)?;

            Ok::<_, AppError>(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Database init task failed: {e}")))??;

        Ok(Self { db_path })
    }

    /// Returns the database path.
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    // ── Settings ─────────────────────────────────────────────────────────────

    /// Reads a setting value.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, AppError> {
        let db_path = self.db_path.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            conn.query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [&key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to read setting: {e}")))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Get setting task failed: {e}")))?
    }

    /// Inserts or replaces a setting value.
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), AppError> {
        let db_path = self.db_path.clone();
        let key = key.to_string();
        let value = value.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            conn.execute(
                r#"
                INSERT INTO settings (key, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                rusqlite::params![key, value, current_timestamp_ms()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to write setting: {e}")))?;

            Ok::<_, AppError>(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Set setting task failed: {e}")))?
    }

    /// Deletes a setting. Idempotent.
    pub async fn delete_setting(&self, key: &str) -> Result<(), AppError> {
        let db_path = self.db_path.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            conn.execute("DELETE FROM settings WHERE key = ?1", [&key])
                .map_err(|e| AppError::Internal(format!("Failed to delete setting: {e}")))?;

            Ok::<_, AppError>(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Delete setting task failed: {e}")))?
    }

    // ── Call history ─────────────────────────────────────────────────────────

    /// Appends a record to the call history.
    pub async fn insert_call_record(&self, record: CallRecord) -> Result<(), AppError> {
        let db_path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            conn.execute(
                r#"
                INSERT INTO call_history (id, lead_id, lead_name, from_number, to_number, started_at, status, conversation_status, queue_position)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                rusqlite::params![
                    record.id,
                    record.lead_id,
                    record.lead_name,
                    record.from,
                    record.to,
                    record.started_at,
                    record.status,
                    record.conversation_status,
                    record.queue_position,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to insert call record: {e}")))?;

            Ok::<_, AppError>(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Insert call record task failed: {e}")))?
    }

    /// Lists call history in insertion order, oldest first.
    /// `limit` keeps only the most recent N records.
    pub async fn list_call_history(&self, limit: Option<u32>) -> Result<Vec<CallRecord>, AppError> {
        let db_path = self.db_path.clone();

        tokio::task::spawn_blocking(move || {
            let conn = open_connection(&db_path)?;

            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT id, lead_id, lead_name, from_number, to_number, started_at, status, conversation_status, queue_position
                    FROM (
                        SELECT * FROM call_history
                        ORDER BY seq DESC
                        LIMIT ?1
                    )
                    ORDER BY seq ASC
                    "#,
                )
                .map_err(|e| AppError::Internal(format!("Failed to prepare query: {e}")))?;

            // SQLite treats a negative LIMIT as "no limit"
            let limit = limit.map(i64::from).unwrap_or(-1);

            let records = stmt
                .query_map([limit], |row| {
                    Ok(CallRecord {
                        id: row.get(0)?,
                        lead_id: row.get(1)?,
                        lead_name: row.get(2)?,
                        from: row.get(3)?,
                        to: row.get(4)?,
                        started_at: row.get(5)?,
                        status: row.get(6)?,
                        conversation_status: row.get(7)?,
                        queue_position: row.get(8)?,
                    })
                })
                .map_err(|e| AppError::Internal(format!("Failed to query call history: {e}")))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| AppError::Internal(format!("Failed to collect call history: {e}")))?;

            Ok::<_, AppError>(records)
        })
        .await
        .map_err(|e| AppError::Internal(format!("List call history task failed: {e}")))?
    }
}

/// Opens a connection with busy timeout and WAL mode.
fn open_connection(path: &PathBuf) -> Result<Connection, AppError> {
    let conn = Connection::open(path)
        .map_err(|e| AppError::Internal(format!("Failed to open database: {e}")))?;

    conn.busy_timeout(Duration::from_secs(10))
        .map_err(|e| AppError::Internal(format!("Failed to set busy timeout: {e}")))?;

    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Internal(format!("Failed to set WAL mode: {e}")))?;

    Ok(conn)
}

fn run_migrations(conn: &mut Connection) -> Result<(), AppError> {
    let current_version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| AppError::Internal(format!("Failed to get schema version: {e}")))?;

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .map_err(|e| AppError::Internal(format!("Failed to start migration transaction: {e}")))?;

    if current_version < 1 {
        tx.execute_batch(V1_SCHEMA)
            .map_err(|e| AppError::Internal(format!("V1 migration failed: {e}")))?;
    }

    if current_version < 2 {
        tx.execute_batch(V2_MIGRATION)
            .map_err(|e| AppError::Internal(format!("V2 migration failed: {e}")))?;
    }

    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| AppError::Internal(format!("Failed to update schema version: {e}")))?;

    tx.commit()
        .map_err(|e| AppError::Internal(format!("Failed to commit migration: {e}")))?;

    Ok(())
}

fn current_timestamp_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
