//! SQLite-backed task store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use super::{HistoryEntry, StoreError, SyncStore, SyncTask, TaskFilter};

/// SQLite-backed task store.
///
/// Task snapshots and history entries are stored as JSON documents next to
/// the columns used for filtering and ordering.
pub struct SqliteSyncStore {
    conn: Mutex<Connection>,
}

impl SqliteSyncStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sync_tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                snapshot TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sync_tasks_user ON sync_tasks(user_id);
            CREATE INDEX IF NOT EXISTS idx_sync_tasks_created_at ON sync_tasks(created_at);

            CREATE TABLE IF NOT EXISTS sync_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                entry TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sync_history_user ON sync_history(user_id, seq);
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, StoreError> {
    serde_json::from_str(json).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl SyncStore for SqliteSyncStore {
    fn put_task(&self, task: &SyncTask) -> Result<(), StoreError> {
        let snapshot = to_json(task)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sync_tasks (id, user_id, status, created_at, updated_at, snapshot) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at, snapshot = excluded.snapshot",
            params![
                task.id,
                task.user_id,
                task.status.as_str(),
                timestamp(&task.created_at),
                timestamp(&task.updated_at),
                snapshot,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_task(&self, id: &str) -> Result<Option<SyncTask>, StoreError> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT snapshot FROM sync_tasks WHERE id = ?",
            params![id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(snapshot) => Ok(Some(from_json(&snapshot)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e.to_string())),
        }
    }

    fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<SyncTask>, StoreError> {
        let conn = self.lock()?;

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref user_id) = filter.user_id {
            conditions.push("user_id = ?");
            params.push(Box::new(user_id.clone()));
        }

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT snapshot FROM sync_tasks {} ORDER BY created_at DESC LIMIT ?",
            where_clause
        );
        params.push(Box::new(filter.limit as i64));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut tasks = Vec::new();
        for row in rows {
            let snapshot = row.map_err(|e| StoreError::Database(e.to_string()))?;
            tasks.push(from_json(&snapshot)?);
        }

        Ok(tasks)
    }

    fn append_history(&self, entry: &HistoryEntry, retention: usize) -> Result<(), StoreError> {
        let json = to_json(entry)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sync_history (user_id, task_id, created_at, entry) VALUES (?, ?, ?, ?)",
            params![entry.user_id, entry.task_id, timestamp(&entry.created_at), json],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        conn.execute(
            "DELETE FROM sync_history WHERE user_id = ?1 AND seq NOT IN (
                SELECT seq FROM sync_history WHERE user_id = ?1 ORDER BY seq DESC LIMIT ?2
            )",
            params![entry.user_id, retention as i64],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>, StoreError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT entry FROM sync_history WHERE user_id = ? ORDER BY created_at DESC, seq DESC LIMIT ?",
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let json = row.map_err(|e| StoreError::Database(e.to_string()))?;
            entries.push(from_json(&json)?);
        }

        Ok(entries)
    }
}
