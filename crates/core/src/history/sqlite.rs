//! SQLite-backed history store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::traits::{ProcessedMessages, RunHistory, StoreError};
use crate::orchestrator::PipelineRun;

/// Stores runs as JSON documents keyed by id, plus the processed-message
/// ledger.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open or create the database file.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store (useful for testing).
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
            CREATE TABLE IF NOT EXISTS pipeline_runs (
                id TEXT PRIMARY KEY,
                mode TEXT NOT NULL,
                outcome TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_started ON pipeline_runs(started_at);

            CREATE TABLE IF NOT EXISTS processed_messages (
                message_id TEXT PRIMARY KEY,
                begin_date TEXT,
                end_date TEXT,
                processed_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }
}

impl RunHistory for SqliteHistoryStore {
    fn record_run(&self, run: &PipelineRun) -> Result<(), StoreError> {
        let body =
            serde_json::to_string(run).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO pipeline_runs (id, mode, outcome, started_at, finished_at, body)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                run.id,
                run.mode.as_str(),
                run.outcome().as_str(),
                run.started_at.to_rfc3339(),
                run.finished_at.map(|t| t.to_rfc3339()),
                body,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT body FROM pipeline_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1")
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let bodies = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        bodies
            .iter()
            .map(|body| {
                serde_json::from_str(body).map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }
}

impl ProcessedMessages for SqliteHistoryStore {
    fn is_processed(&self, message_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found: Option<String> = conn
            .query_row(
                "SELECT message_id FROM processed_messages WHERE message_id = ?1",
                params![message_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    fn mark_processed(
        &self,
        message_id: &str,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO processed_messages (message_id, begin_date, end_date, processed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                message_id,
                begin.map(|d| d.to_string()),
                end.map(|d| d.to_string()),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
