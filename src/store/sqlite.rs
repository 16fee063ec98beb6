//! `rusqlite`-backed persistence for pending memory cards and pending
//! session-summary cards (spec §4.10, §6 Store interface). The `Connection`
//! is blocking; every public operation wraps its body in
//! `tokio::task::spawn_blocking` so async call sites never stall on it.

use crate::error::KioskError;
use crate::executor::executor::StoreWriter;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionSummaryBody {
    summary: String,
    topics: Vec<String>,
    staff_notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSessionSummary {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub topics: Vec<String>,
    pub staff_notes: Vec<String>,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMemory {
    pub id: String,
    pub kind: String,
    pub value: String,
    pub source_quote: Option<String>,
    pub created_at_ms: i64,
}

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, KioskError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| KioskError::PersistenceFailure(format!("creating db directory: {e}")))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pending_memory (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                value TEXT NOT NULL,
                source_quote TEXT,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
            );
            CREATE TABLE IF NOT EXISTS pending_session_summary (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                summary_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
            );",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub async fn create_pending(&self, kind: String, value: String, source_quote: Option<String>, now_ms: i64) -> Result<String, KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let id = Uuid::new_v4().to_string();
            conn.lock().unwrap().execute(
                "INSERT INTO pending_memory (id, kind, value, source_quote, created_at, status) VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                params![id, kind, value, source_quote, now_ms],
            )?;
            Ok(id)
        })
        .await
    }

    pub async fn create_pending_session_summary(
        &self,
        title: String,
        summary: String,
        topics: Vec<String>,
        staff_notes: Vec<String>,
        now_ms: i64,
    ) -> Result<String, KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let id = Uuid::new_v4().to_string();
            let body = SessionSummaryBody { summary, topics, staff_notes };
            let summary_json = serde_json::to_string(&body)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            conn.lock().unwrap().execute(
                "INSERT INTO pending_session_summary (id, title, summary_json, created_at, status) VALUES (?1, ?2, ?3, ?4, 'pending')",
                params![id, title, summary_json, now_ms],
            )?;
            Ok(id)
        })
        .await
    }

    pub async fn list_pending_memory(&self) -> Result<Vec<PendingMemory>, KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, kind, value, source_quote, created_at FROM pending_memory WHERE status = 'pending' ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(PendingMemory {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    value: row.get(2)?,
                    source_quote: row.get(3)?,
                    created_at_ms: row.get(4)?,
                })
            })?;
            rows.collect()
        })
        .await
    }

    pub async fn list_pending_session_summaries(&self) -> Result<Vec<PendingSessionSummary>, KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let conn = conn.lock().unwrap();
            let mut stmt = conn.prepare(
                "SELECT id, title, summary_json, created_at FROM pending_session_summary WHERE status = 'pending' ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let id: String = row.get(0)?;
                let title: String = row.get(1)?;
                let summary_json: String = row.get(2)?;
                let created_at_ms: i64 = row.get(3)?;
                Ok((id, title, summary_json, created_at_ms))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (id, title, summary_json, created_at_ms) = row?;
                let body: SessionSummaryBody = serde_json::from_str(&summary_json)
                    .unwrap_or(SessionSummaryBody { summary: String::new(), topics: Vec::new(), staff_notes: Vec::new() });
                out.push(PendingSessionSummary { id, title, summary: body.summary, topics: body.topics, staff_notes: body.staff_notes, created_at_ms });
            }
            Ok(out)
        })
        .await
    }

    pub async fn confirm_pending_memory(&self, id: String) -> Result<(), KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            conn.lock().unwrap().execute("UPDATE pending_memory SET status = 'confirmed' WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    pub async fn deny_pending_memory(&self, id: String) -> Result<(), KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            conn.lock().unwrap().execute("UPDATE pending_memory SET status = 'denied' WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    pub async fn confirm_pending_session_summary(&self, id: String) -> Result<(), KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            conn.lock().unwrap().execute("UPDATE pending_session_summary SET status = 'confirmed' WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    pub async fn deny_pending_session_summary(&self, id: String) -> Result<(), KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            conn.lock().unwrap().execute("UPDATE pending_session_summary SET status = 'denied' WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    /// The staff console's confirm/deny routes address a card by id alone
    /// (spec §4.11), without saying which table it lives in — try memory
    /// first, then session-summary. Returns whether a row was actually
    /// updated.
    pub async fn confirm_pending_any(&self, id: String) -> Result<bool, KioskError> {
        self.set_status_any(id, "confirmed").await
    }

    pub async fn deny_pending_any(&self, id: String) -> Result<bool, KioskError> {
        self.set_status_any(id, "denied").await
    }

    async fn set_status_any(&self, id: String, status: &'static str) -> Result<bool, KioskError> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let conn = conn.lock().unwrap();
            let memory_rows = match status {
                "confirmed" => conn.execute("UPDATE pending_memory SET status = 'confirmed' WHERE id = ?1", params![id])?,
                _ => conn.execute("UPDATE pending_memory SET status = 'denied' WHERE id = ?1", params![id])?,
            };
            if memory_rows > 0 {
                return Ok(true);
            }
            let summary_rows = match status {
                "confirmed" => conn.execute("UPDATE pending_session_summary SET status = 'confirmed' WHERE id = ?1", params![id])?,
                _ => conn.execute("UPDATE pending_session_summary SET status = 'denied' WHERE id = ?1", params![id])?,
            };
            Ok(summary_rows > 0)
        })
        .await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, KioskError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, rusqlite::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| KioskError::Internal(format!("store task panicked: {e}")))?
        .map_err(KioskError::from)
}

/// Adapts `SqliteStore` to the executor's `STORE_WRITE_*` effect handling.
/// Persistence failures are logged and swallowed here — the reducer already
/// moved on and has no way to retry a failed write.
#[async_trait]
impl StoreWriter for SqliteStore {
    async fn write_pending(&self, kind: String, value: String, source_quote: Option<String>) {
        if let Err(err) = self.create_pending(kind, value, source_quote, Utc::now().timestamp_millis()).await {
            tracing::error!(%err, "failed to persist pending memory candidate");
        }
    }

    async fn write_session_summary_pending(&self, title: String, summary: String, topics: Vec<String>, staff_notes: Vec<String>) {
        if let Err(err) = self
            .create_pending_session_summary(title, summary, topics, staff_notes, Utc::now().timestamp_millis())
            .await
        {
            tracing::error!(%err, "failed to persist pending session summary");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_temp() -> (SqliteStore, tempfile::TempPath) {
        let path = NamedTempFile::new().unwrap().into_temp_path();
        let store = SqliteStore::open(&path).unwrap();
        (store, path)
    }

    #[tokio::test]
    async fn create_and_confirm_pending_memory_round_trips() {
        let (store, _path) = open_temp();
        let id = store.create_pending("likes".to_string(), "カレー".to_string(), Some("カレーが好き".to_string()), 1000).await.unwrap();
        store.confirm_pending_memory(id).await.unwrap();
    }

    #[tokio::test]
    async fn session_summary_round_trips_through_json_column() {
        let (store, _path) = open_temp();
        let id = store
            .create_pending_session_summary(
                "要約".to_string(),
                "今日は元気だった".to_string(),
                vec!["天気".to_string()],
                vec![],
                1000,
            )
            .await
            .unwrap();

        let pending = store.list_pending_session_summaries().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].summary, "今日は元気だった");
        assert_eq!(pending[0].topics, vec!["天気".to_string()]);

        store.confirm_pending_session_summary(id).await.unwrap();
        let remaining = store.list_pending_session_summaries().await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn denied_summary_no_longer_lists_as_pending() {
        let (store, _path) = open_temp();
        let id = store
            .create_pending_session_summary("要約".to_string(), "概要".to_string(), vec![], vec![], 0)
            .await
            .unwrap();
        store.deny_pending_session_summary(id).await.unwrap();
        assert!(store.list_pending_session_summaries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_writer_trait_swallows_and_logs_on_success_path() {
        let (store, _path) = open_temp();
        store.write_pending("food".to_string(), "たこ焼き".to_string(), None).await;
        store.write_session_summary_pending("要約".to_string(), "まとめ".to_string(), vec![], vec![]).await;
        assert_eq!(store.list_pending_session_summaries().await.unwrap().len(), 1);
    }
}
