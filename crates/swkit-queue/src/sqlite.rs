//! SQLite-backed offline store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use swkit_common::{Result, ResultExt, SwKitError};
use tracing::{debug, info, warn};

use crate::{ItemId, OfflineStore, QueueKind, QueuedItem};

/// Database schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Durable queue in a single SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the queue database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).storage_context("failed to open offline queue")?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "Offline queue opened");
        Ok(store)
    }

    /// Open a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().storage_context("failed to open offline queue")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let version = schema_version(&conn)?;
        if version < SCHEMA_VERSION {
            create_schema_v1(&conn)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SwKitError::internal("offline queue connection poisoned"))
    }
}

fn schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get::<_, i32>(0).map(|count| count > 0),
        )
        .storage_context("failed to inspect schema")?;

    if !table_exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .storage_context("failed to read schema version")?;

    Ok(version.unwrap_or(0))
}

fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version INTEGER NOT NULL,
            applied_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS offline_items (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL,
            payload TEXT NOT NULL,
            queued_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_offline_items_kind ON offline_items(kind);
        "#,
    )
    .storage_context("failed to create offline queue schema")?;

    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
        params![SCHEMA_VERSION, Utc::now().timestamp()],
    )
    .storage_context("failed to record schema version")?;

    Ok(())
}

fn row_to_item(
    id: String,
    kind: String,
    payload: String,
    queued_at: i64,
) -> Result<QueuedItem> {
    Ok(QueuedItem {
        id: ItemId::from(id),
        kind: kind.parse()?,
        payload: serde_json::from_str(&payload).storage_context("corrupt queued payload")?,
        queued_at: DateTime::<Utc>::from_timestamp_millis(queued_at)
            .ok_or_else(|| SwKitError::storage(format!("bad timestamp {queued_at}")))?,
    })
}

#[async_trait]
impl OfflineStore for SqliteStore {
    async fn enqueue(&self, kind: QueueKind, payload: JsonValue) -> Result<QueuedItem> {
        let item = QueuedItem::new(kind, payload);
        let payload_text =
            serde_json::to_string(&item.payload).storage_context("failed to encode payload")?;

        self.lock()?
            .execute(
                "INSERT INTO offline_items (id, kind, payload, queued_at) VALUES (?, ?, ?, ?)",
                params![
                    item.id.as_str(),
                    kind.as_str(),
                    payload_text,
                    item.queued_at.timestamp_millis()
                ],
            )
            .storage_context("failed to queue item")?;

        debug!(id = %item.id, kind = %kind, "Queued offline item");
        Ok(item)
    }

    async fn pending(&self, kind: QueueKind) -> Result<Vec<QueuedItem>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, payload, queued_at FROM offline_items
                 WHERE kind = ? ORDER BY seq ASC",
            )
            .storage_context("failed to prepare pending query")?;

        let rows = stmt
            .query_map(params![kind.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .storage_context("failed to read queue")?;

        let mut items = Vec::new();
        for row in rows {
            let (id, kind, payload, queued_at) = row.storage_context("failed to read row")?;
            match row_to_item(id.clone(), kind, payload, queued_at) {
                Ok(item) => items.push(item),
                // One bad row must not hold back the rest of the queue.
                Err(e) => warn!(id = %id, error = %e, "Skipping undecodable queued item"),
            }
        }
        Ok(items)
    }

    async fn remove(&self, id: &ItemId) -> Result<bool> {
        let removed = self
            .lock()?
            .execute("DELETE FROM offline_items WHERE id = ?", params![id.as_str()])
            .storage_context("failed to remove item")?;
        Ok(removed > 0)
    }

    async fn len(&self, kind: QueueKind) -> Result<usize> {
        let count: i64 = self
            .lock()?
            .query_row(
                "SELECT COUNT(*) FROM offline_items WHERE kind = ?",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .storage_context("failed to count queue")?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_items_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("offline.db");

        let queued = {
            let store = SqliteStore::open(&db_path).unwrap();
            store
                .enqueue(QueueKind::Vocabulary, json!({"word": "tiger", "meaning": "호랑이"}))
                .await
                .unwrap()
        };

        let store = SqliteStore::open(&db_path).unwrap();
        let pending = store.pending(QueueKind::Vocabulary).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, queued.id);
        assert_eq!(pending[0].payload["meaning"], "호랑이");
    }

    #[tokio::test]
    async fn test_pending_keeps_insertion_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        for score in [5, 7, 9] {
            store
                .enqueue(QueueKind::QuizScore, json!({ "score": score }))
                .await
                .unwrap();
        }

        let scores: Vec<i64> = store
            .pending(QueueKind::QuizScore)
            .await
            .unwrap()
            .iter()
            .map(|item| item.payload["score"].as_i64().unwrap())
            .collect();
        assert_eq!(scores, vec![5, 7, 9]);
        assert_eq!(store.len(QueueKind::Vocabulary).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_row_does_not_block_queue() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .enqueue(QueueKind::Vocabulary, json!({"word": "sun", "meaning": "해"}))
            .await
            .unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO offline_items (id, kind, payload, queued_at) VALUES (?, ?, ?, ?)",
                params!["broken", "vocabulary", "{not json", Utc::now().timestamp_millis()],
            )
            .unwrap();
        store
            .enqueue(QueueKind::Vocabulary, json!({"word": "moon", "meaning": "달"}))
            .await
            .unwrap();

        let words: Vec<String> = store
            .pending(QueueKind::Vocabulary)
            .await
            .unwrap()
            .iter()
            .map(|item| item.payload["word"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(words, vec!["sun", "moon"]);
        assert_eq!(store.len(QueueKind::Vocabulary).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item = store
            .enqueue(QueueKind::QuizScore, json!({"score": 1}))
            .await
            .unwrap();

        assert!(store.remove(&item.id).await.unwrap());
        assert!(!store.remove(&item.id).await.unwrap());
        assert_eq!(store.len(QueueKind::QuizScore).await.unwrap(), 0);
    }
}
