//! # SwKit Queue
//!
//! Storage for mutations captured while the client had no network, waiting
//! to be replayed by background sync.
//!
//! The worker only depends on the [`OfflineStore`] trait. Two backends ship
//! with the crate:
//!
//! - [`MemoryStore`]: process-local, used by tests and ephemeral hosts
//! - [`SqliteStore`]: durable, one SQLite file per profile
//!
//! ```text
//! page (offline) ──enqueue──▶ OfflineStore ◀──pending/remove── sync handler
//! ```
//!
//! Payloads are opaque JSON; the store never inspects them.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use swkit_common::{Result, SwKitError};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

// ==================== Types ====================

/// Which replay queue an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueKind {
    /// Words added to the personal vocabulary list.
    Vocabulary,
    /// Finished quiz results.
    QuizScore,
}

impl QueueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Vocabulary => "vocabulary",
            QueueKind::QuizScore => "quiz-score",
        }
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueKind {
    type Err = SwKitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vocabulary" => Ok(QueueKind::Vocabulary),
            "quiz-score" => Ok(QueueKind::QuizScore),
            other => Err(SwKitError::InvalidArgument(format!(
                "unknown queue kind: {other}"
            ))),
        }
    }
}

/// Opaque identifier of a queued item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a process-unique id.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(format!(
            "{:016x}-{:04x}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64,
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A mutation waiting for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedItem {
    pub id: ItemId,
    pub kind: QueueKind,
    pub payload: JsonValue,
    pub queued_at: DateTime<Utc>,
}

impl QueuedItem {
    /// Create a fresh item stamped with the current time.
    pub fn new(kind: QueueKind, payload: JsonValue) -> Self {
        Self {
            id: ItemId::generate(),
            kind,
            payload,
            queued_at: Utc::now(),
        }
    }
}

// ==================== Store contract ====================

/// Persistent client-side store backing background sync.
///
/// `pending` returns items oldest first. `remove` is idempotent: removing an
/// unknown id returns `Ok(false)`.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Append an item to its queue.
    async fn enqueue(&self, kind: QueueKind, payload: JsonValue) -> Result<QueuedItem>;

    /// All items currently queued under `kind`.
    async fn pending(&self, kind: QueueKind) -> Result<Vec<QueuedItem>>;

    /// Drop an item after it has been replayed.
    async fn remove(&self, id: &ItemId) -> Result<bool>;

    /// Number of items queued under `kind`.
    async fn len(&self, kind: QueueKind) -> Result<usize> {
        Ok(self.pending(kind).await?.len())
    }
}
