//! In-memory offline store.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use swkit_common::Result;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{ItemId, OfflineStore, QueueKind, QueuedItem};

/// Process-local store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<Vec<QueuedItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfflineStore for MemoryStore {
    async fn enqueue(&self, kind: QueueKind, payload: JsonValue) -> Result<QueuedItem> {
        let item = QueuedItem::new(kind, payload);
        debug!(id = %item.id, kind = %kind, "Queued offline item");
        self.items.write().await.push(item.clone());
        Ok(item)
    }

    async fn pending(&self, kind: QueueKind) -> Result<Vec<QueuedItem>> {
        Ok(self
            .items
            .read()
            .await
            .iter()
            .filter(|item| item.kind == kind)
            .cloned()
            .collect())
    }

    async fn remove(&self, id: &ItemId) -> Result<bool> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| &item.id != id);
        Ok(items.len() != before)
    }
}
