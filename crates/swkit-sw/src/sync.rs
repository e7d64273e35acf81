//! Background sync: replay of mutations queued while offline.

use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use serde_json::Value as JsonValue;
use swkit_net::Request;
use swkit_queue::{QueueKind, QueuedItem};
use tracing::{debug, error, info, warn};
use url::{form_urlencoded, Url};

use crate::worker::{OfflineWorker, ServiceWorkerEvent};
use crate::ServiceWorkerError;

/// Registration tags understood by the sync handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTag {
    Vocabulary,
    QuizScore,
}

impl SyncTag {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "vocabulary-sync" => Some(SyncTag::Vocabulary),
            "quiz-score-sync" => Some(SyncTag::QuizScore),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTag::Vocabulary => "vocabulary-sync",
            SyncTag::QuizScore => "quiz-score-sync",
        }
    }

    /// Queue drained by this tag.
    pub fn kind(&self) -> QueueKind {
        match self {
            SyncTag::Vocabulary => QueueKind::Vocabulary,
            SyncTag::QuizScore => QueueKind::QuizScore,
        }
    }
}

/// Outcome of one sync event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub tag: String,
    /// Items read from the queue.
    pub attempted: usize,
    /// Items the server accepted, now removed.
    pub replayed: usize,
    /// Items the server answered with an error status, dropped all the same.
    pub rejected: usize,
    /// Items left in the queue for a later sync.
    pub kept: usize,
    /// Items delivered but still queued because removal failed; they will be
    /// sent again.
    pub stranded: usize,
    /// Set when the queue itself could not be read.
    pub error: Option<String>,
}

/// Encode a flat JSON object the way `URLSearchParams` would.
pub fn form_encode(payload: &JsonValue) -> Result<String, ServiceWorkerError> {
    let object = payload.as_object().ok_or_else(|| {
        ServiceWorkerError::InvalidPayload("form payload must be a JSON object".to_string())
    })?;

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in object {
        match value {
            JsonValue::String(s) => serializer.append_pair(key, s),
            other => serializer.append_pair(key, &other.to_string()),
        };
    }
    Ok(serializer.finish())
}

fn replay_request(
    tag: SyncTag,
    endpoint: &Url,
    item: &QueuedItem,
) -> Result<Request, ServiceWorkerError> {
    let (body, content_type) = match tag {
        SyncTag::Vocabulary => (
            form_encode(&item.payload)?,
            "application/x-www-form-urlencoded",
        ),
        SyncTag::QuizScore => (item.payload.to_string(), "application/json"),
    };

    Ok(Request::post(endpoint.clone(), body)
        .header(CONTENT_TYPE, HeaderValue::from_static(content_type)))
}

impl OfflineWorker {
    /// Handle a sync event. Unknown tags are ignored.
    pub async fn handle_sync(&self, tag: &str) -> SyncReport {
        let report = match SyncTag::parse(tag) {
            Some(sync_tag) => self.replay(sync_tag).await,
            None => {
                debug!(tag, "Ignoring unknown sync tag");
                SyncReport {
                    tag: tag.to_string(),
                    ..Default::default()
                }
            }
        };
        self.emit(ServiceWorkerEvent::SyncCompleted(report.clone()));
        report
    }

    /// Queue a mutation for the next sync of its kind.
    pub async fn queue_offline(
        &self,
        kind: QueueKind,
        payload: JsonValue,
    ) -> Result<QueuedItem, ServiceWorkerError> {
        Ok(self.store.enqueue(kind, payload).await?)
    }

    /// Read every queued item and replay each one.
    ///
    /// Any HTTP answer removes the item; only a failed delivery keeps it.
    async fn replay(&self, tag: SyncTag) -> SyncReport {
        let mut report = SyncReport {
            tag: tag.as_str().to_string(),
            ..Default::default()
        };

        let items = match self.store.pending(tag.kind()).await {
            Ok(items) => items,
            Err(e) => {
                error!(tag = tag.as_str(), error = %e, category = e.category(), "Sync failed");
                report.error = Some(e.to_string());
                return report;
            }
        };

        let endpoint = match tag {
            SyncTag::Vocabulary => &self.config.vocabulary_endpoint,
            SyncTag::QuizScore => &self.config.quiz_score_endpoint,
        };

        for item in &items {
            report.attempted += 1;
            let status = match self.deliver(tag, endpoint, item).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(
                        tag = tag.as_str(),
                        id = %item.id,
                        error = %e,
                        retryable = e.is_retryable(),
                        "Failed to sync item"
                    );
                    report.kept += 1;
                    continue;
                }
            };

            if let Err(e) = self.store.remove(&item.id).await {
                error!(
                    tag = tag.as_str(),
                    id = %item.id,
                    error = %e,
                    "Item delivered but could not be dequeued"
                );
                report.stranded += 1;
                continue;
            }

            if status.is_success() {
                report.replayed += 1;
            } else {
                warn!(tag = tag.as_str(), id = %item.id, %status, "Server rejected item, dropped");
                report.rejected += 1;
            }
        }

        info!(
            tag = tag.as_str(),
            attempted = report.attempted,
            replayed = report.replayed,
            rejected = report.rejected,
            kept = report.kept,
            stranded = report.stranded,
            "Sync finished"
        );
        report
    }

    /// POST one item and return the server's status.
    async fn deliver(
        &self,
        tag: SyncTag,
        endpoint: &Url,
        item: &QueuedItem,
    ) -> Result<StatusCode, ServiceWorkerError> {
        let request = replay_request(tag, endpoint, item)?;
        let response = self.fetcher.fetch(request).await?;
        Ok(response.status)
    }
}
