//! Immutable worker configuration.

use serde::{Deserialize, Serialize};
use url::Url;

/// Everything the worker needs to know about the site it fronts.
///
/// Built once at startup and shared read-only by every handler.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Origin the worker is registered on.
    pub origin: Url,
    /// Prefix of every bucket name.
    pub cache_prefix: String,
    /// Version tag embedded in bucket names.
    pub version: String,
    /// Assets fetched into the static bucket on install, already resolved.
    pub precache: Vec<Url>,
    /// Routes expected to work offline. Informational.
    pub offline_routes: Vec<String>,
    /// Cached page served when a navigation fails.
    pub offline_page: Url,
    /// Page synthesized when the offline page is not cached either.
    pub offline_fallback_html: String,
    /// Replay target for queued vocabulary additions.
    pub vocabulary_endpoint: Url,
    /// Replay target for queued quiz scores.
    pub quiz_score_endpoint: Url,
    /// Presentation of push notifications.
    pub notifications: NotificationDefaults,
}

impl WorkerConfig {
    /// Name of the bucket populated at install time.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.version)
    }

    /// Name of the bucket populated from network responses.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.version)
    }

    /// Whether `url` is one of the precached assets.
    pub fn is_precached(&self, url: &Url) -> bool {
        self.precache.iter().any(|u| u == url)
    }
}

/// Icons, vibration and actions attached to every push notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDefaults {
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Tag used when the payload does not carry one.
    pub default_tag: String,
    pub open_title: String,
    pub close_title: String,
}
