//! Fetch interception: cache first, network second, offline page last.

use http::{Method, StatusCode};
use swkit_net::{same_origin, Request, Response, ResponseType};
use tracing::{debug, warn};

use crate::config::WorkerConfig;
use crate::worker::OfflineWorker;
use crate::ServiceWorkerError;

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// The cached offline page.
    OfflinePage,
    /// Inline HTML synthesized because no offline page was cached.
    OfflineFallback,
}

/// Result of a fetch event.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself.
    Bypass,
    /// The worker answered.
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

impl FetchOutcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchOutcome::Respond { response, .. } => Some(response),
            FetchOutcome::Bypass => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Respond { source, .. } => Some(*source),
            FetchOutcome::Bypass => None,
        }
    }
}

/// Only GETs are intercepted, and cross-origin GETs only for precached URLs.
pub fn should_intercept(config: &WorkerConfig, request: &Request) -> bool {
    if request.method != Method::GET {
        return false;
    }
    same_origin(&config.origin, &request.url) || config.is_precached(&request.url)
}

/// Whether a network response may be written to the dynamic bucket.
pub fn is_cacheable(response: &Response) -> bool {
    response.status == StatusCode::OK && response.response_type == ResponseType::Basic
}

impl OfflineWorker {
    /// Handle a fetch event.
    ///
    /// Stored entries are returned without revalidation. Network failures are
    /// turned into an offline page for navigations and propagated otherwise.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome, ServiceWorkerError> {
        if !should_intercept(&self.config, &request) {
            debug!(url = %request.url, method = %request.method, "Bypassing request");
            return Ok(FetchOutcome::Bypass);
        }

        if let Some(entry) = self.caches.read().await.match_request(&request) {
            debug!(url = %request.url, "Serving from cache");
            return Ok(FetchOutcome::Respond {
                response: entry.to_response(),
                source: ResponseSource::Cache,
            });
        }

        match self.fetcher.fetch(request.clone()).await {
            Ok(response) => {
                if is_cacheable(&response) {
                    let cache = self.config.dynamic_cache_name();
                    self.caches.write().await.open(&cache).put(&request, &response);
                    debug!(url = %request.url, cache = %cache, "Cached network response");
                }
                Ok(FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Network request failed");
                if !request.is_navigation() {
                    return Err(e.into());
                }
                Ok(self.offline_response().await)
            }
        }
    }

    async fn offline_response(&self) -> FetchOutcome {
        if let Some(entry) = self.caches.read().await.match_url(&self.config.offline_page) {
            return FetchOutcome::Respond {
                response: entry.to_response(),
                source: ResponseSource::OfflinePage,
            };
        }
        FetchOutcome::Respond {
            response: Response::html(self.config.offline_fallback_html.clone()),
            source: ResponseSource::OfflineFallback,
        }
    }
}
