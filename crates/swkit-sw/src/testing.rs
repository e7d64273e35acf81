//! Test doubles shared by the handler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use swkit_net::{resolve, same_origin, Fetcher, NetError, Request, Response, ResponseType};
use swkit_queue::MemoryStore;
use tokio::sync::mpsc;
use url::Url;

use crate::config::{NotificationDefaults, WorkerConfig};
use crate::worker::{OfflineWorker, ServiceWorkerEvent};

pub const ORIGIN: &str = "https://wackydocs.test/";

pub const MANIFEST: &[&str] = &[
    "/",
    "/static/css/style.css",
    "/static/js/main.js",
    "/static/manifest.json",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
];

pub fn test_config() -> WorkerConfig {
    test_config_with_version("v-test")
}

pub fn test_config_with_version(version: &str) -> WorkerConfig {
    let origin = Url::parse(ORIGIN).unwrap();
    WorkerConfig {
        precache: MANIFEST.iter().map(|p| resolve(&origin, p).unwrap()).collect(),
        offline_routes: vec!["/".into(), "/dashboard".into()],
        offline_page: origin.join("/offline.html").unwrap(),
        offline_fallback_html: "<!DOCTYPE html><html><body><h1>offline</h1></body></html>".into(),
        vocabulary_endpoint: origin.join("/add-vocabulary").unwrap(),
        quiz_score_endpoint: origin.join("/submit-quiz-score").unwrap(),
        notifications: NotificationDefaults {
            icon: "/static/icons/icon-192x192.png".into(),
            badge: "/static/icons/icon-96x96.png".into(),
            vibrate: vec![200, 100, 200],
            default_tag: "wackydocs-notification".into(),
            open_title: "열기".into(),
            close_title: "닫기".into(),
        },
        cache_prefix: "wackydocs".into(),
        version: version.into(),
        origin,
    }
}

/// A request as seen by [`MockFetcher`].
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub url: String,
    pub method: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Scripted network: known URLs answer, everything else is unreachable.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, (u16, String)>>,
    seen: Mutex<Vec<SeenRequest>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every manifest URL with 200.
    pub fn serving_manifest() -> Self {
        let fetcher = Self::new();
        for url in test_config().precache {
            fetcher.respond(url.as_str(), 200, "asset");
        }
        fetcher
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_string()));
    }

    pub fn go_offline(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(SeenRequest {
            url: request.url.to_string(),
            method: request.method.to_string(),
            content_type: request
                .headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: request
                .body
                .as_ref()
                .map(|b| String::from_utf8_lossy(b).into_owned())
                .unwrap_or_default(),
        });

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let (status, body) =
            route.ok_or_else(|| NetError::Unreachable(request.url.to_string()))?;

        let origin = Url::parse(ORIGIN).unwrap();
        let mut response = Response::new(StatusCode::from_u16(status).unwrap(), HeaderMap::new(), body);
        response.url = Some(request.url.clone());
        response.response_type = if same_origin(&origin, &request.url) {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        };
        Ok(response)
    }
}

pub fn test_worker(
    fetcher: Arc<MockFetcher>,
) -> (OfflineWorker, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
    OfflineWorker::new(test_config(), fetcher, Arc::new(MemoryStore::new()))
}
