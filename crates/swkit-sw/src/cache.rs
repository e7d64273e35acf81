//! Cache API: named buckets of request → response pairs.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use swkit_common::ResultExt;
use swkit_net::{Request, Response, ResponseType};
use tracing::{debug, info};
use url::Url;

use crate::ServiceWorkerError;

/// Cache identity of a request: method plus absolute URL.
pub fn cache_key(method: &Method, url: &Url) -> String {
    format!("{} {}", method, url)
}

/// A cached request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers in wire order; names may repeat.
    pub headers: Vec<(String, String)>,

    /// Response type the network reported.
    #[serde(default)]
    pub response_type: ResponseType,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Capture a response for `request`.
    pub fn from_response(request: &Request, response: &Response) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        Self {
            url: request.url.to_string(),
            method: request.method.to_string(),
            status: response.status.as_u16(),
            headers,
            response_type: response.response_type,
            body: response.body.to_vec(),
            cached_at: now_millis(),
        }
    }

    /// Rebuild a response from the stored entry.
    pub fn to_response(&self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(n), Ok(v)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                headers.append(n, v);
            }
        }

        Response {
            url: Url::parse(&self.url).ok(),
            status: StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            response_type: self.response_type,
            body: self.body.clone().into(),
        }
    }
}

/// A cache bucket.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries by [`cache_key`].
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request.
    pub fn match_request(&self, request: &Request) -> Option<&CacheEntry> {
        self.entries.get(&cache_key(&request.method, &request.url))
    }

    /// Match a GET for `url`.
    pub fn match_url(&self, url: &Url) -> Option<&CacheEntry> {
        self.entries.get(&cache_key(&Method::GET, url))
    }

    /// Store a response for a request, replacing any previous entry.
    pub fn put(&mut self, request: &Request, response: &Response) {
        let entry = CacheEntry::from_response(request, response);
        self.entries
            .insert(cache_key(&request.method, &request.url), entry);
    }

    /// Store a batch atomically: either every pair is written or none.
    ///
    /// Mirrors `cache.addAll()`, which rejects when any response is not ok.
    pub fn put_all(&mut self, pairs: &[(Request, Response)]) -> Result<usize, ServiceWorkerError> {
        if let Some((request, response)) = pairs.iter().find(|(_, r)| !r.ok()) {
            return Err(ServiceWorkerError::Cache(format!(
                "{} returned {}",
                request.url, response.status
            )));
        }
        for (request, response) in pairs {
            self.put(request, response);
        }
        Ok(pairs.len())
    }

    /// Delete entry.
    pub fn delete(&mut self, request: &Request) -> bool {
        self.entries
            .remove(&cache_key(&request.method, &request.url))
            .is_some()
    }

    /// Get all keys.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache storage (the `caches` global).
///
/// Buckets are kept in creation order so that cross-bucket matching is
/// deterministic.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheStorage {
    caches: Vec<Cache>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        let index = match self.caches.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                debug!(cache = name, "Creating cache bucket");
                self.caches.push(Cache::new(name));
                self.caches.len() - 1
            }
        };
        &mut self.caches[index]
    }

    /// Get a cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.iter().find(|c| c.name == name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.caches.len();
        self.caches.retain(|c| c.name != name);
        self.caches.len() != before
    }

    /// Get all cache names.
    pub fn keys(&self) -> Vec<&str> {
        self.caches.iter().map(|c| c.name.as_str()).collect()
    }

    /// Match across all caches.
    pub fn match_request(&self, request: &Request) -> Option<&CacheEntry> {
        self.caches.iter().find_map(|c| c.match_request(request))
    }

    /// Match a GET for `url` across all caches.
    pub fn match_url(&self, url: &Url) -> Option<&CacheEntry> {
        self.caches.iter().find_map(|c| c.match_url(url))
    }

    /// Restore storage from a snapshot written by [`CacheStorage::save`].
    ///
    /// A missing file yields empty storage.
    pub fn load(path: &Path) -> Result<Self, ServiceWorkerError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read(path).storage_context("failed to read cache snapshot")?;
        let storage: Self =
            serde_json::from_slice(&data).storage_context("corrupt cache snapshot")?;
        info!(path = %path.display(), caches = storage.caches.len(), "Cache snapshot loaded");
        Ok(storage)
    }

    /// Write a snapshot of every bucket to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ServiceWorkerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).storage_context("failed to create cache dir")?;
        }
        let data = serde_json::to_vec(self).storage_context("failed to encode cache snapshot")?;
        std::fs::write(path, data).storage_context("failed to write cache snapshot")?;
        debug!(path = %path.display(), "Cache snapshot saved");
        Ok(())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
