//! # SwKit Net
//!
//! Request/response model and HTTP loading for the SwKit offline worker.
//!
//! ## Design Goals
//!
//! 1. **Fetch-shaped types**: requests carry a destination, responses carry a
//!    response type (`basic`, `cors`, `opaque`) so cache policy can be decided
//!    the same way a browser worker would.
//! 2. **Pluggable network**: the worker only sees the [`Fetcher`] trait, so
//!    tests and hosts can swap the transport.
//! 3. **Async HTTP**: [`ResourceLoader`] performs real requests with reqwest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use swkit_common::SwKitError;
use thiserror::Error;
use url::Url;

pub mod loader;
pub mod origin;

pub use loader::{LoaderConfig, ResourceLoader};
pub use origin::{resolve, same_origin};

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<NetError> for SwKitError {
    fn from(err: NetError) -> Self {
        match err {
            NetError::Timeout(d) => SwKitError::Timeout(d),
            NetError::InvalidUrl(u) => SwKitError::InvalidArgument(u),
            other => SwKitError::network_with_source("fetch failed", other),
        }
    }
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// What the requested resource will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// Top-level page navigation.
    Document,
    /// Subresource or fetch() style request.
    #[default]
    Empty,
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub destination: Destination,
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a request with an arbitrary method.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method,
            headers: HeaderMap::new(),
            body: None,
            destination: Destination::Empty,
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a top-level navigation request.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).destination(Destination::Document)
    }

    /// Create a POST request.
    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        let mut request = Self::new(Method::POST, url);
        request.body = Some(body.into());
        request
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the destination.
    pub fn destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Whether this is a page navigation.
    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }
}

/// Response type as exposed to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response, fully readable.
    Basic,
    /// Cross-origin response obtained with CORS.
    Cors,
    /// Cross-origin response with hidden status and body.
    Opaque,
    /// Synthesized by the worker itself.
    #[default]
    Default,
}

/// HTTP response.
///
/// The body is fully buffered, so cloning a response for a cache write is cheap.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Option<Url>,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub response_type: ResponseType,
    pub body: Bytes,
}

impl Response {
    /// Create a worker-synthesized response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            url: None,
            status,
            headers,
            response_type: ResponseType::Default,
            body: body.into(),
        }
    }

    /// Create a `text/html` response with status 200.
    pub fn html(body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html"),
        );
        Self::new(StatusCode::OK, headers, body)
    }

    /// Check if request was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

/// The network as seen by the worker.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Any HTTP status is a successful fetch; only
    /// transport failures are errors.
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let url = Url::parse("https://example.com").unwrap();
        let request = Request::get(url.clone())
            .header(
                HeaderName::from_static("accept"),
                HeaderValue::from_static("application/json"),
            )
            .timeout(Duration::from_secs(10));

        assert_eq!(request.url, url);
        assert_eq!(request.method, Method::GET);
        assert!(request.headers.contains_key("accept"));
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
        assert!(!request.is_navigation());
    }

    #[test]
    fn test_navigation_request() {
        let request = Request::navigate(Url::parse("https://example.com/dashboard").unwrap());
        assert!(request.is_navigation());
        assert_eq!(request.method, Method::GET);
    }

    #[test]
    fn test_request_id_uniqueness() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_html_response() {
        let response = Response::html("<p>hi</p>");
        assert!(response.ok());
        assert_eq!(response.headers[http::header::CONTENT_TYPE], "text/html");
        assert_eq!(response.text().unwrap(), "<p>hi</p>");
        assert_eq!(response.response_type, ResponseType::Default);
    }

    #[test]
    fn test_net_error_conversion() {
        let err: SwKitError = NetError::Timeout(Duration::from_secs(3)).into();
        assert_eq!(err.category(), "timeout");

        let err: SwKitError = NetError::Unreachable("offline".into()).into();
        assert_eq!(err.category(), "network");
        assert!(err.is_retryable());
    }
}
