//! reqwest-backed [`Fetcher`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, trace};
use url::Url;

use crate::{same_origin, Fetcher, NetError, Request, Response, ResponseType};

/// Resource loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Accept-Language header.
    pub accept_language: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
    /// Enable cookies.
    pub cookies_enabled: bool,
    /// Origin the worker runs on; decides `basic` vs `cors` response types.
    pub origin: Option<Url>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("SwKit/{}", env!("CARGO_PKG_VERSION")),
            accept_language: "ko-KR,ko;q=0.9,en-US;q=0.8".to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
            cookies_enabled: true,
            origin: None,
        }
    }
}

/// Resource loader for fetching URLs.
pub struct ResourceLoader {
    client: Client,
    config: LoaderConfig,
}

impl ResourceLoader {
    /// Create a new resource loader.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .cookie_store(config.cookies_enabled)
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(origin = ?config.origin.as_ref().map(Url::as_str), "ResourceLoader initialized");

        Ok(Self { client, config })
    }

    fn response_type(&self, final_url: &Url) -> ResponseType {
        match self.config.origin {
            Some(ref origin) if same_origin(origin, final_url) => ResponseType::Basic,
            Some(_) => ResponseType::Cors,
            None => ResponseType::Basic,
        }
    }
}

#[async_trait]
impl Fetcher for ResourceLoader {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .header("Accept-Language", &self.config.accept_language);

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetError::Timeout(request.timeout.unwrap_or(self.config.default_timeout))
            } else if e.is_connect() {
                NetError::Unreachable(e.to_string())
            } else {
                NetError::HttpError(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response {
            response_type: self.response_type(&url),
            url: Some(url),
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue, StatusCode};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn loader_for(server: &MockServer) -> ResourceLoader {
        ResourceLoader::new(LoaderConfig {
            origin: Some(Url::parse(&server.uri()).unwrap()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_loader_config_default() {
        let config = LoaderConfig::default();
        assert!(config.user_agent.starts_with("SwKit/"));
        assert!(config.cookies_enabled);
        assert!(config.origin.is_none());
    }

    #[tokio::test]
    async fn test_fetch_same_origin_is_basic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/static/css/style.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body{}"))
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        let url = Url::parse(&format!("{}/static/css/style.css", server.uri())).unwrap();
        let response = loader.fetch(Request::get(url)).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.response_type, ResponseType::Basic);
        assert_eq!(response.text().unwrap(), "body{}");
    }

    #[tokio::test]
    async fn test_fetch_cross_origin_is_cors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let loader = ResourceLoader::new(LoaderConfig {
            origin: Some(Url::parse("https://wackydocs.example/").unwrap()),
            ..Default::default()
        })
        .unwrap();
        let url = Url::parse(&format!("{}/lib.js", server.uri())).unwrap();
        let response = loader.fetch(Request::get(url)).await.unwrap();

        assert_eq!(response.response_type, ResponseType::Cors);
    }

    #[tokio::test]
    async fn test_fetch_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit-quiz-score"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"score":9}"#))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"success"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        let url = Url::parse(&format!("{}/submit-quiz-score", server.uri())).unwrap();
        let request = Request::post(url, r#"{"score":9}"#).header(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );
        let response = loader.fetch(request).await.unwrap();

        let value: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(value["status"], "success");
    }

    #[tokio::test]
    async fn test_http_error_status_is_not_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let loader = loader_for(&server);
        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let response = loader.fetch(Request::get(url)).await.unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(!response.ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_error() {
        let loader = ResourceLoader::new(LoaderConfig::default()).unwrap();
        // Port 9 (discard) on localhost is closed in test environments.
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        assert!(loader.fetch(Request::get(url)).await.is_err());
    }
}
