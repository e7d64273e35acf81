//! Site API: the mutating endpoints the UI calls directly.

use std::time::Duration;

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;
use wackydocs_core::types::{CsrfToken, DeleteResponse, DeleteTarget, CSRF_HEADER, CSRF_META_NAME};
use wackydocs_core::{WackyError, WackyResult};

/// HTTP client for the WackyDocs site.
///
/// Keeps a cookie store so the session that rendered a page is the one that
/// submits the token scraped from it.
pub struct SiteClient {
    client: Client,
    origin: Url,
}

impl SiteClient {
    pub fn new(origin: Url, user_agent: &str, timeout: Duration) -> WackyResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| WackyError::network(e.to_string()))?;
        Ok(Self { client, origin })
    }

    /// Fetch `page` and read the CSRF token from its meta tag.
    ///
    /// A page without the tag yields an empty token; the server decides.
    pub async fn csrf_token(&self, page: &str) -> WackyResult<CsrfToken> {
        let url = self.origin.join(page)?;
        let html = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| WackyError::network(e.to_string()))?
            .text()
            .await
            .map_err(|e| WackyError::network(e.to_string()))?;

        let token = extract_csrf_token(&html).unwrap_or_default();
        if token.is_empty() {
            warn!(url = %url, "Page carries no CSRF token");
        }
        Ok(CsrfToken(token))
    }

    pub async fn delete_vocab(&self, id: u64, token: &CsrfToken) -> WackyResult<DeleteResponse> {
        self.delete(DeleteTarget::Vocabulary(id), token).await
    }

    pub async fn delete_category(
        &self,
        id: u64,
        token: &CsrfToken,
    ) -> WackyResult<DeleteResponse> {
        self.delete(DeleteTarget::Category(id), token).await
    }

    async fn delete(&self, target: DeleteTarget, token: &CsrfToken) -> WackyResult<DeleteResponse> {
        let url = self.origin.join(&target.path())?;
        debug!(url = %url, "Sending delete request");

        let response = self
            .client
            .post(url)
            .header(CSRF_HEADER, token.as_str())
            .send()
            .await
            .map_err(|e| WackyError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WackyError::network(e.to_string()))?;
        let parsed: DeleteResponse = serde_json::from_str(&body).map_err(|_| {
            WackyError::api(format!("{} delete returned {status} without JSON", target.label()))
        })?;

        if parsed.success {
            info!(target = target.label(), "Deleted");
        } else {
            warn!(target = target.label(), %status, "Delete refused");
        }
        Ok(parsed)
    }
}

/// Content of `<meta name="csrf-token" content="...">`, if the page has one.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .ok()?;
    find_csrf_meta(&dom.document)
}

fn find_csrf_meta(handle: &Handle) -> Option<String> {
    if let NodeData::Element { name, attrs, .. } = &handle.data {
        if &*name.local == "meta" {
            let attrs = attrs.borrow();
            let attr = |key: &str| {
                attrs
                    .iter()
                    .find(|attr| &*attr.name.local == key)
                    .map(|attr| attr.value.to_string())
            };
            if attr("name").as_deref() == Some(CSRF_META_NAME) {
                return attr("content");
            }
        }
    }

    handle.children.borrow().iter().find_map(find_csrf_meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="ko">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <meta name="csrf-token" content="IjQ2YzE5Mjc0">
    <title>WackyDocs</title>
</head>
<body></body>
</html>"#;

    fn client(server: &MockServer) -> SiteClient {
        let origin = Url::parse(&server.uri()).unwrap();
        SiteClient::new(origin, "test-agent", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_extract_csrf_token() {
        assert_eq!(extract_csrf_token(PAGE).as_deref(), Some("IjQ2YzE5Mjc0"));
    }

    #[test]
    fn test_extract_csrf_token_variants() {
        let reordered = r#"<META content='abc' NAME="csrf-token" />"#;
        assert_eq!(extract_csrf_token(reordered).as_deref(), Some("abc"));

        let unquoted = "<meta name=csrf-token content=xyz>";
        assert_eq!(extract_csrf_token(unquoted).as_deref(), Some("xyz"));

        assert_eq!(extract_csrf_token("<meta charset=utf-8><p>hi</p>"), None);
    }

    #[test]
    fn test_commented_out_token_is_ignored() {
        let page = r#"<head>
            <!-- <meta name="csrf-token" content="stale"> -->
            <meta name="csrf-token" content="live">
        </head>"#;
        assert_eq!(extract_csrf_token(page).as_deref(), Some("live"));
    }

    #[test]
    fn test_angle_bracket_inside_attribute_value() {
        let page = r#"<meta data-x="a>b" name="csrf-token" content="tok">"#;
        assert_eq!(extract_csrf_token(page).as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_delete_vocab_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vocab/delete/42"))
            .and(header("X-CSRFToken", "IjQ2YzE5Mjc0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let result = client
            .delete_vocab(42, &CsrfToken("IjQ2YzE5Mjc0".into()))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_token_scraped_then_category_deleted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/dashboard"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/category/delete/3"))
            .and(header("X-CSRFToken", "IjQ2YzE5Mjc0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"success": true}"#))
            .mount(&server)
            .await;

        let client = client(&server);
        let token = client.csrf_token("/dashboard").await.unwrap();
        let result = client.delete_category(3, &token).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_refused_delete_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vocab/delete/9"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"success": false, "message": "forbidden"}"#),
            )
            .mount(&server)
            .await;

        let result = client(&server)
            .delete_vocab(9, &CsrfToken::default())
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("forbidden"));
    }

    #[tokio::test]
    async fn test_non_json_reply_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vocab/delete/1"))
            .respond_with(ResponseTemplate::new(400).set_body_string("<h1>CSRF token missing</h1>"))
            .mount(&server)
            .await;

        let result = client(&server).delete_vocab(1, &CsrfToken::default()).await;
        assert!(matches!(result, Err(WackyError::Api(_))));
    }
}
