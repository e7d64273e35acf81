//! Common types used by the WackyDocs host

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the CSRF token on mutating site requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// Name of the `<meta>` tag pages publish their CSRF token in.
pub const CSRF_META_NAME: &str = "csrf-token";

/// CSRF token scraped from a rendered page. Empty when the page had none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something the UI can delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteTarget {
    Vocabulary(u64),
    Category(u64),
}

impl DeleteTarget {
    /// Path of the deletion endpoint.
    pub fn path(&self) -> String {
        match self {
            DeleteTarget::Vocabulary(id) => format!("/vocab/delete/{id}"),
            DeleteTarget::Category(id) => format!("/category/delete/{id}"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeleteTarget::Vocabulary(_) => "vocabulary",
            DeleteTarget::Category(_) => "category",
        }
    }
}

/// Body returned by the deletion endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_paths() {
        assert_eq!(DeleteTarget::Vocabulary(7).path(), "/vocab/delete/7");
        assert_eq!(DeleteTarget::Category(12).path(), "/category/delete/12");
    }

    #[test]
    fn test_delete_response_defaults() {
        let parsed: DeleteResponse = serde_json::from_str("{}").unwrap();
        assert!(!parsed.success);

        let parsed: DeleteResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(parsed.success);
        assert!(parsed.message.is_none());
    }
}
