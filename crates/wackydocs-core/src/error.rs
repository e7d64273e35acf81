//! Error types for WackyDocs

use swkit_common::SwKitError;
use swkit_sw::ServiceWorkerError;
use thiserror::Error;

/// Result type alias for WackyDocs operations
pub type WackyResult<T> = Result<T, WackyError>;

/// Main error type for WackyDocs
#[derive(Error, Debug)]
pub enum WackyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Site API error: {0}")]
    Api(String),

    #[error("Worker error: {0}")]
    Worker(#[from] ServiceWorkerError),

    #[error(transparent)]
    Common(#[from] SwKitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WackyError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new site API error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }
}
