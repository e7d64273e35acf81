//! # SwKit Common
//!
//! Error types and logging configuration shared by the SwKit offline worker crates.
//!
//! ## Features
//!
//! - Unified error type with source chaining and backtraces for internal faults
//! - Logging configuration and setup
//! - Result extension trait

use std::time::Duration;
use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for SwKit.
#[derive(Error, Debug)]
pub enum SwKitError {
    /// Cache bucket errors.
    #[error("Cache error: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Network-related errors.
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Persistent storage errors (offline queue, snapshots).
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal error (unexpected).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl SwKitError {
    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Create a storage error with source.
    pub fn storage_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error with backtrace.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }

    /// Whether the failure is transient (worth queueing for a later sync).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwKitError::Network { .. } | SwKitError::Timeout(_) | SwKitError::Io(_)
        )
    }

    /// Get the error category for log fields.
    pub fn category(&self) -> &'static str {
        match self {
            SwKitError::Cache { .. } => "cache",
            SwKitError::Network { .. } => "network",
            SwKitError::Storage { .. } => "storage",
            SwKitError::Config { .. } => "config",
            SwKitError::Io(_) => "io",
            SwKitError::Timeout(_) => "timeout",
            SwKitError::InvalidArgument(_) => "invalid_argument",
            SwKitError::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for SwKit operations.
pub type Result<T> = std::result::Result<T, SwKitError>;

/// Extension trait for Result.
pub trait ResultExt<T> {
    /// Wrap the error as a storage failure.
    fn storage_context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn storage_context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| SwKitError::storage_with_source(message, e))
    }
}
