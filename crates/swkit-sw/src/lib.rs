//! # SwKit Offline Worker
//!
//! The WackyDocs offline worker: a caching proxy that sits between the site's
//! pages and the network.
//!
//! ## Features
//!
//! - **Lifecycle**: install populates a versioned static bucket, activate
//!   sweeps buckets of other versions and claims open pages
//! - **Fetch Interception**: cache first, network second, offline page last
//! - **Background Sync**: replays vocabulary additions and quiz scores queued
//!   while offline
//! - **Push**: turns push payloads into notifications and handles clicks
//!
//! ## Architecture
//!
//! ```text
//! OfflineWorker
//!     ├── WorkerConfig (origin, version, manifest, endpoints)
//!     ├── ServiceWorkerRegistration
//!     │       ├── installing
//!     │       ├── waiting
//!     │       └── active
//!     ├── CacheStorage
//!     │       ├── <prefix>-static-<version>
//!     │       └── <prefix>-dynamic-<version>
//!     ├── Clients
//!     ├── Fetcher (network)
//!     └── OfflineStore (queued mutations)
//! ```

use swkit_common::SwKitError;
use swkit_net::NetError;
use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod push;
pub mod sync;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cache::{cache_key, Cache, CacheEntry, CacheStorage};
pub use clients::{Client, Clients};
pub use config::{NotificationDefaults, WorkerConfig};
pub use fetch::{is_cacheable, should_intercept, FetchOutcome, ResponseSource};
pub use lifecycle::{ServiceWorker, ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState};
pub use push::{Notification, NotificationAction, PushPayload, ACTION_CLOSE, ACTION_OPEN};
pub use sync::{form_encode, SyncReport, SyncTag};
pub use worker::{
    ActivateReport, EventOutcome, InstallReport, OfflineWorker, ServiceWorkerEvent, WorkerEvent,
};

/// Errors that can occur in worker handlers.
#[derive(Error, Debug)]
pub enum ServiceWorkerError {
    #[error("Network error: {0}")]
    Network(#[from] NetError),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Storage(#[from] SwKitError),
}

impl ServiceWorkerError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceWorkerError::Network(_) => true,
            ServiceWorkerError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<ServiceWorkerError> for SwKitError {
    fn from(err: ServiceWorkerError) -> Self {
        match err {
            ServiceWorkerError::Storage(e) => e,
            ServiceWorkerError::Network(e) => e.into(),
            ServiceWorkerError::Cache(message) => SwKitError::cache(message),
            other => SwKitError::InvalidArgument(other.to_string()),
        }
    }
}
