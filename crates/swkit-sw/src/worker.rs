//! The worker global: shared state, lifecycle handlers and event dispatch.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::try_join_all;
use swkit_net::{Fetcher, Request};
use swkit_queue::OfflineStore;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, instrument};

use crate::cache::CacheStorage;
use crate::clients::{Client, Clients};
use crate::config::WorkerConfig;
use crate::fetch::FetchOutcome;
use crate::lifecycle::{ServiceWorkerId, ServiceWorkerRegistration, ServiceWorkerState};
use crate::push::Notification;
use crate::sync::SyncReport;
use crate::ServiceWorkerError;

/// Lifecycle and functional events delivered to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Sync { tag: String },
    Push { data: Option<Bytes> },
    NotificationClick { tag: String, action: Option<String> },
}

impl WorkerEvent {
    /// Event type name as a browser would spell it.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::Sync { .. } => "sync",
            WorkerEvent::Push { .. } => "push",
            WorkerEvent::NotificationClick { .. } => "notificationclick",
        }
    }
}

/// What a settled event produced.
#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetch(FetchOutcome),
    Synced(SyncReport),
    Pushed(Option<Notification>),
    Clicked(Option<Client>),
}

/// Notices the worker reports to its host.
#[derive(Debug, Clone)]
pub enum ServiceWorkerEvent {
    /// A worker version changed state.
    StateChange {
        worker_id: ServiceWorkerId,
        new_state: ServiceWorkerState,
    },
    /// A client is now routed through a different worker version.
    ControllerChange { client_id: String },
    /// A notification was displayed.
    NotificationShown(Notification),
    /// A notification was dismissed.
    NotificationClosed { tag: String },
    /// A window was opened on behalf of the worker.
    WindowOpened { client_id: String, url: String },
    /// A background sync finished.
    SyncCompleted(SyncReport),
}

/// Result of the install handler.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub worker_id: ServiceWorkerId,
    /// Static bucket that was populated.
    pub cache: String,
    /// Number of manifest entries stored.
    pub cached: usize,
    /// Whether the worker asked to activate without waiting.
    pub skip_waiting: bool,
    /// Why population failed, if it did. Installation completes regardless.
    pub error: Option<String>,
}

/// Result of the activate handler.
#[derive(Debug, Clone)]
pub struct ActivateReport {
    pub worker_id: Option<ServiceWorkerId>,
    /// Buckets removed because they belong to another version.
    pub deleted: Vec<String>,
    /// Clients whose controller changed.
    pub claimed: usize,
}

/// The offline worker.
///
/// Cheap to clone; clones share the same caches, clients and queues.
#[derive(Clone)]
pub struct OfflineWorker {
    pub(crate) config: Arc<WorkerConfig>,
    pub(crate) caches: Arc<RwLock<CacheStorage>>,
    pub(crate) registration: Arc<RwLock<ServiceWorkerRegistration>>,
    pub(crate) clients: Arc<RwLock<Clients>>,
    pub(crate) notifications: Arc<RwLock<Vec<Notification>>>,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) store: Arc<dyn OfflineStore>,
    event_tx: mpsc::UnboundedSender<ServiceWorkerEvent>,
}

impl OfflineWorker {
    /// Create a worker with empty cache storage.
    pub fn new(
        config: WorkerConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn OfflineStore>,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        Self::with_caches(config, CacheStorage::new(), fetcher, store)
    }

    /// Create a worker on top of previously persisted cache storage.
    pub fn with_caches(
        config: WorkerConfig,
        caches: CacheStorage,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn OfflineStore>,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let registration = ServiceWorkerRegistration::new(config.origin.clone());

        (
            Self {
                config: Arc::new(config),
                caches: Arc::new(RwLock::new(caches)),
                registration: Arc::new(RwLock::new(registration)),
                clients: Arc::new(RwLock::new(Clients::new())),
                notifications: Arc::new(RwLock::new(Vec::new())),
                fetcher,
                store,
                event_tx,
            },
            event_rx,
        )
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Shared handle to the bucket storage.
    pub fn caches(&self) -> Arc<RwLock<CacheStorage>> {
        Arc::clone(&self.caches)
    }

    /// Shared handle to the clients registry.
    pub fn clients(&self) -> Arc<RwLock<Clients>> {
        Arc::clone(&self.clients)
    }

    /// Shared handle to the offline queue.
    pub fn store(&self) -> Arc<dyn OfflineStore> {
        Arc::clone(&self.store)
    }

    /// State of the active worker version, if any.
    pub async fn active_state(&self) -> Option<ServiceWorkerState> {
        self.registration
            .read()
            .await
            .get_active()
            .map(|worker| worker.state)
    }

    pub(crate) fn emit(&self, event: ServiceWorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Run the handler for `event` and wait for it to settle.
    #[instrument(skip_all, fields(event = event.name()))]
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, ServiceWorkerError> {
        match event {
            WorkerEvent::Install => Ok(EventOutcome::Installed(self.install().await)),
            WorkerEvent::Activate => Ok(EventOutcome::Activated(self.activate().await)),
            WorkerEvent::Fetch(request) => self.handle_fetch(request).await.map(EventOutcome::Fetch),
            WorkerEvent::Sync { tag } => Ok(EventOutcome::Synced(self.handle_sync(&tag).await)),
            WorkerEvent::Push { data } => self
                .handle_push(data.as_deref())
                .await
                .map(EventOutcome::Pushed),
            WorkerEvent::NotificationClick { tag, action } => self
                .handle_notification_click(&tag, action.as_deref())
                .await
                .map(EventOutcome::Clicked),
        }
    }

    /// Install: populate the static bucket from the manifest, then ask to
    /// skip waiting.
    ///
    /// Population failures are logged and reported; the worker is installed
    /// either way.
    pub async fn install(&self) -> InstallReport {
        info!(version = %self.config.version, "Service worker installing");

        let worker_id = self.registration.write().await.update(&self.config.version);
        self.emit(ServiceWorkerEvent::StateChange {
            worker_id,
            new_state: ServiceWorkerState::Installing,
        });

        let cache = self.config.static_cache_name();
        let (cached, error) = match self.precache(&cache).await {
            Ok(count) => {
                info!(cache = %cache, count, "Static files cached successfully");
                (count, None)
            }
            Err(e) => {
                error!(cache = %cache, error = %e, "Failed to cache static files");
                (0, Some(e.to_string()))
            }
        };
        let skip_waiting = error.is_none();

        self.registration.write().await.install_complete(skip_waiting);
        self.emit(ServiceWorkerEvent::StateChange {
            worker_id,
            new_state: ServiceWorkerState::Installed,
        });

        InstallReport {
            worker_id,
            cache,
            cached,
            skip_waiting,
            error,
        }
    }

    async fn precache(&self, cache: &str) -> Result<usize, ServiceWorkerError> {
        self.caches.write().await.open(cache);

        let requests: Vec<Request> = self
            .config
            .precache
            .iter()
            .cloned()
            .map(Request::get)
            .collect();

        let responses =
            try_join_all(requests.iter().map(|r| self.fetcher.fetch(r.clone()))).await?;
        let pairs: Vec<_> = requests.into_iter().zip(responses).collect();

        self.caches.write().await.open(cache).put_all(&pairs)
    }

    /// Activate: promote the waiting version, drop buckets of other versions
    /// and claim every client.
    pub async fn activate(&self) -> ActivateReport {
        info!(version = %self.config.version, "Service worker activating");

        let worker_id = {
            let mut registration = self.registration.write().await;
            if let Some(promoted) = registration.activate() {
                self.emit(ServiceWorkerEvent::StateChange {
                    worker_id: promoted,
                    new_state: ServiceWorkerState::Activated,
                });
            }
            registration.get_active().map(|worker| worker.id)
        };

        let keep = [
            self.config.static_cache_name(),
            self.config.dynamic_cache_name(),
        ];
        let deleted = {
            let mut caches = self.caches.write().await;
            let stale: Vec<String> = caches
                .keys()
                .into_iter()
                .filter(|name| !keep.iter().any(|k| k == name))
                .map(str::to_string)
                .collect();
            for name in &stale {
                info!(cache = %name, "Deleting old cache");
                caches.delete(name);
            }
            stale
        };

        let claimed = match worker_id {
            Some(id) => self.clients.write().await.claim(id),
            None => Vec::new(),
        };
        for client_id in &claimed {
            self.emit(ServiceWorkerEvent::ControllerChange {
                client_id: client_id.clone(),
            });
        }

        info!(deleted = deleted.len(), claimed = claimed.len(), "Service worker activated");

        ActivateReport {
            worker_id,
            deleted,
            claimed: claimed.len(),
        }
    }
}
