//! Host state: one worker wired to the real network, the SQLite queue and
//! the cache snapshot on disk.

use std::path::PathBuf;
use std::sync::Arc;

use swkit_net::{Fetcher, ResourceLoader};
use swkit_queue::{OfflineStore, SqliteStore};
use swkit_sw::{CacheStorage, OfflineWorker, ServiceWorkerEvent};
use tokio::sync::mpsc;
use tracing::{debug, info};
use wackydocs_core::{AppConfig, WackyError, WackyResult};

pub struct HostState {
    pub config: AppConfig,
    pub worker: OfflineWorker,
    events: mpsc::UnboundedReceiver<ServiceWorkerEvent>,
    snapshot: PathBuf,
}

impl HostState {
    /// Build the host from configuration, restoring persisted buckets.
    pub fn open(config: AppConfig) -> WackyResult<Self> {
        let loader = ResourceLoader::new(config.loader_config()?)
            .map_err(|e| WackyError::network(e.to_string()))?;

        std::fs::create_dir_all(&config.data_dir)?;
        let store = SqliteStore::open(&config.queue_db_path())?;

        Self::with_parts(config, Arc::new(loader), Arc::new(store))
    }

    /// Build the host around an explicit network and queue.
    pub fn with_parts(
        config: AppConfig,
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn OfflineStore>,
    ) -> WackyResult<Self> {
        let snapshot = config.cache_snapshot_path();
        let caches = CacheStorage::load(&snapshot)?;
        let (worker, events) =
            OfflineWorker::with_caches(config.worker_config()?, caches, fetcher, store);

        info!(
            origin = %config.origin,
            version = %config.cache.version,
            "Offline worker ready"
        );
        Ok(Self {
            config,
            worker,
            events,
            snapshot,
        })
    }

    /// Write every bucket back to disk.
    pub async fn persist(&self) -> WackyResult<()> {
        self.worker.caches().read().await.save(&self.snapshot)?;
        Ok(())
    }

    /// Events the worker reported since the last call.
    pub fn drain_events(&mut self) -> Vec<ServiceWorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            debug!(?event, "Worker event");
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swkit_net::Request;
    use swkit_queue::MemoryStore;
    use swkit_sw::ResponseSource;
    use tempfile::tempdir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_config(origin: &str, root: &std::path::Path) -> AppConfig {
        let mut config = AppConfig {
            origin: origin.to_string(),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            ..AppConfig::default()
        };
        config.cache.static_files = vec!["/".into(), "/static/css/style.css".into()];
        config
    }

    #[tokio::test]
    async fn test_buckets_survive_restart() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>home</h1>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/static/css/style.css"))
            .respond_with(ResponseTemplate::new(200).set_body_string("body {}"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let config = local_config(&format!("{}/", server.uri()), dir.path());

        let mut host = HostState::open(config.clone()).unwrap();
        let report = host.worker.install().await;
        assert!(report.error.is_none(), "{:?}", report.error);
        host.persist().await.unwrap();
        assert!(!host.drain_events().is_empty());
        drop(host);
        drop(server);

        let host = HostState::with_parts(
            config.clone(),
            Arc::new(ResourceLoader::new(config.loader_config().unwrap()).unwrap()),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        let css = Url::parse(&config.origin)
            .unwrap()
            .join("/static/css/style.css")
            .unwrap();
        let outcome = host.worker.handle_fetch(Request::get(css)).await.unwrap();
        assert_eq!(outcome.source(), Some(ResponseSource::Cache));
    }

    #[tokio::test]
    async fn test_queue_database_created_in_data_dir() {
        let dir = tempdir().unwrap();
        let config = local_config("http://127.0.0.1:9/", dir.path());

        let host = HostState::open(config.clone()).unwrap();
        host.worker
            .queue_offline(
                swkit_queue::QueueKind::Vocabulary,
                serde_json::json!({"word": "tree", "meaning": "나무"}),
            )
            .await
            .unwrap();

        assert!(config.queue_db_path().exists());
        assert_eq!(
            host.worker
                .store()
                .len(swkit_queue::QueueKind::Vocabulary)
                .await
                .unwrap(),
            1
        );
    }
}
