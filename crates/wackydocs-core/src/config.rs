//! Host configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use swkit_net::{resolve, LoaderConfig};
use swkit_sw::{NotificationDefaults, WorkerConfig};
use tracing::{debug, info};
use url::Url;

use crate::error::{WackyError, WackyResult};

/// Page shown for failed navigations when `/offline.html` was never cached.
pub const OFFLINE_FALLBACK_HTML: &str = "<!DOCTYPE html><html><head><title>오프라인</title></head><body><h1>인터넷 연결을 확인해주세요</h1><p>현재 오프라인 상태입니다.</p></body></html>";

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Site origin the worker fronts
    pub origin: String,

    /// Bucket naming and offline assets
    pub cache: CacheConfig,

    /// Replay endpoints for background sync
    pub sync: SyncConfig,

    /// Push notification presentation
    pub notifications: NotificationDefaults,

    /// Offline queue database lives here
    pub data_dir: PathBuf,

    /// Cache snapshot lives here
    pub cache_dir: PathBuf,

    /// User agent string
    pub user_agent: String,

    /// Network timeout in seconds
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix of every bucket name
    pub prefix: String,

    /// Version tag; bumping it retires every older bucket on activate
    pub version: String,

    /// Assets fetched on install. Paths resolve against the origin.
    pub static_files: Vec<String>,

    /// Routes expected to work offline
    pub offline_routes: Vec<String>,

    /// Cached page served for failed navigations
    pub offline_page: String,

    /// Inline page used when the offline page is not cached
    pub offline_fallback_html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub vocabulary_endpoint: String,
    pub quiz_score_endpoint: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5000/".to_string(),
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
            notifications: default_notifications(),
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wackydocs"),
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wackydocs"),
            user_agent: format!("WackyDocs-SW/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "wackydocs".to_string(),
            version: "v1.0.0".to_string(),
            static_files: [
                "/",
                "/static/css/style.css",
                "/static/js/main.js",
                "/static/manifest.json",
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
                "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.0.0/css/all.min.css",
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            offline_routes: [
                "/",
                "/dashboard",
                "/english-dictionary",
                "/suneung/korean",
                "/pdf-resources",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            offline_page: "/offline.html".to_string(),
            offline_fallback_html: OFFLINE_FALLBACK_HTML.to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            vocabulary_endpoint: "/add-vocabulary".to_string(),
            quiz_score_endpoint: "/submit-quiz-score".to_string(),
        }
    }
}

fn default_notifications() -> NotificationDefaults {
    NotificationDefaults {
        icon: "/static/icons/icon-192x192.png".to_string(),
        badge: "/static/icons/icon-96x96.png".to_string(),
        vibrate: vec![200, 100, 200],
        default_tag: "wackydocs-notification".to_string(),
        open_title: "열기".to_string(),
        close_title: "닫기".to_string(),
    }
}

impl AppConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("wackydocs").join("config.json"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// read when present and built-in defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> WackyResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => path,
                None => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let data = std::fs::read_to_string(&path).map_err(|e| {
            WackyError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&data)?;
        info!(path = %path.display(), version = %config.cache.version, "Config loaded");
        Ok(config)
    }

    /// Write the configuration as pretty JSON.
    pub fn save(&self, path: &Path) -> WackyResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Network timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// SQLite file backing the offline queue.
    pub fn queue_db_path(&self) -> PathBuf {
        self.data_dir.join("offline-queue.db")
    }

    /// JSON snapshot of the cache buckets.
    pub fn cache_snapshot_path(&self) -> PathBuf {
        self.cache_dir.join("caches.json")
    }

    /// Parsed site origin.
    pub fn origin(&self) -> WackyResult<Url> {
        let origin = Url::parse(&self.origin)?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(WackyError::config(format!(
                "origin must be http(s): {}",
                self.origin
            )));
        }
        Ok(origin)
    }

    /// Derive the worker configuration, resolving every path against the origin.
    pub fn worker_config(&self) -> WackyResult<WorkerConfig> {
        if self.cache.version.is_empty() {
            return Err(WackyError::config("cache version must not be empty"));
        }

        let origin = self.origin()?;
        let precache = self
            .cache
            .static_files
            .iter()
            .map(|path| resolve(&origin, path))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| WackyError::config(e.to_string()))?;

        Ok(WorkerConfig {
            cache_prefix: self.cache.prefix.clone(),
            version: self.cache.version.clone(),
            precache,
            offline_routes: self.cache.offline_routes.clone(),
            offline_page: origin.join(&self.cache.offline_page)?,
            offline_fallback_html: self.cache.offline_fallback_html.clone(),
            vocabulary_endpoint: origin.join(&self.sync.vocabulary_endpoint)?,
            quiz_score_endpoint: origin.join(&self.sync.quiz_score_endpoint)?,
            notifications: self.notifications.clone(),
            origin,
        })
    }

    /// Derive the HTTP loader configuration.
    pub fn loader_config(&self) -> WackyResult<LoaderConfig> {
        Ok(LoaderConfig {
            user_agent: self.user_agent.clone(),
            default_timeout: self.request_timeout(),
            origin: Some(self.origin()?),
            ..LoaderConfig::default()
        })
    }
}
