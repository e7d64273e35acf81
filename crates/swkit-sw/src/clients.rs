//! Clients API: page contexts the worker may control.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use url::Url;

use crate::lifecycle::ServiceWorkerId;
use crate::ServiceWorkerError;

/// A client (controlled page).
#[derive(Debug, Clone)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Whether focused.
    pub focused: bool,

    /// Worker version currently routing this client's requests.
    pub controller: Option<ServiceWorkerId>,
}

/// Clients API.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Register an existing page context (uncontrolled).
    pub fn attach(&mut self, url: Url) -> Client {
        let client = Client {
            id: format!("client-{}", uuid_simple()),
            url,
            focused: false,
            controller: None,
        };
        self.clients.insert(client.id.clone(), client.clone());
        client
    }

    /// Open a window.
    pub fn open_window(
        &mut self,
        url: Url,
        controller: Option<ServiceWorkerId>,
    ) -> Result<Client, ServiceWorkerError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServiceWorkerError::InvalidUrl(url.to_string()));
        }

        for client in self.clients.values_mut() {
            client.focused = false;
        }

        let client = Client {
            id: format!("client-{}", uuid_simple()),
            url,
            focused: true,
            controller,
        };

        self.clients.insert(client.id.clone(), client.clone());
        Ok(client)
    }

    /// Take control of every client. Returns the ids whose controller changed.
    pub fn claim(&mut self, worker: ServiceWorkerId) -> Vec<String> {
        let mut changed = Vec::new();
        for client in self.clients.values_mut() {
            if client.controller != Some(worker) {
                client.controller = Some(worker);
                changed.push(client.id.clone());
            }
        }
        changed
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Generate a simple UUID-like string.
fn uuid_simple() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!(
        "{:016x}-{:04x}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64,
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_window() {
        let mut clients = Clients::new();

        let client = clients
            .open_window(Url::parse("https://example.com/").unwrap(), None)
            .unwrap();
        assert!(client.focused);
        assert!(clients.get(&client.id).is_some());
    }

    #[test]
    fn test_open_window_rejects_non_http() {
        let mut clients = Clients::new();
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(clients.open_window(url, None).is_err());
        assert!(clients.is_empty());
    }

    #[test]
    fn test_claim_controls_every_client() {
        let mut clients = Clients::new();
        let a = clients.attach(Url::parse("https://example.com/dashboard").unwrap());
        let b = clients.attach(Url::parse("https://example.com/pdf-resources").unwrap());
        assert!(clients.get(&a.id).unwrap().controller.is_none());

        let worker = crate::lifecycle::ServiceWorker::new("v1").id;
        assert_eq!(clients.claim(worker).len(), 2);
        assert!(clients.claim(worker).is_empty());
        assert_eq!(clients.get(&b.id).unwrap().controller, Some(worker));
    }
}
