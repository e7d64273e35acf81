//! Push messages and notification clicks.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clients::Client;
use crate::config::NotificationDefaults;
use crate::worker::{OfflineWorker, ServiceWorkerEvent};
use crate::ServiceWorkerError;

/// Action id that opens the site.
pub const ACTION_OPEN: &str = "open";
/// Action id that only dismisses.
pub const ACTION_CLOSE: &str = "close";

/// JSON body of a push message.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tag: Option<String>,
}

/// A button shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// A displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Dress a push payload with the configured presentation.
    pub fn from_push(payload: PushPayload, defaults: &NotificationDefaults) -> Self {
        Self {
            title: payload.title,
            body: payload.body,
            icon: defaults.icon.clone(),
            badge: defaults.badge.clone(),
            vibrate: defaults.vibrate.clone(),
            tag: payload.tag.unwrap_or_else(|| defaults.default_tag.clone()),
            actions: vec![
                NotificationAction {
                    action: ACTION_OPEN.to_string(),
                    title: defaults.open_title.clone(),
                    icon: Some(defaults.badge.clone()),
                },
                NotificationAction {
                    action: ACTION_CLOSE.to_string(),
                    title: defaults.close_title.clone(),
                    icon: None,
                },
            ],
        }
    }
}

impl OfflineWorker {
    /// Handle a push event. Messages without data are ignored.
    ///
    /// A notification replaces any visible one with the same tag.
    pub async fn handle_push(
        &self,
        data: Option<&[u8]>,
    ) -> Result<Option<Notification>, ServiceWorkerError> {
        let Some(data) = data else {
            debug!("Push without data ignored");
            return Ok(None);
        };

        let payload: PushPayload = serde_json::from_slice(data).map_err(|e| {
            warn!(error = %e, "Malformed push payload");
            ServiceWorkerError::InvalidPayload(e.to_string())
        })?;

        let notification = Notification::from_push(payload, &self.config.notifications);
        {
            let mut shown = self.notifications.write().await;
            shown.retain(|n| n.tag != notification.tag);
            shown.push(notification.clone());
        }

        info!(tag = %notification.tag, title = %notification.title, "Showing notification");
        self.emit(ServiceWorkerEvent::NotificationShown(notification.clone()));
        Ok(Some(notification))
    }

    /// Handle a click on the notification tagged `tag`.
    ///
    /// The notification is always closed. The `open` action, or a click on
    /// the body (no action), opens the site root in a new window.
    pub async fn handle_notification_click(
        &self,
        tag: &str,
        action: Option<&str>,
    ) -> Result<Option<Client>, ServiceWorkerError> {
        let closed = {
            let mut shown = self.notifications.write().await;
            let before = shown.len();
            shown.retain(|n| n.tag != tag);
            shown.len() != before
        };
        if closed {
            self.emit(ServiceWorkerEvent::NotificationClosed {
                tag: tag.to_string(),
            });
        }

        match action.unwrap_or_default() {
            "" | ACTION_OPEN => {}
            other => {
                debug!(tag, action = other, "Notification dismissed");
                return Ok(None);
            }
        }

        let root = self
            .config
            .origin
            .join("/")
            .map_err(|e| ServiceWorkerError::InvalidUrl(e.to_string()))?;
        let controller = self.registration.read().await.get_active().map(|w| w.id);
        let client = self.clients.write().await.open_window(root, controller)?;

        info!(client = %client.id, url = %client.url, "Opened window from notification");
        self.emit(ServiceWorkerEvent::WindowOpened {
            client_id: client.id.clone(),
            url: client.url.to_string(),
        });
        Ok(Some(client))
    }

    /// Notifications currently displayed.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}
