//! Push payloads and the notification center.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ServiceWorkerError;

/// Unique identifier for a shown notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload delivered with a push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessageData(Bytes);

impl PushMessageData {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Payload decoded as UTF-8 (lossy).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.0
    }
}

impl From<&str> for PushMessageData {
    fn from(text: &str) -> Self {
        Self::new(text.to_string())
    }
}

/// Action identifiers the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// Open the portfolio in a new window.
    Explore,
    /// Dismiss only.
    Close,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explore => "explore",
            Self::Close => "close",
        }
    }
}

impl FromStr for NotificationAction {
    type Err = ServiceWorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "explore" => Ok(Self::Explore),
            "close" => Ok(Self::Close),
            other => Err(ServiceWorkerError::NotFound(format!(
                "notification action {other}"
            ))),
        }
    }
}

/// A button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationActionButton {
    pub action: String,
    pub title: String,
    pub icon: Option<String>,
}

/// Arbitrary data carried with a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// When the push arrived (ms since epoch).
    pub date_of_arrival: u64,
    pub primary_key: String,
}

/// The notification descriptor built for each push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOptions {
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub vibrate: Vec<u32>,
    pub data: Option<NotificationData>,
    pub actions: Vec<NotificationActionButton>,
}

/// A notification currently on screen.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub options: NotificationOptions,
    pub shown_at: Instant,
}

/// Permission to show notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationPermission {
    /// Never asked; treated as denied.
    #[default]
    Default,
    Granted,
    Denied,
}

/// Host-side notification display.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    permission: NotificationPermission,
    notifications: HashMap<NotificationId, Notification>,
}

impl NotificationCenter {
    pub fn new(permission: NotificationPermission) -> Self {
        Self {
            permission,
            notifications: HashMap::new(),
        }
    }

    pub fn permission(&self) -> NotificationPermission {
        self.permission
    }

    pub fn set_permission(&mut self, permission: NotificationPermission) {
        self.permission = permission;
    }

    /// Display a notification.
    pub fn show(
        &mut self,
        title: &str,
        options: NotificationOptions,
    ) -> Result<NotificationId, ServiceWorkerError> {
        if self.permission != NotificationPermission::Granted {
            return Err(ServiceWorkerError::NotificationError(format!(
                "permission is {:?}",
                self.permission
            )));
        }

        let id = NotificationId::new();
        info!(id = %id, title, body = %options.body, "Showing notification");
        self.notifications.insert(
            id,
            Notification {
                id,
                title: title.to_string(),
                options,
                shown_at: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Close a notification. Returns false if it was not showing.
    pub fn close(&mut self, id: NotificationId) -> bool {
        let closed = self.notifications.remove(&id).is_some();
        debug!(id = %id, closed, "Close notification");
        closed
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.notifications.get(&id)
    }

    /// Notifications currently showing.
    pub fn active(&self) -> Vec<&Notification> {
        self.notifications.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(body: &str) -> NotificationOptions {
        NotificationOptions {
            body: body.to_string(),
            icon: None,
            badge: None,
            vibrate: Vec::new(),
            data: None,
            actions: Vec::new(),
        }
    }

    #[test]
    fn test_push_data_text() {
        assert_eq!(PushMessageData::from("hello").text(), "hello");
        assert_eq!(
            PushMessageData::new(vec![0x68, 0x69, 0xff]).text(),
            "hi\u{fffd}"
        );
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(
            "explore".parse::<NotificationAction>().unwrap(),
            NotificationAction::Explore
        );
        assert_eq!(
            "close".parse::<NotificationAction>().unwrap(),
            NotificationAction::Close
        );
        assert!("Explore".parse::<NotificationAction>().is_err());
        assert_eq!(NotificationAction::Explore.as_str(), "explore");
    }

    #[test]
    fn test_show_and_close() {
        let mut center = NotificationCenter::new(NotificationPermission::Granted);
        let id = center.show("Title", options("body")).unwrap();

        assert_eq!(center.get(id).unwrap().options.body, "body");
        assert_eq!(center.active().len(), 1);

        assert!(center.close(id));
        assert!(!center.close(id));
        assert!(center.active().is_empty());
    }

    #[test]
    fn test_show_requires_permission() {
        let mut center = NotificationCenter::default();
        assert_eq!(center.permission(), NotificationPermission::Default);
        assert!(center.show("Title", options("body")).is_err());

        center.set_permission(NotificationPermission::Denied);
        assert!(matches!(
            center.show("Title", options("body")),
            Err(ServiceWorkerError::NotificationError(_))
        ));
        assert!(center.active().is_empty());
    }

    #[test]
    fn test_data_serializes_camel_case() {
        let data = NotificationData {
            date_of_arrival: 1_700_000_000_000,
            primary_key: "2".to_string(),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["dateOfArrival"], 1_700_000_000_000u64);
        assert_eq!(json["primaryKey"], "2");
    }
}
