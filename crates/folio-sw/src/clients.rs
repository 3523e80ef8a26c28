//! Clients API: the pages and windows a worker can reach.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use tracing::info;
use url::Url;

use crate::{now_millis, ServiceWorkerError};

/// A top-level window the worker opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Whether focused. Only the most recently opened window is.
    pub focused: bool,
}

/// Clients registry.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create new clients registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Every open window.
    pub fn match_all(&self) -> Vec<&Client> {
        self.clients.values().collect()
    }

    /// Open a new top-level browsing context at `url`.
    pub fn open_window(&mut self, url: &Url) -> Result<Client, ServiceWorkerError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServiceWorkerError::SecurityError(format!(
                "refusing to open window at {url}"
            )));
        }

        let id = format!("client-{}", next_client_id());
        let client = Client {
            id: id.clone(),
            url: url.clone(),
            focused: true,
        };

        for other in self.clients.values_mut() {
            other.focused = false;
        }

        info!(client = %id, url = %url, "Opened window");
        self.clients.insert(id, client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn next_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!(
        "{:012x}-{:04x}",
        now_millis(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}
