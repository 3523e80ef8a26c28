//! Host services shared by every worker generation.

use std::sync::Arc;

use folio_net::Fetcher;
use tokio::sync::RwLock;

use crate::cache::CacheStorage;
use crate::clients::Clients;
use crate::notification::{NotificationCenter, NotificationPermission};

/// What the host hands a worker: storage, windows, notifications and the
/// network.
#[derive(Clone)]
pub struct WorkerScope {
    /// Cache storage.
    pub caches: Arc<RwLock<CacheStorage>>,

    /// Clients.
    pub clients: Arc<RwLock<Clients>>,

    /// Notification display.
    pub notifications: Arc<RwLock<NotificationCenter>>,

    fetcher: Arc<dyn Fetcher>,
}

impl WorkerScope {
    /// Scope with empty storage and notification permission granted.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            caches: Arc::new(RwLock::new(CacheStorage::new())),
            clients: Arc::new(RwLock::new(Clients::new())),
            notifications: Arc::new(RwLock::new(NotificationCenter::new(
                NotificationPermission::Granted,
            ))),
            fetcher,
        }
    }

    /// Start from previously persisted buckets.
    pub fn with_caches(mut self, storage: CacheStorage) -> Self {
        self.caches = Arc::new(RwLock::new(storage));
        self
    }

    pub fn with_permission(mut self, permission: NotificationPermission) -> Self {
        self.notifications = Arc::new(RwLock::new(NotificationCenter::new(permission)));
        self
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Cache bucket names, oldest first.
    pub async fn cache_names(&self) -> Vec<String> {
        self.caches
            .read()
            .await
            .keys()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}
