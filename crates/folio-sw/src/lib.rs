//! # Folio Service Worker
//!
//! The portfolio site's offline layer: a service worker that caches a fixed
//! asset manifest and replays push notifications.
//!
//! ## Features
//!
//! - **Install**: seed a version-named cache bucket from the asset manifest
//! - **Fetch**: cache-first, network fallback, same-origin `200`s stored
//! - **Activate**: purge every bucket but the current version's
//! - **Push / notification click**: show a notification, open the portfolio
//! - **Sync**: the background sync tag is acknowledged, nothing is replayed
//!
//! ## Architecture
//!
//! ```text
//! Registration
//!     ├── waiting (AssetCacheManager)
//!     └── active  (AssetCacheManager)
//!             │
//!             └── WorkerScope (shared by every generation)
//!                     ├── CacheStorage ── Cache ── URL → CacheEntry
//!                     ├── Clients
//!                     ├── NotificationCenter
//!                     └── dyn Fetcher (network)
//! ```
//!
//! Every failure inside a lifecycle handler is logged and dropped. The one
//! error a page sees is a fetch that missed the cache and then failed on the
//! network.

use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod notification;
pub mod registration;
pub mod scope;
pub mod worker;

pub use cache::{cache_key, Cache, CacheEntry, CacheStorage, StoredHeader};
pub use clients::{Client, Clients};
pub use notification::{
    Notification, NotificationAction, NotificationCenter, NotificationId, NotificationOptions,
    NotificationPermission, PushMessageData,
};
pub use registration::Registration;
pub use scope::WorkerScope;
pub use worker::{
    AssetCacheManager, ClickOutcome, EventResult, InstallOutcome, LifecycleEvent, WorkerConfig,
    WorkerId, WorkerState,
};

// ==================== Errors ====================

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone)]
pub enum ServiceWorkerError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<folio_net::NetError> for ServiceWorkerError {
    fn from(e: folio_net::NetError) -> Self {
        Self::NetworkError(e.to_string())
    }
}

// ==================== Helpers ====================

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
