//! The asset cache manager: one service worker generation.
//!
//! ```text
//!  Installing ──install──▶ Installed ──activate──▶ Active ──(newer version)──▶ Superseded
//! ```
//!
//! Every handler resolves only once its asynchronous work is done, so a host
//! awaiting [`AssetCacheManager::dispatch`] gets `waitUntil` semantics for free.

use std::sync::atomic::{AtomicU64, Ordering};

use folio_common::BestEffort;
use folio_core::{NotificationSettings, SiteConfig};
use folio_net::{Request, Response};
use futures::future::join_all;
use http::StatusCode;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::cache::CacheEntry;
use crate::clients::Client;
use crate::notification::{
    NotificationAction, NotificationActionButton, NotificationData, NotificationId,
    NotificationOptions, PushMessageData,
};
use crate::scope::WorkerScope;
use crate::{now_millis, ServiceWorkerError};

/// Key stored in every push notification's data.
const PRIMARY_KEY: &str = "2";

// ==================== Types ====================

/// Unique identifier for a worker generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Created, install not yet run.
    #[default]
    Installing,
    /// Install finished, waiting to activate.
    Installed,
    /// Activated; owns the current bucket.
    Active,
    /// Replaced by a newer version; receives no more events.
    Superseded,
}

/// Result of the install step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Every manifest asset was stored.
    Complete { cached: usize },
    /// Population failed; the bucket exists but holds no manifest assets.
    Degraded { reason: String },
}

impl InstallOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// Result of a notification click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickOutcome {
    /// The notification was showing and is now closed.
    pub closed: bool,
    /// Window opened by the "explore" action.
    pub opened: Option<Client>,
}

/// Events the host delivers to a worker.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Install,
    Activate,
    Fetch(Request),
    Push(Option<PushMessageData>),
    NotificationClick {
        notification: NotificationId,
        action: Option<String>,
    },
    Sync {
        tag: String,
    },
}

/// What handling an event produced.
#[derive(Debug)]
pub enum EventResult {
    Installed(InstallOutcome),
    Activated { deleted: Vec<String> },
    Responded(Response),
    Pushed(Option<NotificationId>),
    Clicked(ClickOutcome),
    Synced { recognized: bool },
}

// ==================== Config ====================

/// Everything a worker generation needs to know. The cache name is passed
/// in, never read from a global, so several versions can coexist.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Version-qualified bucket name this worker owns.
    pub cache_name: String,

    /// Origin the manifest paths are resolved against.
    pub origin: Url,

    /// Root-relative asset paths.
    pub asset_manifest: Vec<String>,

    pub notification: NotificationSettings,

    /// Opened by the "explore" action.
    pub explore_url: Url,

    /// Background sync tag that is acknowledged.
    pub sync_tag: String,
}

impl WorkerConfig {
    pub fn from_site(site: &SiteConfig) -> Result<Self, ServiceWorkerError> {
        site.validate()
            .map_err(|e| ServiceWorkerError::ConfigError(e.to_string()))?;

        let origin = site
            .origin_url()
            .map_err(|e| ServiceWorkerError::ConfigError(e.to_string()))?;
        let explore_url = site
            .explore_url()
            .map_err(|e| ServiceWorkerError::ConfigError(e.to_string()))?;

        Ok(Self {
            cache_name: site.cache_name(),
            origin,
            asset_manifest: site.cache.manifest.clone(),
            notification: site.notification.clone(),
            explore_url,
            sync_tag: site.sync_tag.clone(),
        })
    }

    /// Manifest paths resolved against the origin, in order.
    pub fn asset_urls(&self) -> Result<Vec<Url>, ServiceWorkerError> {
        self.asset_manifest
            .iter()
            .map(|path| {
                self.origin
                    .join(path)
                    .map_err(|e| ServiceWorkerError::ConfigError(format!("{path}: {e}")))
            })
            .collect()
    }
}

// ==================== Asset Cache Manager ====================

/// A service worker generation that keeps the portfolio's assets offline.
pub struct AssetCacheManager {
    id: WorkerId,
    config: WorkerConfig,
    scope: WorkerScope,
    state: RwLock<WorkerState>,
    /// Serializes install/activate without blocking functional events.
    lifecycle: Mutex<()>,
}

impl AssetCacheManager {
    pub fn new(config: WorkerConfig, scope: WorkerScope) -> Self {
        Self {
            id: WorkerId::new(),
            config,
            scope,
            state: RwLock::new(WorkerState::Installing),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn scope(&self) -> &WorkerScope {
        &self.scope
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn expect_state(&self, expected: WorkerState) -> Result<(), ServiceWorkerError> {
        let state = self.state().await;
        if state != expected {
            return Err(ServiceWorkerError::StateError(format!(
                "worker {:?} is {:?}, expected {:?}",
                self.id, state, expected
            )));
        }
        Ok(())
    }

    async fn ensure_live(&self) -> Result<(), ServiceWorkerError> {
        if self.state().await == WorkerState::Superseded {
            return Err(ServiceWorkerError::StateError(format!(
                "worker {:?} has been superseded",
                self.id
            )));
        }
        Ok(())
    }

    async fn set_state(&self, state: WorkerState) {
        debug!(worker = ?self.id, ?state, "Worker state change");
        *self.state.write().await = state;
    }

    pub(crate) async fn supersede(&self) {
        self.set_state(WorkerState::Superseded).await;
    }

    /// Route a host event to its handler.
    pub async fn dispatch(
        &self,
        event: LifecycleEvent,
    ) -> Result<EventResult, ServiceWorkerError> {
        match event {
            LifecycleEvent::Install => self.install().await.map(EventResult::Installed),
            LifecycleEvent::Activate => self
                .activate()
                .await
                .map(|deleted| EventResult::Activated { deleted }),
            LifecycleEvent::Fetch(request) => {
                self.handle_fetch(request).await.map(EventResult::Responded)
            }
            LifecycleEvent::Push(data) => self.handle_push(data).await.map(EventResult::Pushed),
            LifecycleEvent::NotificationClick {
                notification,
                action,
            } => self
                .handle_notification_click(notification, action.as_deref())
                .await
                .map(EventResult::Clicked),
            LifecycleEvent::Sync { tag } => self
                .handle_sync(&tag)
                .await
                .map(|recognized| EventResult::Synced { recognized }),
        }
    }

    // ==================== Install ====================

    /// Open this version's bucket and seed it with the asset manifest.
    ///
    /// Population is all-or-nothing; a failure is logged and reported as
    /// [`InstallOutcome::Degraded`], never retried.
    pub async fn install(&self) -> Result<InstallOutcome, ServiceWorkerError> {
        let _guard = self.lifecycle.lock().await;
        self.expect_state(WorkerState::Installing).await?;

        self.scope.caches.write().await.open(&self.config.cache_name);
        info!(cache = %self.config.cache_name, "Opened cache");

        let outcome = match self.populate().await {
            Ok(cached) => {
                info!(cache = %self.config.cache_name, cached, "Install complete");
                InstallOutcome::Complete { cached }
            }
            Err(e) => {
                warn!(cache = %self.config.cache_name, error = %e, "Cache failed");
                InstallOutcome::Degraded {
                    reason: e.to_string(),
                }
            }
        };

        self.set_state(WorkerState::Installed).await;
        Ok(outcome)
    }

    async fn populate(&self) -> Result<usize, ServiceWorkerError> {
        let requests: Vec<Request> = self
            .config
            .asset_urls()?
            .into_iter()
            .map(Request::get)
            .collect();

        let fetcher = self.scope.fetcher();
        let results = join_all(requests.iter().cloned().map(|r| fetcher.fetch(r))).await;

        let mut fetched = Vec::with_capacity(requests.len());
        for (request, result) in requests.into_iter().zip(results) {
            let response = result.map_err(|e| {
                ServiceWorkerError::NetworkError(format!("{}: {}", request.url, e))
            })?;
            if !response.ok() {
                return Err(ServiceWorkerError::NetworkError(format!(
                    "{} returned {}",
                    request.url, response.status
                )));
            }
            fetched.push((request, response));
        }

        let cached = fetched.len();
        let mut caches = self.scope.caches.write().await;
        let cache = caches.open(&self.config.cache_name);
        for (request, response) in fetched {
            cache.put(&request, response)?;
        }
        Ok(cached)
    }

    // ==================== Activate ====================

    /// Delete every bucket except this version's.
    pub async fn activate(&self) -> Result<Vec<String>, ServiceWorkerError> {
        let _guard = self.lifecycle.lock().await;
        self.expect_state(WorkerState::Installed).await?;

        let deleted = {
            let mut caches = self.scope.caches.write().await;
            let stale: Vec<String> = caches
                .keys()
                .into_iter()
                .filter(|name| *name != self.config.cache_name)
                .map(str::to_string)
                .collect();
            for name in &stale {
                caches.delete(name);
                info!(cache = %name, "Deleted stale cache");
            }
            stale
        };

        self.set_state(WorkerState::Active).await;
        info!(cache = %self.config.cache_name, deleted = deleted.len(), "Worker activated");
        Ok(deleted)
    }

    // ==================== Fetch ====================

    /// Cache-first with network fallback.
    ///
    /// A network failure with no cached entry is returned as an error.
    pub async fn handle_fetch(&self, request: Request) -> Result<Response, ServiceWorkerError> {
        self.ensure_live().await?;

        let cached = {
            let caches = self.scope.caches.read().await;
            caches.match_request(&request).map(CacheEntry::to_response)
        };
        if let Some(response) = cached.and_then(|r| r.or_log("Discarding unreadable cache entry")) {
            trace!(url = %request.url, "Cache hit");
            return Ok(response);
        }

        debug!(url = %request.url, "Cache miss, fetching from network");
        let response = match self.scope.fetcher().fetch(request.clone()).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Fetch failed");
                return Err(e.into());
            }
        };

        if !Self::should_cache(&request, &response) {
            trace!(
                url = %request.url,
                status = %response.status,
                response_type = ?response.response_type,
                "Not caching response"
            );
            return Ok(response);
        }

        // The body is single-read: store a copy, hand back the original.
        let copy = response.clone();
        self.scope
            .caches
            .write()
            .await
            .open(&self.config.cache_name)
            .put(&request, copy)
            .or_log("Failed to cache response");

        Ok(response)
    }

    fn should_cache(request: &Request, response: &Response) -> bool {
        request.is_get() && response.status == StatusCode::OK && response.is_basic()
    }

    // ==================== Push ====================

    /// Build the notification descriptor for a push payload.
    pub fn notification_options(&self, data: Option<&PushMessageData>) -> NotificationOptions {
        let settings = &self.config.notification;
        let button = |action: NotificationAction, title: &str| NotificationActionButton {
            action: action.as_str().to_string(),
            title: title.to_string(),
            icon: Some(settings.icon.clone()),
        };

        NotificationOptions {
            body: data
                .map(PushMessageData::text)
                .unwrap_or_else(|| settings.default_body.clone()),
            icon: Some(settings.icon.clone()),
            badge: Some(settings.badge.clone()),
            vibrate: settings.vibrate.clone(),
            data: Some(NotificationData {
                date_of_arrival: now_millis(),
                primary_key: PRIMARY_KEY.to_string(),
            }),
            actions: vec![
                button(NotificationAction::Explore, &settings.explore_title),
                button(NotificationAction::Close, &settings.close_title),
            ],
        }
    }

    /// Show a notification for a push. Display failures are logged and
    /// yield `None`.
    pub async fn handle_push(
        &self,
        data: Option<PushMessageData>,
    ) -> Result<Option<NotificationId>, ServiceWorkerError> {
        self.ensure_live().await?;

        let options = self.notification_options(data.as_ref());
        let id = self
            .scope
            .notifications
            .write()
            .await
            .show(&self.config.notification.title, options)
            .or_log("Notification display failed");
        Ok(id)
    }

    // ==================== Notification click ====================

    /// Close the notification; the "explore" action also opens a window.
    pub async fn handle_notification_click(
        &self,
        notification: NotificationId,
        action: Option<&str>,
    ) -> Result<ClickOutcome, ServiceWorkerError> {
        self.ensure_live().await?;
        info!(id = %notification, action = ?action, "Notification click received");

        let closed = self.scope.notifications.write().await.close(notification);

        let opened = match action.map(str::parse::<NotificationAction>) {
            Some(Ok(NotificationAction::Explore)) => self
                .scope
                .clients
                .write()
                .await
                .open_window(&self.config.explore_url)
                .or_log("Failed to open window"),
            Some(Ok(NotificationAction::Close)) | None => None,
            Some(Err(e)) => {
                debug!(error = %e, "Ignoring unknown notification action");
                None
            }
        };

        Ok(ClickOutcome { closed, opened })
    }

    // ==================== Sync ====================

    /// Acknowledge a background sync tag. Nothing is replayed.
    pub async fn handle_sync(&self, tag: &str) -> Result<bool, ServiceWorkerError> {
        self.ensure_live().await?;

        if tag == self.config.sync_tag {
            info!(tag, "Background sync triggered");
            Ok(true)
        } else {
            debug!(tag, "Ignoring unrecognized sync tag");
            Ok(false)
        }
    }
}
