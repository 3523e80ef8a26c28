//! Worker generations for one site.
//!
//! A new version installs into the `waiting` slot while the current worker
//! keeps serving. Activating it purges the old bucket and supersedes the old
//! worker.

use std::sync::Arc;

use folio_net::{Request, Response};
use tracing::info;

use crate::scope::WorkerScope;
use crate::worker::{AssetCacheManager, InstallOutcome, WorkerConfig};
use crate::ServiceWorkerError;

/// A service worker registration.
pub struct Registration {
    scope: WorkerScope,

    /// Installed but not yet active.
    waiting: Option<Arc<AssetCacheManager>>,

    /// Active worker.
    active: Option<Arc<AssetCacheManager>>,
}

impl Registration {
    pub fn new(scope: WorkerScope) -> Self {
        Self {
            scope,
            waiting: None,
            active: None,
        }
    }

    pub fn scope(&self) -> &WorkerScope {
        &self.scope
    }

    /// Get the active worker.
    pub fn active(&self) -> Option<&Arc<AssetCacheManager>> {
        self.active.as_ref()
    }

    /// Get the waiting worker.
    pub fn waiting(&self) -> Option<&Arc<AssetCacheManager>> {
        self.waiting.as_ref()
    }

    /// Install a worker for `config` and park it in the waiting slot.
    ///
    /// A worker already waiting is superseded by the new one.
    pub async fn update(
        &mut self,
        config: WorkerConfig,
    ) -> Result<InstallOutcome, ServiceWorkerError> {
        let worker = Arc::new(AssetCacheManager::new(config, self.scope.clone()));
        info!(worker = ?worker.id(), cache = %worker.cache_name(), "Update found");

        let outcome = worker.install().await?;

        if let Some(previous) = self.waiting.replace(worker) {
            previous.supersede().await;
        }
        Ok(outcome)
    }

    /// Promote the waiting worker and retire the active one.
    ///
    /// Returns the names of the deleted buckets.
    pub async fn activate(&mut self) -> Result<Vec<String>, ServiceWorkerError> {
        let worker = self
            .waiting
            .clone()
            .ok_or_else(|| ServiceWorkerError::StateError("no waiting worker".to_string()))?;

        // Stays waiting if activation fails.
        let deleted = worker.activate().await?;
        self.waiting = None;

        if let Some(old) = self.active.replace(worker) {
            old.supersede().await;
        }
        Ok(deleted)
    }

    /// Install and immediately activate.
    pub async fn install_and_activate(
        &mut self,
        config: WorkerConfig,
    ) -> Result<(InstallOutcome, Vec<String>), ServiceWorkerError> {
        let outcome = self.update(config).await?;
        let deleted = self.activate().await?;
        Ok((outcome, deleted))
    }

    /// Route a request through the active worker, or straight to the
    /// network when nothing is active.
    pub async fn handle_fetch(&self, request: Request) -> Result<Response, ServiceWorkerError> {
        match self.active {
            Some(ref worker) => worker.handle_fetch(request).await,
            None => Ok(self.scope.fetcher().fetch(request).await?),
        }
    }

    /// Retire every worker. Cache buckets are left in place.
    pub async fn unregister(&mut self) {
        for worker in [self.waiting.take(), self.active.take()].into_iter().flatten() {
            worker.supersede().await;
        }
    }
}
