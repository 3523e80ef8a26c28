//! Shared fixtures for worker tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use folio_core::SiteConfig;
use folio_net::{Fetcher, NetError, Request, Response};
use folio_sw::{AssetCacheManager, WorkerConfig, WorkerScope};
use http::StatusCode;
use url::Url;

/// In-memory network: URL → canned response, with an offline switch.
#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, response: Response) {
        self.routes
            .lock()
            .unwrap()
            .insert(response.url.to_string(), response);
    }

    pub fn route_text(&self, url: &str, body: &str) {
        self.route(Response::basic(Url::parse(url).unwrap(), body.to_string()));
    }

    pub fn unroute(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    /// Serve every manifest asset with its path as the body.
    pub fn serve_manifest(&self, config: &WorkerConfig) {
        for (path, url) in config
            .asset_manifest
            .iter()
            .zip(config.asset_urls().unwrap())
        {
            self.route(Response::basic(url, path.clone()));
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::Offline(request.url.to_string()));
        }

        let routed = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        Ok(routed.unwrap_or_else(|| {
            Response::basic(request.url.clone(), "not found").with_status(StatusCode::NOT_FOUND)
        }))
    }
}

pub const ORIGIN: &str = "https://rksazid.onrender.com";

pub fn site(version: u32) -> SiteConfig {
    let mut site = SiteConfig::default();
    site.origin = ORIGIN.to_string();
    site.cache.version = version;
    site
}

pub fn worker_config(version: u32) -> WorkerConfig {
    WorkerConfig::from_site(&site(version)).unwrap()
}

pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn get(path: &str) -> Request {
    Request::get(url(path))
}

/// A worker over a fresh scope whose network serves the manifest.
pub fn worker(version: u32) -> (Arc<MockFetcher>, AssetCacheManager) {
    let fetcher = MockFetcher::new();
    let config = worker_config(version);
    fetcher.serve_manifest(&config);
    let scope = WorkerScope::new(fetcher.clone());
    (fetcher, AssetCacheManager::new(config, scope))
}
