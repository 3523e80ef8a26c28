//! Cache buckets and the storage that holds them.
//!
//! ```text
//! CacheStorage (caches)
//!     └── Cache "rezaul-karim-portfolio-v1"
//!             └── request URL → CacheEntry
//! ```

use std::path::Path;

use bytes::Bytes;
use folio_net::{Request, Response, ResponseType};
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use url::Url;

use crate::{now_millis, ServiceWorkerError};

/// File holding the persisted buckets inside a cache directory.
pub const SNAPSHOT_FILE: &str = "caches.json";

// ==================== Cache Entry ====================

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers in arrival order. Repeated names are kept.
    pub headers: Vec<StoredHeader>,

    /// Response body.
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,

    /// Response type at the time it was stored.
    pub response_type: ResponseType,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

/// One response header. The value is raw bytes, base64 on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredHeader {
    pub name: String,
    #[serde(with = "body_base64")]
    pub value: Vec<u8>,
}

/// Key a request is stored under: the URL without its fragment.
pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

impl CacheEntry {
    /// Build an entry from a request and a response copy. Reads the body.
    pub fn from_response(request: &Request, response: Response) -> Self {
        let headers = response
            .headers
            .iter()
            .map(|(name, value)| StoredHeader {
                name: name.as_str().to_string(),
                value: value.as_bytes().to_vec(),
            })
            .collect();

        Self {
            url: cache_key(&request.url),
            method: request.method.to_string(),
            status: response.status.as_u16(),
            headers,
            response_type: response.response_type,
            cached_at: now_millis(),
            body: response.bytes().to_vec(),
        }
    }

    /// Rebuild a response to hand back to the page.
    pub fn to_response(&self) -> Result<Response, ServiceWorkerError> {
        let url = Url::parse(&self.url)
            .map_err(|e| ServiceWorkerError::CacheError(format!("{}: {}", self.url, e)))?;
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| ServiceWorkerError::CacheError(e.to_string()))?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for header in &self.headers {
            let name = HeaderName::from_bytes(header.name.as_bytes())
                .map_err(|e| ServiceWorkerError::CacheError(format!("{}: {}", header.name, e)))?;
            let value = HeaderValue::from_bytes(&header.value)
                .map_err(|e| ServiceWorkerError::CacheError(format!("{}: {}", header.name, e)))?;
            headers.append(name, value);
        }

        let mut response = Response::new(
            url,
            status,
            headers,
            Bytes::from(self.body.clone()),
            self.response_type,
        );
        response.from_cache = true;
        Ok(response)
    }
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// ==================== Cache ====================

/// A named cache bucket.
#[derive(Debug, Default, Clone)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries keyed by request URL.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request by URL, ignoring the fragment. Only GET requests match.
    pub fn match_request(&self, request: &Request) -> Option<&CacheEntry> {
        if !request.is_get() {
            return None;
        }
        self.match_url(&cache_key(&request.url))
    }

    /// Match by exact key (see [`cache_key`]).
    pub fn match_url(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Store a response for a request. Only GET requests can be stored.
    pub fn put(&mut self, request: &Request, response: Response) -> Result<(), ServiceWorkerError> {
        if !request.is_get() {
            return Err(ServiceWorkerError::CacheError(format!(
                "cannot cache {} request for {}",
                request.method, request.url
            )));
        }
        self.put_entry(CacheEntry::from_response(request, response));
        Ok(())
    }

    /// Insert a prepared entry, replacing any entry with the same URL.
    pub fn put_entry(&mut self, entry: CacheEntry) {
        trace!(cache = %self.name, url = %entry.url, "Cache put");
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Delete entry.
    pub fn delete(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    /// Get all keys (URLs).
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==================== Cache Storage ====================

/// Cache storage (the `caches` global).
///
/// Remembers creation order: cross-bucket matches check the oldest bucket
/// first.
#[derive(Debug, Default, Clone)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
    order: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct CacheSnapshot {
    name: String,
    entries: Vec<CacheEntry>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        if !self.caches.contains_key(name) {
            debug!(cache = name, "Creating cache bucket");
            self.order.push(name.to_string());
        }
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Get a cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.caches.remove(name).is_some()
    }

    /// All cache names, oldest first.
    pub fn keys(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Match across all caches, oldest first.
    pub fn match_request(&self, request: &Request) -> Option<&CacheEntry> {
        self.order
            .iter()
            .filter_map(|name| self.caches.get(name))
            .find_map(|cache| cache.match_request(request))
    }

    /// Write every bucket to `dir/caches.json`.
    pub fn save(&self, dir: &Path) -> Result<(), ServiceWorkerError> {
        let snapshot: Vec<CacheSnapshot> = self
            .order
            .iter()
            .filter_map(|name| self.caches.get(name))
            .map(|cache| CacheSnapshot {
                name: cache.name.clone(),
                entries: cache.entries.values().cloned().collect(),
            })
            .collect();

        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| ServiceWorkerError::PersistenceError(e.to_string()))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| ServiceWorkerError::PersistenceError(e.to_string()))?;
        let path = dir.join(SNAPSHOT_FILE);
        std::fs::write(&path, json)
            .map_err(|e| ServiceWorkerError::PersistenceError(e.to_string()))?;

        info!(path = %path.display(), buckets = snapshot.len(), "Saved cache storage");
        Ok(())
    }

    /// Load buckets from `dir/caches.json`. A missing file yields empty storage.
    pub fn load(dir: &Path) -> Result<Self, ServiceWorkerError> {
        let path = dir.join(SNAPSHOT_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "No cache snapshot, starting empty");
            return Ok(Self::new());
        }

        let json = std::fs::read(&path)
            .map_err(|e| ServiceWorkerError::PersistenceError(e.to_string()))?;
        let snapshot: Vec<CacheSnapshot> = serde_json::from_slice(&json)
            .map_err(|e| ServiceWorkerError::PersistenceError(e.to_string()))?;

        let mut storage = Self::new();
        for bucket in snapshot {
            let cache = storage.open(&bucket.name);
            for entry in bucket.entries {
                cache.put_entry(entry);
            }
        }

        info!(path = %path.display(), buckets = storage.order.len(), "Loaded cache storage");
        Ok(storage)
    }
}
