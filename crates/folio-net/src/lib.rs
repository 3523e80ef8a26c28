//! # Folio Net
//!
//! Request/response model and network fetching for the Folio offline layer.
//!
//! ## Design Goals
//!
//! 1. **Fetch-shaped types**: requests carry a mode, responses carry a type
//!    (`basic`, `cors`, `opaque`) so cache policy can be decided per response
//! 2. **Single-read bodies**: reading a body consumes the response; callers
//!    that need the body twice clone first
//! 3. **Swappable network**: everything above this crate talks to a
//!    [`Fetcher`], so hosts and tests can provide their own

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use mime::Mime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub mod loader;

pub use loader::{Fetcher, LoaderConfig, ResourceLoader};

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network unavailable: {0}")]
    Offline(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Request mode, deciding how cross-origin responses are exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Cross-origin responses come back opaque.
    NoCors,
    /// Cross-origin responses are readable.
    #[default]
    Cors,
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            mode: RequestMode::default(),
            timeout: None,
        }
    }

    /// Create a POST request.
    pub fn post(url: Url, body: Bytes) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(url)
        }
    }

    /// Parse `url` and create a GET request.
    pub fn parse(url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|e| NetError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::get(url))
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request mode.
    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Whether this is a GET request.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// How much of a response the requesting page may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response, fully readable.
    Basic,
    /// Cross-origin response obtained with CORS.
    Cors,
    /// Cross-origin no-cors response; status, headers and body are hidden.
    Opaque,
    /// Network error.
    Error,
}

impl ResponseType {
    /// Classify a response by comparing its final URL with the requesting origin.
    ///
    /// Without a requesting origin every response is treated as same-origin.
    pub fn classify(origin: Option<&Url>, response_url: &Url, mode: RequestMode) -> Self {
        let same_origin = origin.map_or(true, |o| o.origin() == response_url.origin());
        match (same_origin, mode) {
            (true, _) => Self::Basic,
            (false, RequestMode::NoCors) => Self::Opaque,
            (false, _) => Self::Cors,
        }
    }
}

/// HTTP response.
///
/// The body can be read once: [`Response::bytes`] and [`Response::text`]
/// consume the response. Clone it first to keep a copy.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub response_type: ResponseType,
    pub redirected: bool,
    /// Served from a cache bucket rather than the network.
    pub from_cache: bool,
    body: Bytes,
}

impl Response {
    /// Create a response.
    pub fn new(
        url: Url,
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        response_type: ResponseType,
    ) -> Self {
        Self {
            url,
            status,
            headers,
            response_type,
            redirected: false,
            from_cache: false,
            body,
        }
    }

    /// Create a same-origin `200 OK` response.
    pub fn basic(url: Url, body: impl Into<Bytes>) -> Self {
        Self::new(
            url,
            StatusCode::OK,
            HeaderMap::new(),
            body.into(),
            ResponseType::Basic,
        )
    }

    /// Create an opaque response. Status is 0 in fetch terms; represented
    /// here with an empty body and headers and a `200` placeholder that
    /// callers must not rely on.
    pub fn opaque(url: Url) -> Self {
        Self::new(
            url,
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::new(),
            ResponseType::Opaque,
        )
    }

    /// Set the status.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set the response type.
    pub fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Check if request was successful (2xx).
    pub fn ok(&self) -> bool {
        self.response_type != ResponseType::Opaque && self.status.is_success()
    }

    /// Same-origin, non-opaque response.
    pub fn is_basic(&self) -> bool {
        self.response_type == ResponseType::Basic
    }

    /// Parsed Content-Type header.
    pub fn content_type(&self) -> Option<Mime> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Mime>().ok())
    }

    /// Body length without reading it.
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Get the body as bytes.
    pub fn bytes(self) -> Bytes {
        self.body
    }

    /// Get the body as text.
    pub fn text(self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}
