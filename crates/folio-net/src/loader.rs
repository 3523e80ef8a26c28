//! Network fetching.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, trace};
use url::Url;

use crate::{NetError, Request, Response, ResponseType};

/// Anything that can turn a [`Request`] into a [`Response`].
///
/// The service worker reaches the network only through this trait.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Transport failures are errors; HTTP error
    /// statuses are successful fetches.
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}

/// Resource loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string.
    pub user_agent: String,
    /// Origin of the page issuing requests; decides response types.
    pub origin: Option<Url>,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("Folio/{}", env!("CARGO_PKG_VERSION")),
            origin: None,
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

impl LoaderConfig {
    /// Bind the loader to a requesting origin.
    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// reqwest-backed [`Fetcher`].
pub struct ResourceLoader {
    client: Client,
    config: LoaderConfig,
}

impl ResourceLoader {
    /// Create a new resource loader.
    pub fn new(config: LoaderConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        info!(origin = ?config.origin.as_ref().map(Url::as_str), "ResourceLoader initialized");

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    fn map_error(&self, request: &Request, error: reqwest::Error) -> NetError {
        if error.is_timeout() {
            NetError::Timeout(request.timeout.unwrap_or(self.config.default_timeout))
        } else if error.is_connect() {
            NetError::Offline(format!("{}: {}", request.url, error))
        } else {
            NetError::HttpError(error)
        }
    }
}

#[async_trait]
impl Fetcher for ResourceLoader {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        if let Some(ref body) = request.body {
            req_builder = req_builder.body(body.clone());
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| self.map_error(&request, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let redirected = url != request.url;

        let response_type =
            ResponseType::classify(self.config.origin.as_ref(), &url, request.mode);

        if response_type == ResponseType::Opaque {
            trace!(url = %url, "Opaque response, body withheld");
            let mut opaque = Response::opaque(url);
            opaque.redirected = redirected;
            return Ok(opaque);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(&request, e))?;

        trace!(
            url = %url,
            status = %status,
            response_type = ?response_type,
            body_len = body.len(),
            "Response received"
        );

        let mut response = Response::new(url, status, headers, body, response_type);
        response.redirected = redirected;
        Ok(response)
    }
}
