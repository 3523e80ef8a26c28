//! Site and worker configuration

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{FolioError, FolioResult};

/// Top-level configuration for the portfolio's offline layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Origin the site is served from
    pub origin: String,

    /// Cache bucket naming and the asset manifest
    pub cache: CacheSettings,

    /// Push notification presentation
    pub notification: NotificationSettings,

    /// Background sync tag the worker recognizes
    pub sync_tag: String,

    /// Directory where cache buckets are persisted between runs
    pub cache_dir: PathBuf,

    /// User agent string for network fetches
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Bucket name prefix, e.g. "rezaul-karim-portfolio"
    pub prefix: String,

    /// Bumped whenever the manifest or caching logic changes
    pub version: u32,

    /// Root-relative asset paths cached on install, in order
    pub manifest: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub title: String,

    /// Body used when a push carries no payload
    pub default_body: String,

    pub icon: String,
    pub badge: String,

    /// Vibration pattern in milliseconds
    pub vibrate: Vec<u32>,

    /// Page opened by the "explore" action
    pub explore_url: String,
    pub explore_title: String,
    pub close_title: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "https://rksazid.onrender.com".to_string(),
            cache: CacheSettings::default(),
            notification: NotificationSettings::default(),
            sync_tag: "background-sync".to_string(),
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("folio"),
            user_agent: format!("Folio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            prefix: "rezaul-karim-portfolio".to_string(),
            version: 1,
            manifest: [
                "/",
                "/index.html",
                "/assets/css/johndoe.css",
                "/assets/css/modern-styles.css",
                "/assets/js/johndoe.js",
                "/assets/vendors/themify-icons/css/themify-icons.css",
                "/assets/vendors/bootstrap/bootstrap.bundle.js",
                "/assets/vendors/jquery/jquery-3.4.1.min.js",
                "/assets/vendors/isotope/isotope.pkgd.js",
                "/assets/imgs/avatar.png",
                "/assets/imgs/header.png",
                "/manifest.json",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            title: "MD. Rezaul Karim".to_string(),
            default_body: "New update from Rezaul Karim".to_string(),
            icon: "/assets/imgs/avatar.png".to_string(),
            badge: "/assets/imgs/avatar.png".to_string(),
            vibrate: vec![100, 50, 100],
            explore_url: "https://rksazid.onrender.com/".to_string(),
            explore_title: "View Portfolio".to_string(),
            close_title: "Close".to_string(),
        }
    }
}

impl CacheSettings {
    /// Version-qualified bucket name, e.g. "rezaul-karim-portfolio-v1".
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.prefix, self.version)
    }
}

impl SiteConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> FolioResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        info!(path = %path.display(), cache = %config.cache_name(), "Loaded site config");
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> FolioResult<Self> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                debug!(path = %p.display(), "Config file missing, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate configuration from a JSON string.
    pub fn from_json(json: &str) -> FolioResult<Self> {
        let config: SiteConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a JSON file.
    pub fn save(&self, path: &Path) -> FolioResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Name of the bucket this configuration makes authoritative.
    pub fn cache_name(&self) -> String {
        self.cache.cache_name()
    }

    /// Parsed site origin.
    pub fn origin_url(&self) -> FolioResult<Url> {
        let url = Url::parse(&self.origin)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FolioError::config(format!(
                "origin must be http(s): {}",
                self.origin
            )));
        }
        Ok(url)
    }

    /// Parsed URL opened by the "explore" notification action.
    pub fn explore_url(&self) -> FolioResult<Url> {
        Ok(Url::parse(&self.notification.explore_url)?)
    }

    /// Check the configuration for values the worker cannot use.
    pub fn validate(&self) -> FolioResult<()> {
        if self.cache.prefix.trim().is_empty() {
            return Err(FolioError::config("cache prefix must not be empty"));
        }

        let mut seen = HashSet::new();
        for path in &self.cache.manifest {
            if !path.starts_with('/') {
                return Err(FolioError::config(format!(
                    "manifest entry is not root-relative: {path}"
                )));
            }
            if !seen.insert(path.as_str()) {
                return Err(FolioError::config(format!(
                    "duplicate manifest entry: {path}"
                )));
            }
        }

        self.origin_url()?;
        self.explore_url()?;
        Ok(())
    }
}
