//! Folio Core Library
//!
//! This crate provides the site configuration and shared error type for the
//! portfolio's offline layer.

pub mod config;
pub mod error;

pub use config::{CacheSettings, NotificationSettings, SiteConfig};
pub use error::{FolioError, FolioResult};
