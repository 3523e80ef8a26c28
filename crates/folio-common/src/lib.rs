//! # Folio Common
//!
//! Shared utilities for the Folio offline layer.
//!
//! ## Features
//!
//! - Logging configuration and setup
//! - Best-effort result handling (log and move on)

use std::fmt::Display;

use tracing::warn;

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat};

/// Extension trait for operations whose failure is logged and then ignored.
///
/// Lifecycle handlers never retry and never escalate; a failure is reported
/// once at `warn` level with the given context and the caller continues with
/// `None`.
pub trait BestEffort<T> {
    /// Log the error (if any) under `context` and discard it.
    fn or_log(self, context: &str) -> Option<T>;
}

impl<T, E: Display> BestEffort<T> for Result<T, E> {
    fn or_log(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "{}", context);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_log_passes_value_through() {
        let ok: Result<i32, String> = Ok(42);
        assert_eq!(ok.or_log("should not log"), Some(42));
    }

    #[test]
    fn test_or_log_discards_error() {
        let err: Result<i32, String> = Err("boom".to_string());
        assert_eq!(err.or_log("Cache failed"), None);
    }

    #[test]
    fn test_or_log_unit_result() {
        let err: Result<(), std::io::Error> = Err(std::io::Error::other("disk full"));
        assert!(err.or_log("Persist failed").is_none());
    }
}
