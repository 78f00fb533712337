//! Error types for pulsefeed-connect
//!
//! Only two error classes abort a fetch run: configuration mistakes
//! (unknown metric, unknown accessor, bad date range) and upstream
//! authentication failures, which would recur on every subsequent call.
//! Everything else is isolated per unit and lands in the failure manifest
//! of the run report.

use thiserror::Error;

/// Fatal connector error
#[derive(Debug, Error)]
pub enum FetchError {
    /// Malformed or missing configuration; aborts before any fetching
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream authentication/session failure; aborts the remaining run
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Output sink error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// pulsefeed-common error
    #[error(transparent)]
    Common(#[from] pulsefeed_common::Error),
}

/// Result type for connector operations
pub type FetchResult<T> = Result<T, FetchError>;
