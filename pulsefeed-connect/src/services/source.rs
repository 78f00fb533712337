//! Upstream client interface
//!
//! The orchestrator never hardcodes endpoint knowledge; it resolves accessor
//! names from the registry and calls through this trait. Implementations
//! decide what an accessor means (an HTTP route, a fixture table in tests).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by a single upstream accessor call
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("API error {0}: {1}")]
    Upstream(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Unknown accessor: {0}")]
    UnknownAccessor(String),
}

/// Capability interface of the upstream API client
///
/// A call that succeeds with `Value::Null`, an empty array or an empty
/// object means "no data available" for that unit; callers must not treat
/// it as a failure.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Whether this source knows the given accessor name
    fn supports(&self, accessor: &str) -> bool;

    /// Fetch a daily metric for one calendar date
    async fn fetch_daily(&self, accessor: &str, date: NaiveDate) -> Result<Value, SourceError>;

    /// Fetch a metric for an inclusive date range in one call
    async fn fetch_range(
        &self,
        accessor: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, SourceError>;

    /// Fetch a metric that takes no arguments (current snapshot)
    async fn fetch_simple(&self, accessor: &str) -> Result<Value, SourceError>;

    /// List unit identifiers (e.g. activity ids) for a date range
    async fn list_units(
        &self,
        accessor: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, SourceError>;

    /// Fetch the detail or a sub-resource payload for one unit
    async fn fetch_unit(&self, accessor: &str, unit_id: &str) -> Result<Value, SourceError>;
}

/// True when an upstream result carries no data for its unit
pub fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
