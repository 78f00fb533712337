//! Fetch requests, tagged output records and the run report

use crate::error::{FetchError, FetchResult};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use uuid::Uuid;

/// One fetch invocation: which metrics, over which inclusive date range
///
/// Metric names are kept in a BTreeSet so a run processes metrics in a
/// deterministic order.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub metric_names: BTreeSet<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl FetchRequest {
    pub fn new<I, S>(metric_names: I, start_date: NaiveDate, end_date: NaiveDate) -> FetchResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if start_date > end_date {
            return Err(FetchError::Config(format!(
                "start date {} is after end date {}",
                start_date, end_date
            )));
        }
        Ok(Self {
            metric_names: metric_names.into_iter().map(Into::into).collect(),
            start_date,
            end_date,
        })
    }

    /// Range tag used for records and failures that span the whole request
    pub fn range_tag(&self) -> String {
        format!("{}..{}", self.start_date, self.end_date)
    }
}

/// The unit of output: one normalized payload tagged with its metric and
/// originating unit (a calendar date or an upstream unit id)
#[derive(Debug, Clone, Serialize)]
pub struct TaggedRecord {
    pub metric: String,
    pub unit_id: String,
    pub payload: Value,
}

impl TaggedRecord {
    pub fn new(metric: &str, unit_id: &str, payload: Value) -> Self {
        Self {
            metric: metric.to_string(),
            unit_id: unit_id.to_string(),
            payload,
        }
    }

    /// Serialize to one compact JSON line (without trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Classification of an isolated per-unit failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Upstream call exceeded the configured bound
    Timeout,
    /// Upstream returned a rate-limit response
    RateLimited,
    /// Upstream returned a server error
    Upstream,
    /// Transport-level failure
    Network,
    /// Response body could not be decoded
    Parse,
}

/// One entry of the failure manifest
#[derive(Debug, Clone, Serialize)]
pub struct FailureEntry {
    pub unit_id: String,
    pub metric: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Emitted by the shape normalizer when an unmapped array-of-arrays with
/// arity above two degrades to positional keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShapeWarning {
    /// `$`-rooted path of the offending array
    pub path: String,
    /// Arity of the inner arrays at that site
    pub arity: usize,
}

/// A shape warning paired with the metric it occurred in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningEntry {
    pub metric: String,
    pub path: String,
    pub arity: usize,
}

/// Aggregate result of one orchestrator run
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub records: Vec<TaggedRecord>,
    pub failures: Vec<FailureEntry>,
    pub warnings: Vec<WarningEntry>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            records: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
