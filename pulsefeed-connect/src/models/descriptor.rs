//! Metric descriptors and retrieval strategy kinds

use serde::{Deserialize, Serialize};

/// Retrieval pattern used to fetch a metric from the upstream source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One call per calendar date in the requested range
    Daily,
    /// Single call covering the whole date range
    Range,
    /// Single call with no arguments (current snapshot)
    Simple,
    /// List units for the range, then one detail call per unit
    UnitDetail,
    /// List units for the range, then one call per (unit, sub-resource)
    UnitSubdata,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Daily => "daily",
            StrategyKind::Range => "range",
            StrategyKind::Simple => "simple",
            StrategyKind::UnitDetail => "unit_detail",
            StrategyKind::UnitSubdata => "unit_subdata",
        }
    }
}

/// One entry of the metric registry
///
/// For `UnitSubdata` metrics the `accessor` field carries a comma-separated
/// list of secondary accessor names; each sub-result is merged into the unit
/// record under a key named after its accessor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// Unique metric name (registry key)
    pub name: String,
    /// Upstream accessor identifier(s)
    pub accessor: String,
    /// Retrieval strategy
    pub strategy: StrategyKind,
    /// Human description
    pub description: String,
}

impl MetricDescriptor {
    /// Accessor names this descriptor resolves against the upstream source
    pub fn accessors(&self) -> Vec<&str> {
        match self.strategy {
            StrategyKind::UnitSubdata => self
                .accessor
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect(),
            _ => vec![self.accessor.as_str()],
        }
    }
}
