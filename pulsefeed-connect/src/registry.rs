//! Declarative metric registry
//!
//! Maps metric names to their upstream accessor, retrieval strategy and
//! description. Loaded once from a TOML file at startup and read-only
//! thereafter; malformed entries fail the load, not the first lookup.
//!
//! File format:
//!
//! ```toml
//! unit_list_accessor = "activities"
//! unit_id_field = "activityId"
//!
//! [metrics.sleep]
//! accessor = "sleep"
//! strategy = "daily"
//! description = "Nightly sleep summary"
//!
//! [shape_mappings]
//! stressValuesArray = ["timestamp", "type", "value", "score"]
//! ```

use crate::models::{MetricDescriptor, StrategyKind};
use pulsefeed_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

fn default_unit_list_accessor() -> String {
    "activities".to_string()
}

fn default_unit_id_field() -> String {
    "id".to_string()
}

/// Raw registry file contents
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default = "default_unit_list_accessor")]
    unit_list_accessor: String,
    #[serde(default = "default_unit_id_field")]
    unit_id_field: String,
    #[serde(default)]
    metrics: HashMap<String, RawDescriptor>,
    #[serde(default)]
    shape_mappings: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    accessor: String,
    strategy: String,
    #[serde(default)]
    description: String,
}

/// Immutable metric registry
#[derive(Debug)]
pub struct MetricRegistry {
    metrics: HashMap<String, MetricDescriptor>,
    unit_list_accessor: String,
    unit_id_field: String,
    shape_mappings: HashMap<String, Vec<String>>,
}

impl MetricRegistry {
    /// Load and validate a registry file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read registry file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate registry TOML
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: RegistryFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid registry TOML: {}", e)))?;

        let mut metrics = HashMap::with_capacity(file.metrics.len());
        for (name, raw) in file.metrics {
            let descriptor = validate_descriptor(&name, raw)?;
            metrics.insert(name, descriptor);
        }

        Ok(Self {
            metrics,
            unit_list_accessor: file.unit_list_accessor,
            unit_id_field: file.unit_id_field,
            shape_mappings: file.shape_mappings,
        })
    }

    /// Look up a metric descriptor by name
    pub fn resolve(&self, name: &str) -> Result<&MetricDescriptor> {
        self.metrics
            .get(name)
            .ok_or_else(|| Error::Config(format!("Unknown metric '{}'", name)))
    }

    /// All registered metric names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.metrics.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Accessor used to list units for the two-phase strategies
    pub fn unit_list_accessor(&self) -> &str {
        &self.unit_list_accessor
    }

    /// Key holding the unit id inside each listing element
    pub fn unit_id_field(&self) -> &str {
        &self.unit_id_field
    }

    /// Known multi-column array mappings for the shape normalizer
    pub fn shape_mappings(&self) -> &HashMap<String, Vec<String>> {
        &self.shape_mappings
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

fn validate_descriptor(name: &str, raw: RawDescriptor) -> Result<MetricDescriptor> {
    if name.trim().is_empty() {
        return Err(Error::Config("Metric name must not be empty".to_string()));
    }

    let strategy = parse_strategy(&raw.strategy)
        .ok_or_else(|| {
            Error::Config(format!(
                "Metric '{}' has unknown strategy '{}'",
                name, raw.strategy
            ))
        })?;

    let descriptor = MetricDescriptor {
        name: name.to_string(),
        accessor: raw.accessor,
        strategy,
        description: raw.description,
    };

    if descriptor.accessors().is_empty() || descriptor.accessor.trim().is_empty() {
        return Err(Error::Config(format!(
            "Metric '{}' has an empty accessor",
            name
        )));
    }

    Ok(descriptor)
}

fn parse_strategy(value: &str) -> Option<StrategyKind> {
    match value {
        "daily" => Some(StrategyKind::Daily),
        "range" => Some(StrategyKind::Range),
        "simple" => Some(StrategyKind::Simple),
        "unit_detail" => Some(StrategyKind::UnitDetail),
        "unit_subdata" => Some(StrategyKind::UnitSubdata),
        _ => None,
    }
}
