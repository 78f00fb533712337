//! Configuration resolution for pulsefeed-connect
//!
//! Settings load from a TOML file (discovered via pulsefeed-common) and are
//! overridden by `PULSEFEED_*` environment variables. The API token follows
//! ENV > TOML priority with a warning when both are set, so a stale file
//! value never silently shadows the operator's environment.

use pulsefeed_common::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ENV_BASE_URL: &str = "PULSEFEED_BASE_URL";
const ENV_API_TOKEN: &str = "PULSEFEED_API_TOKEN";
const ENV_REGISTRY_FILE: &str = "PULSEFEED_REGISTRY_FILE";
const ENV_OUTPUT_FILE: &str = "PULSEFEED_OUTPUT_FILE";

/// Connector service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Upstream API base URL
    pub base_url: String,
    /// Pre-provisioned bearer token (TOML tier; ENV overrides)
    pub api_token: Option<String>,
    /// Metric registry file
    pub registry_file: PathBuf,
    /// NDJSON output file
    pub output_file: PathBuf,
    /// Minimum interval between upstream calls
    pub pacing_ms: u64,
    /// Per-call timeout bound
    pub call_timeout_secs: u64,
    /// Endpoint template overrides, merged over the compiled defaults
    pub endpoints: HashMap<String, String>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com".to_string(),
            api_token: None,
            registry_file: PathBuf::from("registry.toml"),
            output_file: PathBuf::from("records.ndjson"),
            pacing_ms: 1000,
            call_timeout_secs: 30,
            endpoints: HashMap::new(),
        }
    }
}

impl ConnectConfig {
    /// Load configuration: TOML file (if any) with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
                })?;
                let config: ConnectConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            None => {
                info!("No configuration file, using compiled defaults");
                ConnectConfig::default()
            }
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `PULSEFEED_*` environment overrides
    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var(ENV_BASE_URL) {
            if !value.trim().is_empty() {
                self.base_url = value;
            }
        }
        if let Ok(value) = std::env::var(ENV_REGISTRY_FILE) {
            if !value.trim().is_empty() {
                self.registry_file = PathBuf::from(value);
            }
        }
        if let Ok(value) = std::env::var(ENV_OUTPUT_FILE) {
            if !value.trim().is_empty() {
                self.output_file = PathBuf::from(value);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.call_timeout_secs == 0 {
            return Err(Error::Config(
                "call_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint table: compiled defaults overlaid with configured overrides
    pub fn endpoint_table(&self) -> HashMap<String, String> {
        let mut table = default_endpoints();
        for (accessor, template) in &self.endpoints {
            table.insert(accessor.clone(), template.clone());
        }
        table
    }
}

/// Resolve the upstream API token from ENV > TOML priority
///
/// Returns `None` when no tier holds a usable token; the connector then
/// talks to the upstream anonymously (some endpoints allow it).
pub fn resolve_api_token(config: &ConnectConfig) -> Option<String> {
    let env_token = std::env::var(ENV_API_TOKEN).ok().filter(|t| is_valid_token(t));
    let toml_token = config.api_token.as_deref().filter(|t| is_valid_token(t));

    if env_token.is_some() && toml_token.is_some() {
        warn!(
            "API token found in both environment and config file. Using environment (highest priority)."
        );
    }

    if let Some(token) = env_token {
        info!("API token loaded from environment variable");
        return Some(token);
    }

    if let Some(token) = toml_token {
        info!("API token loaded from config file");
        return Some(token.to_string());
    }

    warn!(
        "No API token configured. Set {} or api_token in the config file.",
        ENV_API_TOKEN
    );
    None
}

/// Validate a token (non-empty, non-whitespace)
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

/// Compiled default endpoint templates for the shipped registry
pub fn default_endpoints() -> HashMap<String, String> {
    let table = [
        ("sleep", "/wellness/v2/daily-sleep/{date}"),
        ("steps", "/wellness/v2/daily-steps/{date}"),
        ("heart_rate", "/wellness/v2/daily-heart-rate/{date}"),
        ("stress", "/wellness/v2/daily-stress/{date}"),
        ("body_battery", "/wellness/v2/body-battery?from={start}&to={end}"),
        ("user_profile", "/user/v1/profile"),
        ("activities", "/activities/v1/search?from={start}&to={end}"),
        ("activity", "/activities/v1/{unit}"),
        ("activity_splits", "/activities/v1/{unit}/splits"),
        ("activity_weather", "/activities/v1/{unit}/weather"),
        ("recently_played", "/music/v1/recently-played?from={start}&to={end}"),
    ];

    table
        .into_iter()
        .map(|(accessor, template)| (accessor.to_string(), template.to_string()))
        .collect()
}
