//! HTTP implementation of the upstream client interface
//!
//! Accessor names resolve through an endpoint table of URL path templates
//! with `{date}`, `{start}`, `{end}` and `{unit}` placeholders. Status
//! codes map onto the connector error taxonomy: 401/403 escalate as auth
//! failures, 404 and empty bodies mean "no data", 429 is a rate-limit
//! response, everything else non-2xx is an upstream error.
//!
//! Session establishment is out of scope; a pre-provisioned bearer token
//! from configuration is attached as-is.

use crate::services::source::{MetricSource, SourceError};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const USER_AGENT: &str = "pulsefeed-connect/0.1.0";

/// Upstream client over HTTP with a configurable endpoint table
pub struct HttpMetricSource {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    endpoints: HashMap<String, String>,
}

impl HttpMetricSource {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        endpoints: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            endpoints,
        })
    }

    /// Build the full URL for an accessor, substituting placeholders
    fn url_for(&self, accessor: &str, params: &[(&str, String)]) -> Result<String, SourceError> {
        let template = self
            .endpoints
            .get(accessor)
            .ok_or_else(|| SourceError::UnknownAccessor(accessor.to_string()))?;

        let mut path = template.clone();
        for (placeholder, value) in params {
            path = path.replace(placeholder, value);
        }

        Ok(format!("{}{}", self.base_url, path))
    }

    async fn get_json(&self, url: String) -> Result<Value, SourceError> {
        tracing::debug!(url = %url, "Querying upstream API");

        let mut request = self.http_client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(SourceError::Auth(format!("upstream returned {}", status)));
        }

        if status == 404 || status == 204 {
            // Absent resource means no data for this unit, not an error.
            return Ok(Value::Null);
        }

        if status == 429 {
            return Err(SourceError::RateLimited);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SourceError::Upstream(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    fn supports(&self, accessor: &str) -> bool {
        self.endpoints.contains_key(accessor)
    }

    async fn fetch_daily(&self, accessor: &str, date: NaiveDate) -> Result<Value, SourceError> {
        let url = self.url_for(accessor, &[("{date}", date.to_string())])?;
        self.get_json(url).await
    }

    async fn fetch_range(
        &self,
        accessor: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, SourceError> {
        let url = self.url_for(
            accessor,
            &[("{start}", start.to_string()), ("{end}", end.to_string())],
        )?;
        self.get_json(url).await
    }

    async fn fetch_simple(&self, accessor: &str) -> Result<Value, SourceError> {
        let url = self.url_for(accessor, &[])?;
        self.get_json(url).await
    }

    async fn list_units(
        &self,
        accessor: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, SourceError> {
        let url = self.url_for(
            accessor,
            &[("{start}", start.to_string()), ("{end}", end.to_string())],
        )?;
        self.get_json(url).await
    }

    async fn fetch_unit(&self, accessor: &str, unit_id: &str) -> Result<Value, SourceError> {
        let url = self.url_for(accessor, &[("{unit}", unit_id.to_string())])?;
        self.get_json(url).await
    }
}
