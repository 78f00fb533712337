//! Retrieval strategies
//!
//! Each strategy turns "fetch metric M over this range" into one or more
//! upstream calls and shapes the raw responses into a flat sequence of
//! tagged records. A failing unit never aborts its loop: the failure is
//! recorded and iteration continues. Only authentication failures escalate,
//! since they would recur on every remaining call.
//!
//! Every upstream call is paced and bounded by the configured timeout;
//! an elapsed timeout is an isolated transient failure like any other.

use crate::error::{FetchError, FetchResult};
use crate::models::{FailureEntry, FailureKind, FetchRequest, MetricDescriptor, TaggedRecord};
use crate::services::pacer::Pacer;
use crate::services::source::{is_empty_result, MetricSource, SourceError};
use pulsefeed_common::time::date_range;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shared environment for one strategy invocation
pub struct StrategyContext<'a> {
    pub source: &'a dyn MetricSource,
    pub pacer: &'a dyn Pacer,
    pub call_timeout: Duration,
    pub cancel: &'a CancellationToken,
    /// Accessor used to list units for the two-phase strategies
    pub unit_list_accessor: &'a str,
    /// Key holding the unit id inside each listing element
    pub unit_id_field: &'a str,
}

/// Records and isolated failures produced by one strategy invocation
#[derive(Debug, Default)]
pub struct StrategyOutput {
    pub records: Vec<TaggedRecord>,
    pub failures: Vec<FailureEntry>,
}

/// Bound an upstream call by the configured per-call timeout
async fn bounded<F>(ctx: &StrategyContext<'_>, call: F) -> Result<Value, SourceError>
where
    F: Future<Output = Result<Value, SourceError>>,
{
    match tokio::time::timeout(ctx.call_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout),
    }
}

/// Turn a per-call error into a manifest entry; auth escalates instead
fn classify(err: SourceError, metric: &str, unit_id: &str) -> FetchResult<FailureEntry> {
    let kind = match &err {
        SourceError::Timeout => FailureKind::Timeout,
        SourceError::RateLimited => FailureKind::RateLimited,
        SourceError::Upstream(_, _) | SourceError::UnknownAccessor(_) => FailureKind::Upstream,
        SourceError::Network(_) => FailureKind::Network,
        SourceError::Parse(_) => FailureKind::Parse,
        SourceError::Auth(message) => return Err(FetchError::Auth(message.clone())),
    };
    Ok(FailureEntry {
        unit_id: unit_id.to_string(),
        metric: metric.to_string(),
        kind,
        message: err.to_string(),
    })
}

/// Tag an upstream payload: one record per list element, one record for a
/// single object, nothing for an empty result
fn tag_payloads(value: Value, metric: &str, unit_id: &str) -> Vec<TaggedRecord> {
    if is_empty_result(&value) {
        return Vec::new();
    }
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| TaggedRecord::new(metric, unit_id, item))
            .collect(),
        other => vec![TaggedRecord::new(metric, unit_id, other)],
    }
}

/// One call per calendar date; per-date failures are isolated
pub async fn fetch_daily(
    ctx: &StrategyContext<'_>,
    descriptor: &MetricDescriptor,
    request: &FetchRequest,
) -> FetchResult<StrategyOutput> {
    let mut output = StrategyOutput::default();

    for date in date_range(request.start_date, request.end_date) {
        if ctx.cancel.is_cancelled() {
            tracing::info!(metric = %descriptor.name, "Fetch cancelled, stopping daily iteration");
            break;
        }

        let tag = date.to_string();
        ctx.pacer.pace().await;

        match bounded(ctx, ctx.source.fetch_daily(&descriptor.accessor, date)).await {
            Ok(value) => {
                output
                    .records
                    .extend(tag_payloads(value, &descriptor.name, &tag));
            }
            Err(err) => {
                tracing::warn!(
                    metric = %descriptor.name,
                    date = %tag,
                    error = %err,
                    "Daily fetch failed, continuing with next date"
                );
                output.failures.push(classify(err, &descriptor.name, &tag)?);
            }
        }
    }

    // Date tags are ISO strings, so lexicographic order is chronological.
    output.records.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

    Ok(output)
}

/// Single call covering the whole range
pub async fn fetch_range(
    ctx: &StrategyContext<'_>,
    descriptor: &MetricDescriptor,
    request: &FetchRequest,
) -> FetchResult<StrategyOutput> {
    let mut output = StrategyOutput::default();
    if ctx.cancel.is_cancelled() {
        return Ok(output);
    }

    let tag = request.range_tag();
    ctx.pacer.pace().await;

    match bounded(
        ctx,
        ctx.source
            .fetch_range(&descriptor.accessor, request.start_date, request.end_date),
    )
    .await
    {
        Ok(value) => output.records = tag_payloads(value, &descriptor.name, &tag),
        Err(err) => {
            tracing::warn!(metric = %descriptor.name, error = %err, "Range fetch failed");
            output.failures.push(classify(err, &descriptor.name, &tag)?);
        }
    }

    Ok(output)
}

/// Single no-argument call; records are tagged with the request end date
pub async fn fetch_simple(
    ctx: &StrategyContext<'_>,
    descriptor: &MetricDescriptor,
    request: &FetchRequest,
) -> FetchResult<StrategyOutput> {
    let mut output = StrategyOutput::default();
    if ctx.cancel.is_cancelled() {
        return Ok(output);
    }

    let tag = request.end_date.to_string();
    ctx.pacer.pace().await;

    match bounded(ctx, ctx.source.fetch_simple(&descriptor.accessor)).await {
        Ok(value) => output.records = tag_payloads(value, &descriptor.name, &tag),
        Err(err) => {
            tracing::warn!(metric = %descriptor.name, error = %err, "Simple fetch failed");
            output.failures.push(classify(err, &descriptor.name, &tag)?);
        }
    }

    Ok(output)
}

/// Two-phase: list units, then one detail call per unit merged over its
/// listing summary
pub async fn fetch_unit_detail(
    ctx: &StrategyContext<'_>,
    descriptor: &MetricDescriptor,
    request: &FetchRequest,
) -> FetchResult<StrategyOutput> {
    let mut output = StrategyOutput::default();
    let units = list_units(ctx, descriptor, request, &mut output).await?;

    for (unit_id, summary) in units {
        if ctx.cancel.is_cancelled() {
            tracing::info!(metric = %descriptor.name, "Fetch cancelled, stopping unit iteration");
            break;
        }

        ctx.pacer.pace().await;

        match bounded(ctx, ctx.source.fetch_unit(&descriptor.accessor, &unit_id)).await {
            Ok(detail) if is_empty_result(&detail) => {
                tracing::debug!(metric = %descriptor.name, unit = %unit_id, "No detail data for unit");
            }
            Ok(detail) => {
                output.records.push(TaggedRecord::new(
                    &descriptor.name,
                    &unit_id,
                    merge_detail(summary, detail),
                ));
            }
            Err(err) => {
                tracing::warn!(
                    metric = %descriptor.name,
                    unit = %unit_id,
                    error = %err,
                    "Unit detail fetch failed, continuing with next unit"
                );
                output
                    .failures
                    .push(classify(err, &descriptor.name, &unit_id)?);
            }
        }
    }

    Ok(output)
}

/// Merge the phase-2 detail document over the phase-1 summary; detail wins
/// on key conflicts, a non-object detail nests under a "detail" key
fn merge_detail(summary: Value, detail: Value) -> Value {
    match (summary, detail) {
        (Value::Object(mut base), Value::Object(extra)) => {
            for (key, value) in extra {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (Value::Object(mut base), other) => {
            base.insert("detail".to_string(), other);
            Value::Object(base)
        }
        (_, other) => other,
    }
}

/// Two-phase: list units, then one call per (unit, sub-resource); each
/// sub-result lands under a key named after its accessor
pub async fn fetch_unit_subdata(
    ctx: &StrategyContext<'_>,
    descriptor: &MetricDescriptor,
    request: &FetchRequest,
) -> FetchResult<StrategyOutput> {
    let mut output = StrategyOutput::default();
    let subs = descriptor.accessors();
    let units = list_units(ctx, descriptor, request, &mut output).await?;

    for (unit_id, summary) in units {
        if ctx.cancel.is_cancelled() {
            tracing::info!(metric = %descriptor.name, "Fetch cancelled, stopping unit iteration");
            break;
        }

        let mut record = match summary {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("summary".to_string(), other);
                map
            }
        };

        for sub in &subs {
            ctx.pacer.pace().await;

            match bounded(ctx, ctx.source.fetch_unit(sub, &unit_id)).await {
                Ok(value) if is_empty_result(&value) => {
                    tracing::debug!(
                        metric = %descriptor.name,
                        unit = %unit_id,
                        sub = %sub,
                        "No sub-resource data for unit"
                    );
                }
                Ok(value) => {
                    record.insert((*sub).to_string(), value);
                }
                Err(err) => {
                    // Isolated to this (unit, sub) pair; remaining subs for
                    // the same unit still execute.
                    let pair = format!("{}/{}", unit_id, sub);
                    tracing::warn!(
                        metric = %descriptor.name,
                        unit = %unit_id,
                        sub = %sub,
                        error = %err,
                        "Sub-resource fetch failed, continuing"
                    );
                    output.failures.push(classify(err, &descriptor.name, &pair)?);
                }
            }
        }

        output
            .records
            .push(TaggedRecord::new(&descriptor.name, &unit_id, Value::Object(record)));
    }

    Ok(output)
}

/// Phase-1 unit listing shared by the two-phase strategies; a listing
/// failure isolates to one manifest entry for the whole metric
async fn list_units(
    ctx: &StrategyContext<'_>,
    descriptor: &MetricDescriptor,
    request: &FetchRequest,
    output: &mut StrategyOutput,
) -> FetchResult<Vec<(String, Value)>> {
    if ctx.cancel.is_cancelled() {
        return Ok(Vec::new());
    }

    ctx.pacer.pace().await;

    let listing = match bounded(
        ctx,
        ctx.source
            .list_units(ctx.unit_list_accessor, request.start_date, request.end_date),
    )
    .await
    {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(metric = %descriptor.name, error = %err, "Unit listing failed");
            output
                .failures
                .push(classify(err, &descriptor.name, &request.range_tag())?);
            return Ok(Vec::new());
        }
    };

    Ok(extract_units(listing, ctx.unit_id_field, &descriptor.name))
}

/// Pull (unit id, summary) pairs out of a listing response
fn extract_units(listing: Value, id_field: &str, metric: &str) -> Vec<(String, Value)> {
    let items = match listing {
        Value::Array(items) => items,
        Value::Null => return Vec::new(),
        other => {
            tracing::warn!(
                metric = %metric,
                got = %value_kind(&other),
                "Unit listing is not an array, ignoring"
            );
            return Vec::new();
        }
    };

    let mut units = Vec::with_capacity(items.len());
    for item in items {
        let id = item.get(id_field).and_then(unit_id_string);
        match id {
            Some(id) => units.push((id, item)),
            None => {
                tracing::warn!(
                    metric = %metric,
                    field = %id_field,
                    "Listing element has no unit id, skipping"
                );
            }
        }
    }
    units
}

fn unit_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
