//! Fetch orchestrator
//!
//! Coordinates one connector run: resolves every requested metric against
//! the registry, dispatches each to its retrieval strategy, normalizes every
//! payload and aggregates records, isolated failures and shape warnings into
//! a single run report.
//!
//! Metrics are processed independently; a fully failed metric only
//! contributes manifest entries. Only configuration and authentication
//! errors abort a run.

use crate::error::{FetchError, FetchResult};
use crate::models::{
    FetchRequest, MetricDescriptor, RunReport, StrategyKind, TaggedRecord, WarningEntry,
};
use crate::normalize::normalize;
use crate::registry::MetricRegistry;
use crate::services::pacer::{IntervalPacer, Pacer};
use crate::services::source::MetricSource;
use crate::services::strategies::{self, StrategyContext, StrategyOutput};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DEFAULT_PACING_MS: u64 = 1000;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Orchestrates fetching a set of metrics over a date range
pub struct FetchOrchestrator {
    registry: Arc<MetricRegistry>,
    source: Arc<dyn MetricSource>,
    pacer: Arc<dyn Pacer>,
    call_timeout: Duration,
}

impl FetchOrchestrator {
    pub fn new(registry: Arc<MetricRegistry>, source: Arc<dyn MetricSource>) -> Self {
        Self {
            registry,
            source,
            pacer: Arc::new(IntervalPacer::new(DEFAULT_PACING_MS)),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Replace the pacing component (tests use a no-op pacer)
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// Bound every upstream call by this timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Run without external cancellation
    pub async fn run(&self, request: &FetchRequest) -> FetchResult<RunReport> {
        self.run_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Execute one fetch run
    ///
    /// Cancellation stops scheduling new work; records already produced are
    /// returned as a valid partial report.
    pub async fn run_with_cancel(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> FetchResult<RunReport> {
        let run_id = Uuid::new_v4();
        let start_time = std::time::Instant::now();

        // Resolve every metric and verify every accessor before the first
        // upstream call; a bad name is a caller mistake, not a transient
        // condition.
        let descriptors = self.preflight(request)?;

        tracing::info!(
            run_id = %run_id,
            metrics = descriptors.len(),
            start_date = %request.start_date,
            end_date = %request.end_date,
            "Starting fetch run"
        );

        let mut report = RunReport::new(run_id);

        for descriptor in &descriptors {
            if cancel.is_cancelled() {
                tracing::info!(run_id = %run_id, "Fetch run cancelled, returning partial results");
                break;
            }

            let output = self.fetch_metric(descriptor, request, cancel).await?;
            self.collect(descriptor, output, &mut report);
        }

        tracing::info!(
            run_id = %run_id,
            records = report.records.len(),
            failures = report.failures.len(),
            warnings = report.warnings.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Fetch run completed"
        );

        Ok(report)
    }

    /// Resolve descriptors and reject unknown accessor names eagerly
    fn preflight(&self, request: &FetchRequest) -> FetchResult<Vec<MetricDescriptor>> {
        let mut descriptors = Vec::with_capacity(request.metric_names.len());

        for name in &request.metric_names {
            let descriptor = self
                .registry
                .resolve(name)
                .map_err(|e| FetchError::Config(e.to_string()))?
                .clone();

            for accessor in descriptor.accessors() {
                if !self.source.supports(accessor) {
                    return Err(FetchError::Config(format!(
                        "Metric '{}' uses accessor '{}' unknown to the upstream source",
                        name, accessor
                    )));
                }
            }

            if matches!(
                descriptor.strategy,
                StrategyKind::UnitDetail | StrategyKind::UnitSubdata
            ) && !self.source.supports(self.registry.unit_list_accessor())
            {
                return Err(FetchError::Config(format!(
                    "Unit listing accessor '{}' unknown to the upstream source",
                    self.registry.unit_list_accessor()
                )));
            }

            descriptors.push(descriptor);
        }

        Ok(descriptors)
    }

    /// Dispatch one metric to its strategy
    async fn fetch_metric(
        &self,
        descriptor: &MetricDescriptor,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> FetchResult<StrategyOutput> {
        let ctx = StrategyContext {
            source: self.source.as_ref(),
            pacer: self.pacer.as_ref(),
            call_timeout: self.call_timeout,
            cancel,
            unit_list_accessor: self.registry.unit_list_accessor(),
            unit_id_field: self.registry.unit_id_field(),
        };

        tracing::debug!(
            metric = %descriptor.name,
            strategy = descriptor.strategy.as_str(),
            "Dispatching metric"
        );

        match descriptor.strategy {
            StrategyKind::Daily => strategies::fetch_daily(&ctx, descriptor, request).await,
            StrategyKind::Range => strategies::fetch_range(&ctx, descriptor, request).await,
            StrategyKind::Simple => strategies::fetch_simple(&ctx, descriptor, request).await,
            StrategyKind::UnitDetail => {
                strategies::fetch_unit_detail(&ctx, descriptor, request).await
            }
            StrategyKind::UnitSubdata => {
                strategies::fetch_unit_subdata(&ctx, descriptor, request).await
            }
        }
    }

    /// Normalize strategy output into the run report
    fn collect(&self, descriptor: &MetricDescriptor, output: StrategyOutput, report: &mut RunReport) {
        let record_count = output.records.len();
        let failure_count = output.failures.len();

        for record in output.records {
            let TaggedRecord {
                metric,
                unit_id,
                payload,
            } = record;
            let (payload, warnings) = normalize(payload, self.registry.shape_mappings());

            for warning in warnings {
                tracing::warn!(
                    metric = %metric,
                    path = %warning.path,
                    arity = warning.arity,
                    "Unmapped wide array degraded to positional keys; declare a shape mapping"
                );
                report.warnings.push(WarningEntry {
                    metric: metric.clone(),
                    path: warning.path,
                    arity: warning.arity,
                });
            }

            report.records.push(TaggedRecord {
                metric,
                unit_id,
                payload,
            });
        }

        report.failures.extend(output.failures);

        tracing::info!(
            metric = %descriptor.name,
            records = record_count,
            failures = failure_count,
            "Metric fetch finished"
        );
    }
}
