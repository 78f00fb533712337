//! pulsefeed-connect - Personal data platform connector
//!
//! Pulls metric data from a third-party wellness/fitness/music API and
//! lands it as newline-delimited JSON for warehouse ingestion. Which
//! metrics exist and how each is retrieved is declared in the metric
//! registry file; this binary wires configuration, registry, upstream
//! client and orchestrator together and writes the output sink.

use anyhow::Result;
use clap::Parser;
use pulsefeed_common::time::parse_date;
use pulsefeed_connect::config::{resolve_api_token, ConnectConfig};
use pulsefeed_connect::models::FetchRequest;
use pulsefeed_connect::registry::MetricRegistry;
use pulsefeed_connect::services::{FetchOrchestrator, HttpMetricSource, IntervalPacer, NdjsonSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pulsefeed-connect", version, about = "Fetch personal metric data as NDJSON")]
struct Cli {
    /// Configuration file (default: discovered per platform)
    #[arg(long)]
    config: Option<String>,

    /// Metrics to fetch (comma-separated); all registry metrics when omitted
    #[arg(long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// First date of the range (YYYY-MM-DD)
    #[arg(long)]
    start: String,

    /// Last date of the range (YYYY-MM-DD); defaults to the start date
    #[arg(long)]
    end: Option<String>,

    /// Output file override
    #[arg(long)]
    output: Option<PathBuf>,

    /// Exit nonzero when the failure manifest is non-empty
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting pulsefeed-connect");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Step 1: Resolve and load configuration
    let config_path = pulsefeed_common::config::resolve_config_file(
        cli.config.as_deref(),
        "PULSEFEED_CONNECT_CONFIG",
        "connect",
    );
    let config = ConnectConfig::load(config_path.as_deref())?;

    // Step 2: Load the metric registry
    let registry = Arc::new(MetricRegistry::load(&config.registry_file)?);
    info!(
        metrics = registry.len(),
        registry = %config.registry_file.display(),
        "Metric registry loaded"
    );

    // Step 3: Build the upstream client
    let token = resolve_api_token(&config);
    let source = Arc::new(
        HttpMetricSource::new(
            config.base_url.clone(),
            token,
            config.endpoint_table(),
            Duration::from_secs(config.call_timeout_secs),
        )
        .map_err(|e| anyhow::anyhow!("Failed to create upstream client: {}", e))?,
    );
    info!(base_url = %config.base_url, "Upstream client initialized");

    // Step 4: Build the fetch request
    let start_date = parse_date(&cli.start)?;
    let end_date = match &cli.end {
        Some(end) => parse_date(end)?,
        None => start_date,
    };
    let metric_names: Vec<String> = if cli.metrics.is_empty() {
        registry.names().iter().map(|s| s.to_string()).collect()
    } else {
        cli.metrics.clone()
    };
    let request = FetchRequest::new(metric_names, start_date, end_date)?;

    let orchestrator = FetchOrchestrator::new(registry, source)
        .with_pacer(Arc::new(IntervalPacer::new(config.pacing_ms)))
        .with_call_timeout(Duration::from_secs(config.call_timeout_secs));

    // Ctrl-C stops scheduling new units; partial results are still written.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            signal_token.cancel();
        }
    });

    // Step 5: Run and write the sink
    let report = orchestrator.run_with_cancel(&request, &cancel).await?;

    let output_file = cli.output.unwrap_or_else(|| config.output_file.clone());
    let sink = NdjsonSink::new(&output_file);
    let written = sink.write(&report.records)?;

    for failure in &report.failures {
        warn!(
            metric = %failure.metric,
            unit = %failure.unit_id,
            kind = ?failure.kind,
            message = %failure.message,
            "Isolated fetch failure"
        );
    }

    info!(
        run_id = %report.run_id,
        records = written,
        failures = report.failures.len(),
        warnings = report.warnings.len(),
        output = %output_file.display(),
        "Run finished"
    );

    if cli.strict && !report.failures.is_empty() {
        anyhow::bail!(
            "{} unit(s) failed; rerun without --strict to accept partial data",
            report.failures.len()
        );
    }

    Ok(())
}
