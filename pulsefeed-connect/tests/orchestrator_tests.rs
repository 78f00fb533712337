//! Integration tests for the fetch orchestrator and retrieval strategies
//!
//! Uses an in-memory fake upstream source with per-call failure injection
//! and call recording, so isolation, escalation and preflight behavior can
//! be asserted without a network or real delays.

use async_trait::async_trait;
use chrono::NaiveDate;
use pulsefeed_connect::models::{FailureKind, FetchRequest};
use pulsefeed_connect::registry::MetricRegistry;
use pulsefeed_connect::services::{MetricSource, NoopPacer, SourceError};
use pulsefeed_connect::{FetchError, FetchOrchestrator};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REGISTRY: &str = r#"
    unit_list_accessor = "activities"
    unit_id_field = "activityId"

    [metrics.sleep]
    accessor = "sleep"
    strategy = "daily"
    description = "Nightly sleep summary"

    [metrics.steps]
    accessor = "steps"
    strategy = "daily"
    description = "Daily step totals"

    [metrics.stress]
    accessor = "stress"
    strategy = "daily"
    description = "Daily stress samples"

    [metrics.body_battery]
    accessor = "body_battery"
    strategy = "range"
    description = "Body battery events"

    [metrics.user_profile]
    accessor = "user_profile"
    strategy = "simple"
    description = "Profile snapshot"

    [metrics.activity_details]
    accessor = "activity"
    strategy = "unit_detail"
    description = "Per-activity detail"

    [metrics.activity_extras]
    accessor = "activity_splits,activity_weather"
    strategy = "unit_subdata"
    description = "Per-activity splits and weather"

    [shape_mappings]
    stressValuesArray = ["timestamp", "type", "value", "score"]
"#;

/// In-memory upstream source with failure injection and call recording
struct FakeSource {
    supported: HashSet<String>,
    responses: HashMap<String, Value>,
    failures: HashSet<String>,
    auth_failures: HashSet<String>,
    hangs: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    fn new(accessors: &[&str]) -> Self {
        Self {
            supported: accessors.iter().map(|a| a.to_string()).collect(),
            responses: HashMap::new(),
            failures: HashSet::new(),
            auth_failures: HashSet::new(),
            hangs: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn all_accessors() -> Self {
        Self::new(&[
            "sleep",
            "steps",
            "stress",
            "body_battery",
            "user_profile",
            "activities",
            "activity",
            "activity_splits",
            "activity_weather",
        ])
    }

    fn respond(mut self, key: &str, value: Value) -> Self {
        self.responses.insert(key.to_string(), value);
        self
    }

    fn fail(mut self, key: &str) -> Self {
        self.failures.insert(key.to_string());
        self
    }

    fn fail_auth(mut self, key: &str) -> Self {
        self.auth_failures.insert(key.to_string());
        self
    }

    fn hang(mut self, key: &str) -> Self {
        self.hangs.insert(key.to_string());
        self
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn dispatch(&self, key: String) -> Result<Value, SourceError> {
        self.calls.lock().unwrap().push(key.clone());

        if self.hangs.contains(&key) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.auth_failures.contains(&key) {
            return Err(SourceError::Auth("session expired".to_string()));
        }
        if self.failures.contains(&key) {
            return Err(SourceError::Upstream(500, "internal server error".to_string()));
        }
        Ok(self.responses.get(&key).cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    fn supports(&self, accessor: &str) -> bool {
        self.supported.contains(accessor)
    }

    async fn fetch_daily(&self, accessor: &str, date: NaiveDate) -> Result<Value, SourceError> {
        self.dispatch(format!("daily:{}:{}", accessor, date)).await
    }

    async fn fetch_range(
        &self,
        accessor: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Value, SourceError> {
        self.dispatch(format!("range:{}", accessor)).await
    }

    async fn fetch_simple(&self, accessor: &str) -> Result<Value, SourceError> {
        self.dispatch(format!("simple:{}", accessor)).await
    }

    async fn list_units(
        &self,
        accessor: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Value, SourceError> {
        self.dispatch(format!("list:{}", accessor)).await
    }

    async fn fetch_unit(&self, accessor: &str, unit_id: &str) -> Result<Value, SourceError> {
        self.dispatch(format!("unit:{}:{}", accessor, unit_id)).await
    }
}

fn registry() -> Arc<MetricRegistry> {
    Arc::new(MetricRegistry::from_toml_str(REGISTRY).unwrap())
}

fn orchestrator(source: Arc<FakeSource>) -> FetchOrchestrator {
    FetchOrchestrator::new(registry(), source)
        .with_pacer(Arc::new(NoopPacer))
        .with_call_timeout(Duration::from_millis(200))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn request(metrics: &[&str], start: NaiveDate, end: NaiveDate) -> FetchRequest {
    FetchRequest::new(metrics.iter().copied(), start, end).unwrap()
}

#[tokio::test]
async fn daily_failure_is_isolated_per_date() {
    let mut source = FakeSource::all_accessors();
    for day in 1..=5 {
        source = source.respond(
            &format!("daily:sleep:2024-01-0{}", day),
            json!({"deep_minutes": 90 + day}),
        );
    }
    let source = Arc::new(source.fail("daily:sleep:2024-01-02"));

    let report = orchestrator(source.clone())
        .run(&request(&["sleep"], date(2024, 1, 1), date(2024, 1, 5)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].unit_id, "2024-01-02");
    assert_eq!(report.failures[0].metric, "sleep");
    assert_eq!(report.failures[0].kind, FailureKind::Upstream);
    // The failing date did not stop the remaining dates.
    assert_eq!(source.call_count(), 5);
}

#[tokio::test]
async fn daily_output_is_sorted_ascending_by_date() {
    let mut source = FakeSource::all_accessors();
    for day in 1..=7 {
        source = source.respond(
            &format!("daily:steps:2024-01-0{}", day),
            json!({"total": day * 1000}),
        );
    }
    let source = Arc::new(source);

    let report = orchestrator(source)
        .run(&request(&["steps"], date(2024, 1, 1), date(2024, 1, 7)))
        .await
        .unwrap();

    let tags: Vec<&str> = report.records.iter().map(|r| r.unit_id.as_str()).collect();
    let mut sorted = tags.clone();
    sorted.sort_unstable();
    assert_eq!(tags, sorted);
    assert_eq!(tags.first(), Some(&"2024-01-01"));
    assert_eq!(tags.last(), Some(&"2024-01-07"));
}

#[tokio::test]
async fn daily_list_response_yields_record_per_element() {
    let source = Arc::new(FakeSource::all_accessors().respond(
        "daily:stress:2024-01-01",
        json!([{"level": 20}, {"level": 35}]),
    ));

    let report = orchestrator(source)
        .run(&request(&["stress"], date(2024, 1, 1), date(2024, 1, 1)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 2);
    assert!(report.records.iter().all(|r| r.unit_id == "2024-01-01"));
}

#[tokio::test]
async fn empty_results_mean_no_data_not_failure() {
    let source = Arc::new(
        FakeSource::all_accessors()
            .respond("daily:sleep:2024-01-01", Value::Null)
            .respond("daily:sleep:2024-01-02", json!([]))
            .respond("daily:sleep:2024-01-03", json!({})),
    );

    let report = orchestrator(source)
        .run(&request(&["sleep"], date(2024, 1, 1), date(2024, 1, 3)))
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn range_records_are_tagged_with_the_range() {
    let source = Arc::new(FakeSource::all_accessors().respond(
        "range:body_battery",
        json!([{"charged": 60}, {"drained": 35}]),
    ));

    let report = orchestrator(source)
        .run(&request(&["body_battery"], date(2024, 1, 1), date(2024, 1, 7)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 2);
    assert!(report
        .records
        .iter()
        .all(|r| r.unit_id == "2024-01-01..2024-01-07"));
}

#[tokio::test]
async fn simple_record_is_tagged_with_the_end_date() {
    let source = Arc::new(
        FakeSource::all_accessors().respond("simple:user_profile", json!({"vo2max": 52})),
    );

    let report = orchestrator(source)
        .run(&request(&["user_profile"], date(2024, 1, 1), date(2024, 1, 7)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].unit_id, "2024-01-07");
}

#[tokio::test]
async fn unit_detail_partial_failure_is_isolated() {
    let source = Arc::new(
        FakeSource::all_accessors()
            .respond(
                "list:activities",
                json!([
                    {"activityId": 101, "sport": "running"},
                    {"activityId": 102, "sport": "cycling"},
                    {"activityId": 103, "sport": "rowing"}
                ]),
            )
            .respond("unit:activity:101", json!({"distance": 5.2}))
            .fail("unit:activity:102")
            .respond("unit:activity:103", json!({"distance": 2.0})),
    );

    let report = orchestrator(source)
        .run(&request(&["activity_details"], date(2024, 1, 1), date(2024, 1, 7)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].unit_id, "102");

    // Summary and detail are merged into one record per unit.
    let first = &report.records[0];
    assert_eq!(first.unit_id, "101");
    assert_eq!(first.payload["sport"], "running");
    assert_eq!(first.payload["distance"], 5.2);
}

#[tokio::test]
async fn unit_detail_empty_detail_yields_no_record() {
    let source = Arc::new(
        FakeSource::all_accessors()
            .respond("list:activities", json!([{"activityId": 101}]))
            .respond("unit:activity:101", Value::Null),
    );

    let report = orchestrator(source)
        .run(&request(&["activity_details"], date(2024, 1, 1), date(2024, 1, 7)))
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn unit_listing_failure_isolates_to_one_manifest_entry() {
    let source = Arc::new(FakeSource::all_accessors().fail("list:activities"));

    let report = orchestrator(source.clone())
        .run(&request(&["activity_details"], date(2024, 1, 1), date(2024, 1, 7)))
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].unit_id, "2024-01-01..2024-01-07");
    // No detail calls were attempted after the listing failed.
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn unit_subdata_failure_is_isolated_to_the_pair() {
    let source = Arc::new(
        FakeSource::all_accessors()
            .respond(
                "list:activities",
                json!([{"activityId": 101, "sport": "running"}, {"activityId": 102, "sport": "hiking"}]),
            )
            .fail("unit:activity_splits:101")
            .respond("unit:activity_weather:101", json!({"temp_c": 11}))
            .respond("unit:activity_splits:102", json!([{"km": 1}]))
            .respond("unit:activity_weather:102", json!({"temp_c": 9})),
    );

    let report = orchestrator(source)
        .run(&request(&["activity_extras"], date(2024, 1, 1), date(2024, 1, 7)))
        .await
        .unwrap();

    // Both units still produce a record.
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].unit_id, "101/activity_splits");

    // Unit 101 kept its other sub-resource.
    let unit_101 = report.records.iter().find(|r| r.unit_id == "101").unwrap();
    assert_eq!(unit_101.payload["activity_weather"]["temp_c"], 11);
    assert!(unit_101.payload.get("activity_splits").is_none());

    // Unit 102 has both sub-resources.
    let unit_102 = report.records.iter().find(|r| r.unit_id == "102").unwrap();
    assert!(unit_102.payload.get("activity_splits").is_some());
    assert!(unit_102.payload.get("activity_weather").is_some());
}

#[tokio::test]
async fn unknown_metric_is_config_error_before_any_call() {
    let source = Arc::new(FakeSource::all_accessors());

    let result = orchestrator(source.clone())
        .run(&request(&["vo2max"], date(2024, 1, 1), date(2024, 1, 7)))
        .await;

    assert!(matches!(result, Err(FetchError::Config(_))));
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn unknown_accessor_is_config_error_before_any_call() {
    // Source that does not know the sleep accessor.
    let source = Arc::new(FakeSource::new(&["steps"]));

    let result = orchestrator(source.clone())
        .run(&request(&["sleep", "steps"], date(2024, 1, 1), date(2024, 1, 2)))
        .await;

    assert!(matches!(result, Err(FetchError::Config(_))));
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn auth_failure_escalates_and_stops_the_run() {
    let source = Arc::new(
        FakeSource::all_accessors()
            .fail_auth("daily:sleep:2024-01-01")
            .respond("daily:steps:2024-01-01", json!({"total": 1000})),
    );

    let result = orchestrator(source.clone())
        .run(&request(&["sleep", "steps"], date(2024, 1, 1), date(2024, 1, 3)))
        .await;

    assert!(matches!(result, Err(FetchError::Auth(_))));
    // Nothing ran after the auth failure, including the second metric.
    assert_eq!(source.calls(), vec!["daily:sleep:2024-01-01".to_string()]);
}

#[tokio::test]
async fn hanging_call_becomes_timeout_failure() {
    let source = Arc::new(
        FakeSource::all_accessors()
            .respond("daily:sleep:2024-01-01", json!({"deep_minutes": 90}))
            .hang("daily:sleep:2024-01-02"),
    );

    let report = orchestrator(source)
        .run(&request(&["sleep"], date(2024, 1, 1), date(2024, 1, 2)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, FailureKind::Timeout);
    assert_eq!(report.failures[0].unit_id, "2024-01-02");
}

#[tokio::test]
async fn failed_metric_does_not_block_other_metrics() {
    let source = Arc::new(
        FakeSource::all_accessors()
            .fail("daily:sleep:2024-01-01")
            .fail("daily:sleep:2024-01-02")
            .respond("daily:steps:2024-01-01", json!({"total": 4000}))
            .respond("daily:steps:2024-01-02", json!({"total": 6000})),
    );

    let report = orchestrator(source)
        .run(&request(&["sleep", "steps"], date(2024, 1, 1), date(2024, 1, 2)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 2);
    assert!(report.records.iter().all(|r| r.metric == "steps"));
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.metric == "sleep"));
}

#[tokio::test]
async fn cancelled_token_returns_empty_report_without_calls() {
    let source = Arc::new(FakeSource::all_accessors());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = orchestrator(source.clone())
        .run_with_cancel(
            &request(&["sleep", "steps"], date(2024, 1, 1), date(2024, 1, 7)),
            &cancel,
        )
        .await
        .unwrap();

    assert!(report.records.is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn payloads_are_normalized_and_warnings_reported() {
    let source = Arc::new(FakeSource::all_accessors().respond(
        "daily:stress:2024-01-01",
        json!({
            "stressValuesArray": [[100, "MEASURED", 42, 3.0]],
            "samples": [[1000, 61], [2000, 65]],
            "wide": [[1, 2, 3, 4, 5]]
        }),
    ));

    let report = orchestrator(source)
        .run(&request(&["stress"], date(2024, 1, 1), date(2024, 1, 1)))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 1);
    let payload = &report.records[0].payload;

    // Declared mapping applied.
    assert_eq!(
        payload["stressValuesArray"][0],
        json!({"timestamp": 100, "type": "MEASURED", "value": 42, "score": 3.0})
    );
    // Generic two-element fallback.
    assert_eq!(payload["samples"][0], json!({"timestamp": 1000, "value": 61}));
    // Unmapped wide array degraded with a warning.
    assert_eq!(payload["wide"][0]["val_4"], 5);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].metric, "stress");
    assert_eq!(report.warnings[0].arity, 5);
}
