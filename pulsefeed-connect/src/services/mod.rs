//! Service modules for the fetch pipeline

pub mod http_source;
pub mod orchestrator;
pub mod pacer;
pub mod sink;
pub mod source;
pub mod strategies;

pub use http_source::HttpMetricSource;
pub use orchestrator::FetchOrchestrator;
pub use pacer::{IntervalPacer, NoopPacer, Pacer};
pub use sink::NdjsonSink;
pub use source::{MetricSource, SourceError};
pub use strategies::{StrategyContext, StrategyOutput};
