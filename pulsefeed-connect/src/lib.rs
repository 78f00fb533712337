//! pulsefeed-connect library interface
//!
//! Exposes the connector building blocks for integration testing and for
//! embedding in other workspace services: the metric registry, the shape
//! normalizer, the retrieval strategies and the fetch orchestrator.

pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod registry;
pub mod services;

pub use crate::error::{FetchError, FetchResult};
pub use crate::models::{
    FailureEntry, FailureKind, FetchRequest, MetricDescriptor, RunReport, ShapeWarning,
    StrategyKind, TaggedRecord, WarningEntry,
};
pub use crate::normalize::{normalize, ShapeMappings};
pub use crate::registry::MetricRegistry;
pub use crate::services::orchestrator::FetchOrchestrator;
