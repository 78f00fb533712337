//! Data model types for the connector

pub mod descriptor;
pub mod record;

pub use descriptor::{MetricDescriptor, StrategyKind};
pub use record::{
    FailureEntry, FailureKind, FetchRequest, RunReport, ShapeWarning, TaggedRecord, WarningEntry,
};
