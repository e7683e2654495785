//! Core domain model for scaleprobe
//!
//! This crate holds the types every other crate agrees on: test
//! configurations, request outcomes, metric samples, the baseline cell and
//! the per-test result record, together with the request statistics that
//! the analyzer derives from a load window.

pub mod error;
pub mod stats;
pub mod types;

pub use error::{DegradedReason, ResolutionFailure, StrategyFailure};
pub use stats::{mean, percentile, LoadStats};
pub use types::{
    Baseline, BaselineCell, Endpoint, MetricKind, MetricSample, RequestOutcome, RequestStatus,
    SampleSet, StopCondition, StrategyKind, TestConfiguration, TestResult, TimeWindow,
};
