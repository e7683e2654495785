//! Metric retrieval for scaleprobe
//!
//! A [`MetricsBackend`] answers range queries; the [`MetricSampler`] turns a
//! test's time window into a [`scaleprobe_core::SampleSet`], retrying empty
//! answers a bounded number of times and recording metrics that never show
//! up as unavailable instead of failing the test.

pub mod backend;
pub mod errors;
pub mod prometheus;
pub mod sampler;

pub use backend::{MetricsBackend, Series};
pub use errors::MetricsError;
pub use prometheus::PrometheusBackend;
pub use sampler::{MetricSampler, QueryContext};
