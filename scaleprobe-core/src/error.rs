//! Error taxonomy shared by the harness crates
//!
//! Only [`ResolutionFailure`] is fatal to a whole run. Everything at the
//! request, metric or single-test level is recovered locally and surfaces
//! as a [`DegradedReason`] on the written row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::types::MetricKind;

/// Last error observed for one connectivity strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub attempts: u32,
    pub error: String,
}

/// Every connectivity strategy was exhausted without a successful probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFailure {
    pub failures: Vec<StrategyFailure>,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no connectivity strategies configured");
        }
        write!(f, "all connectivity strategies failed")?;
        for failure in &self.failures {
            write!(
                f,
                "; {} ({} attempts): {}",
                failure.strategy, failure.attempts, failure.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionFailure {}

/// Why a row carries null or undefined derived fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedReason {
    /// The platform rejected or never acknowledged the scale command
    ScaleFailed,
    /// The platform accepted the scale command but did not report completion in time
    ScaleTimeout,
    /// Not every target instance became ready within the readiness timeout
    ReadinessTimeout,
    /// Too few successful requests to derive throughput and latency
    InsufficientSuccesses,
    /// No single-replica baseline has been recorded yet
    BaselineMissing,
    /// A metric stayed absent after the bounded retries
    MetricUnavailable(MetricKind),
    /// No per-instance request volume could be attributed
    DistributionUnavailable,
}

impl DegradedReason {
    /// Reasons that prevented the load window from running at all
    pub fn is_fatal_to_test(&self) -> bool {
        matches!(
            self,
            DegradedReason::ScaleFailed | DegradedReason::ScaleTimeout | DegradedReason::ReadinessTimeout
        )
    }
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::ScaleFailed => write!(f, "scale_failed"),
            DegradedReason::ScaleTimeout => write!(f, "scale_timeout"),
            DegradedReason::ReadinessTimeout => write!(f, "readiness_timeout"),
            DegradedReason::InsufficientSuccesses => write!(f, "insufficient_successes"),
            DegradedReason::BaselineMissing => write!(f, "baseline_missing"),
            DegradedReason::MetricUnavailable(kind) => write!(f, "metric_unavailable:{}", kind),
            DegradedReason::DistributionUnavailable => write!(f, "distribution_unavailable"),
        }
    }
}

impl FromStr for DegradedReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(metric) = s.strip_prefix("metric_unavailable:") {
            return metric.parse().map(DegradedReason::MetricUnavailable);
        }
        match s {
            "scale_failed" => Ok(DegradedReason::ScaleFailed),
            "scale_timeout" => Ok(DegradedReason::ScaleTimeout),
            "readiness_timeout" => Ok(DegradedReason::ReadinessTimeout),
            "insufficient_successes" => Ok(DegradedReason::InsufficientSuccesses),
            "baseline_missing" => Ok(DegradedReason::BaselineMissing),
            "distribution_unavailable" => Ok(DegradedReason::DistributionUnavailable),
            other => Err(format!("Unknown degraded reason: {}", other)),
        }
    }
}
