//! Domain types shared across the harness

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::DegradedReason;

/// Condition that ends a load window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop once the wall-clock duration has elapsed
    Duration(Duration),
    /// Stop once this many requests have been issued across all workers
    RequestCount(u64),
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopCondition::Duration(d) => write!(f, "duration:{}s", d.as_secs_f64()),
            StopCondition::RequestCount(n) => write!(f, "requests:{}", n),
        }
    }
}

/// One cell of the test matrix. Immutable once the test begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfiguration {
    /// Sequential identifier within a run, starting at 1
    pub test_id: u32,
    pub replica_count: u32,
    pub concurrency_level: usize,
    pub stop_condition: StopCondition,
    /// Zero-based repetition index for this replica count
    pub repetition_index: u32,
}

/// Connectivity strategy families, in the order they are usually tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Direct,
    Tunnel,
    PortForward,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Direct => "direct",
            StrategyKind::Tunnel => "tunnel",
            StrategyKind::PortForward => "port_forward",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reachable base address for the target service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub base_url: String,
    pub strategy: StrategyKind,
    pub resolved_at: DateTime<Utc>,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, strategy: StrategyKind) -> Self {
        Self {
            base_url: base_url.into(),
            strategy,
            resolved_at: Utc::now(),
        }
    }

    /// Join a request path onto the base address
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Classified result of a single synthetic request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Success,
    HttpError(u16),
    Timeout,
    ConnectionError,
}

/// Outcome of one request issued by a load worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub issued_at: DateTime<Utc>,
    pub latency: Duration,
    pub status: RequestStatus,
    /// Instance label reported by the target in its response body, if any
    pub instance: Option<String>,
}

impl RequestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RequestStatus::Success)
    }
}

/// Metrics the sampler knows how to retrieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Monotonic request counter, one series per instance
    RequestCount,
    /// CPU usage in cores, one series per instance
    Cpu,
    /// Working-set memory in bytes, one series per instance
    Memory,
    /// Deployment-level available replica count
    ReplicaCount,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::RequestCount => "request_count",
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::ReplicaCount => "replica_count",
        }
    }

    pub fn all() -> &'static [MetricKind] {
        &[
            MetricKind::RequestCount,
            MetricKind::Cpu,
            MetricKind::Memory,
            MetricKind::ReplicaCount,
        ]
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request_count" => Ok(MetricKind::RequestCount),
            "cpu" => Ok(MetricKind::Cpu),
            "memory" => Ok(MetricKind::Memory),
            "replica_count" => Ok(MetricKind::ReplicaCount),
            other => Err(format!("Unknown metric kind: {}", other)),
        }
    }
}

/// A single point of one labelled time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: MetricKind,
    pub instance: String,
    pub value: f64,
    pub sampled_at: DateTime<Utc>,
}

/// Half-open time range a test's metrics are correlated to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Extend the end of the window to catch delayed scrapes
    pub fn with_trailing_margin(self, margin: Duration) -> Self {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            start: self.start,
            end: self.end + margin,
        }
    }
}

/// Samples gathered for one test plus the metrics that could not be read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    pub samples: Vec<MetricSample>,
    pub unavailable: BTreeSet<MetricKind>,
}

impl SampleSet {
    pub fn is_available(&self, kind: MetricKind) -> bool {
        !self.unavailable.contains(&kind) && self.samples.iter().any(|s| s.metric == kind)
    }

    /// Group one metric's samples by instance, each series sorted by time
    pub fn series(&self, kind: MetricKind) -> BTreeMap<String, Vec<(DateTime<Utc>, f64)>> {
        let mut grouped: BTreeMap<String, Vec<(DateTime<Utc>, f64)>> = BTreeMap::new();
        for sample in self.samples.iter().filter(|s| s.metric == kind) {
            grouped
                .entry(sample.instance.clone())
                .or_default()
                .push((sample.sampled_at, sample.value));
        }
        for points in grouped.values_mut() {
            points.sort_by_key(|(ts, _)| *ts);
        }
        grouped
    }
}

/// Single-replica reference performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub rps: f64,
    pub per_instance_rps: f64,
    pub latency_avg_ms: Option<f64>,
    /// Test that established the baseline
    pub source_test_id: u32,
}

impl Baseline {
    pub const REPLICA_COUNT: u32 = 1;
}

/// Holds the run's baseline. Owned by one orchestrator run and handed to
/// the analyzer explicitly; the first established value is never replaced.
#[derive(Debug, Clone, Default)]
pub struct BaselineCell {
    inner: Option<Baseline>,
}

impl BaselineCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded cell, e.g. a baseline carried over from an earlier run
    pub fn with_baseline(baseline: Baseline) -> Self {
        Self {
            inner: Some(baseline),
        }
    }

    pub fn get(&self) -> Option<&Baseline> {
        self.inner.as_ref()
    }

    /// Record a baseline if none exists yet. Returns true when stored.
    pub fn establish(&mut self, baseline: Baseline) -> bool {
        if self.inner.is_some() {
            return false;
        }
        self.inner = Some(baseline);
        true
    }
}

/// One observation per completed test. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub timestamp: DateTime<Utc>,
    pub test_id: u32,
    pub replicas: u32,
    pub repetition: u32,
    pub concurrency_level: usize,
    pub stop_condition: StopCondition,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub timeout_requests: u64,
    pub connection_errors: u64,
    pub http_errors: u64,
    pub rps: Option<f64>,
    pub rps_per_replica: Option<f64>,
    pub latency_avg_ms: Option<f64>,
    pub latency_max_ms: Option<f64>,
    pub latency_p95_ms: Option<f64>,
    pub success_rate: f64,
    pub cpu_pct: Option<f64>,
    pub memory_pct: Option<f64>,
    /// Requests per second attributed to each instance
    pub per_instance_rps: BTreeMap<String, f64>,
    pub max_instance_share: Option<f64>,
    pub load_balanced: bool,
    pub power_per_instance_w: Option<f64>,
    pub power_estimate_w: Option<f64>,
    pub power_efficiency: Option<f64>,
    pub scaling_efficiency_vs_baseline: Option<f64>,
    pub latency_inflation_vs_baseline: Option<f64>,
    pub test_duration: Duration,
    pub failure_reasons: Vec<DegradedReason>,
}

impl TestResult {
    /// Result for a test that never reached its load window
    pub fn failed(config: &TestConfiguration, reason: DegradedReason, test_duration: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            test_id: config.test_id,
            replicas: config.replica_count,
            repetition: config.repetition_index,
            concurrency_level: config.concurrency_level,
            stop_condition: config.stop_condition,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            timeout_requests: 0,
            connection_errors: 0,
            http_errors: 0,
            rps: None,
            rps_per_replica: None,
            latency_avg_ms: None,
            latency_max_ms: None,
            latency_p95_ms: None,
            success_rate: 0.0,
            cpu_pct: None,
            memory_pct: None,
            per_instance_rps: BTreeMap::new(),
            max_instance_share: None,
            load_balanced: config.replica_count == 1,
            power_per_instance_w: None,
            power_estimate_w: None,
            power_efficiency: None,
            scaling_efficiency_vs_baseline: None,
            latency_inflation_vs_baseline: None,
            test_duration,
            failure_reasons: vec![reason],
        }
    }

    /// A degraded test still produced a row but has null derived fields
    pub fn is_degraded(&self) -> bool {
        !self.failure_reasons.is_empty()
    }

    /// Whether the load window ran at all
    pub fn is_completed(&self) -> bool {
        !self.failure_reasons.iter().any(|r| r.is_fatal_to_test())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(replicas: u32) -> TestConfiguration {
        TestConfiguration {
            test_id: 3,
            replica_count: replicas,
            concurrency_level: 8,
            stop_condition: StopCondition::Duration(Duration::from_secs(15)),
            repetition_index: 0,
        }
    }

    #[test]
    fn test_endpoint_url_join() {
        let endpoint = Endpoint::new("http://localhost:30080/", StrategyKind::Direct);
        assert_eq!(endpoint.url_for("/factorial/50"), "http://localhost:30080/factorial/50");
        assert_eq!(endpoint.url_for("health"), "http://localhost:30080/health");
    }

    #[test]
    fn test_baseline_cell_keeps_first_value() {
        let mut cell = BaselineCell::new();
        assert!(cell.get().is_none());

        let first = Baseline {
            rps: 40.0,
            per_instance_rps: 40.0,
            latency_avg_ms: Some(120.0),
            source_test_id: 1,
        };
        assert!(cell.establish(first.clone()));

        let second = Baseline {
            rps: 55.0,
            ..first.clone()
        };
        assert!(!cell.establish(second));
        assert_eq!(cell.get(), Some(&first));
    }

    #[test]
    fn test_sample_set_groups_and_sorts_series() {
        let t0 = Utc::now();
        let later = t0 + chrono::Duration::seconds(5);
        let set = SampleSet {
            samples: vec![
                MetricSample {
                    metric: MetricKind::Cpu,
                    instance: "pod-b".to_string(),
                    value: 0.4,
                    sampled_at: later,
                },
                MetricSample {
                    metric: MetricKind::Cpu,
                    instance: "pod-b".to_string(),
                    value: 0.2,
                    sampled_at: t0,
                },
                MetricSample {
                    metric: MetricKind::Memory,
                    instance: "pod-a".to_string(),
                    value: 1024.0,
                    sampled_at: t0,
                },
            ],
            unavailable: BTreeSet::new(),
        };

        let cpu = set.series(MetricKind::Cpu);
        assert_eq!(cpu.len(), 1);
        assert_eq!(cpu["pod-b"], vec![(t0, 0.2), (later, 0.4)]);
        assert!(set.is_available(MetricKind::Memory));
        assert!(!set.is_available(MetricKind::RequestCount));
    }

    #[test]
    fn test_failed_result_is_degraded() {
        let result = TestResult::failed(&config(2), DegradedReason::ReadinessTimeout, Duration::from_secs(90));
        assert!(result.is_degraded());
        assert!(!result.is_completed());
        assert!(!result.load_balanced);
        assert_eq!(result.success_rate, 0.0);
        assert!(result.rps.is_none());

        let single = TestResult::failed(&config(1), DegradedReason::ScaleFailed, Duration::ZERO);
        assert!(single.load_balanced);
    }

    #[test]
    fn test_time_window_margin() {
        let start = Utc::now();
        let end = start + chrono::Duration::seconds(15);
        let window = TimeWindow::new(start, end).with_trailing_margin(Duration::from_secs(10));
        assert_eq!(window.end - window.start, chrono::Duration::seconds(25));
    }

    #[test]
    fn test_stop_condition_display() {
        assert_eq!(StopCondition::RequestCount(500).to_string(), "requests:500");
        assert_eq!(
            StopCondition::Duration(Duration::from_secs(15)).to_string(),
            "duration:15s"
        );
    }
}
