//! Flat CSV representation of a test result

use chrono::{DateTime, Utc};
use scaleprobe_core::{DegradedReason, TestResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column names, in file order
pub const HEADER: [&str; 31] = [
    "timestamp",
    "test_id",
    "replicas",
    "repetition",
    "concurrency_level",
    "stop_condition",
    "total_requests",
    "successful_requests",
    "failed_requests",
    "timeout_requests",
    "connection_errors",
    "http_errors",
    "rps",
    "rps_per_replica",
    "latency_avg_ms",
    "latency_max_ms",
    "latency_p95_ms",
    "success_rate",
    "cpu_pct",
    "memory_pct",
    "per_instance_rps_distribution",
    "max_instance_share",
    "load_balanced",
    "power_per_instance_w",
    "power_estimate_w",
    "power_efficiency",
    "scaling_efficiency_vs_baseline",
    "latency_inflation_vs_baseline",
    "test_duration_s",
    "degraded",
    "failure_reason",
];

/// One dataset row. Null numeric fields are written as empty cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub timestamp: DateTime<Utc>,
    pub test_id: u32,
    pub replicas: u32,
    pub repetition: u32,
    pub concurrency_level: usize,
    pub stop_condition: String,
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
    /// `instance:rps` pairs separated by `;`
    pub per_instance_rps_distribution: String,
    pub max_instance_share: Option<f64>,
    pub load_balanced: bool,
    pub power_per_instance_w: Option<f64>,
    pub power_estimate_w: Option<f64>,
    pub power_efficiency: Option<f64>,
    pub scaling_efficiency_vs_baseline: Option<f64>,
    pub latency_inflation_vs_baseline: Option<f64>,
    pub test_duration_s: f64,
    pub degraded: bool,
    /// Degraded reasons separated by `;`
    pub failure_reason: String,
}

impl DatasetRow {
    /// Per-instance RPS parsed back from the distribution cell
    pub fn distribution(&self) -> BTreeMap<String, f64> {
        self.per_instance_rps_distribution
            .split(';')
            .filter_map(|pair| {
                let (instance, rps) = pair.rsplit_once(':')?;
                Some((instance.to_string(), rps.parse().ok()?))
            })
            .collect()
    }

    /// Degraded reasons parsed back from the failure cell; unknown entries are skipped
    pub fn failure_reasons(&self) -> Vec<DegradedReason> {
        self.failure_reason
            .split(';')
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

fn format_distribution(per_instance: &BTreeMap<String, f64>) -> String {
    per_instance
        .iter()
        .map(|(instance, rps)| format!("{}:{:.3}", instance, rps))
        .collect::<Vec<_>>()
        .join(";")
}

impl From<&TestResult> for DatasetRow {
    fn from(result: &TestResult) -> Self {
        Self {
            timestamp: result.timestamp,
            test_id: result.test_id,
            replicas: result.replicas,
            repetition: result.repetition,
            concurrency_level: result.concurrency_level,
            stop_condition: result.stop_condition.to_string(),
            total_requests: result.total_requests,
            successful_requests: result.successful_requests,
            failed_requests: result.failed_requests,
            timeout_requests: result.timeout_requests,
            connection_errors: result.connection_errors,
            http_errors: result.http_errors,
            rps: result.rps,
            rps_per_replica: result.rps_per_replica,
            latency_avg_ms: result.latency_avg_ms,
            latency_max_ms: result.latency_max_ms,
            latency_p95_ms: result.latency_p95_ms,
            success_rate: result.success_rate,
            cpu_pct: result.cpu_pct,
            memory_pct: result.memory_pct,
            per_instance_rps_distribution: format_distribution(&result.per_instance_rps),
            max_instance_share: result.max_instance_share,
            load_balanced: result.load_balanced,
            power_per_instance_w: result.power_per_instance_w,
            power_estimate_w: result.power_estimate_w,
            power_efficiency: result.power_efficiency,
            scaling_efficiency_vs_baseline: result.scaling_efficiency_vs_baseline,
            latency_inflation_vs_baseline: result.latency_inflation_vs_baseline,
            test_duration_s: result.test_duration.as_secs_f64(),
            degraded: result.is_degraded(),
            failure_reason: result
                .failure_reasons
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaleprobe_core::{MetricKind, StopCondition, TestConfiguration};
    use std::time::Duration;

    #[test]
    fn test_header_matches_serialized_field_order() {
        let config = TestConfiguration {
            test_id: 1,
            replica_count: 2,
            concurrency_level: 4,
            stop_condition: StopCondition::RequestCount(100),
            repetition_index: 0,
        };
        let row = DatasetRow::from(&TestResult::failed(
            &config,
            DegradedReason::ReadinessTimeout,
            Duration::from_secs(90),
        ));

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&row).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let header_line = text.lines().next().unwrap();
        assert_eq!(header_line, HEADER.join(","));
    }

    #[test]
    fn test_distribution_and_reasons_parse_back() {
        let row = DatasetRow {
            per_instance_rps_distribution: "factorial-a:12.300;factorial-b:11.900".to_string(),
            failure_reason: "metric_unavailable:cpu;baseline_missing".to_string(),
            ..sample_row()
        };
        let distribution = row.distribution();
        assert_eq!(distribution.len(), 2);
        assert_eq!(distribution["factorial-b"], 11.9);
        assert_eq!(
            row.failure_reasons(),
            vec![
                DegradedReason::MetricUnavailable(MetricKind::Cpu),
                DegradedReason::BaselineMissing
            ]
        );
    }

    fn sample_row() -> DatasetRow {
        let config = TestConfiguration {
            test_id: 1,
            replica_count: 1,
            concurrency_level: 4,
            stop_condition: StopCondition::Duration(Duration::from_secs(15)),
            repetition_index: 0,
        };
        DatasetRow::from(&TestResult::failed(
            &config,
            DegradedReason::ScaleFailed,
            Duration::from_secs(1),
        ))
    }
}
