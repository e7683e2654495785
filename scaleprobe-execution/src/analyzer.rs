//! Scaling analysis
//!
//! Turns one load window and its metric samples into a [`TestResult`].
//! Missing inputs never fail the analysis; the affected fields are left
//! empty and the reason is recorded on the row.

use crate::load::LoadRun;
use chrono::Utc;
use scaleprobe_config::{AnalysisConfig, PowerModelConfig};
use scaleprobe_core::{
    mean, Baseline, BaselineCell, DegradedReason, LoadStats, MetricKind, SampleSet,
    TestConfiguration, TestResult,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Increase of a monotonic counter across `points`, tolerating resets
pub fn counter_increase(points: &[f64]) -> f64 {
    points
        .windows(2)
        .map(|pair| {
            let (prev, next) = (pair[0], pair[1]);
            if next >= prev {
                next - prev
            } else {
                // counter restarted from zero
                next
            }
        })
        .sum()
}

/// Whether request volume is spread evenly enough across instances
pub fn is_load_balanced(max_share: f64, replicas: u32, fairness_threshold: f64) -> bool {
    if replicas <= 1 {
        return true;
    }
    max_share <= fairness_threshold / replicas as f64
}

/// Estimated draw of one instance from the power model
pub fn instance_power(model: &PowerModelConfig, cpu_fraction: f64, memory_gib: f64, instance_rps: f64) -> f64 {
    let cpu = model.cpu_watts * cpu_fraction.max(0.0).powf(model.cpu_exponent);
    let memory = model.memory_watts_per_gib * memory_gib.max(0.0);
    let io = (instance_rps.max(0.0) / model.io_rps_scale * model.io_watts).min(model.io_cap_watts);
    model.base_watts + cpu + memory + io
}

/// Request share per instance, from the request counter when possible and
/// from response labels otherwise
fn request_shares(samples: &SampleSet, run: &LoadRun) -> BTreeMap<String, f64> {
    if samples.is_available(MetricKind::RequestCount) {
        let increases: BTreeMap<String, f64> = samples
            .series(MetricKind::RequestCount)
            .into_iter()
            .map(|(instance, points)| {
                let values: Vec<f64> = points.into_iter().map(|(_, v)| v).collect();
                (instance, counter_increase(&values))
            })
            .collect();
        let total: f64 = increases.values().sum();
        if total > 0.0 {
            return increases
                .into_iter()
                .map(|(instance, increase)| (instance, increase / total))
                .collect();
        }
        debug!("Request counter did not move; falling back to response labels");
    }

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for outcome in run.outcomes.iter().filter(|o| o.is_success()) {
        if let Some(instance) = &outcome.instance {
            *counts.entry(instance.clone()).or_default() += 1;
        }
    }
    let total: u64 = counts.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }
    counts
        .into_iter()
        .map(|(instance, count)| (instance, count as f64 / total as f64))
        .collect()
}

/// Average over instances of each instance's mean value
fn instance_average(samples: &SampleSet, kind: MetricKind) -> Option<f64> {
    if !samples.is_available(kind) {
        return None;
    }
    let per_instance: Vec<f64> = samples
        .series(kind)
        .values()
        .filter_map(|points| {
            let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
            mean(&values)
        })
        .collect();
    mean(&per_instance)
}

/// Derives a [`TestResult`] from a finished load window
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn analyze(
        &self,
        test: &TestConfiguration,
        run: &LoadRun,
        samples: &SampleSet,
        baseline: &mut BaselineCell,
        test_duration: Duration,
    ) -> TestResult {
        let stats = LoadStats::from_outcomes(&run.outcomes, run.elapsed);
        let replicas = test.replica_count.max(1);
        let mut reasons = Vec::new();

        let sufficient = stats.successful >= self.config.min_successful_requests;
        if !sufficient {
            warn!(
                test_id = test.test_id,
                "Only {} successful requests (minimum {}); throughput-derived fields left empty",
                stats.successful,
                self.config.min_successful_requests
            );
            reasons.push(DegradedReason::InsufficientSuccesses);
        }

        // Resource utilisation as a percentage of the configured limits
        let cpu_cores = instance_average(samples, MetricKind::Cpu);
        let memory_bytes = instance_average(samples, MetricKind::Memory);
        if cpu_cores.is_none() {
            reasons.push(DegradedReason::MetricUnavailable(MetricKind::Cpu));
        }
        if memory_bytes.is_none() {
            reasons.push(DegradedReason::MetricUnavailable(MetricKind::Memory));
        }
        let cpu_pct = cpu_cores.map(|cores| cores / self.config.cpu_limit_cores * 100.0);
        let memory_pct =
            memory_bytes.map(|bytes| bytes / self.config.memory_limit_bytes as f64 * 100.0);

        if let Some(observed) = samples
            .series(MetricKind::ReplicaCount)
            .values()
            .filter_map(|points| points.last().map(|(_, v)| *v))
            .reduce(f64::max)
        {
            if observed.round() as u32 != replicas {
                warn!(
                    "Platform reported {} replicas during test {} (expected {})",
                    observed, test.test_id, replicas
                );
            }
        }

        // Load distribution
        let shares = request_shares(samples, run);
        let max_instance_share = shares.values().copied().reduce(f64::max);
        let load_balanced = match max_instance_share {
            Some(share) => is_load_balanced(share, replicas, self.config.fairness_threshold),
            None if replicas == 1 => true,
            None => {
                reasons.push(DegradedReason::DistributionUnavailable);
                false
            }
        };
        if !load_balanced {
            if let Some(share) = max_instance_share {
                warn!(
                    test_id = test.test_id,
                    "Uneven load: busiest instance served {:.1}% across {} replicas",
                    share * 100.0,
                    replicas
                );
            }
        }

        let rps = sufficient.then_some(stats.rps);
        let rps_per_replica = rps.map(|r| r / replicas as f64);
        let per_instance_rps = match rps {
            Some(rps) => shares
                .iter()
                .map(|(instance, share)| (instance.clone(), share * rps))
                .collect(),
            None => BTreeMap::new(),
        };

        // Power model
        let power_per_instance_w = match (cpu_pct, memory_bytes) {
            (Some(cpu_pct), Some(memory_bytes)) => Some(instance_power(
                &self.config.power,
                cpu_pct / 100.0,
                memory_bytes / BYTES_PER_GIB,
                stats.rps / replicas as f64,
            )),
            _ => None,
        };
        let power_estimate_w = power_per_instance_w.map(|w| w * replicas as f64);
        let power_efficiency = match (rps, power_estimate_w) {
            (Some(rps), Some(watts)) if watts > 0.0 => Some(rps / watts),
            _ => None,
        };

        // Efficiency against the single-replica baseline
        if sufficient && replicas == Baseline::REPLICA_COUNT {
            let established = baseline.establish(Baseline {
                rps: stats.rps,
                per_instance_rps: stats.rps,
                latency_avg_ms: stats.latency_avg_ms,
                source_test_id: test.test_id,
            });
            if established {
                info!(
                    test_id = test.test_id,
                    "Baseline established at {:.2} rps", stats.rps
                );
            }
        }

        let scaling_efficiency_vs_baseline = match (rps, baseline.get()) {
            _ if !sufficient => None,
            (Some(_), _) if replicas == Baseline::REPLICA_COUNT => Some(100.0),
            (Some(rps), Some(base)) if base.rps > 0.0 => {
                Some(100.0 * rps / (base.rps * replicas as f64))
            }
            _ => {
                reasons.push(DegradedReason::BaselineMissing);
                None
            }
        };

        let latency_inflation_vs_baseline = match (
            sufficient,
            stats.latency_avg_ms,
            baseline.get().and_then(|b| b.latency_avg_ms),
        ) {
            (true, Some(current), Some(reference)) if reference > 0.0 => Some(current / reference),
            _ => None,
        };

        TestResult {
            timestamp: Utc::now(),
            test_id: test.test_id,
            replicas: test.replica_count,
            repetition: test.repetition_index,
            concurrency_level: test.concurrency_level,
            stop_condition: test.stop_condition,
            total_requests: stats.total,
            successful_requests: stats.successful,
            failed_requests: stats.failed,
            timeout_requests: stats.timeouts,
            connection_errors: stats.connection_errors,
            http_errors: stats.http_errors,
            // the measured rate is always reported, even when it is zero
            rps: Some(stats.rps),
            rps_per_replica,
            latency_avg_ms: stats.latency_avg_ms,
            latency_max_ms: stats.latency_max_ms,
            latency_p95_ms: stats.latency_p95_ms,
            success_rate: stats.success_rate,
            cpu_pct,
            memory_pct,
            per_instance_rps,
            max_instance_share,
            load_balanced,
            power_per_instance_w,
            power_estimate_w,
            power_efficiency,
            scaling_efficiency_vs_baseline,
            latency_inflation_vs_baseline,
            test_duration,
            failure_reasons: reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use scaleprobe_core::{MetricSample, RequestOutcome, RequestStatus, StopCondition, TimeWindow};
    use std::collections::BTreeSet;

    fn test_config(test_id: u32, replicas: u32) -> TestConfiguration {
        TestConfiguration {
            test_id,
            replica_count: replicas,
            concurrency_level: 20,
            stop_condition: StopCondition::Duration(Duration::from_secs(10)),
            repetition_index: 0,
        }
    }

    fn outcome(status: RequestStatus, latency_ms: u64, instance: Option<&str>) -> RequestOutcome {
        RequestOutcome {
            issued_at: Utc::now(),
            latency: Duration::from_millis(latency_ms),
            status,
            instance: instance.map(str::to_string),
        }
    }

    /// `successes` successful requests over 10 s, spread by `split`
    fn run(successes: usize, split: &[(&str, usize)]) -> LoadRun {
        let mut outcomes = Vec::new();
        for (instance, count) in split {
            outcomes.extend((0..*count).map(|_| outcome(RequestStatus::Success, 50, Some(*instance))));
        }
        let remaining = successes.saturating_sub(outcomes.len());
        outcomes.extend((0..remaining).map(|_| outcome(RequestStatus::Success, 50, None)));

        let end = Utc::now();
        LoadRun {
            outcomes,
            window: TimeWindow::new(end - ChronoDuration::seconds(10), end),
            elapsed: Duration::from_secs(10),
        }
    }

    fn counter_samples(increases: &[(&str, f64)]) -> SampleSet {
        let t0 = Utc::now() - ChronoDuration::seconds(20);
        let mut samples = Vec::new();
        for (instance, increase) in increases {
            for (offset, value) in [(0, 100.0), (15, 100.0 + increase)] {
                samples.push(MetricSample {
                    metric: MetricKind::RequestCount,
                    instance: instance.to_string(),
                    value,
                    sampled_at: t0 + ChronoDuration::seconds(offset),
                });
            }
        }
        SampleSet {
            samples,
            unavailable: BTreeSet::new(),
        }
    }

    fn with_resources(mut set: SampleSet, instances: &[&str], cores: f64, bytes: f64) -> SampleSet {
        let t0 = Utc::now() - ChronoDuration::seconds(20);
        for instance in instances {
            set.samples.push(MetricSample {
                metric: MetricKind::Cpu,
                instance: instance.to_string(),
                value: cores,
                sampled_at: t0,
            });
            set.samples.push(MetricSample {
                metric: MetricKind::Memory,
                instance: instance.to_string(),
                value: bytes,
                sampled_at: t0,
            });
        }
        set
    }

    fn baseline(rps: f64) -> BaselineCell {
        BaselineCell::with_baseline(Baseline {
            rps,
            per_instance_rps: rps,
            latency_avg_ms: Some(25.0),
            source_test_id: 1,
        })
    }

    #[test]
    fn test_counter_increase_handles_reset() {
        assert_eq!(counter_increase(&[10.0, 15.0, 30.0]), 20.0);
        assert_eq!(counter_increase(&[10.0, 40.0, 5.0, 8.0]), 38.0);
        assert_eq!(counter_increase(&[7.0]), 0.0);
        assert_eq!(counter_increase(&[]), 0.0);
    }

    #[test]
    fn test_fairness_rule() {
        assert!(is_load_balanced(1.0, 1, 1.5));
        assert!(is_load_balanced(0.5, 2, 1.5));
        assert!(is_load_balanced(0.75, 2, 1.5));
        assert!(!is_load_balanced(0.99, 2, 1.5));
        assert!(!is_load_balanced(0.6, 3, 1.5));
    }

    #[test]
    fn test_skewed_distribution_is_unbalanced() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let samples = counter_samples(&[("pod-a", 990.0), ("pod-b", 10.0)]);
        let mut cell = baseline(50.0);

        let result = analyzer.analyze(&test_config(2, 2), &run(100, &[]), &samples, &mut cell, Duration::from_secs(12));

        assert!(!result.load_balanced);
        assert!((result.max_instance_share.unwrap() - 0.99).abs() < 1e-9);
        assert!((result.per_instance_rps["pod-a"] - 9.9).abs() < 1e-9);
        assert!((result.per_instance_rps["pod-b"] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_single_replica_is_balanced_and_sets_baseline() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = BaselineCell::new();

        let result = analyzer.analyze(
            &test_config(1, 1),
            &run(400, &[("pod-a", 400)]),
            &SampleSet::default(),
            &mut cell,
            Duration::from_secs(12),
        );

        assert!(result.load_balanced);
        assert_eq!(result.scaling_efficiency_vs_baseline, Some(100.0));
        assert_eq!(result.latency_inflation_vs_baseline, Some(1.0));
        let base = cell.get().unwrap();
        assert_eq!(base.source_test_id, 1);
        assert!((base.rps - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_later_single_replica_runs_keep_first_baseline() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = baseline(40.0);

        let result = analyzer.analyze(&test_config(2, 1), &run(600, &[]), &SampleSet::default(), &mut cell, Duration::ZERO);

        assert_eq!(result.scaling_efficiency_vs_baseline, Some(100.0));
        assert!((cell.get().unwrap().rps - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_against_baseline() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = baseline(40.0);
        let samples = counter_samples(&[("pod-a", 500.0), ("pod-b", 520.0)]);

        // 600 successes over 10 s = 60 rps, ideal for 2 replicas is 80
        let result = analyzer.analyze(&test_config(3, 2), &run(600, &[]), &samples, &mut cell, Duration::ZERO);

        let efficiency = result.scaling_efficiency_vs_baseline.unwrap();
        assert!((efficiency - 75.0).abs() < 1e-9);
        assert!(result.load_balanced);
        assert!((result.rps_per_replica.unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_baseline_leaves_efficiency_empty() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = BaselineCell::new();

        let result = analyzer.analyze(
            &test_config(1, 2),
            &run(100, &[("pod-a", 50), ("pod-b", 50)]),
            &SampleSet::default(),
            &mut cell,
            Duration::ZERO,
        );

        assert_eq!(result.scaling_efficiency_vs_baseline, None);
        assert!(result.failure_reasons.contains(&DegradedReason::BaselineMissing));
        assert!(result.load_balanced);
        assert!(cell.get().is_none());
    }

    #[test]
    fn test_all_timeouts_produce_degraded_result() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = baseline(40.0);
        let timeouts = LoadRun {
            outcomes: (0..20).map(|_| outcome(RequestStatus::Timeout, 5000, None)).collect(),
            window: TimeWindow::new(Utc::now(), Utc::now()),
            elapsed: Duration::from_secs(15),
        };

        let result = analyzer.analyze(&test_config(4, 2), &timeouts, &SampleSet::default(), &mut cell, Duration::ZERO);

        assert_eq!(result.success_rate, 0.0);
        assert_eq!(result.rps, Some(0.0));
        assert_eq!(result.timeout_requests, 20);
        assert!(result.is_degraded());
        assert!(result.failure_reasons.contains(&DegradedReason::InsufficientSuccesses));
        assert!(result.failure_reasons.contains(&DegradedReason::DistributionUnavailable));
        assert_eq!(result.rps_per_replica, None);
        assert_eq!(result.scaling_efficiency_vs_baseline, None);
        assert!(!result.load_balanced);
    }

    #[test]
    fn test_response_labels_used_without_counter_metric() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = baseline(10.0);
        let mut samples = SampleSet::default();
        samples.unavailable.insert(MetricKind::RequestCount);

        let result = analyzer.analyze(
            &test_config(2, 2),
            &run(100, &[("101", 60), ("102", 40)]),
            &samples,
            &mut cell,
            Duration::ZERO,
        );

        assert!((result.max_instance_share.unwrap() - 0.6).abs() < 1e-9);
        assert!(result.load_balanced);
        assert!(!result.failure_reasons.contains(&DegradedReason::DistributionUnavailable));
    }

    #[test]
    fn test_resource_percentages_and_power() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = baseline(50.0);
        let samples = with_resources(
            counter_samples(&[("pod-a", 500.0), ("pod-b", 500.0)]),
            &["pod-a", "pod-b"],
            1.0,
            256.0 * 1024.0 * 1024.0,
        );

        let result = analyzer.analyze(&test_config(2, 2), &run(1000, &[]), &samples, &mut cell, Duration::ZERO);

        assert!((result.cpu_pct.unwrap() - 50.0).abs() < 1e-9);
        assert!((result.memory_pct.unwrap() - 50.0).abs() < 1e-9);

        let model = PowerModelConfig::default();
        let expected = instance_power(&model, 0.5, 0.25, 50.0);
        assert!((result.power_per_instance_w.unwrap() - expected).abs() < 1e-9);
        assert!((result.power_estimate_w.unwrap() - 2.0 * expected).abs() < 1e-9);
        assert!((result.power_efficiency.unwrap() - 100.0 / (2.0 * expected)).abs() < 1e-9);
    }

    #[test]
    fn test_missing_resource_metrics_are_flagged() {
        let analyzer = Analyzer::new(AnalysisConfig::default());
        let mut cell = BaselineCell::new();

        let result = analyzer.analyze(&test_config(1, 1), &run(100, &[]), &SampleSet::default(), &mut cell, Duration::ZERO);

        assert_eq!(result.cpu_pct, None);
        assert_eq!(result.power_estimate_w, None);
        assert!(result
            .failure_reasons
            .contains(&DegradedReason::MetricUnavailable(MetricKind::Cpu)));
        assert!(result
            .failure_reasons
            .contains(&DegradedReason::MetricUnavailable(MetricKind::Memory)));
    }

    #[test]
    fn test_power_model_io_term_is_capped() {
        let model = PowerModelConfig::default();
        let idle = instance_power(&model, 0.0, 0.0, 0.0);
        assert!((idle - model.base_watts).abs() < 1e-9);

        let busy = instance_power(&model, 0.0, 0.0, 1_000_000.0);
        assert!((busy - (model.base_watts + model.io_cap_watts)).abs() < 1e-9);
    }
}
