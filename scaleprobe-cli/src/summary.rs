//! End-of-run scaling summary

use colored::*;
use scaleprobe_core::{mean, DegradedReason};
use scaleprobe_output::DatasetRow;
use std::collections::BTreeMap;

/// Benchmark bands for scaling efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfficiencyBand {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl EfficiencyBand {
    pub fn classify(efficiency: f64) -> Self {
        if efficiency > 85.0 {
            EfficiencyBand::Excellent
        } else if efficiency > 70.0 {
            EfficiencyBand::Good
        } else if efficiency > 50.0 {
            EfficiencyBand::Moderate
        } else {
            EfficiencyBand::Poor
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EfficiencyBand::Excellent => "excellent",
            EfficiencyBand::Good => "good",
            EfficiencyBand::Moderate => "moderate",
            EfficiencyBand::Poor => "poor",
        }
    }

    fn paint(&self, text: String) -> ColoredString {
        match self {
            EfficiencyBand::Excellent => text.bright_green().bold(),
            EfficiencyBand::Good => text.green(),
            EfficiencyBand::Moderate => text.yellow(),
            EfficiencyBand::Poor => text.bright_red(),
        }
    }
}

/// How efficiency moves from the smallest to the largest replica count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfficiencyTrend {
    Improves,
    Stable,
    ModerateDecrease,
    SignificantLoss,
}

impl EfficiencyTrend {
    /// `change` is last minus first, in percentage points
    pub fn classify(change: f64) -> Self {
        if change > 5.0 {
            EfficiencyTrend::Improves
        } else if change > -10.0 {
            EfficiencyTrend::Stable
        } else if change > -25.0 {
            EfficiencyTrend::ModerateDecrease
        } else {
            EfficiencyTrend::SignificantLoss
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            EfficiencyTrend::Improves => "efficiency improves as replicas are added",
            EfficiencyTrend::Stable => "efficiency stays roughly stable as replicas are added",
            EfficiencyTrend::ModerateDecrease => {
                "efficiency decreases moderately as replicas are added"
            }
            EfficiencyTrend::SignificantLoss => {
                "efficiency drops significantly as replicas are added"
            }
        }
    }
}

/// Averages over every completed test with one replica count
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaSummary {
    pub replicas: u32,
    pub tests: usize,
    pub completed: usize,
    pub rps: Option<f64>,
    pub rps_per_replica: Option<f64>,
    /// Throughput relative to the single-replica average
    pub scale_factor: Option<f64>,
    pub efficiency: Option<f64>,
}

/// A test whose request volume was not spread evenly
#[derive(Debug, Clone, PartialEq)]
pub struct LoadAnomaly {
    pub test_id: u32,
    pub replicas: u32,
    pub max_instance_share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalingSummary {
    pub total_tests: usize,
    pub degraded_tests: usize,
    pub by_replicas: Vec<ReplicaSummary>,
    pub anomalies: Vec<LoadAnomaly>,
    /// Mean efficiency of the multi-replica configurations
    pub overall_efficiency: Option<f64>,
    /// Efficiency change from the smallest to the largest multi-replica count
    pub trend: Option<f64>,
}

fn completed(row: &DatasetRow) -> bool {
    !row.failure_reasons().iter().any(DegradedReason::is_fatal_to_test)
}

/// Throughput of a row with enough successes to derive anything from
fn measured_rps(row: &DatasetRow) -> Option<f64> {
    row.rps_per_replica.and(row.rps)
}

impl ScalingSummary {
    pub fn from_rows(rows: &[DatasetRow]) -> Self {
        let mut groups: BTreeMap<u32, Vec<&DatasetRow>> = BTreeMap::new();
        for row in rows {
            groups.entry(row.replicas).or_default().push(row);
        }

        let averaged = |rows: &[&DatasetRow], field: fn(&DatasetRow) -> Option<f64>| {
            let values: Vec<f64> = rows.iter().filter_map(|r| field(r)).collect();
            mean(&values)
        };

        let mut by_replicas = Vec::with_capacity(groups.len());
        for (replicas, group) in &groups {
            let done: Vec<&DatasetRow> = group.iter().copied().filter(|r| completed(r)).collect();
            by_replicas.push(ReplicaSummary {
                replicas: *replicas,
                tests: group.len(),
                completed: done.len(),
                rps: averaged(&done, measured_rps),
                rps_per_replica: averaged(&done, |r| r.rps_per_replica),
                scale_factor: None,
                efficiency: averaged(&done, |r| r.scaling_efficiency_vs_baseline),
            });
        }

        let single_rps = by_replicas
            .iter()
            .find(|s| s.replicas == 1)
            .and_then(|s| s.rps)
            .filter(|rps| *rps > 0.0);
        for summary in &mut by_replicas {
            summary.scale_factor = match (summary.rps, single_rps) {
                (Some(rps), Some(base)) => Some(rps / base),
                _ => None,
            };
        }

        let multi: Vec<f64> = by_replicas
            .iter()
            .filter(|s| s.replicas > 1)
            .filter_map(|s| s.efficiency)
            .collect();

        // the single-replica group is 100 by definition and is left out
        let trend = match (multi.first(), multi.last()) {
            (Some(first), Some(last)) if multi.len() >= 2 => Some(last - first),
            _ => None,
        };

        let anomalies = rows
            .iter()
            .filter(|r| completed(r) && !r.load_balanced)
            .map(|r| LoadAnomaly {
                test_id: r.test_id,
                replicas: r.replicas,
                max_instance_share: r.max_instance_share,
            })
            .collect();

        Self {
            total_tests: rows.len(),
            degraded_tests: rows.iter().filter(|r| r.degraded).count(),
            by_replicas,
            anomalies,
            overall_efficiency: mean(&multi),
            trend,
        }
    }

    pub fn print(&self) {
        println!();
        println!("{}", "Scaling summary".bright_cyan().bold());

        if self.by_replicas.is_empty() {
            println!("{} No tests recorded", "ℹ".bright_blue().bold());
            return;
        }

        println!(
            "{:>8}  {:>10}  {:>12}  {:>12}  {:>12}  {:>6}",
            "Replicas".bold(),
            "RPS".bold(),
            "Per-Replica".bold(),
            "Scale Factor".bold(),
            "Efficiency".bold(),
            "Tests".bold()
        );
        for summary in &self.by_replicas {
            let efficiency = match summary.efficiency {
                Some(e) => EfficiencyBand::classify(e).paint(format!("{:>11.1}%", e)),
                None => format!("{:>12}", "-").normal(),
            };
            println!(
                "{:>8}  {:>10}  {:>12}  {:>12}  {}  {:>6}",
                summary.replicas,
                fmt_opt(summary.rps, 1),
                fmt_opt(summary.rps_per_replica, 1),
                summary
                    .scale_factor
                    .map(|f| format!("{:.2}x", f))
                    .unwrap_or_else(|| "-".to_string()),
                efficiency,
                format!("{}/{}", summary.completed, summary.tests)
            );
        }
        println!();

        match self.overall_efficiency {
            Some(efficiency) => {
                let band = EfficiencyBand::classify(efficiency);
                println!(
                    "Overall scaling efficiency: {}",
                    band.paint(format!("{:.1}% ({})", efficiency, band.label()))
                );
            }
            None => println!("Overall scaling efficiency: not enough multi-replica data"),
        }

        if let Some(change) = self.trend {
            println!(
                "{} {} ({:+.1} points)",
                "ℹ".bright_blue().bold(),
                EfficiencyTrend::classify(change).describe(),
                change
            );
        }

        if self.anomalies.is_empty() {
            println!("{} Load was balanced in every completed test", "✓".bright_green().bold());
        } else {
            for anomaly in &self.anomalies {
                let share = anomaly
                    .max_instance_share
                    .map(|s| format!("busiest instance served {:.1}%", s * 100.0))
                    .unwrap_or_else(|| "no per-instance distribution available".to_string());
                println!(
                    "{} {}",
                    "⚠".bright_yellow().bold(),
                    format!(
                        "Test {} ({} replicas): uneven load, {}; investigate the load balancer",
                        anomaly.test_id, anomaly.replicas, share
                    )
                    .bright_yellow()
                );
            }
        }

        if self.degraded_tests > 0 {
            println!(
                "{} {} of {} tests recorded degraded data",
                "⚠".bright_yellow().bold(),
                self.degraded_tests,
                self.total_tests
            );
        }
    }
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".to_string())
}
