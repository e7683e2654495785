//! Analysis and power model configuration

use crate::error::ConfigResult;
use crate::validation::{validate_at_least, validate_positive, Validatable};
use serde::{Deserialize, Serialize};

/// Thresholds and resource limits used to derive a test's metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Balanced when the busiest instance's share is at most this multiple of an even share
    #[serde(default = "default_fairness_threshold")]
    pub fairness_threshold: f64,

    /// Fewer successes than this nulls throughput-derived fields
    #[serde(default = "default_min_successful_requests")]
    pub min_successful_requests: u64,

    /// Per-instance CPU limit used for utilisation percentages
    #[serde(default = "default_cpu_limit_cores")]
    pub cpu_limit_cores: f64,

    /// Per-instance memory limit used for utilisation percentages
    #[serde(default = "default_memory_limit_bytes")]
    pub memory_limit_bytes: u64,

    #[serde(default)]
    pub power: PowerModelConfig,
}

/// Coefficients of the per-instance power estimate.
///
/// `base + (cpu_pct/100)^cpu_exponent * cpu_watts + mem_GiB * memory_watts_per_gib
/// + min(rps / io_rps_scale * io_watts, io_cap_watts)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerModelConfig {
    #[serde(default = "default_base_watts")]
    pub base_watts: f64,
    #[serde(default = "default_cpu_watts")]
    pub cpu_watts: f64,
    #[serde(default = "default_cpu_exponent")]
    pub cpu_exponent: f64,
    #[serde(default = "default_memory_watts_per_gib")]
    pub memory_watts_per_gib: f64,
    #[serde(default = "default_io_watts")]
    pub io_watts: f64,
    #[serde(default = "default_io_rps_scale")]
    pub io_rps_scale: f64,
    #[serde(default = "default_io_cap_watts")]
    pub io_cap_watts: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fairness_threshold: default_fairness_threshold(),
            min_successful_requests: default_min_successful_requests(),
            cpu_limit_cores: default_cpu_limit_cores(),
            memory_limit_bytes: default_memory_limit_bytes(),
            power: PowerModelConfig::default(),
        }
    }
}

impl Default for PowerModelConfig {
    fn default() -> Self {
        Self {
            base_watts: default_base_watts(),
            cpu_watts: default_cpu_watts(),
            cpu_exponent: default_cpu_exponent(),
            memory_watts_per_gib: default_memory_watts_per_gib(),
            io_watts: default_io_watts(),
            io_rps_scale: default_io_rps_scale(),
            io_cap_watts: default_io_cap_watts(),
        }
    }
}

impl Validatable for AnalysisConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_at_least(self.fairness_threshold, 1.0, "fairness_threshold", self.domain_name())?;
        validate_positive(
            self.min_successful_requests,
            "min_successful_requests",
            self.domain_name(),
        )?;
        validate_positive(self.cpu_limit_cores, "cpu_limit_cores", self.domain_name())?;
        validate_positive(self.memory_limit_bytes, "memory_limit_bytes", self.domain_name())?;
        self.power.validate()
    }

    fn domain_name(&self) -> &'static str {
        "analysis"
    }
}

impl Validatable for PowerModelConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("base_watts", self.base_watts),
            ("cpu_watts", self.cpu_watts),
            ("memory_watts_per_gib", self.memory_watts_per_gib),
            ("io_watts", self.io_watts),
            ("io_cap_watts", self.io_cap_watts),
        ] {
            validate_at_least(value, 0.0, name, self.domain_name())?;
        }
        validate_positive(self.cpu_exponent, "cpu_exponent", self.domain_name())?;
        validate_positive(self.io_rps_scale, "io_rps_scale", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "analysis.power"
    }
}

fn default_fairness_threshold() -> f64 {
    1.5
}

fn default_min_successful_requests() -> u64 {
    5
}

fn default_cpu_limit_cores() -> f64 {
    2.0
}

fn default_memory_limit_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_base_watts() -> f64 {
    1.5
}

fn default_cpu_watts() -> f64 {
    4.0
}

fn default_cpu_exponent() -> f64 {
    1.2
}

fn default_memory_watts_per_gib() -> f64 {
    0.4
}

fn default_io_watts() -> f64 {
    0.5
}

fn default_io_rps_scale() -> f64 {
    150.0
}

fn default_io_cap_watts() -> f64 {
    1.2
}
