//! Metrics backend configuration

use crate::domains::retry::RetrySettings;
use crate::error::ConfigResult;
use crate::validation::{validate_http_url, validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prometheus-compatible metrics backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// When disabled every metric is reported unavailable
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Base URL of the query API
    #[serde(default = "default_url")]
    pub url: String,

    /// Timeout for a single range query
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_query_timeout"
    )]
    pub query_timeout: Duration,

    /// Resolution step of range queries
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_step")]
    pub step: Duration,

    /// Extra time after the load window so the last scrape lands inside it
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_scrape_margin"
    )]
    pub scrape_margin: Duration,

    /// Retries for an empty or failed metric query
    #[serde(default = "default_retry")]
    pub retry: RetrySettings,

    /// Series label that identifies the serving instance
    #[serde(default = "default_instance_label")]
    pub instance_label: String,

    /// Query templates, one per metric
    #[serde(default)]
    pub queries: MetricQueries,
}

/// Query templates.
///
/// `{namespace}`, `{deployment}` and `{app}` are substituted before the
/// query is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricQueries {
    /// Cumulative request counter per instance
    #[serde(default = "default_request_count_query")]
    pub request_count: String,

    /// CPU usage per instance, in cores
    #[serde(default = "default_cpu_query")]
    pub cpu: String,

    /// Working-set memory per instance, in bytes
    #[serde(default = "default_memory_query")]
    pub memory: String,

    /// Available replicas reported by the platform
    #[serde(default = "default_replica_count_query")]
    pub replica_count: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_url(),
            query_timeout: default_query_timeout(),
            step: default_step(),
            scrape_margin: default_scrape_margin(),
            retry: default_retry(),
            instance_label: default_instance_label(),
            queries: MetricQueries::default(),
        }
    }
}

impl Default for MetricQueries {
    fn default() -> Self {
        Self {
            request_count: default_request_count_query(),
            cpu: default_cpu_query(),
            memory: default_memory_query(),
            replica_count: default_replica_count_query(),
        }
    }
}

impl Validatable for MetricsConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }

        validate_http_url(&self.url, "url", self.domain_name())?;
        validate_positive(self.query_timeout.as_secs(), "query_timeout", self.domain_name())?;
        validate_positive(self.step.as_secs(), "step", self.domain_name())?;
        validate_required_string(&self.instance_label, "instance_label", self.domain_name())?;
        self.retry.validate()?;

        for (name, query) in [
            ("queries.request_count", &self.queries.request_count),
            ("queries.cpu", &self.queries.cpu),
            ("queries.memory", &self.queries.memory),
            ("queries.replica_count", &self.queries.replica_count),
        ] {
            validate_required_string(query, name, self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "metrics"
    }
}

fn default_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_query_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_step() -> Duration {
    Duration::from_secs(5)
}

fn default_scrape_margin() -> Duration {
    Duration::from_secs(15)
}

fn default_retry() -> RetrySettings {
    RetrySettings::fixed(3, Duration::from_secs(2))
}

fn default_instance_label() -> String {
    "pod".to_string()
}

fn default_request_count_query() -> String {
    r#"sum by (pod) (factorial_requests_total{namespace="{namespace}",pod=~"{deployment}-.*"})"#
        .to_string()
}

fn default_cpu_query() -> String {
    r#"sum by (pod) (rate(container_cpu_usage_seconds_total{namespace="{namespace}",pod=~"{deployment}-.*",container!="POD",container!=""}[1m]))"#
        .to_string()
}

fn default_memory_query() -> String {
    r#"sum by (pod) (container_memory_working_set_bytes{namespace="{namespace}",pod=~"{deployment}-.*",container!="POD",container!=""})"#
        .to_string()
}

fn default_replica_count_query() -> String {
    r#"kube_deployment_status_replicas_available{namespace="{namespace}",deployment="{deployment}"}"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.instance_label, "pod");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.queries.cpu.contains("container!=\"POD\""));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_metrics_skip_validation() {
        let config = MetricsConfig {
            enabled: false,
            url: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_query_override() {
        let yaml = r#"
url: "http://prometheus.monitoring:9090"
queries:
  cpu: "sum by (pod) (rate(cpu_seconds{ns=\"{namespace}\"}[30s]))"
"#;
        let config: MetricsConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.queries.cpu.starts_with("sum by (pod) (rate(cpu_seconds"));
        assert_eq!(config.queries.memory, default_memory_query());
        assert!(config.validate().is_ok());
    }
}
