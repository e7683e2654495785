//! Target service configuration

use crate::domains::retry::RetrySettings;
use crate::error::ConfigResult;
use crate::validation::{
    validate_http_url, validate_path, validate_port, validate_positive, validate_required_string,
    Validatable,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How to reach the target service and what its responses look like
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Connectivity strategies, tried in order
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,

    /// Request path template; `{n}` is replaced by the generated input
    #[serde(default = "default_request_path")]
    pub request_path: String,

    /// Lightweight probe path used for connectivity checks
    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// Field that must be present in a probe's JSON body
    #[serde(skip_serializing_if = "Option::is_none", default = "default_probe_expect_field")]
    pub probe_expect_field: Option<String>,

    /// Response field carrying the serving instance's label
    #[serde(default = "default_instance_field")]
    pub instance_field: String,

    /// Per-request timeout during load windows
    #[serde(
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_request_timeout",
        rename = "request_timeout_ms"
    )]
    pub request_timeout: Duration,

    /// Per-probe timeout during resolution
    #[serde(
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_probe_timeout",
        rename = "probe_timeout_ms"
    )]
    pub probe_timeout: Duration,

    /// Retry policy applied to each strategy's probe
    #[serde(default)]
    pub probe_retry: RetrySettings,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// One way of reaching the target service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Cluster-exposed address such as a NodePort
    Direct { url: String },

    /// Load-balancer address exposed through a local tunnel
    Tunnel { url: String },

    /// Locally forwarded port, optionally started by the harness
    PortForward {
        #[serde(default = "default_local_port")]
        local_port: u16,
        #[serde(default = "default_remote_port")]
        remote_port: u16,
        /// Service to forward; required when `spawn` is set
        #[serde(skip_serializing_if = "Option::is_none")]
        service: Option<String>,
        /// Launch `kubectl port-forward` before probing
        #[serde(default = "crate::domains::utils::default_false")]
        spawn: bool,
    },
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            request_path: default_request_path(),
            probe_path: default_probe_path(),
            probe_expect_field: default_probe_expect_field(),
            instance_field: default_instance_field(),
            request_timeout: default_request_timeout(),
            probe_timeout: default_probe_timeout(),
            probe_retry: RetrySettings::default(),
            user_agent: default_user_agent(),
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.strategies.is_empty() {
            return Err(self.validation_error("at least one connectivity strategy is required"));
        }
        for strategy in &self.strategies {
            strategy.validate()?;
        }

        validate_path(&self.request_path, "request_path", self.domain_name())?;
        validate_path(&self.probe_path, "probe_path", self.domain_name())?;
        validate_required_string(&self.instance_field, "instance_field", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        validate_positive(
            self.request_timeout.as_millis(),
            "request_timeout_ms",
            self.domain_name(),
        )?;
        validate_positive(
            self.probe_timeout.as_millis(),
            "probe_timeout_ms",
            self.domain_name(),
        )?;
        self.probe_retry.validate()?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

impl Validatable for StrategyConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self {
            StrategyConfig::Direct { url } | StrategyConfig::Tunnel { url } => {
                validate_http_url(url, "url", self.domain_name())
            }
            StrategyConfig::PortForward {
                local_port,
                remote_port,
                service,
                spawn,
            } => {
                validate_port(*local_port, "local_port", self.domain_name())?;
                validate_port(*remote_port, "remote_port", self.domain_name())?;
                if *spawn && service.as_deref().map_or(true, |s| s.trim().is_empty()) {
                    return Err(self.validation_error("service is required when spawn is enabled"));
                }
                Ok(())
            }
        }
    }

    fn domain_name(&self) -> &'static str {
        "target.strategies"
    }
}

// Default value functions
fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::Direct {
            url: "http://192.168.49.2:30080".to_string(),
        },
        StrategyConfig::Tunnel {
            url: "http://localhost".to_string(),
        },
        StrategyConfig::PortForward {
            local_port: default_local_port(),
            remote_port: default_remote_port(),
            service: None,
            spawn: false,
        },
    ]
}

fn default_request_path() -> String {
    "/factorial/{n}".to_string()
}

fn default_probe_path() -> String {
    "/factorial/50".to_string()
}

fn default_probe_expect_field() -> Option<String> {
    Some("number".to_string())
}

fn default_instance_field() -> String {
    "worker_pid".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_user_agent() -> String {
    concat!("scaleprobe/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_local_port() -> u16 {
    8080
}

fn default_remote_port() -> u16 {
    8000
}
