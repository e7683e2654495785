//! Deployment platform configuration

use crate::domains::retry::RetrySettings;
use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Where the target deployment lives and how to scale it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    #[serde(default)]
    pub platform: PlatformKind,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Deployment name
    #[serde(default = "default_name")]
    pub name: String,

    /// Label selector matching the deployment's instances
    #[serde(default = "default_selector")]
    pub selector: String,

    #[serde(default = "default_kubectl_path")]
    pub kubectl_path: String,

    /// Timeout for a single platform command
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_command_timeout"
    )]
    pub command_timeout: Duration,

    /// Retry policy for the scale command
    #[serde(default = "default_scale_retry")]
    pub scale_retry: RetrySettings,

    /// Maximum wait for all instances to report ready
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_readiness_timeout"
    )]
    pub readiness_timeout: Duration,

    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_poll_interval"
    )]
    pub poll_interval: Duration,

    /// Settle time after readiness, before warmup
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_stabilization"
    )]
    pub stabilization: Duration,

    /// Pause between consecutive tests
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_cooldown")]
    pub cooldown: Duration,
}

/// Deployment platform backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Scale through the `kubectl` CLI
    #[default]
    Kubectl,
    /// Operator scales by hand; readiness is assumed after stabilization
    Manual,
}

impl FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kubectl" => Ok(PlatformKind::Kubectl),
            "manual" => Ok(PlatformKind::Manual),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKind::default(),
            namespace: default_namespace(),
            name: default_name(),
            selector: default_selector(),
            kubectl_path: default_kubectl_path(),
            command_timeout: default_command_timeout(),
            scale_retry: default_scale_retry(),
            readiness_timeout: default_readiness_timeout(),
            poll_interval: default_poll_interval(),
            stabilization: default_stabilization(),
            cooldown: default_cooldown(),
        }
    }
}

impl Validatable for DeploymentConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.namespace, "namespace", self.domain_name())?;
        validate_required_string(&self.name, "name", self.domain_name())?;

        if self.platform == PlatformKind::Kubectl {
            validate_required_string(&self.selector, "selector", self.domain_name())?;
            validate_required_string(&self.kubectl_path, "kubectl_path", self.domain_name())?;
            validate_positive(self.command_timeout.as_secs(), "command_timeout", self.domain_name())?;
            validate_positive(self.poll_interval.as_secs(), "poll_interval", self.domain_name())?;
        }

        validate_positive(
            self.readiness_timeout.as_secs(),
            "readiness_timeout",
            self.domain_name(),
        )?;
        self.scale_retry.validate()?;

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "deployment"
    }
}

fn default_namespace() -> String {
    "factorial-service".to_string()
}

fn default_name() -> String {
    "factorial-service".to_string()
}

fn default_selector() -> String {
    "app=factorial-service".to_string()
}

fn default_kubectl_path() -> String {
    "kubectl".to_string()
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_scale_retry() -> RetrySettings {
    RetrySettings::exponential(3, Duration::from_secs(1), Duration::from_secs(10))
}

fn default_readiness_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_stabilization() -> Duration {
    Duration::from_secs(8)
}

fn default_cooldown() -> Duration {
    Duration::from_secs(5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_defaults() {
        let config = DeploymentConfig::default();
        assert_eq!(config.platform, PlatformKind::Kubectl);
        assert_eq!(config.readiness_timeout, Duration::from_secs(90));
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.stabilization, Duration::from_secs(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_manual_platform_does_not_need_kubectl() {
        let yaml = r#"
platform: manual
kubectl_path: ""
selector: ""
"#;
        let config: DeploymentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.platform, PlatformKind::Manual);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_platform_kind_from_str() {
        assert_eq!("KUBECTL".parse::<PlatformKind>().unwrap(), PlatformKind::Kubectl);
        assert_eq!("manual".parse::<PlatformKind>().unwrap(), PlatformKind::Manual);
        assert!("nomad".parse::<PlatformKind>().is_err());
    }
}
