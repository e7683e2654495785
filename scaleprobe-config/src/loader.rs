//! Configuration loading and environment variable handling

use crate::domains::ScaleProbeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `SCALEPROBE` prefix
    pub fn new() -> Self {
        Self {
            prefix: "SCALEPROBE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<ScaleProbeConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ScaleProbeConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<ScaleProbeConfig> {
        let mut config = ScaleProbeConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load from a file when one is given, otherwise from the environment
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<ScaleProbeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut ScaleProbeConfig) -> ConfigResult<()> {
        self.apply_target_overrides(&mut config.target)?;
        self.apply_metrics_overrides(&mut config.metrics)?;
        self.apply_deployment_overrides(&mut config.deployment)?;
        self.apply_load_overrides(&mut config.load)?;
        self.apply_matrix_overrides(&mut config.matrix)?;
        self.apply_output_overrides(&mut config.output)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// A single `TARGET_URL` replaces the strategy list with one direct strategy
    fn apply_target_overrides(
        &self,
        config: &mut crate::domains::target::TargetConfig,
    ) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("TARGET_URL") {
            config.strategies = vec![crate::domains::target::StrategyConfig::Direct { url }];
        }

        if let Some(millis) = self.parse_env::<u64>("REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(millis);
        }

        Ok(())
    }

    fn apply_metrics_overrides(
        &self,
        config: &mut crate::domains::metrics::MetricsConfig,
    ) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("METRICS_URL") {
            config.url = url;
        }

        if let Some(enabled) = self.parse_env::<bool>("METRICS_ENABLED")? {
            config.enabled = enabled;
        }

        Ok(())
    }

    fn apply_deployment_overrides(
        &self,
        config: &mut crate::domains::deployment::DeploymentConfig,
    ) -> ConfigResult<()> {
        if let Ok(namespace) = self.get_env_var("NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(name) = self.get_env_var("DEPLOYMENT") {
            config.name = name;
        }

        if let Some(platform) = self.parse_env("PLATFORM")? {
            config.platform = platform;
        }

        Ok(())
    }

    fn apply_load_overrides(
        &self,
        config: &mut crate::domains::load::LoadConfig,
    ) -> ConfigResult<()> {
        if let Some(concurrency) = self.parse_env::<usize>("CONCURRENCY")? {
            config.concurrency = concurrency;
        }

        if let Some(seconds) = self.parse_env::<u64>("DURATION_SECONDS")? {
            config.stop = crate::domains::load::StopConditionConfig::Duration { seconds };
        }

        if let Some(count) = self.parse_env::<u64>("REQUEST_COUNT")? {
            config.stop = crate::domains::load::StopConditionConfig::Requests { count };
        }

        Ok(())
    }

    fn apply_matrix_overrides(
        &self,
        config: &mut crate::domains::matrix::MatrixConfig,
    ) -> ConfigResult<()> {
        if let Ok(replicas) = self.get_env_var("REPLICAS") {
            config.replica_counts = replicas
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<u32>().map_err(|e| ConfigError::EnvError {
                        var: self.env_name("REPLICAS"),
                        message: format!("'{}': {}", s, e),
                    })
                })
                .collect::<ConfigResult<Vec<_>>>()?;
        }

        if let Some(repetitions) = self.parse_env::<u32>("REPETITIONS")? {
            config.repetitions = repetitions;
        }

        Ok(())
    }

    fn apply_output_overrides(
        &self,
        config: &mut crate::domains::output::OutputConfig,
    ) -> ConfigResult<()> {
        if let Ok(path) = self.get_env_var("DATASET_PATH") {
            config.dataset_path = path.into();
        }

        Ok(())
    }

    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Some(level) = self.parse_env("LOG_LEVEL")? {
            config.level = level;
        }

        if let Some(format) = self.parse_env("LOG_FORMAT")? {
            config.format = format;
        }

        Ok(())
    }

    /// Parse a prefixed variable; unset yields `None`
    fn parse_env<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::EnvError {
                    var: self.env_name(name),
                    message: format!("'{}': {}", raw, e),
                }),
            Err(_) => Ok(None),
        }
    }

    fn env_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(self.env_name(name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
