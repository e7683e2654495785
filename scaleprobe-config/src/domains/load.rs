//! Load generation configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Closed-loop load generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Number of concurrently outstanding requests
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// When a load window ends
    #[serde(default)]
    pub stop: StopConditionConfig,

    /// Discarded warmup window before each measured window; zero disables it
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_warmup")]
    pub warmup: Duration,

    /// Warmup concurrency; falls back to `concurrency`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warmup_concurrency: Option<usize>,

    /// How request inputs are generated
    #[serde(default)]
    pub input: InputConfig,
}

/// Stop condition of a load window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopConditionConfig {
    /// Run for a fixed wall-clock time
    Duration { seconds: u64 },
    /// Run until this many requests have been issued
    Requests { count: u64 },
}

/// Request input generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    #[serde(default)]
    pub mode: InputMode,

    /// Candidate inputs substituted into the request path
    #[serde(default = "default_values")]
    pub values: Vec<u64>,

    /// Relative weights for `weighted` mode, aligned with `values`
    #[serde(default = "default_weights")]
    pub weights: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Cycle through the values in order
    RoundRobin,
    /// Draw values at random according to `weights`
    #[default]
    Weighted,
}

impl LoadConfig {
    pub fn effective_warmup_concurrency(&self) -> usize {
        self.warmup_concurrency.unwrap_or(self.concurrency)
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            stop: StopConditionConfig::default(),
            warmup: default_warmup(),
            warmup_concurrency: None,
            input: InputConfig::default(),
        }
    }
}

impl Default for StopConditionConfig {
    fn default() -> Self {
        StopConditionConfig::Duration { seconds: 15 }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mode: InputMode::default(),
            values: default_values(),
            weights: default_weights(),
        }
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "round_robin" => Ok(InputMode::RoundRobin),
            "weighted" => Ok(InputMode::Weighted),
            _ => Err(format!("Invalid input mode: {}", s)),
        }
    }
}

impl Validatable for LoadConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.concurrency, "concurrency", self.domain_name())?;

        match self.stop {
            StopConditionConfig::Duration { seconds } => {
                validate_positive(seconds, "stop.seconds", self.domain_name())?
            }
            StopConditionConfig::Requests { count } => {
                validate_positive(count, "stop.count", self.domain_name())?
            }
        }

        if let Some(warmup_concurrency) = self.warmup_concurrency {
            validate_positive(warmup_concurrency, "warmup_concurrency", self.domain_name())?;
        }

        self.input.validate()
    }

    fn domain_name(&self) -> &'static str {
        "load"
    }
}

impl Validatable for InputConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.values.is_empty() {
            return Err(self.validation_error("values cannot be empty"));
        }

        if self.mode == InputMode::Weighted {
            if self.weights.len() != self.values.len() {
                return Err(self.validation_error(format!(
                    "weights must match values in length ({} weights, {} values)",
                    self.weights.len(),
                    self.values.len()
                )));
            }
            if self.weights.iter().all(|w| *w == 0) {
                return Err(self.validation_error("at least one weight must be non-zero"));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load.input"
    }
}

fn default_concurrency() -> usize {
    20
}

fn default_warmup() -> Duration {
    Duration::from_secs(3)
}

fn default_values() -> Vec<u64> {
    vec![40, 90, 140, 150, 200]
}

fn default_weights() -> Vec<u32> {
    vec![40, 30, 20, 8, 2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = LoadConfig::default();
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.stop, StopConditionConfig::Duration { seconds: 15 });
        assert_eq!(config.effective_warmup_concurrency(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_count_stop_condition() {
        let yaml = r#"
concurrency: 4
stop:
  type: requests
  count: 500
warmup_concurrency: 2
input:
  mode: round_robin
  values: [10, 20]
"#;
        let config: LoadConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.stop, StopConditionConfig::Requests { count: 500 });
        assert_eq!(config.effective_warmup_concurrency(), 2);
        assert_eq!(config.input.mode, InputMode::RoundRobin);
        // weights are ignored outside weighted mode
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_input_validation() {
        let mut config = LoadConfig::default();
        config.input.weights.pop();
        assert!(config.validate().is_err());

        let mut config = LoadConfig::default();
        config.input.weights = vec![0; 5];
        assert!(config.validate().is_err());

        let mut config = LoadConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = LoadConfig::default();
        config.stop = StopConditionConfig::Requests { count: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_input_mode_from_str() {
        assert_eq!("round-robin".parse::<InputMode>().unwrap(), InputMode::RoundRobin);
        assert_eq!("Weighted".parse::<InputMode>().unwrap(), InputMode::Weighted);
        assert!("random".parse::<InputMode>().is_err());
    }
}
