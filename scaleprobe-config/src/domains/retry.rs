//! Bounded retry settings shared by the probe, scale and metric domains

use crate::error::ConfigResult;
use crate::validation::{validate_at_least, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry settings for one kind of external call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_initial_delay",
        rename = "initial_delay_ms"
    )]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_max_delay",
        rename = "max_delay_ms"
    )]
    pub max_delay: Duration,

    /// Growth factor between delays; 1.0 keeps the delay fixed
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Whether to add +/-20% jitter to each delay
    #[serde(default = "crate::domains::utils::default_false")]
    pub jitter: bool,
}

impl RetrySettings {
    /// Exponential backoff starting at `initial_delay`
    pub fn exponential(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter: false,
        }
    }

    /// Same delay between every attempt
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: false,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: false,
        }
    }
}

impl Validatable for RetrySettings {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_attempts, "max_attempts", self.domain_name())?;
        validate_at_least(self.multiplier, 1.0, "multiplier", self.domain_name())?;

        if self.max_delay < self.initial_delay {
            return Err(self.validation_error(format!(
                "max_delay_ms ({}) must not be smaller than initial_delay_ms ({})",
                self.max_delay.as_millis(),
                self.initial_delay.as_millis()
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "retry"
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_multiplier() -> f64 {
    2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        let settings = RetrySettings::default();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.initial_delay, Duration::from_millis(500));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_retry_validation() {
        let mut settings = RetrySettings::fixed(0, Duration::from_secs(1));
        assert!(settings.validate().is_err());

        settings.max_attempts = 2;
        settings.multiplier = 0.5;
        assert!(settings.validate().is_err());

        let inverted = RetrySettings {
            max_delay: Duration::from_millis(10),
            ..RetrySettings::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_retry_yaml_uses_millis() {
        let yaml = "max_attempts: 4\ninitial_delay_ms: 250\nmax_delay_ms: 2000\n";
        let settings: RetrySettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.max_attempts, 4);
        assert_eq!(settings.initial_delay, Duration::from_millis(250));
        assert_eq!(settings.max_delay, Duration::from_secs(2));
        assert_eq!(settings.multiplier, 2.0);
    }
}
