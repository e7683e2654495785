//! Domain-specific configuration modules

pub mod analysis;
pub mod deployment;
pub mod load;
pub mod logging;
pub mod matrix;
pub mod metrics;
pub mod output;
pub mod retry;
pub mod target;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Complete scaleprobe configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ScaleProbeConfig {
    /// Target service and connectivity strategies
    #[serde(default)]
    pub target: target::TargetConfig,

    /// Metrics backend
    #[serde(default)]
    pub metrics: metrics::MetricsConfig,

    /// Deployment platform and timing between phases
    #[serde(default)]
    pub deployment: deployment::DeploymentConfig,

    /// Load generator
    #[serde(default)]
    pub load: load::LoadConfig,

    /// Replica counts and repetitions
    #[serde(default)]
    pub matrix: matrix::MatrixConfig,

    /// Derived-metric thresholds and power model
    #[serde(default)]
    pub analysis: analysis::AnalysisConfig,

    /// Dataset location
    #[serde(default)]
    pub output: output::OutputConfig,

    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl ScaleProbeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.metrics.validate()?;
        self.deployment.validate()?;
        self.load.validate()?;
        self.matrix.validate()?;
        self.analysis.validate()?;
        self.output.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = ScaleProbeConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
