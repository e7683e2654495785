//! Domain-driven configuration management for scaleprobe
//!
//! Configuration is split by functional domain (target, metrics,
//! deployment, load, matrix, analysis, output, logging), each with serde
//! defaults and validation, and can be overridden through `SCALEPROBE_*`
//! environment variables.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    analysis::{AnalysisConfig, PowerModelConfig},
    deployment::{DeploymentConfig, PlatformKind},
    load::{InputConfig, InputMode, LoadConfig, StopConditionConfig},
    logging::{LogFormat, LogLevel, LogTarget, LoggingConfig},
    matrix::MatrixConfig,
    metrics::{MetricQueries, MetricsConfig},
    output::OutputConfig,
    retry::RetrySettings,
    target::{StrategyConfig, TargetConfig},
    ScaleProbeConfig,
};

// Re-export utilities
pub use domains::utils::{serde_duration, serde_duration_millis};
