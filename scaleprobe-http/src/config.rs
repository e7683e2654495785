//! HTTP client configuration

use scaleprobe_config::TargetConfig;
use std::time::Duration;

/// Settings for the pooled client shared by all load workers
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Applied when a call does not pass its own timeout
    pub default_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&TargetConfig::default())
    }
}

impl From<&TargetConfig> for HttpClientConfig {
    fn from(config: &TargetConfig) -> Self {
        Self {
            default_timeout: config.request_timeout,
            connect_timeout: config.probe_timeout,
            user_agent: config.user_agent.clone(),
            pool_max_idle_per_host: 64,
        }
    }
}
