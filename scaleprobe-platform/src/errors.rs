//! Platform error types

use scaleprobe_resilience::Retryable;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("Failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Unexpected platform output: {0}")]
    Parse(String),

    #[error("{ready} of {expected} instances ready after {waited:?}")]
    ReadinessTimeout {
        expected: u32,
        ready: usize,
        waited: Duration,
    },

    #[error("Port forward exited early: {0}")]
    PortForward(String),
}

impl Retryable for PlatformError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::CommandFailed { .. } | PlatformError::CommandTimeout { .. }
        )
    }
}
