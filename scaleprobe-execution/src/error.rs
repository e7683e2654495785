//! Errors that halt a harness run

use scaleprobe_core::ResolutionFailure;
use thiserror::Error;

/// Run-level failures.
///
/// Anything narrower than this (a timed out request, a missing metric, a
/// deployment that never became ready) is absorbed into a degraded row.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Target unreachable: {0}")]
    Resolution(#[from] ResolutionFailure),

    #[error("Dataset error: {0}")]
    Dataset(#[from] scaleprobe_output::DatasetError),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
